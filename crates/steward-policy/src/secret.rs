// crates/steward-policy/src/secret.rs
// ============================================================================
// Module: Secret Injection Validation
// Description: Pure validation of secret references and injection modes.
// Purpose: Refuse unexpiring secrets and disallowed injection surfaces.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Secret injection never touches secret material; it validates the
//! reference and the surface the secret would be injected into. A secret
//! without a declared expiry policy is invalid, and disallowed injection
//! modes are rejected unless explicitly exception-listed, in which case the
//! use pauses for review.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Secret References
// ============================================================================

/// Backend holding the secret material.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretProvider {
    /// A vault service.
    Vault,
    /// Process environment.
    Env,
    /// OS keychain.
    Keychain,
    /// Key management service.
    Kms,
}

/// Reference to a secret, without its material.
///
/// # Invariants
/// - `rotation_ttl_seconds` of zero does not count as an expiry policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretRef {
    /// Backend provider.
    pub provider: SecretProvider,
    /// Secret key within the provider.
    pub key: String,
    /// Optional secret version.
    #[serde(default)]
    pub version: Option<String>,
    /// Whether an expiry timestamp is mandated at use time.
    #[serde(default)]
    pub expires_at_required: bool,
    /// Optional rotation TTL in seconds.
    #[serde(default)]
    pub rotation_ttl_seconds: Option<u64>,
}

/// Surface a secret may be injected into.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretInjectionMode {
    /// HTTP header.
    Header,
    /// Request body field.
    BodyField,
    /// Query parameter.
    QueryParam,
    /// URL path segment.
    UrlPath,
}

/// Outcome of secret-injection validation.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretValidation {
    /// Injection is valid.
    Valid,
    /// Injection is invalid.
    Invalid,
    /// Injection requires a ledger review.
    ReviewRequired,
}

// ============================================================================
// SECTION: Validation
// ============================================================================

/// Validates one secret injection against the declared mode policy.
#[must_use]
pub fn validate_secret_injection(
    secret_ref: &SecretRef,
    injection_mode: SecretInjectionMode,
    disallowed_modes: &BTreeSet<SecretInjectionMode>,
    exception_modes: &BTreeSet<SecretInjectionMode>,
) -> SecretValidation {
    if secret_ref.key.is_empty() {
        return SecretValidation::Invalid;
    }
    let has_expiry_policy = secret_ref.expires_at_required
        || secret_ref.rotation_ttl_seconds.is_some_and(|ttl| ttl > 0);
    if !has_expiry_policy {
        return SecretValidation::Invalid;
    }
    if disallowed_modes.contains(&injection_mode) {
        if exception_modes.contains(&injection_mode) {
            return SecretValidation::ReviewRequired;
        }
        return SecretValidation::Invalid;
    }
    SecretValidation::Valid
}
