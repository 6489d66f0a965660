// crates/steward-core/src/hashing.rs
// ============================================================================
// Module: Domain Hashing and Canonical Input Builders
// Description: Domain-separated SHA-256 over canonical JSON bytes.
// Purpose: Give every semantic object a collision-isolated, replayable hash.
// Dependencies: crate::canon, sha2
// ============================================================================

//! ## Overview
//! Every hash in Steward is `SHA-256(domain_tag || 0x0A || canonical_bytes)`
//! rendered as lowercase hex. Domain tags are version-qualified strings
//! unique per semantic object, so identical payloads hashed under different
//! tags never collide across contexts.
//!
//! The typed builders validate their inputs (non-empty required strings,
//! bounded decision vocabularies) and return canonical maps ready for
//! [`domain_hash`]. Composite objects hash as
//! `domain_hash(tag, {identity, body})`, which removes field-reordering and
//! length-extension ambiguity.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt::Write as _;

use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

use crate::canon::CanonError;
use crate::canon::CanonMap;
use crate::canon::CanonValue;
use crate::canon::canonical_bytes;

// ============================================================================
// SECTION: Domain Tags
// ============================================================================

/// Domain tag for policy document hashes.
pub const DOMAIN_POLICY_HASH: &str = "policy_hash.v1";

/// Domain tag for request fingerprints.
pub const DOMAIN_REQUEST_FINGERPRINT: &str = "request_fingerprint.v1";

/// Domain tag for audit event fingerprints.
pub const DOMAIN_AUDIT_EVENT: &str = "audit_event.v1";

/// Domain tag for review identifiers.
pub const DOMAIN_REVIEW_ID: &str = "review_id.v1";

/// Domain tag for review decision records.
pub const DOMAIN_REVIEW_DECISION: &str = "review_decision.v1";

/// Domain tag for execution permits.
pub const DOMAIN_EXECUTION_PERMIT: &str = "execution_permit.v1";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors produced by domain hashing and input builders.
///
/// # Invariants
/// - Display forms are stable error codes that appear in tests.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HashError {
    /// The domain tag was empty.
    #[error("secure_layer.hash.invalid domain")]
    EmptyDomain,
    /// A required string field was empty.
    #[error("secure_layer.hash.invalid {field}")]
    EmptyField {
        /// Name of the offending field.
        field: &'static str,
    },
    /// A review decision outside the allow/block vocabulary was supplied.
    #[error("secure_layer.hash.invalid decision")]
    InvalidDecision,
    /// A sequence number exceeds the canonical integer range.
    #[error("secure_layer.hash.invalid sequence")]
    InvalidSequence,
    /// Canonical value construction or rendering failed.
    #[error(transparent)]
    Canon(#[from] CanonError),
}

// ============================================================================
// SECTION: Hash Primitives
// ============================================================================

/// Computes the SHA-256 of raw bytes as lowercase hex.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut rendered = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(rendered, "{byte:02x}");
    }
    rendered
}

/// Computes the domain-separated hash of a canonical value.
///
/// # Errors
///
/// Returns [`HashError::EmptyDomain`] for an empty tag and canonical
/// rendering failures otherwise.
pub fn domain_hash(domain: &str, value: &CanonValue) -> Result<String, HashError> {
    if domain.is_empty() {
        return Err(HashError::EmptyDomain);
    }
    let rendered = canonical_bytes(value)?;
    let mut input = Vec::with_capacity(domain.len() + 1 + rendered.len());
    input.extend_from_slice(domain.as_bytes());
    input.push(b'\n');
    input.extend_from_slice(&rendered);
    Ok(sha256_hex(&input))
}

/// Computes the domain-separated hash of a canonical map.
///
/// # Errors
///
/// Returns [`HashError`] as [`domain_hash`] does.
pub fn domain_hash_map(domain: &str, map: &CanonMap) -> Result<String, HashError> {
    domain_hash(domain, &CanonValue::Map(map.clone()))
}

// ============================================================================
// SECTION: Builder Helpers
// ============================================================================

/// Requires a non-empty string field, returning it as a canonical value.
fn require_non_empty(value: &str, field: &'static str) -> Result<CanonValue, HashError> {
    if value.is_empty() {
        return Err(HashError::EmptyField {
            field,
        });
    }
    Ok(CanonValue::from(value))
}

/// Converts a sequence number into a canonical integer.
fn sequence_value(sequence: u64) -> Result<CanonValue, HashError> {
    i64::try_from(sequence).map(CanonValue::Int).map_err(|_| HashError::InvalidSequence)
}

// ============================================================================
// SECTION: Typed Input Builders
// ============================================================================

/// Builds the canonical input for a policy hash.
///
/// # Errors
///
/// Returns [`HashError::EmptyField`] when any required field is empty.
pub fn build_policy_hash_input(
    policy_id: &str,
    policy_version: &str,
    conflict_resolution_mode: &str,
    tie_breaker: &str,
    stable_order_mode: &str,
    rules_hash: &str,
) -> Result<CanonMap, HashError> {
    let mut input = CanonMap::new();
    input.insert("policy_id".to_string(), require_non_empty(policy_id, "policy_id")?);
    input.insert("policy_version".to_string(), require_non_empty(policy_version, "policy_version")?);
    input.insert(
        "conflict_resolution_mode".to_string(),
        require_non_empty(conflict_resolution_mode, "conflict_resolution_mode")?,
    );
    input.insert("tie_breaker".to_string(), require_non_empty(tie_breaker, "tie_breaker")?);
    input.insert(
        "stable_order_mode".to_string(),
        require_non_empty(stable_order_mode, "stable_order_mode")?,
    );
    input.insert("rules_hash".to_string(), require_non_empty(rules_hash, "rules_hash")?);
    Ok(input)
}

/// Builds the canonical input for a request fingerprint.
///
/// # Errors
///
/// Returns [`HashError::EmptyField`] when any required field is empty.
pub fn build_request_fingerprint_input(
    actor_id: &str,
    capability: &str,
    operation: &str,
    target: &str,
    context_hash: &str,
) -> Result<CanonMap, HashError> {
    let mut input = CanonMap::new();
    input.insert("actor_id".to_string(), require_non_empty(actor_id, "actor_id")?);
    input.insert("capability".to_string(), require_non_empty(capability, "capability")?);
    input.insert("operation".to_string(), require_non_empty(operation, "operation")?);
    input.insert("target".to_string(), require_non_empty(target, "target")?);
    input.insert("context_hash".to_string(), require_non_empty(context_hash, "context_hash")?);
    Ok(input)
}

/// Builds the canonical identity input for an audit event.
///
/// The previous event hash may be empty; it is stored as the empty string so
/// genesis events hash identically regardless of how absence is spelled.
///
/// # Errors
///
/// Returns [`HashError`] when a required field is empty or the sequence is
/// out of canonical range.
pub fn build_audit_event_identity_input(
    event_id: &str,
    event_type: &str,
    policy_hash: &str,
    request_fingerprint: &str,
    sequence: u64,
    stream_id: &str,
    prev_event_hash: &str,
) -> Result<CanonMap, HashError> {
    let mut input = CanonMap::new();
    input.insert("event_id".to_string(), require_non_empty(event_id, "event_id")?);
    input.insert("event_type".to_string(), require_non_empty(event_type, "event_type")?);
    input.insert("policy_hash".to_string(), require_non_empty(policy_hash, "policy_hash")?);
    input.insert(
        "request_fingerprint".to_string(),
        require_non_empty(request_fingerprint, "request_fingerprint")?,
    );
    input.insert("sequence".to_string(), sequence_value(sequence)?);
    input.insert("stream_id".to_string(), require_non_empty(stream_id, "stream_id")?);
    input.insert("prev_event_hash".to_string(), CanonValue::from(prev_event_hash));
    Ok(input)
}

/// Builds the canonical body input for an audit event.
#[must_use]
pub fn build_audit_event_body_input(payload: &CanonMap) -> CanonMap {
    let mut input = CanonMap::new();
    input.insert("payload".to_string(), CanonValue::Map(payload.clone()));
    input
}

/// Builds the canonical input for a review identifier.
///
/// # Errors
///
/// Returns [`HashError::EmptyField`] when any required field is empty.
pub fn build_review_id_input(
    policy_hash: &str,
    request_fingerprint: &str,
) -> Result<CanonMap, HashError> {
    let mut input = CanonMap::new();
    input.insert("policy_hash".to_string(), require_non_empty(policy_hash, "policy_hash")?);
    input.insert(
        "request_fingerprint".to_string(),
        require_non_empty(request_fingerprint, "request_fingerprint")?,
    );
    Ok(input)
}

/// Builds the canonical input for a review decision record.
///
/// # Errors
///
/// Returns [`HashError::InvalidDecision`] for decisions outside
/// `allow`/`block`, and [`HashError::EmptyField`] for empty fields.
pub fn build_review_decision_input(
    review_id: &str,
    policy_hash: &str,
    request_fingerprint: &str,
    decision: &str,
    decided_by: &str,
    signature_ref: &str,
) -> Result<CanonMap, HashError> {
    if decision != "allow" && decision != "block" {
        return Err(HashError::InvalidDecision);
    }
    let mut input = CanonMap::new();
    input.insert("review_id".to_string(), require_non_empty(review_id, "review_id")?);
    input.insert("policy_hash".to_string(), require_non_empty(policy_hash, "policy_hash")?);
    input.insert(
        "request_fingerprint".to_string(),
        require_non_empty(request_fingerprint, "request_fingerprint")?,
    );
    input.insert("decision".to_string(), CanonValue::from(decision));
    input.insert("decided_by".to_string(), require_non_empty(decided_by, "decided_by")?);
    input.insert("signature_ref".to_string(), require_non_empty(signature_ref, "signature_ref")?);
    Ok(input)
}
