// crates/steward-policy/src/ledger.rs
// ============================================================================
// Module: Review Ledger Resolution
// Description: Deterministic resolution of paused reviews.
// Purpose: Resume paused executions only on fully matching review artifacts.
// Dependencies: steward-core, serde
// ============================================================================

//! ## Overview
//! A paused execution resumes only when a review artifact matches its
//! review identity, policy hash, and request fingerprint exactly. Anything
//! less resolves to `unresolved` and the execution stays paused.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use steward_core::DOMAIN_REVIEW_ID;
use steward_core::build_review_decision_input;
use steward_core::build_review_id_input;
use steward_core::domain_hash_map;

// ============================================================================
// SECTION: Ledger Types
// ============================================================================

/// Resolution of a ledger lookup.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerResolution {
    /// The review allowed the execution.
    Allow,
    /// The review blocked the execution.
    Block,
    /// No matching resolution exists; stay paused.
    Unresolved,
}

/// Review decision recorded in the ledger.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    /// The reviewer allowed the execution.
    Allow,
    /// The reviewer blocked the execution.
    Block,
}

impl ReviewDecision {
    /// Returns the stable wire label for the decision.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Block => "block",
        }
    }
}

/// Minimal review artifact held by a ledger.
///
/// # Invariants
/// - All identity fields must match a request exactly for resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewArtifact {
    /// Review identifier.
    pub review_id: String,
    /// Policy hash the review was decided under.
    pub policy_hash: String,
    /// Fingerprint of the paused request.
    pub request_fingerprint: String,
    /// Recorded decision.
    pub decision: ReviewDecision,
}

/// Full resume artifact including reviewer attribution.
///
/// # Invariants
/// - `decision` is free-form on the wire and validated during resume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewResumeArtifact {
    /// Review identifier.
    pub review_id: String,
    /// Policy hash the review was decided under.
    pub policy_hash: String,
    /// Fingerprint of the paused request.
    pub request_fingerprint: String,
    /// Recorded decision label.
    pub decision: String,
    /// Reviewer identity.
    pub decided_by: String,
    /// Signature reference for the decision.
    pub signature_ref: String,
}

/// Pure ledger interface. Implementations must not hide state mutations.
pub trait ReviewLedgerResolver {
    /// Resolves a review by identity, fingerprint, and policy hash.
    fn resolve(
        &self,
        review_id: &str,
        request_fingerprint: &str,
        policy_hash: &str,
    ) -> LedgerResolution;
}

// ============================================================================
// SECTION: Resolution
// ============================================================================

/// Deterministic artifact validation for review resume.
///
/// Returns `Unresolved` when the artifact is missing or does not match the
/// review identity, policy hash, or request fingerprint.
#[must_use]
pub fn resolve_review_artifact(
    artifact: Option<&ReviewArtifact>,
    review_id: &str,
    request_fingerprint: &str,
    policy_hash: &str,
) -> LedgerResolution {
    let Some(artifact) = artifact else {
        return LedgerResolution::Unresolved;
    };
    if artifact.review_id != review_id {
        return LedgerResolution::Unresolved;
    }
    if artifact.policy_hash != policy_hash {
        return LedgerResolution::Unresolved;
    }
    if artifact.request_fingerprint != request_fingerprint {
        return LedgerResolution::Unresolved;
    }
    match artifact.decision {
        ReviewDecision::Allow => LedgerResolution::Allow,
        ReviewDecision::Block => LedgerResolution::Block,
    }
}

/// Verifies that a resume artifact authorizes resuming a paused execution.
///
/// Reconstructs the expected review identifier from the policy hash and
/// request fingerprint and validates the full decision record shape.
#[must_use]
pub fn verify_review_resume(
    policy_hash: &str,
    request_fingerprint: &str,
    artifact: Option<&ReviewResumeArtifact>,
) -> bool {
    let Some(artifact) = artifact else {
        return false;
    };
    let Ok(review_id_input) = build_review_id_input(policy_hash, request_fingerprint) else {
        return false;
    };
    let Ok(expected_review_id) = domain_hash_map(DOMAIN_REVIEW_ID, &review_id_input) else {
        return false;
    };
    if artifact.review_id != expected_review_id {
        return false;
    }
    if artifact.policy_hash != policy_hash {
        return false;
    }
    if artifact.request_fingerprint != request_fingerprint {
        return false;
    }
    if build_review_decision_input(
        &artifact.review_id,
        &artifact.policy_hash,
        &artifact.request_fingerprint,
        &artifact.decision,
        &artifact.decided_by,
        &artifact.signature_ref,
    )
    .is_err()
    {
        return false;
    }
    artifact.decision == "allow" || artifact.decision == "block"
}
