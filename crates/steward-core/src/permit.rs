// crates/steward-core/src/permit.rs
// ============================================================================
// Module: Execution Permit Validation
// Description: One-shot and bounded permits bound to audit chain positions.
// Purpose: Cryptographically bind one dispatch to one chain position.
// Dependencies: crate::{canon, hashing, severity}, serde
// ============================================================================

//! ## Overview
//! An execution permit authorizes exactly one dispatch (one-shot) or a
//! bounded sequence window. Its `permit_id` is an honest fixed point: the
//! stored identifier must equal the domain hash of the permit's own input,
//! so any field mutation after issuance is detectable. Chain binding checks
//! (stream, previous hash, sequence) happen against verifier-supplied
//! current values, never against permit-internal state alone.
//!
//! Validation errors mark a single task ineligible; they are distinct from
//! kill-switch errors, which terminate the controller.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::canon::CanonMap;
use crate::canon::CanonValue;
use crate::hashing::DOMAIN_EXECUTION_PERMIT;
use crate::hashing::HashError;
use crate::hashing::domain_hash_map;
use crate::severity::Severity;

// ============================================================================
// SECTION: Permit Types
// ============================================================================

/// Validity scope of an execution permit.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermitScope {
    /// Valid for exactly the issuing sequence position.
    OneShot,
    /// Valid for a declared sequence window.
    Bounded,
}

impl PermitScope {
    /// Returns the stable wire label for the scope.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OneShot => "one_shot",
            Self::Bounded => "bounded",
        }
    }
}

/// Execution permit binding one dispatch to one audit chain position.
///
/// # Invariants
/// - `permit_id` equals the domain hash of [`compute_permit_id_input`].
/// - `expiry_condition` keys are restricted to `valid_for_sequence_range`
///   and `valid_for_commit`; floats cannot appear anywhere inside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPermit {
    /// Honest permit identifier (domain hash of the permit input).
    pub permit_id: String,
    /// Policy hash in force at issuance.
    pub policy_hash: String,
    /// Fingerprint of the authorized request.
    pub request_fingerprint: String,
    /// Capability description; non-empty mapping.
    pub capability: CanonMap,
    /// Decision severity carried by the permit.
    pub decision: Severity,
    /// Mapping from severity to gating action; covers exactly the four severities.
    pub severity_to_gating: BTreeMap<String, String>,
    /// Issuing authority.
    pub issued_by: String,
    /// Chain sequence at which the permit was issued.
    pub issued_at_sequence: u64,
    /// Stream the permit is bound to.
    pub stream_id: String,
    /// Previous-event hash the permit is bound to; never empty.
    pub prev_event_hash: String,
    /// Validity scope.
    pub permit_scope: PermitScope,
    /// Expiry condition mapping.
    pub expiry_condition: CanonMap,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Permit validation and chain-binding errors.
///
/// # Invariants
/// - Display forms are stable error codes that appear in tests.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PermitError {
    /// The permit identifier was empty.
    #[error("secure_layer.permit.invalid.permit_id")]
    EmptyPermitId,
    /// The policy hash was empty.
    #[error("secure_layer.permit.invalid.policy_hash")]
    EmptyPolicyHash,
    /// The request fingerprint was empty.
    #[error("secure_layer.permit.invalid.request_fingerprint")]
    EmptyRequestFingerprint,
    /// The issuing authority was empty.
    #[error("secure_layer.permit.invalid.issued_by")]
    EmptyIssuedBy,
    /// The stream identifier was empty.
    #[error("secure_layer.permit.invalid.stream_id")]
    EmptyStreamId,
    /// The previous-event hash was empty.
    #[error("secure_layer.permit.invalid.prev_event_hash")]
    EmptyPrevEventHash,
    /// The issuing sequence exceeds the canonical integer range.
    #[error("secure_layer.permit.invalid.issued_at_sequence")]
    IssuedAtSequence,
    /// The capability mapping was empty.
    #[error("secure_layer.permit.invalid.capability")]
    EmptyCapability,
    /// The severity-to-gating mapping did not cover exactly the four severities.
    #[error("secure_layer.permit.invalid.severity_to_gating")]
    SeverityToGating,
    /// The expiry condition mapping was empty.
    #[error("secure_layer.permit.invalid.expiry_condition")]
    EmptyExpiryCondition,
    /// The expiry condition carried an unknown key.
    #[error("secure_layer.permit.invalid.expiry_condition_key")]
    ExpiryConditionKey,
    /// The expiry condition declared neither a range nor a commit.
    #[error("secure_layer.permit.invalid.expiry_condition_missing")]
    ExpiryConditionMissing,
    /// The sequence range was malformed.
    #[error("secure_layer.permit.invalid.valid_for_sequence_range")]
    SequenceRange,
    /// The commit binding was not a non-empty string.
    #[error("secure_layer.permit.invalid.valid_for_commit")]
    CommitBinding,
    /// The stored permit identifier did not match the computed hash.
    #[error("secure_layer.permit.invalid.permit_id_mismatch")]
    PermitIdMismatch,
    /// The verifier-supplied stream identifier was empty.
    #[error("secure_layer.permit.invalid.current_stream_id")]
    EmptyCurrentStreamId,
    /// The verifier-supplied previous-event hash was empty.
    #[error("secure_layer.permit.invalid.current_prev_event_hash")]
    EmptyCurrentPrevEventHash,
    /// The permit stream did not match the current stream.
    #[error("secure_layer.permit.invalid.stream_id_mismatch")]
    StreamIdMismatch,
    /// The permit previous-event hash did not match the current chain head.
    #[error("secure_layer.permit.invalid.prev_event_hash_mismatch")]
    PrevEventHashMismatch,
    /// The permit issuing sequence did not match the current sequence.
    #[error("secure_layer.permit.invalid.sequence_mismatch")]
    SequenceMismatch,
    /// The expiry condition lacked a sequence range during chain verification.
    #[error("secure_layer.permit.invalid.expiry_sequence_range_missing")]
    ExpirySequenceRangeMissing,
    /// A one-shot permit declared a range away from its issuing sequence.
    #[error("secure_layer.permit.invalid.one_shot_range_mismatch")]
    OneShotRangeMismatch,
    /// The current sequence fell outside a bounded permit window.
    #[error("secure_layer.permit.invalid.bounded_range_violation")]
    BoundedRangeViolation,
    /// Permit-id hashing failed.
    #[error(transparent)]
    Hash(#[from] HashError),
}

// ============================================================================
// SECTION: Gating Table
// ============================================================================

/// Returns the canonical severity-to-gating mapping.
#[must_use]
pub fn canonical_severity_gating() -> BTreeMap<String, String> {
    Severity::ALL
        .iter()
        .map(|severity| (severity.as_str().to_string(), severity.gating_action().to_string()))
        .collect()
}

/// Validates that a gating mapping covers exactly the canonical table.
fn validate_severity_to_gating(mapping: &BTreeMap<String, String>) -> Result<(), PermitError> {
    if mapping.len() != Severity::ALL.len() {
        return Err(PermitError::SeverityToGating);
    }
    for severity in Severity::ALL {
        match mapping.get(severity.as_str()) {
            Some(action) if action == severity.gating_action() => {}
            _ => return Err(PermitError::SeverityToGating),
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Expiry Condition
// ============================================================================

/// Extracts and validates the `[start, end]` sequence range.
fn validate_sequence_range(value: &CanonValue) -> Result<(u64, u64), PermitError> {
    let CanonValue::List(items) = value else {
        return Err(PermitError::SequenceRange);
    };
    let [start, end] = items.as_slice() else {
        return Err(PermitError::SequenceRange);
    };
    let (Some(start), Some(end)) = (start.as_int(), end.as_int()) else {
        return Err(PermitError::SequenceRange);
    };
    if start < 0 || end < 0 || start > end {
        return Err(PermitError::SequenceRange);
    }
    let start = u64::try_from(start).map_err(|_| PermitError::SequenceRange)?;
    let end = u64::try_from(end).map_err(|_| PermitError::SequenceRange)?;
    Ok((start, end))
}

/// Validates the expiry condition shape.
///
/// Floats are unrepresentable in [`CanonValue`], so the recursive float
/// rejection required by the contract holds by construction.
fn validate_expiry_condition(expiry: &CanonMap) -> Result<(), PermitError> {
    if expiry.is_empty() {
        return Err(PermitError::EmptyExpiryCondition);
    }
    for key in expiry.keys() {
        if key != "valid_for_sequence_range" && key != "valid_for_commit" {
            return Err(PermitError::ExpiryConditionKey);
        }
    }
    let range = expiry.get("valid_for_sequence_range");
    let commit = expiry.get("valid_for_commit");
    if range.is_none() && commit.is_none() {
        return Err(PermitError::ExpiryConditionMissing);
    }
    if let Some(range) = range {
        validate_sequence_range(range)?;
    }
    if let Some(commit) = commit {
        match commit.as_str() {
            Some(sha) if !sha.is_empty() => {}
            _ => return Err(PermitError::CommitBinding),
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Structure Validation
// ============================================================================

/// Validates the attribute-level invariants of a permit, including the
/// honest permit-id fixed point.
///
/// # Errors
///
/// Returns [`PermitError`] naming the first violated attribute.
pub fn validate_execution_permit_structure(permit: &ExecutionPermit) -> Result<(), PermitError> {
    if permit.permit_id.is_empty() {
        return Err(PermitError::EmptyPermitId);
    }
    if permit.policy_hash.is_empty() {
        return Err(PermitError::EmptyPolicyHash);
    }
    if permit.request_fingerprint.is_empty() {
        return Err(PermitError::EmptyRequestFingerprint);
    }
    if permit.issued_by.is_empty() {
        return Err(PermitError::EmptyIssuedBy);
    }
    if permit.stream_id.is_empty() {
        return Err(PermitError::EmptyStreamId);
    }
    if permit.prev_event_hash.is_empty() {
        return Err(PermitError::EmptyPrevEventHash);
    }
    if permit.capability.is_empty() {
        return Err(PermitError::EmptyCapability);
    }
    validate_severity_to_gating(&permit.severity_to_gating)?;
    validate_expiry_condition(&permit.expiry_condition)?;

    let computed = compute_permit_id(permit)?;
    if permit.permit_id != computed {
        return Err(PermitError::PermitIdMismatch);
    }
    Ok(())
}

// ============================================================================
// SECTION: Permit Identity
// ============================================================================

/// Builds the canonical input whose domain hash is the permit identifier.
///
/// # Errors
///
/// Returns [`PermitError::IssuedAtSequence`] when the issuing sequence
/// exceeds the canonical integer range.
pub fn compute_permit_id_input(permit: &ExecutionPermit) -> Result<CanonMap, PermitError> {
    let sequence =
        i64::try_from(permit.issued_at_sequence).map_err(|_| PermitError::IssuedAtSequence)?;
    let mut gating = CanonMap::new();
    for (key, action) in &permit.severity_to_gating {
        gating.insert(key.clone(), CanonValue::from(action.as_str()));
    }
    let mut input = CanonMap::new();
    input.insert("policy_hash".to_string(), CanonValue::from(permit.policy_hash.as_str()));
    input.insert(
        "request_fingerprint".to_string(),
        CanonValue::from(permit.request_fingerprint.as_str()),
    );
    input.insert("capability".to_string(), CanonValue::Map(permit.capability.clone()));
    input.insert("decision".to_string(), CanonValue::from(permit.decision.as_str()));
    input.insert("severity_to_gating".to_string(), CanonValue::Map(gating));
    input.insert("issued_by".to_string(), CanonValue::from(permit.issued_by.as_str()));
    input.insert("issued_at_sequence".to_string(), CanonValue::Int(sequence));
    input.insert("stream_id".to_string(), CanonValue::from(permit.stream_id.as_str()));
    input.insert("prev_event_hash".to_string(), CanonValue::from(permit.prev_event_hash.as_str()));
    input.insert("permit_scope".to_string(), CanonValue::from(permit.permit_scope.as_str()));
    input.insert("expiry_condition".to_string(), CanonValue::Map(permit.expiry_condition.clone()));
    Ok(input)
}

/// Computes the honest permit identifier.
///
/// # Errors
///
/// Returns [`PermitError`] when input construction or hashing fails.
pub fn compute_permit_id(permit: &ExecutionPermit) -> Result<String, PermitError> {
    let input = compute_permit_id_input(permit)?;
    Ok(domain_hash_map(DOMAIN_EXECUTION_PERMIT, &input)?)
}

// ============================================================================
// SECTION: Chain Binding
// ============================================================================

/// Verifies a permit against the current chain position.
///
/// Checks structure first, then all three bindings (stream, previous hash,
/// sequence), then the scope-specific range rule.
///
/// # Errors
///
/// Returns [`PermitError`] with the precise binding code that failed.
pub fn verify_execution_permit_against_chain(
    permit: &ExecutionPermit,
    current_stream_id: &str,
    current_sequence: u64,
    current_prev_event_hash: &str,
) -> Result<(), PermitError> {
    validate_execution_permit_structure(permit)?;

    if current_stream_id.is_empty() {
        return Err(PermitError::EmptyCurrentStreamId);
    }
    if current_prev_event_hash.is_empty() {
        return Err(PermitError::EmptyCurrentPrevEventHash);
    }
    if permit.stream_id != current_stream_id {
        return Err(PermitError::StreamIdMismatch);
    }
    if permit.prev_event_hash != current_prev_event_hash {
        return Err(PermitError::PrevEventHashMismatch);
    }
    if permit.issued_at_sequence != current_sequence {
        return Err(PermitError::SequenceMismatch);
    }

    let Some(range) = permit.expiry_condition.get("valid_for_sequence_range") else {
        return Err(PermitError::ExpirySequenceRangeMissing);
    };
    let (start, end) = validate_sequence_range(range)?;
    match permit.permit_scope {
        PermitScope::OneShot => {
            if start != permit.issued_at_sequence || end != permit.issued_at_sequence {
                return Err(PermitError::OneShotRangeMismatch);
            }
        }
        PermitScope::Bounded => {
            if current_sequence < start || current_sequence > end {
                return Err(PermitError::BoundedRangeViolation);
            }
        }
    }

    if let Some(commit) = permit.expiry_condition.get("valid_for_commit") {
        match commit.as_str() {
            Some(sha) if !sha.is_empty() => {}
            _ => return Err(PermitError::CommitBinding),
        }
    }
    Ok(())
}
