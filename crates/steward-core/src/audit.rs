// crates/steward-core/src/audit.rs
// ============================================================================
// Module: Audit Event Taxonomy and Chain Verification
// Description: Typed audit events, per-stream linkage, and replay checks.
// Purpose: Make every audit stream tamper-evident and order-exact.
// Dependencies: crate::{canon, hashing}, serde
// ============================================================================

//! ## Overview
//! Audit streams are append-only per-stream logs. Within a stream, sequences
//! run 0,1,2,… and every event carries the fingerprint of its predecessor in
//! `prev_event_hash`. Any deviation is a hard error; there is no reordering
//! and no gap filling. Callers must present events in sequence order.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::canon::CanonMap;
use crate::canon::CanonValue;
use crate::hashing::DOMAIN_AUDIT_EVENT;
use crate::hashing::HashError;
use crate::hashing::build_audit_event_body_input;
use crate::hashing::build_audit_event_identity_input;
use crate::hashing::domain_hash_map;

// ============================================================================
// SECTION: Event Taxonomy
// ============================================================================

/// Audit event types recognized by the control plane.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditEventType {
    /// A policy document was evaluated.
    #[serde(rename = "policy.evaluated")]
    PolicyEvaluated,
    /// A tool execution was requested.
    #[serde(rename = "tool.exec.requested")]
    ToolExecRequested,
    /// A tool execution was allowed.
    #[serde(rename = "tool.exec.allowed")]
    ToolExecAllowed,
    /// A tool execution was blocked.
    #[serde(rename = "tool.exec.blocked")]
    ToolExecBlocked,
    /// A tool execution proceeded with a warning.
    #[serde(rename = "tool.exec.warned")]
    ToolExecWarned,
    /// A tool execution was paused for review.
    #[serde(rename = "tool.exec.reviewed")]
    ToolExecReviewed,
    /// Network egress was requested.
    #[serde(rename = "net.egress.requested")]
    NetEgressRequested,
    /// Network egress was allowed.
    #[serde(rename = "net.egress.allowed")]
    NetEgressAllowed,
    /// Network egress was blocked.
    #[serde(rename = "net.egress.blocked")]
    NetEgressBlocked,
    /// Network egress proceeded with a warning.
    #[serde(rename = "net.egress.warned")]
    NetEgressWarned,
    /// Network egress was paused for review.
    #[serde(rename = "net.egress.reviewed")]
    NetEgressReviewed,
    /// A secret use was requested.
    #[serde(rename = "secret.use.requested")]
    SecretUseRequested,
    /// A secret use was allowed.
    #[serde(rename = "secret.use.allowed")]
    SecretUseAllowed,
    /// A secret use was blocked.
    #[serde(rename = "secret.use.blocked")]
    SecretUseBlocked,
    /// A secret use proceeded with a warning.
    #[serde(rename = "secret.use.warned")]
    SecretUseWarned,
    /// A secret use was paused for review.
    #[serde(rename = "secret.use.reviewed")]
    SecretUseReviewed,
    /// Execution paused pending a review-ledger decision.
    #[serde(rename = "review.paused")]
    ReviewPaused,
    /// A pending review was resolved.
    #[serde(rename = "review.resolved")]
    ReviewResolved,
    /// An execution permit was consumed.
    #[serde(rename = "permit.used")]
    PermitUsed,
}

impl AuditEventType {
    /// Returns the stable wire label for the event type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PolicyEvaluated => "policy.evaluated",
            Self::ToolExecRequested => "tool.exec.requested",
            Self::ToolExecAllowed => "tool.exec.allowed",
            Self::ToolExecBlocked => "tool.exec.blocked",
            Self::ToolExecWarned => "tool.exec.warned",
            Self::ToolExecReviewed => "tool.exec.reviewed",
            Self::NetEgressRequested => "net.egress.requested",
            Self::NetEgressAllowed => "net.egress.allowed",
            Self::NetEgressBlocked => "net.egress.blocked",
            Self::NetEgressWarned => "net.egress.warned",
            Self::NetEgressReviewed => "net.egress.reviewed",
            Self::SecretUseRequested => "secret.use.requested",
            Self::SecretUseAllowed => "secret.use.allowed",
            Self::SecretUseBlocked => "secret.use.blocked",
            Self::SecretUseWarned => "secret.use.warned",
            Self::SecretUseReviewed => "secret.use.reviewed",
            Self::ReviewPaused => "review.paused",
            Self::ReviewResolved => "review.resolved",
            Self::PermitUsed => "permit.used",
        }
    }
}

// ============================================================================
// SECTION: Audit Event
// ============================================================================

/// One audit event at a fixed position in a stream.
///
/// # Invariants
/// - `prev_event_hash` is empty only at sequence 0.
/// - `payload` is a canonical mapping; floats cannot appear.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Event identifier.
    pub event_id: String,
    /// Event type from the closed taxonomy.
    pub event_type: AuditEventType,
    /// Policy hash under which the event was produced.
    pub policy_hash: String,
    /// Fingerprint of the request that produced the event.
    pub request_fingerprint: String,
    /// Position within the stream, starting at 0.
    pub sequence: u64,
    /// Owning stream identifier.
    pub stream_id: String,
    /// Fingerprint of the immediately preceding event, or empty at genesis.
    #[serde(default)]
    pub prev_event_hash: String,
    /// Schema-less canonical payload.
    pub payload: CanonMap,
}

/// Errors raised by audit event and stream validation.
///
/// # Invariants
/// - Display forms are stable error codes that appear in tests.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuditError {
    /// The event identifier was empty.
    #[error("secure_layer.audit.invalid event_id")]
    EmptyEventId,
    /// The policy hash was empty.
    #[error("secure_layer.audit.invalid policy_hash")]
    EmptyPolicyHash,
    /// The request fingerprint was empty.
    #[error("secure_layer.audit.invalid request_fingerprint")]
    EmptyRequestFingerprint,
    /// The stream identifier was empty.
    #[error("secure_layer.audit.invalid stream_id")]
    EmptyStreamId,
    /// An event belonged to a different stream.
    #[error("secure_layer.audit.invalid stream_id_mismatch")]
    StreamIdMismatch,
    /// Sequences were not contiguous from 0.
    #[error("secure_layer.audit.invalid non_contiguous_sequence")]
    NonContiguousSequence,
    /// A previous-event hash did not match the predecessor fingerprint.
    #[error("secure_layer.audit.invalid prev_event_hash_mismatch")]
    PrevEventHashMismatch,
    /// Fingerprint computation failed.
    #[error(transparent)]
    Hash(#[from] HashError),
}

/// Validates the attribute-level invariants of one audit event.
///
/// # Errors
///
/// Returns [`AuditError`] naming the first violated attribute.
pub fn validate_audit_event(event: &AuditEvent) -> Result<(), AuditError> {
    if event.event_id.is_empty() {
        return Err(AuditError::EmptyEventId);
    }
    if event.policy_hash.is_empty() {
        return Err(AuditError::EmptyPolicyHash);
    }
    if event.request_fingerprint.is_empty() {
        return Err(AuditError::EmptyRequestFingerprint);
    }
    if event.stream_id.is_empty() {
        return Err(AuditError::EmptyStreamId);
    }
    Ok(())
}

/// Validates a contiguous, hash-linked event stream.
///
/// The empty stream is trivially valid. Events must be presented in
/// sequence order; this function never reorders its input.
///
/// # Errors
///
/// Returns [`AuditError`] at the first linkage or shape violation.
pub fn validate_event_stream(events: &[AuditEvent]) -> Result<(), AuditError> {
    let Some(first) = events.first() else {
        return Ok(());
    };
    for event in events {
        validate_audit_event(event)?;
        if event.stream_id != first.stream_id {
            return Err(AuditError::StreamIdMismatch);
        }
    }
    let mut previous_hash = String::new();
    let mut expected_sequence = 0u64;
    for event in events {
        if event.sequence != expected_sequence {
            return Err(AuditError::NonContiguousSequence);
        }
        if event.prev_event_hash != previous_hash {
            return Err(AuditError::PrevEventHashMismatch);
        }
        previous_hash = event_fingerprint(event)?;
        expected_sequence += 1;
    }
    Ok(())
}

/// Computes the domain-separated fingerprint of one audit event.
///
/// # Errors
///
/// Returns [`HashError`] when identity fields are empty or rendering fails.
pub fn event_fingerprint(event: &AuditEvent) -> Result<String, HashError> {
    let identity = build_audit_event_identity_input(
        &event.event_id,
        event.event_type.as_str(),
        &event.policy_hash,
        &event.request_fingerprint,
        event.sequence,
        &event.stream_id,
        &event.prev_event_hash,
    )?;
    let body = build_audit_event_body_input(&event.payload);
    let mut composite = CanonMap::new();
    composite.insert("identity".to_string(), CanonValue::Map(identity));
    composite.insert("body".to_string(), CanonValue::Map(body));
    domain_hash_map(DOMAIN_AUDIT_EVENT, &composite)
}

// ============================================================================
// SECTION: Chain Verification
// ============================================================================

/// Errors raised by offline chain verification, with the failed index.
///
/// # Invariants
/// - Display forms are stable error codes that appear in tests.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// The expected stream identifier was empty.
    #[error("secure_layer.replay.invalid stream_id")]
    EmptyStreamId,
    /// An event belonged to a different stream.
    #[error("secure_layer.replay.invalid stream_id_mismatch index={index}")]
    StreamIdMismatch {
        /// Index of the offending event.
        index: usize,
    },
    /// An event carried an empty policy hash.
    #[error("secure_layer.replay.invalid policy_hash index={index}")]
    EmptyPolicyHash {
        /// Index of the offending event.
        index: usize,
    },
    /// An event carried an empty request fingerprint.
    #[error("secure_layer.replay.invalid request_fingerprint index={index}")]
    EmptyRequestFingerprint {
        /// Index of the offending event.
        index: usize,
    },
    /// A sequence number broke contiguity.
    #[error("secure_layer.replay.invalid sequence index={index}")]
    Sequence {
        /// Index of the offending event.
        index: usize,
    },
    /// A previous-event hash did not match the predecessor fingerprint.
    #[error("secure_layer.replay.invalid prev_event_hash index={index}")]
    PrevEventHash {
        /// Index of the offending event.
        index: usize,
    },
    /// Fingerprint computation failed.
    #[error(transparent)]
    Hash(#[from] HashError),
}

impl ChainError {
    /// Returns the index of the failing event, when one exists.
    #[must_use]
    pub const fn failed_index(&self) -> Option<usize> {
        match self {
            Self::StreamIdMismatch {
                index,
            }
            | Self::EmptyPolicyHash {
                index,
            }
            | Self::EmptyRequestFingerprint {
                index,
            }
            | Self::Sequence {
                index,
            }
            | Self::PrevEventHash {
                index,
            } => Some(*index),
            Self::EmptyStreamId | Self::Hash(_) => None,
        }
    }
}

/// Verifies a full audit chain against an expected stream identifier.
///
/// The empty chain is valid. Input must already be in sequence order;
/// out-of-order input fails with a [`ChainError::Sequence`] at the first
/// offending index.
///
/// # Errors
///
/// Returns [`ChainError`] identifying the first violation and its index.
pub fn verify_audit_chain(events: &[AuditEvent], stream_id: &str) -> Result<(), ChainError> {
    if stream_id.is_empty() {
        return Err(ChainError::EmptyStreamId);
    }
    let mut previous_hash = String::new();
    let mut expected_sequence = 0u64;
    for (index, event) in events.iter().enumerate() {
        if event.stream_id != stream_id {
            return Err(ChainError::StreamIdMismatch {
                index,
            });
        }
        if event.policy_hash.is_empty() {
            return Err(ChainError::EmptyPolicyHash {
                index,
            });
        }
        if event.request_fingerprint.is_empty() {
            return Err(ChainError::EmptyRequestFingerprint {
                index,
            });
        }
        if event.sequence != expected_sequence {
            return Err(ChainError::Sequence {
                index,
            });
        }
        if event.prev_event_hash != previous_hash {
            return Err(ChainError::PrevEventHash {
                index,
            });
        }
        previous_hash = event_fingerprint(event)?;
        expected_sequence += 1;
    }
    Ok(())
}
