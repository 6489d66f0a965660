// crates/steward-policy/src/egress.rs
// ============================================================================
// Module: Network Egress Evaluation
// Description: Deterministic egress request types and initialization checks.
// Purpose: Keep egress decisions replayable under pinned DNS resolution.
// Dependencies: steward-core, serde
// ============================================================================

//! ## Overview
//! Egress evaluation shares the interpreter's conflict-resolution discipline
//! and adds one hard requirement: DNS resolution must be replayable, either
//! as pinned IPs or as a resolution snapshot hash. Unresolved DNS is not
//! acceptable input.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::interpreter::ConflictResolutionMode;
use crate::interpreter::StableOrderMode;
use crate::interpreter::TieBreaker;

// ============================================================================
// SECTION: Egress Types
// ============================================================================

/// Egress decision vocabulary.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EgressDecision {
    /// Permit the egress.
    Allow,
    /// Deny the egress.
    Block,
    /// Pause pending a review-ledger resolution.
    Review,
}

/// One outbound request under evaluation.
///
/// # Invariants
/// - Fields are snapshots of the request; evaluation never mutates them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EgressRequest {
    /// Target host.
    pub host: String,
    /// Request path.
    pub path: String,
    /// HTTP method.
    pub method: String,
}

/// Replayable DNS resolution mode.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DnsReplayMode {
    /// Resolution was pinned to explicit IPs.
    PinnedIps,
    /// Resolution is represented by a snapshot hash.
    ResolutionSnapshotHash,
}

/// Snapshot of DNS resolution taken at evaluation time.
///
/// # Invariants
/// - `resolved_ips` is meaningful only under [`DnsReplayMode::PinnedIps`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionSnapshot {
    /// Replay mode for this snapshot.
    pub dns_replay_mode: DnsReplayMode,
    /// Pinned IPs, when applicable.
    #[serde(default)]
    pub resolved_ips: Vec<String>,
    /// Snapshot hash, when applicable.
    #[serde(default)]
    pub resolution_snapshot_hash: Option<String>,
}

// ============================================================================
// SECTION: Initialization
// ============================================================================

/// Conflict-resolution configuration supplied to the egress evaluator.
///
/// # Invariants
/// - Shapes mirror the interpreter configuration; the tie breaker is fixed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EgressConflictResolution {
    /// Conflict resolution mode.
    pub mode: ConflictResolutionMode,
    /// Tie breaker; fixed to stable order.
    pub tie_breaker: TieBreaker,
    /// Total order used by the stable pick.
    pub stable_order_mode: StableOrderMode,
}

/// Egress initialization errors.
///
/// # Invariants
/// - Display forms are stable error codes that appear in tests.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EgressInitError {
    /// Interpretation authority was not the supervisor.
    #[error("secure_layer.init.invalid interpretation_authority must be supervisor")]
    Authority,
    /// No conflict-resolution configuration was supplied.
    #[error("secure_layer.init.invalid conflict_resolution required")]
    ConflictResolutionMissing,
    /// No replayable DNS mode was supplied.
    #[error("secure_layer.init.invalid dns_replay_mode required")]
    DnsReplayModeMissing,
}

/// Validates egress evaluator initialization.
///
/// # Errors
///
/// Returns [`EgressInitError`] when the authority, conflict-resolution
/// configuration, or DNS replay mode is missing or invalid.
pub fn validate_network_egress_initialization(
    interpretation_authority: &str,
    conflict_resolution: Option<&EgressConflictResolution>,
    dns_replay_mode: Option<DnsReplayMode>,
) -> Result<(), EgressInitError> {
    if interpretation_authority != "supervisor" {
        return Err(EgressInitError::Authority);
    }
    if conflict_resolution.is_none() {
        return Err(EgressInitError::ConflictResolutionMissing);
    }
    if dns_replay_mode.is_none() {
        return Err(EgressInitError::DnsReplayModeMissing);
    }
    Ok(())
}
