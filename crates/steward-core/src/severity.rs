// crates/steward-core/src/severity.rs
// ============================================================================
// Module: Decision Severity
// Description: Shared severity vocabulary for permits and policy decisions.
// Purpose: Keep the allow/warn/block/review set closed and wire-stable.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Permits, policy decisions, and audit gating all share one closed severity
//! vocabulary. The wire form is snake_case and stable.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Severity
// ============================================================================

/// Decision severity emitted by policy evaluation and carried by permits.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Proceed without restriction.
    Allow,
    /// Proceed and emit an audit event.
    Warn,
    /// Deny and emit an audit event.
    Block,
    /// Pause pending a review-ledger resolution.
    Review,
}

impl Severity {
    /// Returns the stable wire label for the severity.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Warn => "warn",
            Self::Block => "block",
            Self::Review => "review",
        }
    }

    /// Returns the gating action mandated for this severity.
    #[must_use]
    pub const fn gating_action(self) -> &'static str {
        match self {
            Self::Allow => "proceed",
            Self::Warn => "proceed_emit_audit",
            Self::Block => "deny_emit_audit",
            Self::Review => "pause_pending_ledger",
        }
    }

    /// All severities in wire order.
    pub const ALL: [Self; 4] = [Self::Allow, Self::Warn, Self::Block, Self::Review];
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
