// crates/steward-forge/src/types.rs
// ============================================================================
// Module: Forge Wire Types
// Description: Lenient deserialization shapes for the forge REST surface.
// Purpose: Decode issues, pulls, reviews, statuses, and commits fail-safe.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Forge payloads are untrusted; every field the control plane does not
//! strictly need defaults to its empty form instead of failing the decode.
//! Shape-level failures (a list endpoint returning something else) are
//! handled by the client, which fails closed with a typed error.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Labels and Accounts
// ============================================================================

/// Issue label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    /// Label identifier.
    #[serde(default)]
    pub id: i64,
    /// Label name.
    #[serde(default)]
    pub name: String,
}

/// Account reference embedded in issues, pulls, and reviews.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Login name.
    #[serde(default)]
    pub login: String,
    /// Account type label; `bot` marks automation accounts.
    #[serde(default, rename = "type")]
    pub user_type: String,
}

// ============================================================================
// SECTION: Issues and Milestones
// ============================================================================

/// Milestone attached to issues.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    /// Milestone identifier.
    #[serde(default)]
    pub id: i64,
    /// Milestone title; matched against the fixed phase list.
    #[serde(default)]
    pub title: String,
    /// Milestone state.
    #[serde(default)]
    pub state: String,
}

/// Issue as consumed by the supervisor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Issue number.
    #[serde(default)]
    pub number: u64,
    /// Issue title.
    #[serde(default)]
    pub title: String,
    /// Issue body.
    #[serde(default)]
    pub body: String,
    /// Issue state (`open` or `closed`).
    #[serde(default)]
    pub state: String,
    /// Attached labels.
    #[serde(default)]
    pub labels: Vec<Label>,
    /// Attached milestone, when any.
    #[serde(default)]
    pub milestone: Option<Milestone>,
    /// Issue author.
    #[serde(default)]
    pub user: Account,
}

impl Issue {
    /// Returns true when the issue carries a label with the given name.
    #[must_use]
    pub fn has_label(&self, name: &str) -> bool {
        self.labels.iter().any(|label| label.name == name)
    }
}

/// Timeline entry used for claim-age computation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEvent {
    /// Event type label.
    #[serde(default, rename = "type")]
    pub event_type: String,
    /// Event timestamp (RFC 3339).
    #[serde(default)]
    pub created_at: String,
    /// Label referenced by label events.
    #[serde(default)]
    pub label: Option<Label>,
}

// ============================================================================
// SECTION: Pull Requests
// ============================================================================

/// Branch reference within a pull request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchRef {
    /// Branch name.
    #[serde(default, rename = "ref")]
    pub name: String,
    /// Head commit SHA.
    #[serde(default)]
    pub sha: String,
}

/// Pull request surface consumed by the governance gate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    /// Pull request number.
    #[serde(default)]
    pub number: u64,
    /// Pull request title.
    #[serde(default)]
    pub title: String,
    /// Pull request body.
    #[serde(default)]
    pub body: String,
    /// Base branch.
    #[serde(default)]
    pub base: BranchRef,
    /// Head branch.
    #[serde(default)]
    pub head: BranchRef,
    /// Pull request author.
    #[serde(default)]
    pub user: Account,
}

/// Review entry on a pull request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    /// Review state (`APPROVED`, `CHANGES_REQUESTED`, ...).
    #[serde(default)]
    pub state: String,
    /// Submission timestamp (RFC 3339); lexical comparison is chronological.
    #[serde(default)]
    pub submitted_at: String,
    /// Reviewer account.
    #[serde(default)]
    pub user: Account,
}

/// Commit status entry for a SHA.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitStatus {
    /// Status context; entries without one are skipped.
    #[serde(default)]
    pub context: Option<String>,
    /// Status state (`success`, `failure`, `pending`, ...).
    #[serde(default)]
    pub state: String,
}

/// Changed file entry on a pull request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullFile {
    /// Repository-relative file name.
    #[serde(default)]
    pub filename: String,
}

// ============================================================================
// SECTION: Commit Signatures
// ============================================================================

/// Forge-reported signature verification block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    /// Whether the forge verified the signature.
    #[serde(default)]
    pub verified: bool,
}

/// Nested commit detail carrying a verification block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitDetail {
    /// Verification block, when reported.
    #[serde(default)]
    pub verification: Option<Verification>,
}

/// Raw commit entry on a pull request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrCommit {
    /// Commit SHA.
    #[serde(default)]
    pub sha: String,
    /// Top-level verification block, when reported.
    #[serde(default)]
    pub verification: Option<Verification>,
    /// Nested commit detail, when reported.
    #[serde(default)]
    pub commit: Option<CommitDetail>,
}

/// Normalized signature state for one commit.
///
/// # Invariants
/// - `verifiable == None` or `verified == None` marks the signature as
///   unverifiable; both failure classes fail the signing gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSignature {
    /// Commit SHA.
    pub sha: String,
    /// Whether a verification could be attempted at all.
    pub verifiable: Option<bool>,
    /// Whether the signature verified.
    pub verified: Option<bool>,
}

// ============================================================================
// SECTION: Status Publication
// ============================================================================

/// Commit status state accepted by the forge.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusState {
    /// Evaluation in flight.
    Pending,
    /// All gates passed.
    Success,
    /// At least one gate failed.
    Failure,
}

impl StatusState {
    /// Returns the stable wire label for the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}
