// crates/steward-supervisor/src/autonomy.rs
// ============================================================================
// Module: Autonomy Mode
// Description: Self-generated build tasks after the final phase completes.
// Purpose: Extend the backlog deterministically, under recursion gating.
// Dependencies: serde, serde_json, steward-forge
// ============================================================================

//! ## Overview
//! Once the final phase is complete the supervisor may create build tasks
//! from a deterministic backlog document. Two gates apply:
//! - a hard block when the prior cycle recorded a governance violation,
//!   environment failure, rollback, or commit-scope mismatch;
//! - a recursion cooldown: after a recursive creation, one non-recursive
//!   autonomous task must close successfully before the next recursive
//!   creation.
//!
//! The backlog document is a queue; creating a task pops its head.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use steward_forge::ForgeApi;
use steward_forge::ForgeError;

// ============================================================================
// SECTION: Labels
// ============================================================================

/// Label marking autonomy-created tasks.
pub const AUTONOMOUS_LABEL: &str = "autonomous";

/// Label marking recursive autonomy-created tasks.
pub const RECURSIVE_LABEL: &str = "recursive";

// ============================================================================
// SECTION: Backlog Document
// ============================================================================

/// One backlog entry awaiting task creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutonomyBacklogEntry {
    /// Task title.
    pub title: String,
    /// Task body; allowed files are declared in backticks.
    #[serde(default)]
    pub body: String,
    /// Whether the task itself may generate further tasks.
    #[serde(default)]
    pub recursive: bool,
}

/// Autonomy errors.
#[derive(Debug, Error)]
pub enum AutonomyError {
    /// The backlog document could not be read or parsed.
    #[error("autonomy.backlog_invalid {0}")]
    Backlog(String),
    /// The backlog document could not be rewritten after a pop.
    #[error("autonomy.backlog_io {0}")]
    BacklogIo(String),
    /// A forge call failed.
    #[error(transparent)]
    Forge(#[from] ForgeError),
}

/// Loads the backlog queue; a missing file is an empty queue.
///
/// # Errors
///
/// Returns [`AutonomyError::Backlog`] when the document exists but does not
/// parse.
pub fn load_backlog(path: &Path) -> Result<Vec<AutonomyBacklogEntry>, AutonomyError> {
    if !path.is_file() {
        return Ok(Vec::new());
    }
    let raw = fs::read_to_string(path).map_err(|err| AutonomyError::Backlog(err.to_string()))?;
    serde_json::from_str(&raw).map_err(|err| AutonomyError::Backlog(err.to_string()))
}

/// Rewrites the backlog queue after a pop.
fn store_backlog(path: &Path, entries: &[AutonomyBacklogEntry]) -> Result<(), AutonomyError> {
    let rendered = serde_json::to_string_pretty(entries)
        .map_err(|err| AutonomyError::BacklogIo(err.to_string()))?;
    fs::write(path, format!("{rendered}\n")).map_err(|err| AutonomyError::BacklogIo(err.to_string()))
}

// ============================================================================
// SECTION: State and Gating
// ============================================================================

/// Sticky flags from the prior cycle that hard-block recursive creation.
#[derive(Debug, Clone, Copy, Default)]
pub struct PriorCycleFlags {
    /// A governance violation was recorded.
    pub governance_violation: bool,
    /// Environment validation failed.
    pub environment_failure: bool,
    /// A rollback occurred.
    pub rollback: bool,
    /// A commit-scope mismatch was detected.
    pub commit_scope_mismatch: bool,
}

impl PriorCycleFlags {
    /// Returns the first raised flag's stable reason label, if any.
    #[must_use]
    pub const fn blocking_reason(&self) -> Option<&'static str> {
        if self.governance_violation {
            Some("governance_violation")
        } else if self.environment_failure {
            Some("environment_failure")
        } else if self.rollback {
            Some("rollback")
        } else if self.commit_scope_mismatch {
            Some("commit_scope_mismatch")
        } else {
            None
        }
    }
}

/// Cooldown state across autonomy cycles.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutonomyState {
    /// Armed after a recursive creation; cleared by one non-recursive
    /// successful autonomous close.
    pub cooldown_armed: bool,
}

impl AutonomyState {
    /// Records a successful autonomous close and clears the cooldown when
    /// the closed task was not recursive.
    pub const fn record_autonomous_close(&mut self, recursive: bool) {
        if !recursive {
            self.cooldown_armed = false;
        }
    }
}

/// Outcome of one autonomy step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutonomyOutcome {
    /// A task was created from the backlog head.
    Created {
        /// Created issue number.
        issue: u64,
        /// Whether the creation was recursive.
        recursive: bool,
    },
    /// Creation was blocked; carries the stable reason label.
    Blocked {
        /// Reason label for the `RECURSION_BLOCKED` token.
        reason: String,
    },
    /// The backlog is empty but autonomous tasks are still open.
    Idle,
    /// The backlog is empty and no autonomous tasks remain open.
    Complete,
}

// ============================================================================
// SECTION: Autonomy Step
// ============================================================================

/// Runs one autonomy step: gate, pop, create.
///
/// # Errors
///
/// Returns [`AutonomyError`] when the backlog is unreadable or the forge
/// rejects the creation.
pub fn autonomy_step(
    forge: &dyn ForgeApi,
    backlog_path: &Path,
    build_label: &str,
    milestone: Option<i64>,
    state: &mut AutonomyState,
    flags: PriorCycleFlags,
) -> Result<AutonomyOutcome, AutonomyError> {
    if let Some(reason) = flags.blocking_reason() {
        return Ok(AutonomyOutcome::Blocked {
            reason: reason.to_string(),
        });
    }

    let mut backlog = load_backlog(backlog_path)?;
    if backlog.is_empty() {
        let open_autonomous = forge
            .list_issues("open")?
            .iter()
            .any(|issue| issue.has_label(AUTONOMOUS_LABEL));
        return Ok(if open_autonomous {
            AutonomyOutcome::Idle
        } else {
            AutonomyOutcome::Complete
        });
    }

    let entry = backlog.remove(0);
    if entry.recursive && state.cooldown_armed {
        backlog.insert(0, entry);
        return Ok(AutonomyOutcome::Blocked {
            reason: "cooldown_active".to_string(),
        });
    }

    let mut label_ids = Vec::new();
    for name in [build_label, AUTONOMOUS_LABEL] {
        label_ids.push(ensure_label(forge, name)?);
    }
    if entry.recursive {
        label_ids.push(ensure_label(forge, RECURSIVE_LABEL)?);
    }
    let issue = forge.create_issue(&entry.title, &entry.body, &label_ids, milestone)?;
    store_backlog(backlog_path, &backlog)?;
    if entry.recursive {
        state.cooldown_armed = true;
    }
    Ok(AutonomyOutcome::Created {
        issue: issue.number,
        recursive: entry.recursive,
    })
}

/// Finds or creates a label by name and returns its identifier.
fn ensure_label(forge: &dyn ForgeApi, name: &str) -> Result<i64, AutonomyError> {
    if let Some(label) = forge.list_labels()?.into_iter().find(|label| label.name == name) {
        return Ok(label.id);
    }
    Ok(forge.create_label(name, "cccccc", "Created by the supervisor")?.id)
}
