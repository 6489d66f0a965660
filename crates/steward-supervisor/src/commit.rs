// crates/steward-supervisor/src/commit.rs
// ============================================================================
// Module: Governed Commit Flow
// Description: Scope-exact staging and conventional commit creation.
// Purpose: Commit exactly the verified executor changes, nothing else.
// Dependencies: std::process
// ============================================================================

//! ## Overview
//! A governed commit stages exactly the verified changed files and commits
//! with the fixed `feat(task-<id>): governed executor result` message. The
//! short hash of the created commit is returned for the close comment. A
//! verified success without file changes produces no commit.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::process::Command;

use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Commit flow errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommitError {
    /// A git command failed.
    #[error("commit.git_failure {0}")]
    Git(String),
}

// ============================================================================
// SECTION: Commit Flow
// ============================================================================

/// Builds the governed commit message for a task.
#[must_use]
pub fn governed_commit_message(task_id: u64) -> String {
    format!("feat(task-{task_id}): governed executor result")
}

/// Runs one git command under the repository root.
fn git(repo_root: &Path, args: &[&str]) -> Result<String, CommitError> {
    let output = Command::new("git")
        .current_dir(repo_root)
        .args(args)
        .output()
        .map_err(|err| CommitError::Git(err.to_string()))?;
    if !output.status.success() {
        return Err(CommitError::Git(format!(
            "git {} failed: {}",
            args.first().copied().unwrap_or(""),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Creates the governed commit for a verified result.
///
/// Stages exactly `changed_files`, commits with the governed message, and
/// returns the short commit hash. Returns `Ok(None)` when there are no
/// changed files, in which case no commit is created.
///
/// # Errors
///
/// Returns [`CommitError`] when staging, committing, or hash resolution
/// fails.
pub fn create_governed_commit(
    repo_root: &Path,
    task_id: u64,
    changed_files: &[String],
) -> Result<Option<String>, CommitError> {
    if changed_files.is_empty() {
        return Ok(None);
    }
    let mut add_args = vec!["add", "--"];
    add_args.extend(changed_files.iter().map(String::as_str));
    git(repo_root, &add_args)?;

    let message = governed_commit_message(task_id);
    git(repo_root, &["commit", "-m", &message])?;
    let short_hash = git(repo_root, &["rev-parse", "--short", "HEAD"])?;
    Ok(Some(short_hash))
}
