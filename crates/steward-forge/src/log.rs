// crates/steward-forge/src/log.rs
// ============================================================================
// Module: Gate Log Stream
// Description: Line-delimited log with redaction applied before write.
// Purpose: Record gate activity without leaking credentials.
// Dependencies: crate::redact, time
// ============================================================================

//! ## Overview
//! The gate log is a plain line-delimited stream:
//! `"<UTC> [component] message"`. Both the component and the message are
//! sanitized before the line is written. Logging is best-effort; a failed
//! write never fails the caller.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::Path;
use std::path::PathBuf;

use time::OffsetDateTime;
use time::macros::format_description;

use crate::redact::sanitize;

// ============================================================================
// SECTION: Timestamps
// ============================================================================

/// Formats the current wall clock as `YYYY-MM-DDTHH:MM:SSZ`.
#[must_use]
pub fn utc_timestamp() -> String {
    let format = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]Z");
    OffsetDateTime::now_utc().format(&format).unwrap_or_default()
}

// ============================================================================
// SECTION: Gate Log
// ============================================================================

/// Default gate log path, relative to the repository root.
pub const DEFAULT_GATE_LOG_PATH: &str = "governance/logs/pr-gate.log";

/// Append-only gate log stream.
///
/// # Invariants
/// - Every line is sanitized before write.
/// - Write failures are swallowed; logging never fails the caller.
#[derive(Debug, Clone)]
pub struct GateLog {
    /// Log file path.
    path: PathBuf,
}

impl GateLog {
    /// Creates a log stream at the given path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
        }
    }

    /// Creates a log stream at the default path under a repository root.
    #[must_use]
    pub fn default_under(repo_root: &Path) -> Self {
        Self::new(repo_root.join(DEFAULT_GATE_LOG_PATH))
    }

    /// Appends one sanitized log line.
    pub fn event(&self, component: &str, message: &str) {
        let line =
            format!("{} [{}] {}\n", utc_timestamp(), sanitize(component), sanitize(message));
        if let Some(parent) = self.path.parent()
            && fs::create_dir_all(parent).is_err()
        {
            return;
        }
        let Ok(mut file) = OpenOptions::new().create(true).append(true).open(&self.path) else {
            return;
        };
        let _ = file.write_all(line.as_bytes());
    }
}
