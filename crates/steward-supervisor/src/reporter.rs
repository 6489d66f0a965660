// crates/steward-supervisor/src/reporter.rs
// ============================================================================
// Module: Control Token Reporter
// Description: Stdout token seam for the supervisor loop.
// Purpose: Decouple token emission from the process's stdout handle.
// Dependencies: none beyond std
// ============================================================================

//! ## Overview
//! The supervisor formats every uppercase control token exactly once and
//! hands the line to a [`Reporter`]. The CLI installs a stdout reporter;
//! tests install capturing reporters and assert on the token stream.

// ============================================================================
// SECTION: Reporter Seam
// ============================================================================

use std::sync::Mutex;

/// Token sink for supervisor control output.
pub trait Reporter {
    /// Emits one formatted token line.
    fn emit(&self, line: &str);
}

/// Reporter that discards every line.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn emit(&self, _line: &str) {}
}

/// Reporter that captures every line for later inspection.
#[derive(Debug, Default)]
pub struct CapturingReporter {
    /// Captured lines in emission order.
    lines: Mutex<Vec<String>>,
}

impl CapturingReporter {
    /// Creates an empty capturing reporter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the captured lines.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|lines| lines.clone()).unwrap_or_default()
    }

    /// Returns true when any captured line starts with the prefix.
    #[must_use]
    pub fn has_line_starting_with(&self, prefix: &str) -> bool {
        self.lines().iter().any(|line| line.starts_with(prefix))
    }
}

impl Reporter for CapturingReporter {
    fn emit(&self, line: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line.to_string());
        }
    }
}
