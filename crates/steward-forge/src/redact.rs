// crates/steward-forge/src/redact.rs
// ============================================================================
// Module: Credential Redaction
// Description: Strip tokens and Authorization headers from log lines.
// Purpose: Keep credentials out of every persisted log stream.
// Dependencies: regex
// ============================================================================

//! ## Overview
//! Every line written to a log stream passes through [`sanitize`] first.
//! Authorization headers and `token`/`bearer` credentials are replaced with
//! `[REDACTED]`, and whitespace is collapsed to single spaces.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::OnceLock;

use regex::Regex;

// ============================================================================
// SECTION: Patterns
// ============================================================================

/// Authorization header assignments.
static AUTH_PATTERN: OnceLock<Option<Regex>> = OnceLock::new();

/// Bare `token` / `bearer` credentials.
static TOKEN_PATTERN: OnceLock<Option<Regex>> = OnceLock::new();

/// Whitespace runs.
static SPACE_PATTERN: OnceLock<Option<Regex>> = OnceLock::new();

/// Returns the compiled authorization pattern.
fn auth_pattern() -> Option<&'static Regex> {
    AUTH_PATTERN
        .get_or_init(|| Regex::new(r"(?i)authorization\s*[:=]\s*[^\s,;]+").ok())
        .as_ref()
}

/// Returns the compiled token pattern.
fn token_pattern() -> Option<&'static Regex> {
    TOKEN_PATTERN.get_or_init(|| Regex::new(r"(?i)\b(token|bearer)\s+[A-Za-z0-9._\-]+").ok()).as_ref()
}

/// Returns the compiled whitespace pattern.
fn space_pattern() -> Option<&'static Regex> {
    SPACE_PATTERN.get_or_init(|| Regex::new(r"\s+").ok()).as_ref()
}

// ============================================================================
// SECTION: Sanitization
// ============================================================================

/// Redacts credentials and collapses whitespace in a log line.
#[must_use]
pub fn sanitize(text: &str) -> String {
    let mut value = text.to_string();
    if let Some(pattern) = auth_pattern() {
        value = pattern.replace_all(&value, "Authorization=[REDACTED]").into_owned();
    }
    if let Some(pattern) = token_pattern() {
        value = pattern.replace_all(&value, "$1 [REDACTED]").into_owned();
    }
    if let Some(pattern) = space_pattern() {
        value = pattern.replace_all(&value, " ").into_owned();
    }
    value.trim().to_string()
}
