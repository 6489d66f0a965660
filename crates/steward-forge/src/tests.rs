// crates/steward-forge/src/tests.rs
// ============================================================================
// Module: Forge Unit Tests
// Description: Redaction, API base normalization, and identity parsing.
// Purpose: Pin the pure helpers of the forge crate.
// Dependencies: steward-forge
// ============================================================================

//! ## Overview
//! Unit tests for the side-effect-free pieces of the forge crate.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use crate::client::normalize_api_base;
use crate::identity::parse_remote_url;
use crate::redact::sanitize;

#[test]
fn api_base_gains_the_api_suffix_once() {
    assert_eq!(normalize_api_base("http://forge:3000").unwrap(), "http://forge:3000/api/v1");
    assert_eq!(
        normalize_api_base("http://forge:3000/api/v1").unwrap(),
        "http://forge:3000/api/v1"
    );
    assert_eq!(
        normalize_api_base("http://forge:3000/api/v1/extra/").unwrap(),
        "http://forge:3000/api/v1"
    );
    assert_eq!(normalize_api_base("http://forge:3000/").unwrap(), "http://forge:3000/api/v1");
}

#[test]
fn empty_api_base_is_rejected() {
    assert!(normalize_api_base("").is_err());
    assert!(normalize_api_base("///").is_err());
}

#[test]
fn authorization_headers_are_redacted() {
    let line = sanitize("request failed Authorization: token abc123 retrying");
    assert!(!line.contains("abc123"), "credential leaked: {line}");
    assert!(line.contains("Authorization=[REDACTED]"));
}

#[test]
fn bearer_tokens_are_redacted() {
    let line = sanitize("header bearer sEcr.et-42 sent");
    assert!(!line.contains("sEcr.et-42"), "credential leaked: {line}");
    assert!(line.contains("bearer [REDACTED]"));
}

#[test]
fn whitespace_collapses_to_single_spaces() {
    assert_eq!(sanitize("a\t\tb\n c"), "a b c");
}

#[test]
fn ssh_remote_urls_parse() {
    let (owner, repo) = parse_remote_url("ssh://git@localhost:2222/don/dev.git").unwrap();
    assert_eq!(owner, "don");
    assert_eq!(repo, "dev");
}

#[test]
fn scp_style_remote_urls_parse() {
    let (owner, repo) = parse_remote_url("git@forge.example.com:acme/widgets.git").unwrap();
    assert_eq!(owner, "acme");
    assert_eq!(repo, "widgets");
}

#[test]
fn unknown_remote_urls_are_rejected() {
    assert!(parse_remote_url("https://forge.example.com/acme/widgets").is_err());
}

#[test]
fn gate_log_lines_are_sanitized_on_write() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pr-gate.log");
    let log = crate::log::GateLog::new(&path);
    log.event("status_publish", "posted Authorization: token abc123");

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(!text.contains("abc123"), "credential leaked: {text}");
    assert!(text.contains("[status_publish]"));
    assert!(text.ends_with('\n'));
}
