// crates/steward-core/tests/sink.rs
// ============================================================================
// Module: Audit Artifact Sink Tests
// Description: Verifies write-once artifacts, stream loading, and replay.
// ============================================================================
//! ## Overview
//! Exercises the append-only artifact layout in a temporary repository:
//! exclusive creates, the kill-switch on rewrite, contiguity on load, and
//! stored-hash verification.

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

use std::fs;

use steward_core::AuditArtifactWriter;
use steward_core::AuditEvent;
use steward_core::AuditEventType;
use steward_core::CanonMap;
use steward_core::CanonValue;
use steward_core::RepoAuditWriter;
use steward_core::SinkError;
use steward_core::event_fingerprint;
use steward_core::load_audit_stream;
use steward_core::next_stream_position;
use steward_core::verify_audit_stream;

/// Builds one event at a given chain position.
fn event_at(sequence: u64, prev_event_hash: &str) -> AuditEvent {
    let mut payload = CanonMap::new();
    payload.insert("note".to_string(), CanonValue::from("governed"));
    AuditEvent {
        event_id: format!("event-{sequence}"),
        event_type: AuditEventType::PermitUsed,
        policy_hash: "policy-hash".to_string(),
        request_fingerprint: "request-fp".to_string(),
        sequence,
        stream_id: "task-7".to_string(),
        prev_event_hash: prev_event_hash.to_string(),
        payload,
    }
}

#[test]
fn write_event_creates_the_expected_artifact() {
    let repo = tempfile::tempdir().expect("tempdir");
    let writer = RepoAuditWriter::new(repo.path(), "supervisor");

    let rel = writer.write_event(&event_at(0, "")).expect("write");
    assert_eq!(rel, "audit/streams/task-7/0.audit.json");
    assert!(repo.path().join(&rel).is_file());
}

#[test]
fn rewriting_an_artifact_raises_the_kill_switch() {
    let repo = tempfile::tempdir().expect("tempdir");
    let writer = RepoAuditWriter::new(repo.path(), "supervisor");

    writer.write_event(&event_at(0, "")).expect("first write");
    let err = writer.write_event(&event_at(0, "")).unwrap_err();
    assert!(matches!(err, SinkError::AppendViolation { .. }));
    assert!(err.is_kill_switch());
}

#[test]
fn written_stream_loads_and_verifies() {
    let repo = tempfile::tempdir().expect("tempdir");
    let writer = RepoAuditWriter::new(repo.path(), "supervisor");

    let first = event_at(0, "");
    let first_hash = event_fingerprint(&first).expect("fingerprint");
    let second = event_at(1, &first_hash);
    writer.write_event(&first).expect("write first");
    writer.write_event(&second).expect("write second");

    let loaded = load_audit_stream(repo.path(), "task-7").expect("load");
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[0].1, first_hash);

    let length = verify_audit_stream(repo.path(), "task-7").expect("verify");
    assert_eq!(length, 2);
}

#[test]
fn missing_stream_directory_is_an_error_on_load() {
    let repo = tempfile::tempdir().expect("tempdir");
    let err = load_audit_stream(repo.path(), "task-7").unwrap_err();
    assert!(matches!(err, SinkError::StreamMissing));
}

#[test]
fn sequence_gap_on_disk_is_rejected() {
    let repo = tempfile::tempdir().expect("tempdir");
    let writer = RepoAuditWriter::new(repo.path(), "supervisor");

    let first = event_at(0, "");
    let first_hash = event_fingerprint(&first).expect("fingerprint");
    writer.write_event(&first).expect("write first");
    writer.write_event(&event_at(2, &first_hash)).expect("write skipped");

    let err = load_audit_stream(repo.path(), "task-7").unwrap_err();
    assert!(matches!(err, SinkError::MissingSequence));
}

#[test]
fn tampered_stored_hash_is_rejected() {
    let repo = tempfile::tempdir().expect("tempdir");
    let writer = RepoAuditWriter::new(repo.path(), "supervisor");
    let rel = writer.write_event(&event_at(0, "")).expect("write");

    let path = repo.path().join(rel);
    let text = fs::read_to_string(&path).expect("read artifact");
    let mut value: serde_json::Value = serde_json::from_str(&text).expect("parse artifact");
    value["event_hash"] = serde_json::Value::String("0".repeat(64));
    fs::write(&path, serde_json::to_vec(&value).expect("render")).expect("rewrite for test");

    let err = load_audit_stream(repo.path(), "task-7").unwrap_err();
    assert!(matches!(
        err,
        SinkError::EventHashMismatch {
            sequence: 0
        }
    ));
}

#[test]
fn unparsable_sequence_file_name_is_rejected() {
    let repo = tempfile::tempdir().expect("tempdir");
    let writer = RepoAuditWriter::new(repo.path(), "supervisor");
    writer.write_event(&event_at(0, "")).expect("write");

    let stray = repo.path().join("audit/streams/task-7/not-a-number.audit.json");
    fs::write(&stray, b"{}").expect("write stray file");

    let err = load_audit_stream(repo.path(), "task-7").unwrap_err();
    assert!(matches!(err, SinkError::SequenceFile));
}

#[test]
fn next_position_starts_fresh_and_advances() {
    let repo = tempfile::tempdir().expect("tempdir");
    let writer = RepoAuditWriter::new(repo.path(), "supervisor");

    let (sequence, prev) = next_stream_position(repo.path(), "task-7").expect("fresh");
    assert_eq!(sequence, 0);
    assert!(prev.is_empty());

    let first = event_at(0, "");
    let first_hash = event_fingerprint(&first).expect("fingerprint");
    writer.write_event(&first).expect("write");

    let (sequence, prev) = next_stream_position(repo.path(), "task-7").expect("advanced");
    assert_eq!(sequence, 1);
    assert_eq!(prev, first_hash);
}
