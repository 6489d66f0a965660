// crates/steward-core/tests/audit_chain.rs
// ============================================================================
// Module: Audit Chain Tests
// Description: Verifies stream linkage, contiguity, and tamper detection.
// ============================================================================
//! ## Overview
//! Builds small hash-linked streams and checks that every deviation from the
//! contiguous, linked form is reported with its failing index.

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

use steward_core::AuditError;
use steward_core::AuditEvent;
use steward_core::AuditEventType;
use steward_core::CanonMap;
use steward_core::CanonValue;
use steward_core::ChainError;
use steward_core::event_fingerprint;
use steward_core::validate_audit_event;
use steward_core::validate_event_stream;
use steward_core::verify_audit_chain;

/// Builds one event at a given chain position.
fn event_at(sequence: u64, prev_event_hash: &str) -> AuditEvent {
    let mut payload = CanonMap::new();
    payload.insert("step".to_string(), CanonValue::Int(i64::try_from(sequence).unwrap()));
    AuditEvent {
        event_id: format!("event-{sequence}"),
        event_type: AuditEventType::PolicyEvaluated,
        policy_hash: "policy-hash".to_string(),
        request_fingerprint: "request-fp".to_string(),
        sequence,
        stream_id: "stream-1".to_string(),
        prev_event_hash: prev_event_hash.to_string(),
        payload,
    }
}

/// Builds a correctly linked chain of the requested length.
fn linked_chain(len: u64) -> Vec<AuditEvent> {
    let mut events = Vec::new();
    let mut prev = String::new();
    for sequence in 0 .. len {
        let event = event_at(sequence, &prev);
        prev = event_fingerprint(&event).expect("fingerprint");
        events.push(event);
    }
    events
}

#[test]
fn linked_chain_validates_and_verifies() {
    let events = linked_chain(3);
    validate_event_stream(&events).expect("stream valid");
    verify_audit_chain(&events, "stream-1").expect("chain verifies");
}

#[test]
fn empty_chain_is_valid() {
    validate_event_stream(&[]).expect("empty stream valid");
    verify_audit_chain(&[], "stream-1").expect("empty chain verifies");
}

#[test]
fn sequence_gap_fails_at_index_one() {
    let first = event_at(0, "");
    let first_hash = event_fingerprint(&first).expect("fingerprint");
    let skipped = event_at(2, &first_hash);

    let err = verify_audit_chain(&[first, skipped], "stream-1").unwrap_err();
    assert_eq!(
        err,
        ChainError::Sequence {
            index: 1
        }
    );
    assert_eq!(err.failed_index(), Some(1));
}

#[test]
fn prev_hash_tamper_is_detected() {
    let mut events = linked_chain(3);
    events[2].prev_event_hash = "0".repeat(64);
    let err = verify_audit_chain(&events, "stream-1").unwrap_err();
    assert_eq!(
        err,
        ChainError::PrevEventHash {
            index: 2
        }
    );
}

#[test]
fn payload_tamper_breaks_the_link_after_it() {
    let mut events = linked_chain(2);
    events[0].payload.insert("injected".to_string(), CanonValue::Bool(true));
    let err = verify_audit_chain(&events, "stream-1").unwrap_err();
    assert_eq!(
        err,
        ChainError::PrevEventHash {
            index: 1
        }
    );
}

#[test]
fn foreign_stream_id_is_rejected() {
    let events = linked_chain(2);
    let err = verify_audit_chain(&events, "stream-2").unwrap_err();
    assert_eq!(
        err,
        ChainError::StreamIdMismatch {
            index: 0
        }
    );
}

#[test]
fn empty_expected_stream_id_is_rejected() {
    let events = linked_chain(1);
    let err = verify_audit_chain(&events, "").unwrap_err();
    assert_eq!(err, ChainError::EmptyStreamId);
}

#[test]
fn mixed_stream_ids_fail_stream_validation() {
    let mut events = linked_chain(2);
    events[1].stream_id = "stream-2".to_string();
    let err = validate_event_stream(&events).unwrap_err();
    assert_eq!(err, AuditError::StreamIdMismatch);
}

#[test]
fn genesis_event_must_have_empty_prev_hash() {
    let events = vec![event_at(0, "not-empty")];
    let err = validate_event_stream(&events).unwrap_err();
    assert_eq!(err, AuditError::PrevEventHashMismatch);
}

#[test]
fn event_validation_rejects_empty_identity_fields() {
    let mut event = event_at(0, "");
    event.event_id = String::new();
    assert_eq!(validate_audit_event(&event).unwrap_err(), AuditError::EmptyEventId);

    let mut event = event_at(0, "");
    event.policy_hash = String::new();
    assert_eq!(validate_audit_event(&event).unwrap_err(), AuditError::EmptyPolicyHash);
}

#[test]
fn fingerprint_is_deterministic_and_payload_sensitive() {
    let event = event_at(0, "");
    let first = event_fingerprint(&event).expect("first");
    let second = event_fingerprint(&event).expect("second");
    assert_eq!(first, second);

    let mut changed = event;
    changed.payload.insert("extra".to_string(), CanonValue::from("value"));
    let third = event_fingerprint(&changed).expect("third");
    assert_ne!(first, third);
}
