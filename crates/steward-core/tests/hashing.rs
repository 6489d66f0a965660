// crates/steward-core/tests/hashing.rs
// ============================================================================
// Module: Canonical Hashing Tests
// Description: Verifies canonical byte rendering and domain-separated hashing.
// ============================================================================
//! ## Overview
//! Ensures canonical rendering is key-order independent, rejects floats
//! outright, and that domain hashes are collision-isolated across tags.

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

use serde_json::json;
use steward_core::CanonError;
use steward_core::CanonMap;
use steward_core::CanonValue;
use steward_core::HashError;
use steward_core::build_audit_event_identity_input;
use steward_core::build_policy_hash_input;
use steward_core::build_request_fingerprint_input;
use steward_core::build_review_decision_input;
use steward_core::canonical_bytes;
use steward_core::domain_hash;
use steward_core::domain_hash_map;
use steward_core::sha256_hex;

#[test]
fn canonical_bytes_are_key_order_independent() {
    let value_a: serde_json::Value = serde_json::from_str(r#"{"b":2,"a":1}"#).expect("parse a");
    let value_b: serde_json::Value = serde_json::from_str(r#"{"a":1,"b":2}"#).expect("parse b");

    let canon_a = CanonValue::from_json(&value_a).expect("canon a");
    let canon_b = CanonValue::from_json(&value_b).expect("canon b");

    let bytes_a = canonical_bytes(&canon_a).expect("bytes a");
    let bytes_b = canonical_bytes(&canon_b).expect("bytes b");
    assert_eq!(bytes_a, bytes_b);
}

#[test]
fn canonical_bytes_use_minimal_separators() {
    let value = json!({"a": [1, 2], "b": "x"});
    let canon = CanonValue::from_json(&value).expect("canon");
    let bytes = canonical_bytes(&canon).expect("bytes");
    assert_eq!(bytes, br#"{"a":[1,2],"b":"x"}"#.to_vec());
}

#[test]
fn canonical_conversion_rejects_floats() {
    let value = json!({"rate": 1.5});
    let err = CanonValue::from_json(&value).unwrap_err();
    assert_eq!(err, CanonError::FloatForbidden);
}

#[test]
fn canonical_conversion_rejects_nested_floats() {
    let value = json!({"outer": {"inner": [1, 2.0]}});
    let err = CanonValue::from_json(&value).unwrap_err();
    assert_eq!(err, CanonError::FloatForbidden);
}

#[test]
fn canonical_conversion_rejects_out_of_range_integers() {
    let value = json!({"big": u64::MAX});
    let err = CanonValue::from_json(&value).unwrap_err();
    assert_eq!(err, CanonError::IntegerRange);
}

#[test]
fn canonical_deserialize_rejects_floats() {
    let err = serde_json::from_str::<CanonValue>("3.14").unwrap_err();
    assert!(err.to_string().contains("float_forbidden"));
}

#[test]
fn unicode_strings_render() {
    let value = json!({"emoji": "Hello, world! \u{1f389}"});
    let canon = CanonValue::from_json(&value).expect("canon");
    assert!(canonical_bytes(&canon).is_ok());
}

// ============================================================================
// SECTION: Domain Hash Golden Values
// ============================================================================

#[test]
fn golden_domain_hash_empty_map() {
    let hash = domain_hash_map("audit_event.v1", &CanonMap::new()).expect("hash");
    assert_eq!(hash, "e24ebf2a1cb2e3d2301c7ffa312c7297a8d875c4e5a6bac26aea2704ed464529");
}

#[test]
fn golden_domain_hash_small_map() {
    let value = json!({"a": 1, "b": "two"});
    let canon = CanonValue::from_json(&value).expect("canon");
    let hash = domain_hash("audit_event.v1", &canon).expect("hash");
    assert_eq!(hash, "518754f35d6d457cac0b76a74ee42eddd6847c48264e2281b015b245cedb3664");
}

#[test]
fn golden_sha256_empty_input() {
    assert_eq!(
        sha256_hex(b""),
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    );
}

#[test]
fn domain_hash_is_lowercase_hex() {
    let hash = domain_hash_map("audit_event.v1", &CanonMap::new()).expect("hash");
    assert_eq!(hash.len(), 64);
    assert!(hash.chars().all(|ch| ch.is_ascii_hexdigit() && !ch.is_uppercase()));
}

#[test]
fn distinct_domains_hash_distinctly() {
    let empty = CanonMap::new();
    let hash_a = domain_hash_map("audit_event.v1", &empty).expect("hash a");
    let hash_b = domain_hash_map("policy_hash.v1", &empty).expect("hash b");
    assert_ne!(hash_a, hash_b);
}

#[test]
fn empty_domain_is_rejected() {
    let err = domain_hash_map("", &CanonMap::new()).unwrap_err();
    assert_eq!(err, HashError::EmptyDomain);
}

#[test]
fn domain_hash_is_deterministic_across_calls() {
    let value = json!({"a": 1, "b": [1, 2, 3], "c": {"nested": true}});
    let canon = CanonValue::from_json(&value).expect("canon");
    let first = domain_hash("request_fingerprint.v1", &canon).expect("first");
    let second = domain_hash("request_fingerprint.v1", &canon).expect("second");
    assert_eq!(first, second);
}

// ============================================================================
// SECTION: Typed Builders
// ============================================================================

#[test]
fn policy_hash_builder_rejects_empty_fields() {
    let err = build_policy_hash_input("", "v1", "deny_wins", "stable_order", "lexical_rule_id", "r")
        .unwrap_err();
    assert_eq!(
        err,
        HashError::EmptyField {
            field: "policy_id"
        }
    );
}

#[test]
fn request_fingerprint_builder_rejects_empty_context_hash() {
    let err = build_request_fingerprint_input("actor", "cap", "op", "target", "").unwrap_err();
    assert_eq!(
        err,
        HashError::EmptyField {
            field: "context_hash"
        }
    );
}

#[test]
fn audit_identity_builder_allows_empty_prev_hash() {
    let input = build_audit_event_identity_input("ev", "permit.used", "p", "r", 0, "stream", "")
        .expect("identity");
    assert_eq!(input.get("prev_event_hash").and_then(CanonValue::as_str), Some(""));
}

#[test]
fn audit_identity_builder_rejects_empty_event_id() {
    let err = build_audit_event_identity_input("", "permit.used", "p", "r", 0, "stream", "")
        .unwrap_err();
    assert_eq!(
        err,
        HashError::EmptyField {
            field: "event_id"
        }
    );
}

#[test]
fn review_decision_builder_rejects_unknown_decision() {
    let err = build_review_decision_input("rid", "p", "r", "warn", "human", "sig").unwrap_err();
    assert_eq!(err, HashError::InvalidDecision);
}

#[test]
fn review_decision_builder_accepts_allow_and_block() {
    for decision in ["allow", "block"] {
        let input = build_review_decision_input("rid", "p", "r", decision, "human", "sig")
            .expect("decision input");
        assert_eq!(input.get("decision").and_then(CanonValue::as_str), Some(decision));
    }
}
