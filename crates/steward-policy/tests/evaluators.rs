// crates/steward-policy/tests/evaluators.rs
// ============================================================================
// Module: Evaluator Tests
// Description: Verifies egress initialization, secret injection, and reviews.
// ============================================================================
//! ## Overview
//! Covers the pure evaluators around the interpreter: egress initialization
//! guardrails, secret-injection outcomes, and review ledger resolution with
//! the reconstructed review identity.

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

use std::collections::BTreeSet;

use steward_core::DOMAIN_REVIEW_ID;
use steward_core::build_review_id_input;
use steward_core::domain_hash_map;
use steward_policy::ConflictResolutionMode;
use steward_policy::DnsReplayMode;
use steward_policy::EgressConflictResolution;
use steward_policy::EgressInitError;
use steward_policy::LedgerResolution;
use steward_policy::ReviewArtifact;
use steward_policy::ReviewDecision;
use steward_policy::ReviewResumeArtifact;
use steward_policy::SecretInjectionMode;
use steward_policy::SecretProvider;
use steward_policy::SecretRef;
use steward_policy::SecretValidation;
use steward_policy::StableOrderMode;
use steward_policy::TieBreaker;
use steward_policy::resolve_review_artifact;
use steward_policy::validate_network_egress_initialization;
use steward_policy::validate_secret_injection;
use steward_policy::verify_review_resume;

/// Builds a conflict-resolution configuration for egress initialization.
fn conflict() -> EgressConflictResolution {
    EgressConflictResolution {
        mode: ConflictResolutionMode::DenyWins,
        tie_breaker: TieBreaker::StableOrder,
        stable_order_mode: StableOrderMode::LexicalRuleId,
    }
}

// ============================================================================
// SECTION: Egress Initialization
// ============================================================================

#[test]
fn egress_initialization_accepts_a_complete_configuration() {
    validate_network_egress_initialization(
        "supervisor",
        Some(&conflict()),
        Some(DnsReplayMode::PinnedIps),
    )
    .expect("initialization valid");
}

#[test]
fn egress_initialization_requires_supervisor_authority() {
    let err = validate_network_egress_initialization(
        "executor",
        Some(&conflict()),
        Some(DnsReplayMode::PinnedIps),
    )
    .unwrap_err();
    assert_eq!(err, EgressInitError::Authority);
}

#[test]
fn egress_initialization_requires_conflict_resolution() {
    let err = validate_network_egress_initialization(
        "supervisor",
        None,
        Some(DnsReplayMode::ResolutionSnapshotHash),
    )
    .unwrap_err();
    assert_eq!(err, EgressInitError::ConflictResolutionMissing);
}

#[test]
fn egress_initialization_rejects_unresolved_dns() {
    let err =
        validate_network_egress_initialization("supervisor", Some(&conflict()), None).unwrap_err();
    assert_eq!(err, EgressInitError::DnsReplayModeMissing);
}

// ============================================================================
// SECTION: Secret Injection
// ============================================================================

/// Builds a secret reference with a rotation TTL.
fn rotating_secret(key: &str) -> SecretRef {
    SecretRef {
        provider: SecretProvider::Vault,
        key: key.to_string(),
        version: None,
        expires_at_required: false,
        rotation_ttl_seconds: Some(3600),
    }
}

#[test]
fn secret_injection_rejects_empty_keys() {
    let outcome = validate_secret_injection(
        &rotating_secret(""),
        SecretInjectionMode::Header,
        &BTreeSet::new(),
        &BTreeSet::new(),
    );
    assert_eq!(outcome, SecretValidation::Invalid);
}

#[test]
fn secret_injection_requires_an_expiry_policy() {
    let mut secret = rotating_secret("api-key");
    secret.rotation_ttl_seconds = Some(0);
    let outcome = validate_secret_injection(
        &secret,
        SecretInjectionMode::Header,
        &BTreeSet::new(),
        &BTreeSet::new(),
    );
    assert_eq!(outcome, SecretValidation::Invalid);

    secret.expires_at_required = true;
    let outcome = validate_secret_injection(
        &secret,
        SecretInjectionMode::Header,
        &BTreeSet::new(),
        &BTreeSet::new(),
    );
    assert_eq!(outcome, SecretValidation::Valid);
}

#[test]
fn disallowed_mode_is_invalid_unless_exception_listed() {
    let disallowed: BTreeSet<_> = [SecretInjectionMode::UrlPath].into();
    let outcome = validate_secret_injection(
        &rotating_secret("api-key"),
        SecretInjectionMode::UrlPath,
        &disallowed,
        &BTreeSet::new(),
    );
    assert_eq!(outcome, SecretValidation::Invalid);

    let exceptions: BTreeSet<_> = [SecretInjectionMode::UrlPath].into();
    let outcome = validate_secret_injection(
        &rotating_secret("api-key"),
        SecretInjectionMode::UrlPath,
        &disallowed,
        &exceptions,
    );
    assert_eq!(outcome, SecretValidation::ReviewRequired);
}

// ============================================================================
// SECTION: Review Ledger
// ============================================================================

#[test]
fn review_artifact_resolves_only_on_full_identity_match() {
    let artifact = ReviewArtifact {
        review_id: "rid".to_string(),
        policy_hash: "phash".to_string(),
        request_fingerprint: "rfp".to_string(),
        decision: ReviewDecision::Allow,
    };

    let resolved = resolve_review_artifact(Some(&artifact), "rid", "rfp", "phash");
    assert_eq!(resolved, LedgerResolution::Allow);

    let resolved = resolve_review_artifact(Some(&artifact), "other", "rfp", "phash");
    assert_eq!(resolved, LedgerResolution::Unresolved);

    let resolved = resolve_review_artifact(Some(&artifact), "rid", "rfp", "other");
    assert_eq!(resolved, LedgerResolution::Unresolved);

    let resolved = resolve_review_artifact(None, "rid", "rfp", "phash");
    assert_eq!(resolved, LedgerResolution::Unresolved);
}

/// Builds a resume artifact with the honest review identifier.
fn resume_artifact(policy_hash: &str, request_fingerprint: &str) -> ReviewResumeArtifact {
    let input = build_review_id_input(policy_hash, request_fingerprint).expect("review input");
    let review_id = domain_hash_map(DOMAIN_REVIEW_ID, &input).expect("review id");
    ReviewResumeArtifact {
        review_id,
        policy_hash: policy_hash.to_string(),
        request_fingerprint: request_fingerprint.to_string(),
        decision: "allow".to_string(),
        decided_by: "human-reviewer".to_string(),
        signature_ref: "sig-1".to_string(),
    }
}

#[test]
fn review_resume_accepts_the_reconstructed_identity() {
    let artifact = resume_artifact("phash", "rfp");
    assert!(verify_review_resume("phash", "rfp", Some(&artifact)));
}

#[test]
fn review_resume_rejects_a_foreign_review_id() {
    let mut artifact = resume_artifact("phash", "rfp");
    artifact.review_id = "0".repeat(64);
    assert!(!verify_review_resume("phash", "rfp", Some(&artifact)));
}

#[test]
fn review_resume_rejects_unknown_decisions() {
    let mut artifact = resume_artifact("phash", "rfp");
    artifact.decision = "warn".to_string();
    assert!(!verify_review_resume("phash", "rfp", Some(&artifact)));
}

#[test]
fn review_resume_rejects_missing_attribution() {
    let mut artifact = resume_artifact("phash", "rfp");
    artifact.decided_by = String::new();
    assert!(!verify_review_resume("phash", "rfp", Some(&artifact)));
}

#[test]
fn review_resume_rejects_absent_artifacts() {
    assert!(!verify_review_resume("phash", "rfp", None));
}
