// crates/steward-core/src/lib.rs
// ============================================================================
// Module: Steward Core Library
// Description: Canonical hashing, audit chains, and execution permits.
// Purpose: Provide the deterministic kernel every Steward subsystem builds on.
// Dependencies: serde, serde_json, sha2, thiserror
// ============================================================================

//! ## Overview
//! Steward Core holds the replay-critical primitives of the governance
//! control plane: the canonical JSON value type, domain-separated hashing
//! with typed input builders, the audit event taxonomy with chain
//! verification, the append-only artifact sink, and the execution permit
//! validator.
//! Invariants:
//! - Every hash pre-image is canonical bytes; floats are unrepresentable.
//! - Audit streams are append-only with contiguous sequences and linked
//!   predecessor fingerprints.
//! - Permit identifiers are honest fixed points over their own input.
//! - Kill-switch errors are distinct from ordinary validation errors.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod canon;
pub mod hashing;
pub mod permit;
pub mod severity;
pub mod sink;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::AuditError;
pub use audit::AuditEvent;
pub use audit::AuditEventType;
pub use audit::ChainError;
pub use audit::event_fingerprint;
pub use audit::validate_audit_event;
pub use audit::validate_event_stream;
pub use audit::verify_audit_chain;
pub use canon::CanonError;
pub use canon::CanonMap;
pub use canon::CanonValue;
pub use canon::canonical_bytes;
pub use canon::canonical_map_bytes;
pub use hashing::DOMAIN_AUDIT_EVENT;
pub use hashing::DOMAIN_EXECUTION_PERMIT;
pub use hashing::DOMAIN_POLICY_HASH;
pub use hashing::DOMAIN_REQUEST_FINGERPRINT;
pub use hashing::DOMAIN_REVIEW_DECISION;
pub use hashing::DOMAIN_REVIEW_ID;
pub use hashing::HashError;
pub use hashing::build_audit_event_body_input;
pub use hashing::build_audit_event_identity_input;
pub use hashing::build_policy_hash_input;
pub use hashing::build_request_fingerprint_input;
pub use hashing::build_review_decision_input;
pub use hashing::build_review_id_input;
pub use hashing::domain_hash;
pub use hashing::domain_hash_map;
pub use hashing::sha256_hex;
pub use permit::ExecutionPermit;
pub use permit::PermitError;
pub use permit::PermitScope;
pub use permit::canonical_severity_gating;
pub use permit::compute_permit_id;
pub use permit::compute_permit_id_input;
pub use permit::validate_execution_permit_structure;
pub use permit::verify_execution_permit_against_chain;
pub use severity::Severity;
pub use sink::AuditArtifactWriter;
pub use sink::RepoAuditWriter;
pub use sink::SinkError;
pub use sink::build_audit_artifact_bytes;
pub use sink::build_audit_artifact_path;
pub use sink::load_audit_stream;
pub use sink::next_stream_position;
pub use sink::verify_audit_stream;
