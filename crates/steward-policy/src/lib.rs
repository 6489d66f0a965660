// crates/steward-policy/src/lib.rs
// ============================================================================
// Module: Steward Policy Library
// Description: Deterministic policy interpretation and pure evaluators.
// Purpose: Resolve rule conflicts, egress, secrets, and reviews replayably.
// Dependencies: steward-core, serde, thiserror
// ============================================================================

//! ## Overview
//! Steward Policy holds the pure evaluators of the control plane: the rule
//! conflict interpreter, the network egress initialization checks, the
//! secret-injection validator, and the review ledger resolver. Nothing in
//! this crate performs I/O or reads a clock; every function is a pure map
//! from inputs to a decision.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod egress;
pub mod interpreter;
pub mod ledger;
pub mod secret;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use egress::DnsReplayMode;
pub use egress::EgressConflictResolution;
pub use egress::EgressDecision;
pub use egress::EgressInitError;
pub use egress::EgressRequest;
pub use egress::ResolutionSnapshot;
pub use egress::validate_network_egress_initialization;
pub use interpreter::ConflictResolutionMode;
pub use interpreter::Decision;
pub use interpreter::DecisionReason;
pub use interpreter::InterpreterError;
pub use interpreter::PolicyInterpretationConfig;
pub use interpreter::RuleMatch;
pub use interpreter::StableOrderMode;
pub use interpreter::TieBreaker;
pub use interpreter::resolve_overlapping_rules;
pub use interpreter::validate_policy_interpretation_config;
pub use interpreter::validate_secure_layer_initialization;
pub use ledger::LedgerResolution;
pub use ledger::ReviewArtifact;
pub use ledger::ReviewDecision;
pub use ledger::ReviewLedgerResolver;
pub use ledger::ReviewResumeArtifact;
pub use ledger::resolve_review_artifact;
pub use ledger::verify_review_resume;
pub use secret::SecretInjectionMode;
pub use secret::SecretProvider;
pub use secret::SecretRef;
pub use secret::SecretValidation;
pub use secret::validate_secret_injection;
