// crates/steward-supervisor/src/lib.rs
// ============================================================================
// Module: Steward Supervisor Library
// Description: Governance enforcement, preflight checks, and the control loop.
// Purpose: Drive governed build tasks from backlog to governed commit.
// Dependencies: regex, serde, serde_json, steward-core, steward-forge,
// steward-gate, steward-policy, time
// ============================================================================

//! ## Overview
//! Steward Supervisor is the single-writer control plane: it loads the
//! governance context, validates the environment, gates open pull requests,
//! selects and claims one build task, dispatches a bounded execution under a
//! one-shot permit, verifies the result, creates a governed commit, and
//! appends the consumed permit to the task's audit stream. Audit failures
//! are kill-switches; task failures only make the current task ineligible.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod autonomy;
pub mod commit;
pub mod config;
pub mod control;
pub mod environment;
pub mod exec;
pub mod governance;
pub mod reporter;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use autonomy::AUTONOMOUS_LABEL;
pub use autonomy::AutonomyBacklogEntry;
pub use autonomy::AutonomyError;
pub use autonomy::AutonomyOutcome;
pub use autonomy::AutonomyState;
pub use autonomy::PriorCycleFlags;
pub use autonomy::RECURSIVE_LABEL;
pub use autonomy::autonomy_step;
pub use commit::CommitError;
pub use commit::create_governed_commit;
pub use commit::governed_commit_message;
pub use config::DEFAULT_CLAIM_TTL_SECONDS;
pub use config::DEFAULT_MAX_DURATION_SECONDS;
pub use config::DEFAULT_SLEEP_SECONDS;
pub use config::SupervisorConfig;
pub use control::BUILD_LABEL;
pub use control::CLAIM_LABEL;
pub use control::ControlExit;
pub use control::CycleError;
pub use control::CycleOutcome;
pub use control::GOVERNANCE_STATUS_CONTEXT;
pub use control::PHASES;
pub use control::Supervisor;
pub use environment::EnvironmentDoc;
pub use environment::EnvironmentDocError;
pub use environment::EnvironmentPaths;
pub use environment::EnvironmentReport;
pub use environment::validate_environment;
pub use exec::DispatchInput;
pub use exec::DispatchMetadata;
pub use exec::ExecError;
pub use exec::ExecutionLock;
pub use exec::ExecutorResult;
pub use exec::TIMEOUT_EXIT_STATUS;
pub use exec::deterministic_executor_command;
pub use exec::dispatch_task_once;
pub use exec::validate_dispatch_input;
pub use exec::verify_result;
pub use governance::ComplianceReport;
pub use governance::ContextInfo;
pub use governance::GovernanceEnforcer;
pub use governance::GovernanceViolation;
pub use governance::ViolationRecord;
pub use governance::extract_allowed_files;
pub use reporter::CapturingReporter;
pub use reporter::NullReporter;
pub use reporter::Reporter;
