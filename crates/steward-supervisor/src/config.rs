// crates/steward-supervisor/src/config.rs
// ============================================================================
// Module: Supervisor Configuration
// Description: Paths, timeouts, and loop bounds for the control loop.
// Purpose: Keep every tunable explicit and owned by the controller.
// Dependencies: none beyond std
// ============================================================================

//! ## Overview
//! All supervisor tunables live here with their contract defaults: the
//! 1800-second claim TTL, the 60-second executor bound, the 60-second
//! inter-cycle sleep, and the protected branch set.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Default claim TTL in seconds.
pub const DEFAULT_CLAIM_TTL_SECONDS: u64 = 1800;

/// Default executor duration bound in seconds.
pub const DEFAULT_MAX_DURATION_SECONDS: u64 = 60;

/// Default inter-cycle sleep in seconds.
pub const DEFAULT_SLEEP_SECONDS: u64 = 60;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Supervisor loop configuration.
///
/// # Invariants
/// - Paths are repository-relative or absolute; the controller never
///   rewrites them at runtime.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Repository root for audit streams, artifacts, and commits.
    pub repo_root: PathBuf,
    /// Governance document path.
    pub governance_path: PathBuf,
    /// Environment document path.
    pub environment_path: PathBuf,
    /// PR governance policy document path.
    pub policy_path: PathBuf,
    /// JSONL governance violation log path.
    pub violation_log_path: PathBuf,
    /// Gate log stream path.
    pub gate_log_path: PathBuf,
    /// Autonomy backlog document path.
    pub autonomy_backlog_path: PathBuf,
    /// Claim TTL in seconds.
    pub claim_ttl_seconds: u64,
    /// Inter-cycle sleep in seconds.
    pub sleep_seconds: u64,
    /// Executor duration bound in seconds.
    pub max_duration_seconds: u64,
    /// Branches whose pull requests are gated.
    pub protected_branches: Vec<String>,
    /// Executor command override; empty selects the built-in deterministic
    /// executor.
    pub executor_command: Vec<String>,
    /// Runtime probe command for environment validation.
    pub runtime_probe: Vec<String>,
    /// Whether a forge token is configured.
    pub has_token: bool,
    /// Optional cycle budget; `None` runs until a task is handled.
    pub max_cycles: Option<u64>,
}

impl SupervisorConfig {
    /// Builds a configuration rooted at a repository checkout, with the
    /// contract defaults.
    #[must_use]
    pub fn rooted_at(repo_root: impl Into<PathBuf>) -> Self {
        let repo_root = repo_root.into();
        Self {
            governance_path: repo_root.join("docs/governance.md"),
            environment_path: repo_root.join("agents/state/environment.json"),
            policy_path: repo_root.join("governance/policy/pr-governance.v0.2.yaml"),
            violation_log_path: repo_root.join("logs/governance_violations.log"),
            gate_log_path: repo_root.join("governance/logs/pr-gate.log"),
            autonomy_backlog_path: repo_root.join("agents/state/autonomy_backlog.json"),
            claim_ttl_seconds: DEFAULT_CLAIM_TTL_SECONDS,
            sleep_seconds: DEFAULT_SLEEP_SECONDS,
            max_duration_seconds: DEFAULT_MAX_DURATION_SECONDS,
            protected_branches: vec!["main".to_string(), "develop".to_string()],
            executor_command: Vec::new(),
            runtime_probe: vec!["git".to_string(), "--version".to_string()],
            has_token: false,
            max_cycles: None,
            repo_root,
        }
    }
}
