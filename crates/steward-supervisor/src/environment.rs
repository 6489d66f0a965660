// crates/steward-supervisor/src/environment.rs
// ============================================================================
// Module: Environment Validation
// Description: Bounded preflight checks before any task claim.
// Purpose: Refuse to claim work from a broken or unauthenticated host.
// Dependencies: serde, serde_json, steward-core, steward-forge
// ============================================================================

//! ## Overview
//! Environment validation runs every check, collects stable failure codes,
//! and reports; it never mutates the environment document. A failed
//! validation aborts the cycle before any claim and is retried on the next
//! cycle.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use steward_core::sha256_hex;
use steward_forge::ForgeApi;
use steward_forge::ForgeError;
use steward_forge::utc_timestamp;

// ============================================================================
// SECTION: Environment Document
// ============================================================================

/// Environment document loaded from `agents/state/environment.json`.
///
/// # Invariants
/// - Read-only from the controller's perspective.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvironmentDoc {
    /// Forge API base.
    #[serde(default)]
    pub api_base: String,
    /// Pinned repository owner, when any.
    #[serde(default)]
    pub owner: Option<String>,
    /// Pinned repository name, when any.
    #[serde(default)]
    pub repo: Option<String>,
    /// Forge API token.
    #[serde(default)]
    pub api_token: Option<String>,
    /// Alternative token field.
    #[serde(default)]
    pub token: Option<String>,
    /// Alternative token field.
    #[serde(default)]
    pub access_token: Option<String>,
}

/// Environment document errors.
#[derive(Debug, Error)]
pub enum EnvironmentDocError {
    /// The document could not be read.
    #[error("environment document unreadable: {0}")]
    Read(String),
    /// The document did not parse as JSON.
    #[error("environment document invalid: {0}")]
    Parse(String),
}

impl EnvironmentDoc {
    /// Loads the environment document.
    ///
    /// # Errors
    ///
    /// Returns [`EnvironmentDocError`] when the file is unreadable or not
    /// valid JSON.
    pub fn load(path: &Path) -> Result<Self, EnvironmentDocError> {
        let raw =
            fs::read_to_string(path).map_err(|err| EnvironmentDocError::Read(err.to_string()))?;
        serde_json::from_str(&raw).map_err(|err| EnvironmentDocError::Parse(err.to_string()))
    }

    /// Resolves the API token from the document or the `FORGE_TOKEN`
    /// environment variable.
    #[must_use]
    pub fn resolve_token(&self) -> Option<String> {
        self.api_token
            .clone()
            .or_else(|| self.token.clone())
            .or_else(|| self.access_token.clone())
            .or_else(|| std::env::var("FORGE_TOKEN").ok())
            .filter(|token| !token.is_empty())
    }
}

// ============================================================================
// SECTION: Validation Report
// ============================================================================

/// Result of one environment validation pass.
#[derive(Debug, Clone, Serialize)]
pub struct EnvironmentReport {
    /// Whether every check passed.
    pub environment_valid: bool,
    /// Names of passed checks.
    pub checks_passed: Vec<String>,
    /// Stable codes of failed checks.
    pub checks_failed: Vec<String>,
    /// UTC timestamp of the validation.
    pub timestamp: String,
}

/// Inputs for an environment validation pass.
#[derive(Debug, Clone)]
pub struct EnvironmentPaths {
    /// Repository root the git probes run under.
    pub repo_root: PathBuf,
    /// Governance document path.
    pub governance_path: PathBuf,
    /// Environment document path.
    pub environment_path: PathBuf,
    /// Runtime probe command; first element is the program.
    pub runtime_probe: Vec<String>,
}

// ============================================================================
// SECTION: Checks
// ============================================================================

/// Runs one git probe, succeeding only on exit status zero.
fn git_probe(repo_root: &Path, args: &[&str]) -> bool {
    Command::new("git")
        .current_dir(repo_root)
        .args(args)
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// A) Repository state: worktree, remote, reachability, porcelain status.
fn check_repository_state(repo_root: &Path) -> bool {
    git_probe(repo_root, &["rev-parse", "--is-inside-work-tree"])
        && git_probe(repo_root, &["config", "--get", "remote.origin.url"])
        && git_probe(repo_root, &["ls-remote", "--exit-code", "origin"])
        && git_probe(repo_root, &["status", "--porcelain=v1"])
}

/// B) Governance files: presence and hash readability.
fn check_governance_files(paths: &EnvironmentPaths) -> Result<(), String> {
    for path in [&paths.governance_path, &paths.environment_path] {
        if !path.is_file() {
            return Err("environment.governance.missing".to_string());
        }
        match fs::read(path) {
            Ok(bytes) => {
                let _ = sha256_hex(&bytes);
            }
            Err(_) => return Err("environment.governance.unreadable".to_string()),
        }
    }
    Ok(())
}

/// C) Runtime integrity: the configured probe command succeeds.
fn check_runtime(paths: &EnvironmentPaths) -> bool {
    let Some((program, args)) = paths.runtime_probe.split_first() else {
        return false;
    };
    Command::new(program)
        .args(args)
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// D) Forge connectivity: authenticated issue listing must return a list.
fn check_forge_connectivity(forge: &dyn ForgeApi, has_token: bool) -> Result<(), String> {
    if !has_token {
        return Err("environment.forge.auth_failed".to_string());
    }
    match forge.list_issues("open") {
        Ok(_) => Ok(()),
        Err(ForgeError::ApiFailure {
            status,
            ..
        }) if status == 401 || status == 403 => Err("environment.forge.auth_failed".to_string()),
        Err(ForgeError::Http(_)) => Err("environment.forge.unreachable".to_string()),
        Err(_) => Err("environment.forge.invalid_response".to_string()),
    }
}

/// E) Label availability: the claim label must exist.
fn check_label_availability(forge: &dyn ForgeApi, claim_label: &str) -> bool {
    forge
        .list_labels()
        .map(|labels| labels.iter().any(|label| label.name == claim_label))
        .unwrap_or(false)
}

// ============================================================================
// SECTION: Validation
// ============================================================================

/// Runs all environment checks and folds them into a report.
#[must_use]
pub fn validate_environment(
    forge: &dyn ForgeApi,
    paths: &EnvironmentPaths,
    has_token: bool,
    claim_label: &str,
) -> EnvironmentReport {
    let mut checks_passed = Vec::new();
    let mut checks_failed = Vec::new();

    if check_repository_state(&paths.repo_root) {
        checks_passed.push("repository_state".to_string());
    } else {
        checks_failed.push("environment.repository.unavailable".to_string());
    }

    match check_governance_files(paths) {
        Ok(()) => checks_passed.push("governance_files".to_string()),
        Err(code) => checks_failed.push(code),
    }

    if check_runtime(paths) {
        checks_passed.push("runtime".to_string());
    } else {
        checks_failed.push("environment.runtime.invalid".to_string());
    }

    match check_forge_connectivity(forge, has_token) {
        Ok(()) => checks_passed.push("forge_connectivity".to_string()),
        Err(code) => checks_failed.push(code),
    }

    if check_label_availability(forge, claim_label) {
        checks_passed.push("label_availability".to_string());
    } else {
        checks_failed.push("environment.labels.missing".to_string());
    }

    EnvironmentReport {
        environment_valid: checks_failed.is_empty(),
        checks_passed,
        checks_failed,
        timestamp: utc_timestamp(),
    }
}
