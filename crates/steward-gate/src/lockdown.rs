// crates/steward-gate/src/lockdown.rs
// ============================================================================
// Module: Policy Hash Lockdown
// Description: Baseline capture and per-cycle policy-hash assertion.
// Purpose: Fail the cycle closed when the policy document changes at runtime.
// Dependencies: serde_json, steward-forge
// ============================================================================

//! ## Overview
//! On startup the controller loads the policy once and records the baseline
//! hash. Every subsequent cycle reloads the document and compares hashes;
//! any mismatch raises `POLICY_LOCKDOWN` carrying both hashes and the cycle
//! fails closed. Two loads of an unchanged file always produce equal hashes
//! because the hash covers the raw bytes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use serde_json::json;
use thiserror::Error;

use steward_forge::GateLog;

use crate::policy::GatePolicy;
use crate::policy::PolicyLoadError;
use crate::policy::load_policy;
use crate::report::GOVERNANCE_ARTIFACT_DIR;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Lockdown errors.
///
/// # Invariants
/// - The mismatch display form is the external `POLICY_LOCKDOWN` contract.
#[derive(Debug, Error)]
pub enum LockdownError {
    /// The policy hash diverged from the captured baseline.
    #[error("POLICY_LOCKDOWN baseline={baseline} current={current}")]
    Mismatch {
        /// Hash captured at startup.
        baseline: String,
        /// Hash observed this cycle.
        current: String,
    },
    /// The policy failed to load.
    #[error(transparent)]
    Load(#[from] PolicyLoadError),
    /// The baseline artifact could not be written.
    #[error("policy baseline io failure: {0}")]
    Io(String),
}

// ============================================================================
// SECTION: Baseline
// ============================================================================

/// Captured policy baseline.
///
/// # Invariants
/// - `policy_hash_baseline` never changes after capture.
#[derive(Debug, Clone)]
pub struct PolicyBaseline {
    /// Path of the policy document.
    policy_path: PathBuf,
    /// Hash captured at startup.
    policy_hash_baseline: String,
}

impl PolicyBaseline {
    /// Loads the policy once and captures its hash as the baseline.
    ///
    /// # Errors
    ///
    /// Returns [`LockdownError::Load`] when the initial load fails.
    pub fn capture(
        policy_path: &Path,
        log: Option<&GateLog>,
    ) -> Result<(Self, GatePolicy), LockdownError> {
        let (policy, policy_hash) = load_policy(policy_path, log)?;
        Ok((
            Self {
                policy_path: policy_path.to_path_buf(),
                policy_hash_baseline: policy_hash,
            },
            policy,
        ))
    }

    /// Returns the captured baseline hash.
    #[must_use]
    pub fn baseline_hash(&self) -> &str {
        &self.policy_hash_baseline
    }

    /// Returns the policy document path.
    #[must_use]
    pub fn policy_path(&self) -> &Path {
        &self.policy_path
    }

    /// Reloads the policy and asserts the hash against the baseline.
    ///
    /// # Errors
    ///
    /// Returns [`LockdownError::Mismatch`] with both hashes when the
    /// document changed, or [`LockdownError::Load`] when the reload fails.
    pub fn recheck(&self, log: Option<&GateLog>) -> Result<GatePolicy, LockdownError> {
        let (policy, current) = load_policy(&self.policy_path, log)?;
        if current != self.policy_hash_baseline {
            return Err(LockdownError::Mismatch {
                baseline: self.policy_hash_baseline.clone(),
                current,
            });
        }
        Ok(policy)
    }

    /// Writes the baseline artifact under the governance artifact directory.
    ///
    /// # Errors
    ///
    /// Returns [`LockdownError::Io`] when the artifact cannot be written.
    pub fn write_artifact(&self, root: &Path) -> Result<PathBuf, LockdownError> {
        let payload = json!({
            "policy_path": self.policy_path.display().to_string(),
            "policy_hash_baseline": self.policy_hash_baseline,
        });
        let mut rendered =
            serde_json::to_string_pretty(&payload).map_err(|err| LockdownError::Io(err.to_string()))?;
        rendered.push('\n');

        let dir = root.join(GOVERNANCE_ARTIFACT_DIR);
        fs::create_dir_all(&dir).map_err(|err| LockdownError::Io(err.to_string()))?;
        let path = dir.join("policy-baseline.json");
        fs::write(&path, rendered).map_err(|err| LockdownError::Io(err.to_string()))?;
        Ok(path)
    }
}
