// crates/steward-gate/src/report.rs
// ============================================================================
// Module: Gate Report Emission
// Description: Stdout report line and governance artifact writer.
// Purpose: Publish gate results in byte-stable forms.
// Dependencies: serde_json, steward-forge
// ============================================================================

//! ## Overview
//! Gate results are published in two stable forms: the `PR_GATE_REPORT`
//! stdout line (compact JSON, sorted keys) and the governance artifact
//! `artifacts/governance/pr-<n>-<sha>.json` (pretty-printed, sorted keys,
//! trailing newline). Key sorting comes from the BTree-backed JSON map, so
//! both forms are byte-stable across runs.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use serde_json::Value;
use serde_json::json;
use thiserror::Error;

use steward_forge::GateLog;

use crate::evaluator::GateReport;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Governance artifact directory, relative to the repository root.
pub const GOVERNANCE_ARTIFACT_DIR: &str = "artifacts/governance";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Report emission errors.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Serialization of the report payload failed.
    #[error("gate report render failure: {0}")]
    Render(String),
    /// The artifact could not be written.
    #[error("gate report io failure: {0}")]
    Io(String),
}

// ============================================================================
// SECTION: Report Line
// ============================================================================

/// Builds the `PR_GATE_REPORT` stdout line.
///
/// # Errors
///
/// Returns [`ReportError::Render`] when serialization fails.
pub fn gate_report_line(
    pr_number: u64,
    head_sha: &str,
    policy_hash: &str,
    report: &GateReport,
) -> Result<String, ReportError> {
    let payload = json!({
        "pr_number": pr_number,
        "head_sha": head_sha,
        "policy_hash": policy_hash,
        "passed": report.passed,
        "failed_gates": report.failed_gates,
        "system_evolution": report.system_evolution,
    });
    let rendered =
        serde_json::to_string(&payload).map_err(|err| ReportError::Render(err.to_string()))?;
    Ok(format!("PR_GATE_REPORT {rendered}"))
}

// ============================================================================
// SECTION: Artifact Writer
// ============================================================================

/// Writes the per-PR governance artifact and returns its path.
///
/// # Errors
///
/// Returns [`ReportError`] when rendering or writing fails.
pub fn write_gate_artifact(
    root: &Path,
    pr_number: u64,
    head_sha: &str,
    policy_hash: &str,
    report: &GateReport,
    log: Option<&GateLog>,
) -> Result<PathBuf, ReportError> {
    let observed: Value =
        serde_json::to_value(&report.observed).map_err(|err| ReportError::Render(err.to_string()))?;
    let payload = json!({
        "pr_number": pr_number,
        "head_sha": head_sha,
        "policy_hash": policy_hash,
        "passed": report.passed,
        "failed_gates": report.failed_gates,
        "observed": observed,
    });
    let mut rendered = serde_json::to_string_pretty(&payload)
        .map_err(|err| ReportError::Render(err.to_string()))?;
    rendered.push('\n');

    let dir = root.join(GOVERNANCE_ARTIFACT_DIR);
    fs::create_dir_all(&dir).map_err(|err| ReportError::Io(err.to_string()))?;
    let path = dir.join(format!("pr-{pr_number}-{head_sha}.json"));
    fs::write(&path, rendered).map_err(|err| ReportError::Io(err.to_string()))?;

    if let Some(log) = log {
        let status = if report.passed { "PASS" } else { "FAIL" };
        log.event("artifact", &format!("wrote pr-{pr_number}-{head_sha}.json status={status}"));
    }
    Ok(path)
}
