// crates/steward-gate/src/policy.rs
// ============================================================================
// Module: Gate Policy Document
// Description: Versioned YAML policy shapes and the hash-locked loader.
// Purpose: Load the PR governance policy exactly once per decision point.
// Dependencies: serde, serde_yaml, steward-core, steward-forge
// ============================================================================

//! ## Overview
//! The governance policy is a YAML mapping with a required top-level key set
//! {version, branch_rules, approvals, high_risk_paths, commit_signing, ci}.
//! The policy hash is the SHA-256 of the raw UTF-8 bytes, so any byte-level
//! edit to the document changes the hash regardless of YAML equivalence.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use steward_core::sha256_hex;
use steward_forge::GateLog;

// ============================================================================
// SECTION: Policy Shapes
// ============================================================================

/// Named branch pattern.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchPattern {
    /// Regular expression the head branch must match.
    #[serde(default)]
    pub regex: String,
}

/// Branch naming rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchRules {
    /// Named patterns; the `feature` name participates in base-branch gating.
    #[serde(default)]
    pub patterns: BTreeMap<String, BranchPattern>,
    /// Whether feature branches may only target `develop`.
    #[serde(default)]
    pub feature_to_develop_only: bool,
}

/// Per-base-branch approval requirements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchApprovals {
    /// Minimum number of distinct non-author approvers.
    #[serde(default)]
    pub min_approvals: u32,
    /// Whether at least one human approver is required.
    #[serde(default)]
    pub require_human_approval: bool,
    /// Whether at least one non-author reviewer is required.
    #[serde(default)]
    pub require_distinct_reviewer: bool,
}

/// Approval policy across base branches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalsPolicy {
    /// Whether authors may approve their own pull requests.
    #[serde(default)]
    pub disallow_self_approval: bool,
    /// Per-base-branch requirements.
    #[serde(flatten)]
    pub branches: BTreeMap<String, BranchApprovals>,
}

/// Issue reference requirements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueLinkPolicy {
    /// Whether an issue reference is required.
    #[serde(default)]
    pub required: bool,
    /// Patterns, any of which satisfies the requirement.
    #[serde(default)]
    pub patterns: Vec<String>,
}

/// Pull request template requirements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplatePolicy {
    /// H3 sections every pull request body must contain.
    #[serde(default)]
    pub required_sections: Vec<String>,
    /// Placeholder tokens rejected inside required sections.
    #[serde(default)]
    pub reject_placeholders: Vec<String>,
    /// Minimum content length per required section.
    #[serde(default)]
    pub min_section_length: usize,
}

/// Lock token policy for high-risk paths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockPolicy {
    /// Whether high-risk changes require a lock token.
    #[serde(default)]
    pub required_on_high_risk: bool,
    /// Whether a token may be held by at most one open pull request.
    #[serde(default)]
    pub exclusive: bool,
    /// Allowed lock tokens.
    #[serde(default)]
    pub allowed: Vec<String>,
}

/// Required CI checks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiPolicy {
    /// Status contexts that must be `success` on the head SHA.
    #[serde(default)]
    pub required_checks: Vec<String>,
}

/// Escalated approvals under system-evolution paths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalatedApprovals {
    /// Escalated minimum approver count.
    #[serde(default)]
    pub min_approvals: u32,
    /// Whether a human approver becomes mandatory.
    #[serde(default)]
    pub require_human_approval: bool,
}

/// System-evolution escalation policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemEvolutionPolicy {
    /// Path prefixes that mark a change as system evolution.
    #[serde(default)]
    pub detect_paths: Vec<String>,
    /// Escalated approval requirements.
    #[serde(default)]
    pub approvals: EscalatedApprovals,
    /// Escalated CI requirements superseding the base set.
    #[serde(default)]
    pub ci: Option<CiPolicy>,
}

/// Commit signing requirements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSigningPolicy {
    /// Whether every commit must carry a verified signature.
    #[serde(default)]
    pub required: bool,
}

/// The full PR governance policy document.
///
/// # Invariants
/// - Decoded only after the required top-level key set is verified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatePolicy {
    /// Document version marker.
    pub version: serde_yaml::Value,
    /// Branch naming rules.
    pub branch_rules: BranchRules,
    /// Approval requirements.
    pub approvals: ApprovalsPolicy,
    /// Issue reference requirements.
    #[serde(default)]
    pub issue_link: Option<IssueLinkPolicy>,
    /// Pull request template requirements.
    #[serde(default)]
    pub pr_template: Option<TemplatePolicy>,
    /// High-risk path prefixes.
    #[serde(default)]
    pub high_risk_paths: Vec<String>,
    /// Lock token policy.
    #[serde(default)]
    pub locks: Option<LockPolicy>,
    /// Required CI checks.
    pub ci: CiPolicy,
    /// System-evolution escalation.
    #[serde(default)]
    pub system_evolution: Option<SystemEvolutionPolicy>,
    /// Commit signing requirements.
    pub commit_signing: CommitSigningPolicy,
}

// ============================================================================
// SECTION: Loader
// ============================================================================

/// Top-level keys every policy document must declare.
const REQUIRED_KEYS: [&str; 6] =
    ["version", "branch_rules", "approvals", "high_risk_paths", "commit_signing", "ci"];

/// Policy loading errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum PolicyLoadError {
    /// The policy file could not be read.
    #[error("failed to read policy: {0}")]
    Read(String),
    /// The policy file did not parse as YAML.
    #[error("failed to parse policy yaml: {0}")]
    Parse(String),
    /// The document root was not a mapping.
    #[error("policy yaml must be a mapping")]
    NotMapping,
    /// Required top-level keys were missing.
    #[error("policy missing required keys: {0}")]
    MissingKeys(String),
    /// The document did not decode into the policy shape.
    #[error("policy shape invalid: {0}")]
    Decode(String),
}

/// Loads the policy document and its raw-byte hash.
///
/// # Errors
///
/// Returns [`PolicyLoadError`] when the file is unreadable, unparsable, not
/// a mapping, missing required keys, or shaped incorrectly.
pub fn load_policy(
    policy_path: &Path,
    log: Option<&GateLog>,
) -> Result<(GatePolicy, String), PolicyLoadError> {
    let raw = fs::read_to_string(policy_path).map_err(|err| {
        if let Some(log) = log {
            log.event("policy_loader", &format!("load_failed path={} error={err}", policy_path.display()));
        }
        PolicyLoadError::Read(err.to_string())
    })?;

    let document: serde_yaml::Value = serde_yaml::from_str(&raw).map_err(|err| {
        if let Some(log) = log {
            log.event("policy_loader", &format!("parse_failed path={} error={err}", policy_path.display()));
        }
        PolicyLoadError::Parse(err.to_string())
    })?;

    let Some(mapping) = document.as_mapping() else {
        if let Some(log) = log {
            log.event("policy_loader", &format!("invalid_mapping path={}", policy_path.display()));
        }
        return Err(PolicyLoadError::NotMapping);
    };

    let mut missing: Vec<&str> = REQUIRED_KEYS
        .iter()
        .copied()
        .filter(|key| !mapping.contains_key(&serde_yaml::Value::String((*key).to_string())))
        .collect();
    missing.sort_unstable();
    if !missing.is_empty() {
        let joined = missing.join(", ");
        if let Some(log) = log {
            log.event(
                "policy_loader",
                &format!("missing_keys path={} missing={joined}", policy_path.display()),
            );
        }
        return Err(PolicyLoadError::MissingKeys(joined));
    }

    let policy: GatePolicy =
        serde_yaml::from_value(document).map_err(|err| PolicyLoadError::Decode(err.to_string()))?;
    let policy_hash = sha256_hex(raw.as_bytes());
    if let Some(log) = log {
        log.event(
            "policy_loader",
            &format!("loaded path={} policy_hash={policy_hash}", policy_path.display()),
        );
    }
    Ok((policy, policy_hash))
}
