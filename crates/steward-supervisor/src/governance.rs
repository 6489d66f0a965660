// crates/steward-supervisor/src/governance.rs
// ============================================================================
// Module: Governance Enforcer
// Description: Context immutability, instruction screening, commit policy.
// Purpose: Reject ungoverned work before anything irreversible happens.
// Dependencies: regex, serde_json, steward-core, steward-forge
// ============================================================================

//! ## Overview
//! The enforcer loads the governance document and the environment document
//! once at startup and captures `governance_hash` over the raw UTF-8 bytes.
//! Every later gate re-reads and re-hashes the document; any drift is a
//! governance violation. Instruction screening and the commit-policy gate
//! run before dispatch and before commit respectively. Every violation is
//! appended to a JSONL log and folded into the compliance report block.
//!
//! Screening patterns are fixed. A pattern that fails to compile counts as
//! a violation, never as a pass.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fs;
use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::PathBuf;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use steward_core::sha256_hex;
use steward_forge::utc_timestamp;

// ============================================================================
// SECTION: Errors and Reports
// ============================================================================

/// Raised when a governance enforcement check fails.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GovernanceViolation {
    /// The governance context could not be loaded.
    #[error("governance context loading failed")]
    ContextLoading,
    /// The governance document changed after startup.
    #[error("governance contract mutation detected")]
    Immutability,
    /// An instruction failed validation.
    #[error("instruction validation failed: {0}")]
    Instruction(String),
    /// Pre-computation requirements were not met.
    #[error("pre-computation validation failed")]
    PreComputation,
    /// The commit policy was violated.
    #[error("commit policy validation failed: {0}")]
    CommitPolicy(String),
}

/// One recorded violation.
#[derive(Debug, Clone, Serialize)]
pub struct ViolationRecord {
    /// UTC timestamp of the violation.
    pub timestamp: String,
    /// Severity; always `critical`.
    pub severity: &'static str,
    /// Rule that was violated.
    pub rule: String,
    /// Human-readable message.
    pub message: String,
    /// Context fields.
    pub context: BTreeMap<String, String>,
}

/// Compliance summary for the current enforcement window.
#[derive(Debug, Clone)]
pub struct ComplianceReport {
    /// Whether the window is free of violations.
    pub governance_compliant: bool,
    /// Violations recorded in this window.
    pub violations: Vec<ViolationRecord>,
    /// Enforcement actions taken.
    pub enforcement_actions: Vec<String>,
}

impl Default for ComplianceReport {
    fn default() -> Self {
        Self {
            governance_compliant: true,
            violations: Vec::new(),
            enforcement_actions: Vec::new(),
        }
    }
}

/// Context information captured at startup.
#[derive(Debug, Clone)]
pub struct ContextInfo {
    /// SHA-256 of the governance document's UTF-8 bytes.
    pub governance_hash: String,
}

// ============================================================================
// SECTION: Allowed-File Extraction
// ============================================================================

/// Extracts backtick-quoted repository paths from instruction text.
///
/// Only `[A-Za-z0-9_./-]` paths wrapped in backticks are recognized.
#[must_use]
pub fn extract_allowed_files(instruction_text: &str) -> BTreeSet<String> {
    let Some(pattern) = compile(r"`([A-Za-z0-9_./-]+)`") else {
        return BTreeSet::new();
    };
    pattern
        .captures_iter(instruction_text)
        .map(|captures| captures[1].to_string())
        .collect()
}

/// Compiles a fixed pattern; `None` means the screen must fail closed.
fn compile(pattern: &str) -> Option<Regex> {
    Regex::new(pattern).ok()
}

// ============================================================================
// SECTION: Enforcer
// ============================================================================

/// Governance enforcer owning the context hashes and violation log.
///
/// # Invariants
/// - `governance_hash` never changes after a successful `load_context`.
#[derive(Debug)]
pub struct GovernanceEnforcer {
    /// Path of the governance document.
    governance_path: PathBuf,
    /// Path of the environment document.
    environment_path: PathBuf,
    /// Path of the JSONL violation log.
    violation_log_path: PathBuf,
    /// Hash captured at startup.
    governance_hash: Option<String>,
    /// Parsed environment document.
    environment: Option<Value>,
    /// Compliance report for the current window.
    last_report: ComplianceReport,
}

impl GovernanceEnforcer {
    /// Creates an enforcer over the given document paths.
    #[must_use]
    pub fn new(
        governance_path: impl Into<PathBuf>,
        environment_path: impl Into<PathBuf>,
        violation_log_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            governance_path: governance_path.into(),
            environment_path: environment_path.into(),
            violation_log_path: violation_log_path.into(),
            governance_hash: None,
            environment: None,
            last_report: ComplianceReport::default(),
        }
    }

    /// Returns the captured governance hash, when context is loaded.
    #[must_use]
    pub fn governance_hash(&self) -> Option<&str> {
        self.governance_hash.as_deref()
    }

    /// Returns the parsed environment document, when context is loaded.
    #[must_use]
    pub const fn environment(&self) -> Option<&Value> {
        self.environment.as_ref()
    }

    /// Records one violation in the report and the JSONL log.
    fn record_violation(
        &mut self,
        rule: &str,
        message: &str,
        context: BTreeMap<String, String>,
    ) {
        let record = ViolationRecord {
            timestamp: utc_timestamp(),
            severity: "critical",
            rule: rule.to_string(),
            message: message.to_string(),
            context,
        };
        self.last_report.governance_compliant = false;
        self.last_report.violations.push(record.clone());
        self.last_report.enforcement_actions.push("task_rejected".to_string());

        if let Ok(line) = serde_json::to_string(&record) {
            if let Some(parent) = self.violation_log_path.parent()
                && fs::create_dir_all(parent).is_err()
            {
                return;
            }
            if let Ok(mut file) =
                OpenOptions::new().create(true).append(true).open(&self.violation_log_path)
            {
                let _ = writeln!(file, "{line}");
            }
        }
    }

    /// Resets the compliance report for a new enforcement window.
    pub fn reset_report(&mut self) {
        self.last_report = ComplianceReport::default();
    }

    /// Loads the governance and environment documents and captures the
    /// governance hash.
    ///
    /// # Errors
    ///
    /// Returns [`GovernanceViolation::ContextLoading`] when either document
    /// cannot be read or parsed.
    pub fn load_context(&mut self) -> Result<ContextInfo, GovernanceViolation> {
        self.reset_report();
        let governance_text = match fs::read_to_string(&self.governance_path) {
            Ok(text) => text,
            Err(err) => {
                self.record_violation(
                    "context_loading",
                    &format!("Failed to load governance context: {err}"),
                    BTreeMap::new(),
                );
                return Err(GovernanceViolation::ContextLoading);
            }
        };
        let environment = match fs::read_to_string(&self.environment_path)
            .map_err(|err| err.to_string())
            .and_then(|raw| {
                serde_json::from_str::<Value>(&raw).map_err(|err| err.to_string())
            }) {
            Ok(value) => value,
            Err(err) => {
                self.record_violation(
                    "context_loading",
                    &format!("Failed to load governance context: {err}"),
                    BTreeMap::new(),
                );
                return Err(GovernanceViolation::ContextLoading);
            }
        };

        let governance_hash = sha256_hex(governance_text.as_bytes());
        self.governance_hash = Some(governance_hash.clone());
        self.environment = Some(environment);
        Ok(ContextInfo {
            governance_hash,
        })
    }

    /// Asserts that the governance document is unchanged since startup.
    ///
    /// # Errors
    ///
    /// Returns [`GovernanceViolation::Immutability`] on drift or when the
    /// document cannot be re-read.
    pub fn enforce_immutability(&mut self) -> Result<(), GovernanceViolation> {
        let Some(expected) = self.governance_hash.clone() else {
            self.record_violation(
                "immutability",
                "Governance context was not loaded before enforcement",
                BTreeMap::new(),
            );
            return Err(GovernanceViolation::Immutability);
        };
        let current = match fs::read_to_string(&self.governance_path) {
            Ok(text) => sha256_hex(text.as_bytes()),
            Err(err) => {
                self.record_violation(
                    "immutability",
                    &format!("Cannot verify governance immutability: {err}"),
                    BTreeMap::new(),
                );
                return Err(GovernanceViolation::Immutability);
            }
        };
        if current != expected {
            let mut context = BTreeMap::new();
            context.insert(
                "governance_path".to_string(),
                self.governance_path.display().to_string(),
            );
            self.record_violation(
                "immutability",
                "Governance contract changed after startup without amendment flow",
                context,
            );
            return Err(GovernanceViolation::Immutability);
        }
        Ok(())
    }

    /// Screens an instruction for role separation, forbidden architectural
    /// actions, and nondeterministic phrasing.
    ///
    /// # Errors
    ///
    /// Returns [`GovernanceViolation::Instruction`] on the first matched
    /// screen.
    pub fn validate_instruction(
        &mut self,
        instruction_text: &str,
    ) -> Result<(), GovernanceViolation> {
        let lower = instruction_text.to_lowercase();

        let role_separation = [
            r"(?s)\bplanner\b.{0,40}\b(write|implement|code|refactor|modify)\b",
            r"(?s)\bplanner\b.{0,40}\b(commit|push|execute)\b",
        ];
        for raw in role_separation {
            let matched = compile(raw).is_none_or(|pattern| pattern.is_match(&lower));
            if matched {
                let mut context = BTreeMap::new();
                context.insert("pattern".to_string(), raw.to_string());
                self.record_violation(
                    "role_separation",
                    "Instruction violates role separation for planner",
                    context,
                );
                return Err(GovernanceViolation::Instruction("role_separation".to_string()));
            }
        }

        let forbidden_actions = [
            r"\buncontrolled architectural\b",
            r"\barchitectural rewrite\b",
            r"\brewrite (the )?(entire|whole)\b",
            r"\bspeculative rewrite\b",
        ];
        for raw in forbidden_actions {
            let matched = compile(raw).is_none_or(|pattern| pattern.is_match(&lower));
            if matched {
                let mut context = BTreeMap::new();
                context.insert("pattern".to_string(), raw.to_string());
                self.record_violation(
                    "allowed_actions",
                    "Instruction requests forbidden architectural action",
                    context,
                );
                return Err(GovernanceViolation::Instruction("allowed_actions".to_string()));
            }
        }

        let nondeterministic_terms =
            ["maybe", "perhaps", "if possible", "as needed", "when convenient"];
        for term in nondeterministic_terms {
            if lower.contains(term) {
                let mut context = BTreeMap::new();
                context.insert("term".to_string(), term.to_string());
                self.record_violation(
                    "deterministic_behavior",
                    "Instruction contains non-deterministic phrasing",
                    context,
                );
                return Err(GovernanceViolation::Instruction(
                    "deterministic_behavior".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Runs the pre-computation gate before dispatch or any irreversible
    /// action.
    ///
    /// # Errors
    ///
    /// Returns [`GovernanceViolation`] when immutability, the instruction
    /// screen, or the intended-outcome requirement fails.
    pub fn validate_pre_computation(
        &mut self,
        instruction_text: &str,
        intended_outcome: &str,
    ) -> Result<(), GovernanceViolation> {
        self.enforce_immutability()?;
        self.validate_instruction(instruction_text)?;
        if intended_outcome.trim().is_empty() {
            self.record_violation("pre_computation", "Intended outcome is missing", BTreeMap::new());
            return Err(GovernanceViolation::PreComputation);
        }
        Ok(())
    }

    /// Runs the commit-policy gate over changed files and the commit
    /// message.
    ///
    /// # Errors
    ///
    /// Returns [`GovernanceViolation::CommitPolicy`] when the scope,
    /// message convention, or content rules are violated.
    pub fn validate_commit_policy(
        &mut self,
        instruction_text: &str,
        changed_files: &[String],
        commit_message: &str,
    ) -> Result<(), GovernanceViolation> {
        self.enforce_immutability()?;

        let allowed_files = extract_allowed_files(instruction_text);
        if allowed_files.is_empty() {
            self.record_violation(
                "commit_policy.affected_files",
                "No explicit allowed files found in instruction text",
                BTreeMap::new(),
            );
            return Err(GovernanceViolation::CommitPolicy("affected_files".to_string()));
        }

        let disallowed: Vec<String> = changed_files
            .iter()
            .filter(|file| !allowed_files.contains(*file))
            .cloned()
            .collect();
        if !disallowed.is_empty() {
            let mut context = BTreeMap::new();
            context.insert("disallowed_files".to_string(), disallowed.join(","));
            self.record_violation(
                "commit_policy.affected_files",
                "Commit includes files not explicitly allowed by task",
                context,
            );
            return Err(GovernanceViolation::CommitPolicy("affected_files".to_string()));
        }

        let skeleton_ok = compile(r"^(feat|fix|chore)\([^)]+\): .+")
            .is_some_and(|pattern| pattern.is_match(commit_message));
        if !skeleton_ok {
            let mut context = BTreeMap::new();
            context.insert("message".to_string(), commit_message.to_string());
            self.record_violation(
                "commit_policy.message_format",
                "Commit message does not follow required convention",
                context,
            );
            return Err(GovernanceViolation::CommitPolicy("message_format".to_string()));
        }

        let governance_doc = self.governance_path.display().to_string();
        if changed_files.iter().any(|file| *file == governance_doc) {
            self.record_violation(
                "content_compliance",
                "Commit attempts to modify immutable governance contract",
                BTreeMap::new(),
            );
            return Err(GovernanceViolation::CommitPolicy("content_compliance".to_string()));
        }
        Ok(())
    }

    /// Returns the current compliance report.
    #[must_use]
    pub const fn last_report(&self) -> &ComplianceReport {
        &self.last_report
    }

    /// Renders the compliance report block.
    #[must_use]
    pub fn compliance_report_block(&self) -> String {
        let mut lines = vec!["## Governance Compliance Report".to_string()];
        lines.push(format!(
            "- governance_compliant: {}",
            self.last_report.governance_compliant
        ));
        lines.push(format!("- violations_detected: {}", self.last_report.violations.len()));
        if self.last_report.enforcement_actions.is_empty() {
            lines.push("- enforcement_actions: none".to_string());
        } else {
            lines.push(format!(
                "- enforcement_actions: {}",
                self.last_report.enforcement_actions.join(", ")
            ));
        }
        lines.join("\n")
    }
}
