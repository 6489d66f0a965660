// crates/steward-gate/src/evaluator.rs
// ============================================================================
// Module: PR Governance Gate Evaluator
// Description: Fixed gate suite over a pull request surface.
// Purpose: Produce an ordered, idempotent pass/fail report per pull request.
// Dependencies: regex, serde, steward-forge
// ============================================================================

//! ## Overview
//! The evaluator runs a fixed suite of fifteen independent gates in a fixed
//! order and records one event per gate. It is pure over its inputs: running
//! twice with identical inputs produces identical reports and identical
//! gate-event orders. `failed_gates` is sorted and deduplicated; gate events
//! keep insertion order.
//!
//! Determinism decisions baked in:
//! - latest review per user is picked by `submitted_at`, later-seen entries
//!   winning exact timestamp ties;
//! - duplicate CI status contexts resolve first-seen-wins;
//! - lock tokens are matched with the fixed `LOCK:` vocabulary.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use regex::Regex;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use steward_forge::CommitSignature;
use steward_forge::CommitStatus;
use steward_forge::PullRequest;
use steward_forge::Review;

use crate::policy::BranchApprovals;
use crate::policy::GatePolicy;

// ============================================================================
// SECTION: Report Types
// ============================================================================

/// Gate outcome label.
///
/// # Invariants
/// - Wire form is the uppercase PASS/FAIL pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateOutcome {
    /// The gate passed.
    #[serde(rename = "PASS")]
    Pass,
    /// The gate failed.
    #[serde(rename = "FAIL")]
    Fail,
}

/// One gate evaluation event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateEvent {
    /// Gate name.
    pub gate: String,
    /// Outcome.
    pub result: GateOutcome,
    /// Human-readable reason string.
    pub reason: String,
}

/// Effective policy requirements applied to the pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRequirements {
    /// Effective minimum approver count.
    pub min_approvals: u32,
    /// Whether a human approval was required.
    pub require_human_approval: bool,
    /// Whether a distinct reviewer was required.
    pub require_distinct_reviewer: bool,
    /// Effective required status checks.
    pub required_checks: Vec<String>,
    /// Whether a lock token was required.
    pub lock_required: bool,
    /// Whether self-approval was disallowed.
    pub disallow_self_approval: bool,
}

/// One observed status check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckObservation {
    /// Status context.
    pub context: String,
    /// Observed state, or `missing`.
    pub state: String,
    /// Whether the state was `success`.
    pub ok: bool,
}

/// Everything the evaluator observed while gating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observed {
    /// Number of effective (non-author) approvers.
    pub approvals: usize,
    /// Sorted effective approver logins.
    pub approvers: Vec<String>,
    /// Pull request author.
    pub author: String,
    /// Whether the author approved their own pull request.
    pub author_approved: bool,
    /// Required check observations.
    pub checks: Vec<CheckObservation>,
    /// Whether any touched file hit a high-risk prefix.
    pub touches_high_risk: bool,
    /// Selected lock token, when any.
    pub lock_token: Option<String>,
    /// Open pull requests holding the same lock token.
    pub lock_conflict_prs: Vec<u64>,
    /// Required sections missing from the body.
    pub missing_sections: Vec<String>,
    /// Required sections containing reject-placeholders.
    pub placeholder_sections: Vec<String>,
    /// Required sections shorter than the minimum length.
    pub short_sections: Vec<String>,
    /// Commits whose signatures could not be verified at all.
    pub unverifiable_commits: Vec<String>,
    /// Commits that are unsigned or carry bad signatures.
    pub unsigned_commits: Vec<String>,
    /// Number of changed files.
    pub files_count: usize,
}

/// Full gate report for one pull request.
///
/// # Invariants
/// - `failed_gates` is sorted ascending and deduplicated.
/// - `gate_events` preserves evaluation insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateReport {
    /// Whether every gate passed.
    pub passed: bool,
    /// Base branch name.
    pub base_branch: String,
    /// Head branch name.
    pub head_branch: String,
    /// Whether system-evolution escalation was active.
    pub system_evolution: bool,
    /// Names of failed gates, sorted and deduplicated.
    pub failed_gates: Vec<String>,
    /// Reasons of failed gates, in gate-event order.
    pub failed_reasons: Vec<String>,
    /// Gate events in insertion order.
    pub gate_events: Vec<GateEvent>,
    /// Effective policy requirements.
    pub policy_requirements: PolicyRequirements,
    /// Observations gathered while gating.
    pub observed: Observed,
}

/// Evaluator errors.
///
/// # Invariants
/// - Any error fails the cycle closed; no partial report is produced.
#[derive(Debug, Error)]
pub enum GateError {
    /// A policy regular expression failed to compile.
    #[error("gate policy regex invalid: {0}")]
    PolicyRegex(String),
}

// ============================================================================
// SECTION: Review Digestion
// ============================================================================

/// Latest approving reviewer with account type.
struct Approver {
    /// Reviewer login.
    login: String,
    /// Lowercased account type.
    user_type: String,
}

/// Folds reviews to the latest entry per user and keeps approvals.
fn latest_approved_reviews(reviews: &[Review]) -> Vec<Approver> {
    struct LatestEntry {
        submitted_at: String,
        state: String,
        user_type: String,
    }
    let mut latest: BTreeMap<String, LatestEntry> = BTreeMap::new();
    for review in reviews {
        let login = review.user.login.clone();
        if login.is_empty() {
            continue;
        }
        let state = review.state.to_uppercase();
        let keep = latest
            .get(&login)
            .is_none_or(|current| review.submitted_at >= current.submitted_at);
        if keep {
            latest.insert(login, LatestEntry {
                submitted_at: review.submitted_at.clone(),
                state,
                user_type: review.user.user_type.to_lowercase(),
            });
        }
    }
    latest
        .into_iter()
        .filter(|(_, entry)| entry.state == "APPROVED")
        .map(|(login, entry)| Approver {
            login,
            user_type: entry.user_type,
        })
        .collect()
}

// ============================================================================
// SECTION: Text Digestion
// ============================================================================

/// Extracts allowed-vocabulary lock tokens from pull request text.
fn extract_lock_tokens(text: &str) -> Result<Vec<String>, GateError> {
    let pattern = Regex::new(r"\bLOCK:[A-Za-z0-9_./-]+\b")
        .map_err(|err| GateError::PolicyRegex(err.to_string()))?;
    Ok(pattern.find_iter(text).map(|token| token.as_str().to_string()).collect())
}

/// Splits a markdown body into H3 sections with trimmed content.
fn section_map(markdown: &str) -> Result<BTreeMap<String, String>, GateError> {
    let heading =
        Regex::new(r"^###\s+(.+?)\s*$").map_err(|err| GateError::PolicyRegex(err.to_string()))?;
    let mut sections: BTreeMap<String, Vec<&str>> = BTreeMap::new();
    let mut current: Option<String> = None;
    for line in markdown.lines() {
        if let Some(captures) = heading.captures(line) {
            let name = captures[1].to_string();
            sections.entry(name.clone()).or_default();
            current = Some(name);
            continue;
        }
        if let Some(section) = &current
            && let Some(content) = sections.get_mut(section)
        {
            content.push(line);
        }
    }
    Ok(sections
        .into_iter()
        .map(|(name, lines)| (name, lines.join("\n").trim().to_string()))
        .collect())
}

/// Returns true when the text satisfies the issue-link requirement.
fn issue_ref_present(policy: &GatePolicy, text: &str) -> Result<bool, GateError> {
    let Some(issue_link) = &policy.issue_link else {
        return Ok(true);
    };
    if !issue_link.required {
        return Ok(true);
    }
    for raw in &issue_link.patterns {
        let pattern = Regex::new(raw).map_err(|err| GateError::PolicyRegex(err.to_string()))?;
        if pattern.is_match(text) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Compiles the named branch patterns.
fn branch_patterns(policy: &GatePolicy) -> Result<BTreeMap<String, Regex>, GateError> {
    let mut compiled = BTreeMap::new();
    for (name, spec) in &policy.branch_rules.patterns {
        if spec.regex.is_empty() {
            continue;
        }
        let pattern =
            Regex::new(&spec.regex).map_err(|err| GateError::PolicyRegex(err.to_string()))?;
        compiled.insert(name.clone(), pattern);
    }
    Ok(compiled)
}

// ============================================================================
// SECTION: Status and Escalation Digestion
// ============================================================================

/// Returns the effective required checks and the escalation flag.
fn required_status_checks(policy: &GatePolicy, files: &[String]) -> (Vec<String>, bool) {
    let mut required = policy.ci.required_checks.clone();
    let Some(system_evolution) = &policy.system_evolution else {
        return (required, false);
    };
    let escalated = files.iter().any(|path| {
        system_evolution.detect_paths.iter().any(|prefix| path.starts_with(prefix.as_str()))
    });
    if escalated && let Some(ci) = &system_evolution.ci {
        required = ci.required_checks.clone();
    }
    (required, escalated)
}

/// Folds statuses into a first-seen-wins map by context.
fn status_by_context(statuses: &[CommitStatus]) -> BTreeMap<String, String> {
    let mut by_context = BTreeMap::new();
    for status in statuses {
        let Some(context) = &status.context else {
            continue;
        };
        if context.is_empty() || by_context.contains_key(context) {
            continue;
        }
        by_context.insert(context.clone(), status.state.to_lowercase());
    }
    by_context
}

/// Classifies commit signatures into unverifiable and unsigned sets.
fn check_commit_signing(
    policy: &GatePolicy,
    commits: &[CommitSignature],
) -> (Vec<String>, Vec<String>) {
    if !policy.commit_signing.required {
        return (Vec::new(), Vec::new());
    }
    let mut unverifiable = Vec::new();
    let mut unsigned = Vec::new();
    for commit in commits {
        let sha = if commit.sha.is_empty() {
            "unknown".to_string()
        } else {
            commit.sha.clone()
        };
        match (commit.verifiable, commit.verified) {
            (Some(true), Some(true)) => {}
            (Some(true), Some(false)) => unsigned.push(sha),
            _ => unverifiable.push(sha),
        }
    }
    (unverifiable, unsigned)
}

// ============================================================================
// SECTION: Evaluation
// ============================================================================

/// Evaluates the fixed gate suite over one pull request surface.
///
/// Inputs are snapshots; the evaluator performs no I/O and never reads a
/// clock, so identical inputs always produce identical reports.
///
/// # Errors
///
/// Returns [`GateError`] when a policy regular expression is invalid; the
/// caller must fail the cycle closed.
#[allow(clippy::too_many_lines, reason = "The gate suite is a fixed linear sequence.")]
pub fn evaluate_pr(
    policy: &GatePolicy,
    pr: &PullRequest,
    open_prs: &[PullRequest],
    commits: &[CommitSignature],
    files: &[String],
    reviews: &[Review],
    statuses: &[CommitStatus],
) -> Result<GateReport, GateError> {
    let mut gate_events: Vec<GateEvent> = Vec::new();
    let mut failed_gates: Vec<String> = Vec::new();

    let record = |events: &mut Vec<GateEvent>,
                  failed: &mut Vec<String>,
                  gate: &str,
                  passed: bool,
                  reason: String| {
        events.push(GateEvent {
            gate: gate.to_string(),
            result: if passed {
                GateOutcome::Pass
            } else {
                GateOutcome::Fail
            },
            reason,
        });
        if !passed {
            failed.push(gate.to_string());
        }
    };

    let base_branch = pr.base.name.trim().to_string();
    let head_branch = pr.head.name.trim().to_string();
    let pr_text = format!("{}\n\n{}", pr.title, pr.body);
    let pr_author = pr.user.login.trim().to_string();

    let required_cfg: BranchApprovals =
        policy.approvals.branches.get(&base_branch).cloned().unwrap_or_default();

    // Gate 1: branch_name_regex.
    let patterns = branch_patterns(policy)?;
    let mut any_match = false;
    let mut feature_match = false;
    for (name, pattern) in &patterns {
        if pattern.is_match(&head_branch) {
            any_match = true;
            if name == "feature" {
                feature_match = true;
            }
        }
    }
    record(
        &mut gate_events,
        &mut failed_gates,
        "branch_name_regex",
        any_match,
        format!("head_branch={head_branch}"),
    );

    // Gate 2: feature_to_develop_only.
    let feature_to_develop = policy.branch_rules.feature_to_develop_only;
    let feature_to_develop_ok = !feature_to_develop || !feature_match || base_branch == "develop";
    record(
        &mut gate_events,
        &mut failed_gates,
        "feature_to_develop_only",
        feature_to_develop_ok,
        format!("base_branch={base_branch}"),
    );

    // Gate 3: issue_reference_required.
    let issue_ref_ok = issue_ref_present(policy, &pr_text)?;
    record(
        &mut gate_events,
        &mut failed_gates,
        "issue_reference_required",
        issue_ref_ok,
        if issue_ref_ok {
            "issue_ref_present".to_string()
        } else {
            "missing_issue_ref".to_string()
        },
    );

    // Gates 4 and 5: pr_template_sections, pr_template_placeholders.
    let template = policy.pr_template.clone().unwrap_or_default();
    let placeholders: Vec<String> =
        template.reject_placeholders.iter().map(|token| token.to_lowercase()).collect();
    let sections = section_map(&pr.body)?;
    let mut missing_sections = Vec::new();
    let mut placeholder_sections = Vec::new();
    let mut short_sections = Vec::new();
    for section in &template.required_sections {
        let Some(content) = sections.get(section) else {
            missing_sections.push(section.clone());
            continue;
        };
        let lowered = content.to_lowercase();
        if placeholders.iter().any(|token| lowered.contains(token)) {
            placeholder_sections.push(section.clone());
        }
        if content.trim().len() < template.min_section_length {
            short_sections.push(section.clone());
        }
    }
    let sections_ok = missing_sections.is_empty() && short_sections.is_empty();
    record(
        &mut gate_events,
        &mut failed_gates,
        "pr_template_sections",
        sections_ok,
        if sections_ok {
            "ok".to_string()
        } else {
            format!(
                "missing={} short={}",
                missing_sections.join(","),
                short_sections.join(",")
            )
        },
    );
    let placeholders_ok = placeholder_sections.is_empty();
    record(
        &mut gate_events,
        &mut failed_gates,
        "pr_template_placeholders",
        placeholders_ok,
        if placeholders_ok {
            "ok".to_string()
        } else {
            format!("sections={}", placeholder_sections.join(","))
        },
    );

    // Gate 6: high_risk_path_detection (always PASS, records touched prefixes).
    let mut touched_high_risk: BTreeSet<String> = BTreeSet::new();
    for path in files {
        for prefix in &policy.high_risk_paths {
            if path.starts_with(prefix.as_str()) {
                touched_high_risk.insert(prefix.clone());
                break;
            }
        }
    }
    let touches_high_risk = !touched_high_risk.is_empty();
    record(
        &mut gate_events,
        &mut failed_gates,
        "high_risk_path_detection",
        true,
        if touches_high_risk {
            format!("touched={}", touched_high_risk.iter().cloned().collect::<Vec<_>>().join(","))
        } else {
            "none".to_string()
        },
    );

    // Gate 7: lock_required.
    let locks = policy.locks.clone().unwrap_or_default();
    let lock_required = touches_high_risk && locks.required_on_high_risk;
    let allowed_locks: BTreeSet<String> = locks.allowed.iter().cloned().collect();
    let lock_tokens = extract_lock_tokens(&pr_text)?;
    let mut selected_locks: Vec<String> =
        lock_tokens.iter().filter(|token| allowed_locks.contains(*token)).cloned().collect();
    selected_locks.sort();
    selected_locks.dedup();
    let lock_token = selected_locks.first().cloned();
    let lock_required_ok = !lock_required || lock_token.is_some();
    record(
        &mut gate_events,
        &mut failed_gates,
        "lock_required",
        lock_required_ok,
        if lock_required_ok {
            "ok".to_string()
        } else {
            format!(
                "missing {}",
                allowed_locks.iter().next().cloned().unwrap_or_else(|| "LOCK:<required>".to_string())
            )
        },
    );

    // Gate 8: lock_exclusive.
    let mut lock_conflict_prs: Vec<u64> = Vec::new();
    if let Some(token) = &lock_token
        && locks.exclusive
    {
        for other in open_prs {
            if other.number == pr.number {
                continue;
            }
            let other_text = format!("{}\n\n{}", other.title, other.body);
            if extract_lock_tokens(&other_text)?.contains(token) {
                lock_conflict_prs.push(other.number);
            }
        }
    }
    lock_conflict_prs.sort_unstable();
    let lock_exclusive_ok = selected_locks.len() <= 1 && lock_conflict_prs.is_empty();
    let lock_reason = if selected_locks.len() > 1 {
        format!("multiple_tokens={}", selected_locks.join(","))
    } else if lock_conflict_prs.is_empty() {
        "ok".to_string()
    } else {
        format!(
            "conflicts={}",
            lock_conflict_prs.iter().map(ToString::to_string).collect::<Vec<_>>().join(",")
        )
    };
    record(&mut gate_events, &mut failed_gates, "lock_exclusive", lock_exclusive_ok, lock_reason);

    // Gate 9: required_status_checks.
    let (required_checks, is_system_evolution) = required_status_checks(policy, files);
    let state_by_context = status_by_context(statuses);
    let checks: Vec<CheckObservation> = required_checks
        .iter()
        .map(|context| {
            let state =
                state_by_context.get(context).cloned().unwrap_or_else(|| "missing".to_string());
            let ok = state == "success";
            CheckObservation {
                context: context.clone(),
                state,
                ok,
            }
        })
        .collect();
    let checks_ok = checks.iter().all(|check| check.ok);
    record(
        &mut gate_events,
        &mut failed_gates,
        "required_status_checks",
        checks_ok,
        if checks_ok {
            "all_required_checks_success".to_string()
        } else {
            "missing_or_failed_checks".to_string()
        },
    );

    // Gate 10: self_approval_forbidden.
    let approved = latest_approved_reviews(reviews);
    let approved_users: BTreeSet<String> =
        approved.iter().map(|approver| approver.login.clone()).collect();
    let author_approved = !pr_author.is_empty() && approved_users.contains(&pr_author);
    let disallow_self = policy.approvals.disallow_self_approval;
    let self_approval_ok = !disallow_self || !author_approved;
    record(
        &mut gate_events,
        &mut failed_gates,
        "self_approval_forbidden",
        self_approval_ok,
        format!("author={pr_author} author_approved={author_approved}"),
    );

    // Gate 11: min_approvals_met.
    let effective_approvers: Vec<String> =
        approved_users.iter().filter(|login| **login != pr_author).cloned().collect();
    let mut min_approvals = required_cfg.min_approvals;
    let mut require_human = required_cfg.require_human_approval;
    let require_distinct = required_cfg.require_distinct_reviewer;
    if is_system_evolution && let Some(system_evolution) = &policy.system_evolution {
        min_approvals = min_approvals.max(system_evolution.approvals.min_approvals);
        require_human = require_human || system_evolution.approvals.require_human_approval;
    }
    let min_approvals_met = effective_approvers.len() >= min_approvals as usize;
    record(
        &mut gate_events,
        &mut failed_gates,
        "min_approvals_met",
        min_approvals_met,
        format!("have={} need={min_approvals}", effective_approvers.len()),
    );

    // Gate 12: distinct_reviewer_required.
    let distinct_ok = !require_distinct || !effective_approvers.is_empty();
    record(
        &mut gate_events,
        &mut failed_gates,
        "distinct_reviewer_required",
        distinct_ok,
        if distinct_ok {
            "ok".to_string()
        } else {
            format!("approvers={}", effective_approvers.join(","))
        },
    );

    // Gate 13: human_approval_required.
    let human_ok = if require_human {
        approved
            .iter()
            .any(|approver| approver.login != pr_author && approver.user_type != "bot")
    } else {
        true
    };
    record(
        &mut gate_events,
        &mut failed_gates,
        "human_approval_required",
        human_ok,
        format!("required={require_human}"),
    );

    // Gate 14: system_evolution_escalation.
    if is_system_evolution {
        let escalation_ok = min_approvals_met && human_ok && checks_ok;
        record(
            &mut gate_events,
            &mut failed_gates,
            "system_evolution_escalation",
            escalation_ok,
            if escalation_ok {
                "requirements_met".to_string()
            } else {
                format!(
                    "min_approvals_met={min_approvals_met} human_approval_required={human_ok} \
                     required_status_checks={checks_ok}"
                )
            },
        );
    } else {
        record(
            &mut gate_events,
            &mut failed_gates,
            "system_evolution_escalation",
            true,
            "inactive".to_string(),
        );
    }

    // Gate 15: commit_signing_required.
    let (unverifiable_commits, unsigned_commits) = check_commit_signing(policy, commits);
    let signing_ok = unverifiable_commits.is_empty() && unsigned_commits.is_empty();
    record(
        &mut gate_events,
        &mut failed_gates,
        "commit_signing_required",
        signing_ok,
        if signing_ok {
            "all_commits_signed".to_string()
        } else {
            format!(
                "unverifiable={} unsigned={}",
                unverifiable_commits.len(),
                unsigned_commits.len()
            )
        },
    );

    failed_gates.sort();
    failed_gates.dedup();
    let passed = failed_gates.is_empty();
    let failed_reasons = gate_events
        .iter()
        .filter(|event| event.result == GateOutcome::Fail)
        .map(|event| event.reason.clone())
        .collect();

    Ok(GateReport {
        passed,
        base_branch,
        head_branch,
        system_evolution: is_system_evolution,
        failed_gates,
        failed_reasons,
        gate_events,
        policy_requirements: PolicyRequirements {
            min_approvals,
            require_human_approval: require_human,
            require_distinct_reviewer: require_distinct,
            required_checks,
            lock_required,
            disallow_self_approval: disallow_self,
        },
        observed: Observed {
            approvals: effective_approvers.len(),
            approvers: effective_approvers,
            author: pr_author,
            author_approved,
            checks,
            touches_high_risk,
            lock_token,
            lock_conflict_prs,
            missing_sections,
            placeholder_sections,
            short_sections,
            unverifiable_commits,
            unsigned_commits,
            files_count: files.len(),
        },
    })
}
