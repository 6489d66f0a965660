// crates/steward-gate/tests/common/mod.rs
// ============================================================================
// Module: Gate Test Fixtures
// Description: Shared policy and pull request builders for gate tests.
// ============================================================================
//! ## Overview
//! Builders for a representative governance policy and a passing pull
//! request surface, mutated per test.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    dead_code,
    reason = "Test-only fixtures; not every test uses every helper."
)]

use std::collections::BTreeMap;

use steward_forge::Account;
use steward_forge::BranchRef;
use steward_forge::CommitSignature;
use steward_forge::CommitStatus;
use steward_forge::PullRequest;
use steward_forge::Review;
use steward_gate::ApprovalsPolicy;
use steward_gate::BranchApprovals;
use steward_gate::BranchPattern;
use steward_gate::BranchRules;
use steward_gate::CiPolicy;
use steward_gate::CommitSigningPolicy;
use steward_gate::EscalatedApprovals;
use steward_gate::GatePolicy;
use steward_gate::IssueLinkPolicy;
use steward_gate::LockPolicy;
use steward_gate::SystemEvolutionPolicy;
use steward_gate::TemplatePolicy;

/// Builds the representative governance policy used across gate tests.
pub fn policy() -> GatePolicy {
    let mut patterns = BTreeMap::new();
    patterns.insert("feature".to_string(), BranchPattern {
        regex: "^feature/.+$".to_string(),
    });
    patterns.insert("hotfix".to_string(), BranchPattern {
        regex: "^hotfix/.+$".to_string(),
    });
    patterns.insert("release".to_string(), BranchPattern {
        regex: "^release/.+$".to_string(),
    });

    let mut branches = BTreeMap::new();
    branches.insert("develop".to_string(), BranchApprovals {
        min_approvals: 1,
        require_human_approval: false,
        require_distinct_reviewer: true,
    });

    GatePolicy {
        version: serde_yaml::Value::from("0.2"),
        branch_rules: BranchRules {
            patterns,
            feature_to_develop_only: true,
        },
        approvals: ApprovalsPolicy {
            disallow_self_approval: true,
            branches,
        },
        issue_link: Some(IssueLinkPolicy {
            required: true,
            patterns: vec![r"(^|\s)#([0-9]+)(\s|$)".to_string()],
        }),
        pr_template: Some(TemplatePolicy {
            required_sections: vec!["Subsystem".to_string(), "Risk Level".to_string()],
            reject_placeholders: vec!["TBD".to_string(), "TODO".to_string()],
            min_section_length: 2,
        }),
        high_risk_paths: vec!["controller/".to_string()],
        locks: Some(LockPolicy {
            required_on_high_risk: true,
            exclusive: true,
            allowed: vec!["LOCK:controller/".to_string()],
        }),
        ci: CiPolicy {
            required_checks: vec!["lint".to_string(), "unit-tests".to_string()],
        },
        system_evolution: Some(SystemEvolutionPolicy {
            detect_paths: vec!["controller/".to_string(), "governance/policy/".to_string()],
            approvals: EscalatedApprovals {
                min_approvals: 2,
                require_human_approval: true,
            },
            ci: Some(CiPolicy {
                required_checks: vec![
                    "lint".to_string(),
                    "unit-tests".to_string(),
                    "determinism-check".to_string(),
                ],
            }),
        }),
        commit_signing: CommitSigningPolicy {
            required: true,
        },
    }
}

/// Builds a pull request that passes every gate against [`policy`] when
/// paired with [`passing_reviews`], [`passing_statuses`], and signed
/// commits touching no high-risk path.
pub fn passing_pr() -> PullRequest {
    PullRequest {
        number: 12,
        title: "change #12".to_string(),
        body: "### Subsystem\ncore engine\n### Risk Level\nlow risk\n".to_string(),
        base: BranchRef {
            name: "develop".to_string(),
            sha: String::new(),
        },
        head: BranchRef {
            name: "feature/x".to_string(),
            sha: "headsha12".to_string(),
        },
        user: Account {
            login: "author".to_string(),
            user_type: "User".to_string(),
        },
    }
}

/// Builds one review entry.
pub fn review(login: &str, state: &str, submitted_at: &str, user_type: &str) -> Review {
    Review {
        state: state.to_string(),
        submitted_at: submitted_at.to_string(),
        user: Account {
            login: login.to_string(),
            user_type: user_type.to_string(),
        },
    }
}

/// One non-author human approval.
pub fn passing_reviews() -> Vec<Review> {
    vec![review("reviewer", "APPROVED", "2026-01-01T00:00:00Z", "User")]
}

/// Both base required checks green.
pub fn passing_statuses() -> Vec<CommitStatus> {
    vec![
        CommitStatus {
            context: Some("lint".to_string()),
            state: "success".to_string(),
        },
        CommitStatus {
            context: Some("unit-tests".to_string()),
            state: "success".to_string(),
        },
    ]
}

/// One verified commit.
pub fn signed_commits() -> Vec<CommitSignature> {
    vec![CommitSignature {
        sha: "headsha12".to_string(),
        verifiable: Some(true),
        verified: Some(true),
    }]
}
