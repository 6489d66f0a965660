// crates/steward-supervisor/tests/common/mod.rs
// ============================================================================
// Module: Supervisor Test Fixtures
// Description: In-memory forge fake and governed-repository scaffolding.
// ============================================================================
//! ## Overview
//! [`InMemoryForge`] implements the forge seam over mutable in-memory state
//! so control-loop tests can observe claims, comments, closures, and status
//! publications without a network.

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
use std::path::Path;
use std::process::Command;
use std::sync::Mutex;

use steward_forge::CommitSignature;
use steward_forge::CommitStatus;
use steward_forge::ForgeApi;
use steward_forge::ForgeError;
use steward_forge::Issue;
use steward_forge::Label;
use steward_forge::Milestone;
use steward_forge::PullRequest;
use steward_forge::Review;
use steward_forge::StatusState;
use steward_forge::TimelineEvent;

/// Mutable forge state behind the fake.
#[derive(Debug, Default)]
pub struct ForgeState {
    /// All issues, open and closed.
    pub issues: Vec<Issue>,
    /// Repository labels.
    pub labels: Vec<Label>,
    /// Milestones.
    pub milestones: Vec<Milestone>,
    /// Open pull requests.
    pub pulls: Vec<PullRequest>,
    /// Comments posted, as (issue, body).
    pub comments: Vec<(u64, String)>,
    /// Statuses published, as (sha, state).
    pub published: Vec<(String, String)>,
    /// Timelines by issue number.
    pub timelines: BTreeMap<u64, Vec<TimelineEvent>>,
    /// Next issue number for creations.
    pub next_issue_number: u64,
}

/// In-memory forge seam.
#[derive(Debug, Default)]
pub struct InMemoryForge {
    /// Guarded state.
    pub state: Mutex<ForgeState>,
}

impl InMemoryForge {
    /// Creates a forge with the given initial state.
    pub fn new(state: ForgeState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    /// Runs a closure over the locked state.
    pub fn with_state<T>(&self, run: impl FnOnce(&mut ForgeState) -> T) -> T {
        run(&mut self.state.lock().expect("forge state lock"))
    }
}

impl ForgeApi for InMemoryForge {
    fn resolve_repo(&self) -> (String, String) {
        ("owner".to_string(), "repo".to_string())
    }

    fn list_issues(&self, state: &str) -> Result<Vec<Issue>, ForgeError> {
        Ok(self.with_state(|forge| {
            forge
                .issues
                .iter()
                .filter(|issue| state == "all" || issue.state == state)
                .cloned()
                .collect()
        }))
    }

    fn issue_timeline(&self, number: u64) -> Result<Vec<TimelineEvent>, ForgeError> {
        Ok(self.with_state(|forge| forge.timelines.get(&number).cloned().unwrap_or_default()))
    }

    fn list_labels(&self) -> Result<Vec<Label>, ForgeError> {
        Ok(self.with_state(|forge| forge.labels.clone()))
    }

    fn create_label(
        &self,
        name: &str,
        _color: &str,
        _description: &str,
    ) -> Result<Label, ForgeError> {
        Ok(self.with_state(|forge| {
            let id = i64::try_from(forge.labels.len()).unwrap() + 1;
            let label = Label {
                id,
                name: name.to_string(),
            };
            forge.labels.push(label.clone());
            label
        }))
    }

    fn issue_labels(&self, number: u64) -> Result<Vec<Label>, ForgeError> {
        Ok(self.with_state(|forge| {
            forge
                .issues
                .iter()
                .find(|issue| issue.number == number)
                .map(|issue| issue.labels.clone())
                .unwrap_or_default()
        }))
    }

    fn add_label(&self, number: u64, label_id: i64) -> Result<(), ForgeError> {
        self.with_state(|forge| {
            let label = forge.labels.iter().find(|label| label.id == label_id).cloned();
            if let (Some(label), Some(issue)) =
                (label, forge.issues.iter_mut().find(|issue| issue.number == number))
                && !issue.labels.iter().any(|existing| existing.id == label_id)
            {
                issue.labels.push(label);
            }
        });
        Ok(())
    }

    fn remove_label(&self, number: u64, label_id: i64) -> Result<(), ForgeError> {
        self.with_state(|forge| {
            if let Some(issue) = forge.issues.iter_mut().find(|issue| issue.number == number) {
                issue.labels.retain(|label| label.id != label_id);
            }
        });
        Ok(())
    }

    fn post_comment(&self, number: u64, body: &str) -> Result<(), ForgeError> {
        self.with_state(|forge| forge.comments.push((number, body.to_string())));
        Ok(())
    }

    fn close_issue(&self, number: u64) -> Result<(), ForgeError> {
        self.with_state(|forge| {
            if let Some(issue) = forge.issues.iter_mut().find(|issue| issue.number == number) {
                issue.state = "closed".to_string();
            }
        });
        Ok(())
    }

    fn create_issue(
        &self,
        title: &str,
        body: &str,
        labels: &[i64],
        milestone: Option<i64>,
    ) -> Result<Issue, ForgeError> {
        Ok(self.with_state(|forge| {
            let number = forge.next_issue_number.max(1);
            forge.next_issue_number = number + 1;
            let attached: Vec<Label> = forge
                .labels
                .iter()
                .filter(|label| labels.contains(&label.id))
                .cloned()
                .collect();
            let issue = Issue {
                number,
                title: title.to_string(),
                body: body.to_string(),
                state: "open".to_string(),
                labels: attached,
                milestone: milestone.and_then(|id| {
                    forge.milestones.iter().find(|milestone| milestone.id == id).cloned()
                }),
                user: steward_forge::Account::default(),
            };
            forge.issues.push(issue.clone());
            issue
        }))
    }

    fn list_milestones(&self) -> Result<Vec<Milestone>, ForgeError> {
        Ok(self.with_state(|forge| forge.milestones.clone()))
    }

    fn open_pulls(&self) -> Result<Vec<PullRequest>, ForgeError> {
        Ok(self.with_state(|forge| {
            let mut pulls = forge.pulls.clone();
            pulls.sort_by_key(|pull| pull.number);
            pulls
        }))
    }

    fn pull_files(&self, _number: u64) -> Result<Vec<String>, ForgeError> {
        Ok(Vec::new())
    }

    fn pull_reviews(&self, _number: u64) -> Result<Vec<Review>, ForgeError> {
        Ok(Vec::new())
    }

    fn pull_commits(&self, _number: u64) -> Result<Vec<CommitSignature>, ForgeError> {
        Ok(vec![CommitSignature {
            sha: "fakesha".to_string(),
            verifiable: Some(true),
            verified: Some(true),
        }])
    }

    fn commit_statuses(&self, _sha: &str) -> Result<Vec<CommitStatus>, ForgeError> {
        Ok(Vec::new())
    }

    fn publish_status(
        &self,
        sha: &str,
        state: StatusState,
        _context: &str,
        _description: &str,
    ) -> Result<(), ForgeError> {
        self.with_state(|forge| {
            forge.published.push((sha.to_string(), state.as_str().to_string()));
        });
        Ok(())
    }
}

// ============================================================================
// SECTION: Repository Scaffolding
// ============================================================================

/// A complete, loadable governance policy document.
pub const POLICY_YAML: &str = r#"version: "0.2"
branch_rules:
  feature_to_develop_only: true
  patterns:
    feature:
      regex: "^feature/.+$"
approvals:
  disallow_self_approval: true
  develop:
    min_approvals: 1
    require_distinct_reviewer: true
high_risk_paths:
  - controller/
commit_signing:
  required: false
ci:
  required_checks:
    - lint
"#;

/// Runs one git command under the repository root.
pub fn git(repo_root: &Path, args: &[&str]) {
    let output = Command::new("git")
        .current_dir(repo_root)
        .args(args)
        .output()
        .expect("run git");
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

/// Initializes a governed repository checkout under a temp dir.
pub fn init_governed_repo(repo_root: &Path) {
    git(repo_root, &["init", "--quiet"]);
    git(repo_root, &["config", "user.name", "supervisor-test"]);
    git(repo_root, &["config", "user.email", "supervisor-test@example.invalid"]);

    std::fs::create_dir_all(repo_root.join("docs")).expect("mkdir docs");
    std::fs::write(
        repo_root.join("docs/governance.md"),
        "# Governance Contract\n\nDeterministic execution only.\n",
    )
    .expect("write governance");

    std::fs::create_dir_all(repo_root.join("agents/state")).expect("mkdir agents/state");
    std::fs::write(
        repo_root.join("agents/state/environment.json"),
        "{\"api_base\":\"http://localhost:3000\",\"api_token\":\"test-token\"}\n",
    )
    .expect("write environment");

    std::fs::create_dir_all(repo_root.join("governance/policy")).expect("mkdir policy");
    std::fs::write(
        repo_root.join("governance/policy/pr-governance.v0.2.yaml"),
        POLICY_YAML,
    )
    .expect("write policy");

    git(repo_root, &["add", "-A"]);
    git(repo_root, &["commit", "--quiet", "-m", "chore(bootstrap): governed repo"]);
    let root = repo_root.display().to_string();
    git(repo_root, &["remote", "add", "origin", &root]);
}

/// Builds one label.
pub fn label(id: i64, name: &str) -> Label {
    Label {
        id,
        name: name.to_string(),
    }
}

/// Builds one open build issue in a milestone.
pub fn build_issue(number: u64, title: &str, body: &str, milestone_title: &str) -> Issue {
    Issue {
        number,
        title: title.to_string(),
        body: body.to_string(),
        state: "open".to_string(),
        labels: vec![label(2, "type:build")],
        milestone: Some(Milestone {
            id: 1,
            title: milestone_title.to_string(),
            state: "open".to_string(),
        }),
        user: steward_forge::Account::default(),
    }
}
