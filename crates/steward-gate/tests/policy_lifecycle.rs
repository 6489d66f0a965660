// crates/steward-gate/tests/policy_lifecycle.rs
// ============================================================================
// Module: Policy Loader and Lockdown Tests
// Description: Loader validation, hash determinism, and lockdown semantics.
// ============================================================================
//! ## Overview
//! Covers loading (required keys, mapping root), the raw-byte policy hash,
//! the lockdown baseline, report artifacts, and the evaluation cache.

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
    reason = "Test-only output and panic-based assertions are permitted."
)]

mod common;

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use common::passing_pr;
use common::passing_reviews;
use common::passing_statuses;
use common::policy;
use common::signed_commits;
use steward_gate::EvaluationCache;
use steward_gate::LockdownError;
use steward_gate::PolicyBaseline;
use steward_gate::PolicyLoadError;
use steward_gate::evaluate_pr;
use steward_gate::gate_report_line;
use steward_gate::load_policy;
use steward_gate::write_gate_artifact;

/// A complete, loadable policy document.
const POLICY_YAML: &str = r#"version: "0.2"
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
  required: true
ci:
  required_checks:
    - lint
    - unit-tests
"#;

/// Writes a policy file into a temp dir and returns its path.
fn write_policy(dir: &Path, contents: &str) -> PathBuf {
    let path = dir.join("pr-governance.yaml");
    fs::write(&path, contents).expect("write policy");
    path
}

#[test]
fn complete_policy_loads_with_a_stable_hash() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_policy(dir.path(), POLICY_YAML);

    let (first_policy, first_hash) = load_policy(&path, None).expect("first load");
    let (_, second_hash) = load_policy(&path, None).expect("second load");
    assert_eq!(first_hash, second_hash);
    assert!(first_policy.branch_rules.feature_to_develop_only);
    assert_eq!(first_policy.ci.required_checks, vec!["lint", "unit-tests"]);
}

#[test]
fn byte_level_change_changes_the_hash() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_policy(dir.path(), POLICY_YAML);
    let (_, original) = load_policy(&path, None).expect("load");

    fs::write(&path, format!("{POLICY_YAML}# trailing comment\n")).expect("rewrite");
    let (_, changed) = load_policy(&path, None).expect("reload");
    assert_ne!(original, changed);
}

#[test]
fn missing_required_keys_fail_the_load() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_policy(dir.path(), "version: \"0.2\"\nbranch_rules: {}\n");
    let err = load_policy(&path, None).unwrap_err();
    let PolicyLoadError::MissingKeys(missing) = err else {
        panic!("expected MissingKeys, got {err}");
    };
    assert!(missing.contains("approvals"));
    assert!(missing.contains("ci"));
}

#[test]
fn non_mapping_root_fails_the_load() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_policy(dir.path(), "- just\n- a\n- list\n");
    assert!(matches!(load_policy(&path, None), Err(PolicyLoadError::NotMapping)));
}

// ============================================================================
// SECTION: Lockdown
// ============================================================================

#[test]
fn unchanged_policy_passes_the_lockdown_recheck() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_policy(dir.path(), POLICY_YAML);
    let (baseline, _) = PolicyBaseline::capture(&path, None).expect("capture");
    baseline.recheck(None).expect("recheck holds");
}

#[test]
fn changed_policy_raises_policy_lockdown() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_policy(dir.path(), POLICY_YAML);
    let (baseline, _) = PolicyBaseline::capture(&path, None).expect("capture");

    fs::write(&path, format!("{POLICY_YAML}# drift\n")).expect("rewrite");
    let err = baseline.recheck(None).unwrap_err();
    let LockdownError::Mismatch {
        baseline: captured,
        current,
    } = err
    else {
        panic!("expected Mismatch");
    };
    assert_eq!(captured, baseline.baseline_hash());
    assert_ne!(captured, current);
}

#[test]
fn baseline_artifact_is_written_with_a_trailing_newline() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_policy(dir.path(), POLICY_YAML);
    let (baseline, _) = PolicyBaseline::capture(&path, None).expect("capture");

    let artifact = baseline.write_artifact(dir.path()).expect("artifact");
    assert!(artifact.ends_with("artifacts/governance/policy-baseline.json"));
    let text = fs::read_to_string(&artifact).expect("read artifact");
    assert!(text.ends_with('\n'));
    assert!(text.contains("policy_hash_baseline"));
}

// ============================================================================
// SECTION: Report Emission
// ============================================================================

#[test]
fn report_line_and_artifact_are_stable() {
    let report = evaluate_pr(
        &policy(),
        &passing_pr(),
        &[],
        &signed_commits(),
        &[],
        &passing_reviews(),
        &passing_statuses(),
    )
    .expect("report");

    let line = gate_report_line(12, "headsha12", "p-hash", &report).expect("line");
    assert!(line.starts_with("PR_GATE_REPORT {"));
    assert!(line.contains("\"passed\":true"));
    let again = gate_report_line(12, "headsha12", "p-hash", &report).expect("line again");
    assert_eq!(line, again);

    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_gate_artifact(dir.path(), 12, "headsha12", "p-hash", &report, None)
        .expect("artifact");
    assert!(path.ends_with("artifacts/governance/pr-12-headsha12.json"));
    let text = fs::read_to_string(&path).expect("read artifact");
    assert!(text.ends_with('\n'));
    assert!(text.contains("\"pr_number\": 12"));
}

// ============================================================================
// SECTION: Evaluation Cache
// ============================================================================

#[test]
fn cache_entries_insert_exactly_once() {
    let mut cache = EvaluationCache::new();
    cache.insert_once(12, "sha", "p-hash", true).expect("first insert");
    assert_eq!(cache.get(12, "sha", "p-hash"), Some(true));
    assert!(cache.insert_once(12, "sha", "p-hash", false).is_err());
    assert_eq!(cache.len(), 1);
}

#[test]
fn cache_keys_include_the_policy_hash() {
    let mut cache = EvaluationCache::new();
    cache.insert_once(12, "sha", "hash-a", true).expect("insert a");
    cache.insert_once(12, "sha", "hash-b", false).expect("insert b");
    assert_eq!(cache.get(12, "sha", "hash-a"), Some(true));
    assert_eq!(cache.get(12, "sha", "hash-b"), Some(false));
    assert_eq!(cache.get(13, "sha", "hash-a"), None);
}
