// crates/steward-supervisor/tests/dispatch.rs
// ============================================================================
// Module: Dispatch Tests
// Description: Input screening, lock discipline, bounded runs, verification.
// ============================================================================
//! ## Overview
//! Exercises the executor dispatch path in isolation: input validation, the
//! non-blocking execution lock, permit gating, timeout mapping to exit
//! status 124, result ingestion (including the explicit allowlist
//! fallback), and the verification predicate.

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

use steward_core::CanonMap;
use steward_core::CanonValue;
use steward_core::ExecutionPermit;
use steward_core::PermitScope;
use steward_core::Severity;
use steward_core::canonical_severity_gating;
use steward_core::compute_permit_id;
use steward_supervisor::DispatchInput;
use steward_supervisor::ExecError;
use steward_supervisor::ExecutionLock;
use steward_supervisor::TIMEOUT_EXIT_STATUS;
use steward_supervisor::dispatch_task_once;
use steward_supervisor::validate_dispatch_input;
use steward_supervisor::verify_result;

/// Builds a well-formed dispatch input for task 3.
fn input() -> DispatchInput {
    DispatchInput {
        task_id: 3,
        instruction: "Apply the declared change to `executor/dispatch.rs`.".to_string(),
        allowed_files: vec!["executor/dispatch.rs".to_string()],
        expected_outcome: "Execute build task #3 within its declared scope".to_string(),
        governance_hash: "governance-hash".to_string(),
        timestamp: "2026-08-01T00:00:00Z".to_string(),
    }
}

/// Builds the matching one-shot permit for task 3.
fn permit_for_task_three() -> ExecutionPermit {
    let mut capability = CanonMap::new();
    capability.insert("name".to_string(), CanonValue::from("executor.dispatch_task_once"));
    let mut expiry = CanonMap::new();
    expiry.insert(
        "valid_for_sequence_range".to_string(),
        CanonValue::List(vec![CanonValue::Int(3), CanonValue::Int(3)]),
    );
    let mut permit = ExecutionPermit {
        permit_id: String::new(),
        policy_hash: "governance-hash".to_string(),
        request_fingerprint: "request-fp".to_string(),
        capability,
        decision: Severity::Allow,
        severity_to_gating: canonical_severity_gating(),
        issued_by: "supervisor".to_string(),
        issued_at_sequence: 3,
        stream_id: "task-3".to_string(),
        prev_event_hash: "governance-hash".to_string(),
        permit_scope: PermitScope::OneShot,
        expiry_condition: expiry,
    };
    permit.permit_id = compute_permit_id(&permit).expect("permit id");
    permit
}

/// Dispatches with a custom executor command.
fn dispatch(
    executor: &[String],
    lock: &ExecutionLock,
    max_duration_seconds: u64,
) -> Result<steward_supervisor::ExecutorResult, ExecError> {
    let permit = permit_for_task_three();
    dispatch_task_once(
        &input(),
        Some(&permit),
        "task-3",
        3,
        "governance-hash",
        lock,
        executor,
        max_duration_seconds,
    )
    .map(|(result, _)| result)
}

#[test]
fn malformed_input_names_the_missing_field() {
    let mut bad = input();
    bad.governance_hash = String::new();
    let err = validate_dispatch_input(&bad).unwrap_err();
    assert_eq!(err.to_string(), "execution.dispatch.malformed missing=governance_hash");
}

#[test]
fn nondeterministic_phrasing_is_rejected() {
    let mut bad = input();
    bad.instruction = "Fix the bug if possible.".to_string();
    let err = validate_dispatch_input(&bad).unwrap_err();
    assert_eq!(err.to_string(), "execution.dispatch.nondeterministic");
}

#[test]
fn dispatch_requires_a_permit() {
    let lock = ExecutionLock::new();
    let err = dispatch_task_once(
        &input(),
        None,
        "task-3",
        3,
        "governance-hash",
        &lock,
        &[],
        5,
    )
    .unwrap_err();
    assert_eq!(err.to_string(), "execution.permit.required");
}

#[test]
fn held_lock_is_a_violation_not_a_wait() {
    let lock = ExecutionLock::new();
    let _guard = lock.try_acquire().expect("first acquisition");
    let err = dispatch(&[], &lock, 5).unwrap_err();
    assert_eq!(err.to_string(), "execution.lock.violation");
}

#[test]
fn builtin_executor_reports_a_clean_success() {
    let lock = ExecutionLock::new();
    let result = dispatch(&[], &lock, 10).expect("dispatch");
    assert_eq!(result.status, "success");
    assert!(result.tests_passed);
    assert!(!result.timed_out);
    assert!(result.changed_files.is_empty());
    assert!(!result.files_assumed_from_allowlist);
    assert!(verify_result(&result, &input().allowed_files));
}

#[test]
fn missing_payload_falls_back_to_the_allowlist_explicitly() {
    let lock = ExecutionLock::new();
    let executor =
        vec!["sh".to_string(), "-c".to_string(), "echo plain output; exit 0".to_string()];
    let result = dispatch(&executor, &lock, 10).expect("dispatch");
    assert!(result.files_assumed_from_allowlist);
    assert_eq!(result.changed_files, vec!["executor/dispatch.rs".to_string()]);
}

#[test]
fn overrunning_executors_are_killed_with_status_124() {
    let lock = ExecutionLock::new();
    let executor = vec!["sh".to_string(), "-c".to_string(), "sleep 30".to_string()];
    let result = dispatch(&executor, &lock, 1).expect("dispatch");
    assert!(result.timed_out);
    assert_eq!(result.exit_status, TIMEOUT_EXIT_STATUS);
    assert_eq!(result.status, "failure");
    assert!(!verify_result(&result, &input().allowed_files));
}

#[test]
fn nonzero_exit_maps_to_failure() {
    let lock = ExecutionLock::new();
    let executor = vec!["sh".to_string(), "-c".to_string(), "exit 3".to_string()];
    let result = dispatch(&executor, &lock, 10).expect("dispatch");
    assert_eq!(result.status, "failure");
    assert_eq!(result.exit_status, 3);
}

#[test]
fn declared_payload_status_overrides_the_exit_code() {
    let lock = ExecutionLock::new();
    let executor = vec![
        "sh".to_string(),
        "-c".to_string(),
        "printf '%s\\n' '{\"status\":\"failure\",\"changed_files\":[],\"tests_passed\":false}'"
            .to_string(),
    ];
    let result = dispatch(&executor, &lock, 10).expect("dispatch");
    assert_eq!(result.status, "failure");
    assert!(!result.tests_passed);
}

#[test]
fn undeclared_status_vocabulary_is_invalid() {
    let lock = ExecutionLock::new();
    let executor = vec![
        "sh".to_string(),
        "-c".to_string(),
        "printf '%s\\n' '{\"status\":\"flaky\"}'".to_string(),
    ];
    let err = dispatch(&executor, &lock, 10).unwrap_err();
    assert!(err.to_string().starts_with("execution.result.invalid"));
}

// ============================================================================
// SECTION: Verification Predicate
// ============================================================================

#[test]
fn out_of_scope_files_fail_verification() {
    let lock = ExecutionLock::new();
    let executor = vec![
        "sh".to_string(),
        "-c".to_string(),
        "printf '%s\\n' '{\"status\":\"success\",\"changed_files\":[\"other/file.rs\"],\"tests_passed\":true}'"
            .to_string(),
    ];
    let result = dispatch(&executor, &lock, 10).expect("dispatch");
    assert!(!verify_result(&result, &input().allowed_files));
}

#[test]
fn commit_message_skeleton_is_enforced_when_declared() {
    let lock = ExecutionLock::new();
    let executor = vec![
        "sh".to_string(),
        "-c".to_string(),
        "printf '%s\\n' '{\"status\":\"success\",\"changed_files\":[],\"tests_passed\":true,\"commit_message\":\"update stuff\"}'"
            .to_string(),
    ];
    let result = dispatch(&executor, &lock, 10).expect("dispatch");
    assert!(!verify_result(&result, &input().allowed_files));

    let executor = vec![
        "sh".to_string(),
        "-c".to_string(),
        "printf '%s\\n' '{\"status\":\"success\",\"changed_files\":[],\"tests_passed\":true,\"commit_message\":\"feat(task-3): governed executor result\"}'"
            .to_string(),
    ];
    let result = dispatch(&executor, &lock, 10).expect("dispatch");
    assert!(verify_result(&result, &input().allowed_files));
}
