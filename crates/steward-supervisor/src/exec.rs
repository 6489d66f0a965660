// crates/steward-supervisor/src/exec.rs
// ============================================================================
// Module: Executor Dispatch
// Description: Bounded single-dispatch execution under permit and lock.
// Purpose: Run exactly one governed sub-process per claimed task.
// Dependencies: regex, serde, serde_json, steward-core, steward-forge
// ============================================================================

//! ## Overview
//! Dispatch validates its input (no missing fields, no nondeterministic
//! phrasing), verifies the execution permit against the supervisor-declared
//! chain position, acquires the process-wide execution lock *non-blocking*,
//! and runs one sub-process bounded by a maximum duration. A run past the
//! bound is killed and mapped to exit status 124 with a failure status.
//!
//! Result ingestion parses the last stdout line as JSON when present;
//! otherwise changed files fall back to the declared allowlist, and the
//! fallback is marked explicitly in the ingested result so it is visible in
//! logs and audit payloads.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Read as _;
use std::process::Command;
use std::process::Stdio;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use regex::Regex;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use steward_core::ExecutionPermit;
use steward_core::PermitError;
use steward_core::verify_execution_permit_against_chain;
use steward_forge::utc_timestamp;

// ============================================================================
// SECTION: Dispatch Input
// ============================================================================

/// Input for one task dispatch.
///
/// # Invariants
/// - Every string field is non-empty once validated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchInput {
    /// Task (issue) identifier.
    pub task_id: u64,
    /// Instruction text driving the executor.
    pub instruction: String,
    /// Files the executor is allowed to change.
    pub allowed_files: Vec<String>,
    /// Declared outcome of the dispatch.
    pub expected_outcome: String,
    /// Governance hash in force at dispatch time.
    pub governance_hash: String,
    /// Dispatch timestamp.
    pub timestamp: String,
}

/// Dispatch and execution errors.
///
/// # Invariants
/// - Display forms are stable error codes that appear in tests.
#[derive(Debug, Error)]
pub enum ExecError {
    /// A required dispatch field was missing or empty.
    #[error("execution.dispatch.malformed missing={0}")]
    Malformed(&'static str),
    /// The instruction contained nondeterministic phrasing.
    #[error("execution.dispatch.nondeterministic")]
    Nondeterministic,
    /// No permit was supplied for the dispatch.
    #[error("execution.permit.required")]
    PermitRequired,
    /// The execution lock was already held.
    #[error("execution.lock.violation")]
    LockViolation,
    /// The executor process could not be spawned.
    #[error("execution.spawn {0}")]
    Spawn(String),
    /// The executor result was malformed.
    #[error("execution.result.invalid {0}")]
    InvalidResult(String),
    /// The permit failed validation or chain binding.
    #[error(transparent)]
    Permit(#[from] PermitError),
}

/// Terms that make an instruction nondeterministic.
const NONDETERMINISTIC_TERMS: [&str; 4] = ["maybe", "perhaps", "if possible", "as needed"];

/// Validates a dispatch input's required fields and phrasing.
///
/// # Errors
///
/// Returns [`ExecError::Malformed`] naming the first empty field, or
/// [`ExecError::Nondeterministic`] for forbidden phrasing.
pub fn validate_dispatch_input(input: &DispatchInput) -> Result<(), ExecError> {
    if input.instruction.is_empty() {
        return Err(ExecError::Malformed("instruction"));
    }
    if input.expected_outcome.is_empty() {
        return Err(ExecError::Malformed("expected_outcome"));
    }
    if input.governance_hash.is_empty() {
        return Err(ExecError::Malformed("governance_hash"));
    }
    if input.timestamp.is_empty() {
        return Err(ExecError::Malformed("timestamp"));
    }
    let lower = input.instruction.to_lowercase();
    if NONDETERMINISTIC_TERMS.iter().any(|term| lower.contains(term)) {
        return Err(ExecError::Nondeterministic);
    }
    Ok(())
}

// ============================================================================
// SECTION: Execution Lock
// ============================================================================

/// Process-wide execution lock, owned by the controller.
///
/// # Invariants
/// - Acquisition is non-blocking exclusive; contention is an error, never a
///   wait.
#[derive(Debug, Default)]
pub struct ExecutionLock {
    /// Exclusive token.
    inner: Mutex<()>,
}

impl ExecutionLock {
    /// Creates an unheld lock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Tries to acquire the lock without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::LockViolation`] when the lock is already held.
    pub fn try_acquire(&self) -> Result<std::sync::MutexGuard<'_, ()>, ExecError> {
        self.inner.try_lock().map_err(|_| ExecError::LockViolation)
    }
}

// ============================================================================
// SECTION: Executor Result
// ============================================================================

/// Exit status substituted for killed-on-timeout executors.
pub const TIMEOUT_EXIT_STATUS: i32 = 124;

/// Structured executor result after ingestion.
///
/// # Invariants
/// - `status` is `success` or `failure`; nothing else survives ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorResult {
    /// Final status.
    pub status: String,
    /// Files the executor changed.
    pub changed_files: Vec<String>,
    /// Commit message skeleton declared by the executor, when any.
    pub commit_message: Option<String>,
    /// Whether the executor's tests passed.
    pub tests_passed: bool,
    /// Combined stdout/stderr log block.
    pub logs: String,
    /// Completion timestamp.
    pub timestamp: String,
    /// Raw stdout.
    pub stdout: String,
    /// Raw stderr.
    pub stderr: String,
    /// Process exit status; 124 on timeout.
    pub exit_status: i32,
    /// Whether the run was killed at the duration bound.
    pub timed_out: bool,
    /// Whether `changed_files` was assumed from the allowlist because the
    /// executor declared none.
    pub files_assumed_from_allowlist: bool,
}

/// Metadata recorded alongside a dispatch.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchMetadata {
    /// Dispatch start timestamp.
    pub dispatch_timestamp: String,
    /// Executor command line.
    pub executor_command: Vec<String>,
    /// Whether the run timed out.
    pub timed_out: bool,
    /// Configured duration bound in seconds.
    pub max_duration_seconds: u64,
}

// ============================================================================
// SECTION: Subprocess Runner
// ============================================================================

/// Raw process outcome before ingestion.
struct RawRun {
    /// Captured stdout.
    stdout: String,
    /// Captured stderr.
    stderr: String,
    /// Exit status; 124 on timeout.
    exit_status: i32,
    /// Whether the run was killed at the bound.
    timed_out: bool,
}

/// Runs one command bounded by a maximum duration.
///
/// Stdout and stderr are drained concurrently so the child never blocks on
/// a full pipe; the wait itself polls the child until the deadline.
fn bounded_run(command: &[String], max_duration: Duration) -> Result<RawRun, ExecError> {
    let Some((program, args)) = command.split_first() else {
        return Err(ExecError::Spawn("empty executor command".to_string()));
    };
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|err| ExecError::Spawn(err.to_string()))?;

    let stdout_handle = child.stdout.take();
    let stderr_handle = child.stderr.take();
    let stdout_reader = thread::spawn(move || {
        let mut buffer = String::new();
        if let Some(mut pipe) = stdout_handle {
            let _ = pipe.read_to_string(&mut buffer);
        }
        buffer
    });
    let stderr_reader = thread::spawn(move || {
        let mut buffer = String::new();
        if let Some(mut pipe) = stderr_handle {
            let _ = pipe.read_to_string(&mut buffer);
        }
        buffer
    });

    let deadline = Instant::now() + max_duration;
    let mut timed_out = false;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break Some(status),
            Ok(None) => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    timed_out = true;
                    break None;
                }
                thread::sleep(Duration::from_millis(50));
            }
            Err(err) => return Err(ExecError::Spawn(err.to_string())),
        }
    };

    let stdout = stdout_reader.join().unwrap_or_default();
    let stderr = stderr_reader.join().unwrap_or_default();
    let exit_status = if timed_out {
        TIMEOUT_EXIT_STATUS
    } else {
        status.and_then(|status| status.code()).unwrap_or(-1)
    };
    Ok(RawRun {
        stdout,
        stderr,
        exit_status,
        timed_out,
    })
}

// ============================================================================
// SECTION: Result Ingestion
// ============================================================================

/// Machine-readable payload an executor may emit as its last stdout line.
#[derive(Debug, Deserialize)]
struct ExecutorPayload {
    /// Declared status.
    #[serde(default)]
    status: Option<String>,
    /// Declared changed files.
    #[serde(default)]
    changed_files: Option<Vec<String>>,
    /// Declared commit message skeleton.
    #[serde(default)]
    commit_message: Option<String>,
    /// Declared test outcome.
    #[serde(default)]
    tests_passed: Option<bool>,
}

/// Ingests a raw run into a structured executor result.
fn ingest_result(
    raw: RawRun,
    allowed_files: &[String],
) -> Result<ExecutorResult, ExecError> {
    let process_status = if raw.exit_status == 0 && !raw.timed_out {
        "success"
    } else {
        "failure"
    };
    let payload = raw
        .stdout
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .and_then(|line| serde_json::from_str::<Value>(line.trim()).ok())
        .and_then(|value| serde_json::from_value::<ExecutorPayload>(value).ok());

    let mut status = process_status.to_string();
    let mut changed_files: Option<Vec<String>> = None;
    let mut commit_message = None;
    let mut tests_passed = None;
    if let Some(payload) = payload {
        if let Some(declared) = payload.status {
            if declared != "success" && declared != "failure" {
                return Err(ExecError::InvalidResult(
                    "status must be success|failure".to_string(),
                ));
            }
            status = declared;
        }
        changed_files = payload.changed_files;
        commit_message = payload.commit_message;
        tests_passed = payload.tests_passed;
    }

    let stderr = if raw.timed_out && raw.stderr.is_empty() {
        "execution.timeout".to_string()
    } else {
        raw.stderr
    };
    let files_assumed = changed_files.is_none();
    let changed_files = changed_files.unwrap_or_else(|| allowed_files.to_vec());
    let logs = format!(
        "stdout:\n{}\n\nstderr:\n{stderr}\n\nexit_status={}",
        raw.stdout, raw.exit_status
    );
    Ok(ExecutorResult {
        tests_passed: tests_passed.unwrap_or(status == "success"),
        status,
        changed_files,
        commit_message,
        logs,
        timestamp: utc_timestamp(),
        stdout: raw.stdout,
        stderr,
        exit_status: raw.exit_status,
        timed_out: raw.timed_out,
        files_assumed_from_allowlist: files_assumed,
    })
}

// ============================================================================
// SECTION: Dispatch
// ============================================================================

/// Builds the default deterministic executor command for a task.
///
/// The command emits a machine-readable payload as its final stdout line,
/// declaring no file changes.
#[must_use]
pub fn deterministic_executor_command(input: &DispatchInput) -> Vec<String> {
    let payload = serde_json::json!({
        "task_id": input.task_id,
        "status": "success",
        "changed_files": [],
        "tests_passed": true,
    });
    vec!["sh".to_string(), "-c".to_string(), format!("printf '%s\\n' '{payload}'")]
}

/// Dispatches exactly one bounded execution for a claimed task.
///
/// The permit is verified against the supervisor-declared chain position
/// before the lock is taken; the lock is held for the duration of the run.
///
/// # Errors
///
/// Returns [`ExecError`] for malformed input, a missing or invalid permit,
/// lock contention, or spawn/ingestion failures. Timeouts are not errors;
/// they surface as a failure result with exit status 124.
#[allow(
    clippy::too_many_arguments,
    reason = "The chain-binding triple is part of the dispatch contract."
)]
pub fn dispatch_task_once(
    input: &DispatchInput,
    permit: Option<&ExecutionPermit>,
    current_stream_id: &str,
    current_sequence: u64,
    current_prev_event_hash: &str,
    lock: &ExecutionLock,
    executor_command: &[String],
    max_duration_seconds: u64,
) -> Result<(ExecutorResult, DispatchMetadata), ExecError> {
    validate_dispatch_input(input)?;
    let Some(permit) = permit else {
        return Err(ExecError::PermitRequired);
    };
    verify_execution_permit_against_chain(
        permit,
        current_stream_id,
        current_sequence,
        current_prev_event_hash,
    )?;

    let _guard = lock.try_acquire()?;
    let command: Vec<String> = if executor_command.is_empty() {
        deterministic_executor_command(input)
    } else {
        executor_command.to_vec()
    };
    let dispatch_timestamp = utc_timestamp();
    let raw = bounded_run(&command, Duration::from_secs(max_duration_seconds))?;
    let timed_out = raw.timed_out;
    let result = ingest_result(raw, &input.allowed_files)?;
    let metadata = DispatchMetadata {
        dispatch_timestamp,
        executor_command: command,
        timed_out,
        max_duration_seconds,
    };
    Ok((result, metadata))
}

// ============================================================================
// SECTION: Verification
// ============================================================================

/// Verifies an ingested result against the declared allowlist.
///
/// A result is verified iff the status is deterministic, the changed files
/// are a subset of the allowed files, the run did not time out, and the
/// commit-message skeleton (when declared) matches the required convention.
#[must_use]
pub fn verify_result(result: &ExecutorResult, allowed_files: &[String]) -> bool {
    if result.status != "success" && result.status != "failure" {
        return false;
    }
    if result.timed_out {
        return false;
    }
    if !result.changed_files.iter().all(|file| allowed_files.contains(file)) {
        return false;
    }
    if let Some(message) = &result.commit_message {
        let skeleton_ok = Regex::new(r"^(feat|fix|chore)\([^)]+\): .+")
            .map(|pattern| pattern.is_match(message))
            .unwrap_or(false);
        if !skeleton_ok {
            return false;
        }
    }
    true
}
