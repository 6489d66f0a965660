// crates/steward-supervisor/src/control.rs
// ============================================================================
// Module: Supervisor Control Loop
// Description: Single-writer cycle over gate, selection, claim, dispatch.
// Purpose: Drive one governed task from backlog to governed commit.
// Dependencies: steward-core, steward-forge, steward-gate, crate modules
// ============================================================================

//! ## Overview
//! Each cycle runs the fixed state machine:
//! `LOAD_CTX -> VALIDATE_ENV -> RUN_PR_GATE -> RELEASE_STALE_CLAIMS ->
//! DETECT_ACTIVE_PHASE -> SELECT_TASK -> CLAIM -> DISPATCH -> VERIFY ->
//! {COMMIT | RETRY} -> TRANSITION -> SLEEP`.
//!
//! The loop is cooperative and single-writer: all governance work happens on
//! this thread, suspension points exist only at external I/O, and every
//! decision derives from the cycle's snapshots. Audit-sink failures are
//! kill-switches that terminate the controller with exit code 2; ordinary
//! task failures make only the current task ineligible.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::thread;
use std::time::Duration;

use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use steward_core::AuditEvent;
use steward_core::AuditEventType;
use steward_core::AuditArtifactWriter;
use steward_core::CanonMap;
use steward_core::CanonValue;
use steward_core::DOMAIN_REQUEST_FINGERPRINT;
use steward_core::ExecutionPermit;
use steward_core::HashError;
use steward_core::PermitError;
use steward_core::PermitScope;
use steward_core::RepoAuditWriter;
use steward_core::Severity;
use steward_core::SinkError;
use steward_core::build_request_fingerprint_input;
use steward_core::canonical_severity_gating;
use steward_core::compute_permit_id;
use steward_core::domain_hash_map;
use steward_core::next_stream_position;
use steward_core::verify_audit_stream;
use steward_forge::ForgeApi;
use steward_forge::ForgeError;
use steward_forge::GateLog;
use steward_forge::Issue;
use steward_forge::StatusState;
use steward_forge::utc_timestamp;
use steward_policy::ConflictResolutionMode;
use steward_policy::InterpreterError;
use steward_policy::PolicyInterpretationConfig;
use steward_policy::RuleMatch;
use steward_policy::StableOrderMode;
use steward_policy::TieBreaker;
use steward_policy::resolve_overlapping_rules;
use steward_policy::validate_secure_layer_initialization;
use steward_gate::CacheError;
use steward_gate::EvaluationCache;
use steward_gate::GateError;
use steward_gate::GatePolicy;
use steward_gate::LockdownError;
use steward_gate::PolicyBaseline;
use steward_gate::ReportError;
use steward_gate::evaluate_pr;
use steward_gate::gate_report_line;
use steward_gate::write_gate_artifact;

use crate::autonomy::AUTONOMOUS_LABEL;
use crate::autonomy::AutonomyError;
use crate::autonomy::AutonomyOutcome;
use crate::autonomy::AutonomyState;
use crate::autonomy::PriorCycleFlags;
use crate::autonomy::RECURSIVE_LABEL;
use crate::autonomy::autonomy_step;
use crate::commit::CommitError;
use crate::commit::create_governed_commit;
use crate::commit::governed_commit_message;
use crate::config::SupervisorConfig;
use crate::environment::EnvironmentPaths;
use crate::environment::validate_environment;
use crate::exec::DispatchInput;
use crate::exec::ExecError;
use crate::exec::ExecutionLock;
use crate::exec::dispatch_task_once;
use crate::exec::verify_result;
use crate::governance::GovernanceEnforcer;
use crate::governance::extract_allowed_files;
use crate::reporter::Reporter;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Fixed ordered phase list; milestone titles must match exactly.
pub const PHASES: [&str; 5] = [
    "phase-1-bootstrap",
    "phase-2-secure-layer",
    "phase-3-governance",
    "phase-4-integration",
    "phase-5-autonomy",
];

/// Label marking build tasks.
pub const BUILD_LABEL: &str = "type:build";

/// Label marking claimed tasks.
pub const CLAIM_LABEL: &str = "in-progress";

/// Status context published on pull request heads.
pub const GOVERNANCE_STATUS_CONTEXT: &str = "supervisor/governance";

// ============================================================================
// SECTION: Exit and Error Types
// ============================================================================

/// Terminal outcome of a supervisor run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlExit {
    /// One task was claimed and handled to completion.
    TaskHandled,
    /// The cycle budget was exhausted without claimable work.
    Idle,
    /// Governance context failed to load at startup.
    GovernanceStartupFailure,
    /// An audit or permit invariant breach terminated the controller.
    KillSwitch,
}

impl ControlExit {
    /// Maps the outcome to the process exit code contract.
    #[must_use]
    pub const fn exit_code(self) -> u8 {
        match self {
            Self::TaskHandled | Self::Idle => 0,
            Self::GovernanceStartupFailure => 1,
            Self::KillSwitch => 2,
        }
    }
}

/// Outcome of a single cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A task was claimed and handled to completion.
    TaskHandled,
    /// Nothing was handled this cycle.
    Idle,
}

/// Cycle-level errors.
///
/// # Invariants
/// - Audit-sink errors are kill-switches; everything else is retried on the
///   next cycle.
#[derive(Debug, Error)]
pub enum CycleError {
    /// A forge call failed.
    #[error(transparent)]
    Forge(#[from] ForgeError),
    /// The policy lockdown failed or the policy could not be loaded.
    #[error(transparent)]
    Lockdown(#[from] LockdownError),
    /// Gate evaluation failed.
    #[error(transparent)]
    Gate(#[from] GateError),
    /// Report emission failed.
    #[error(transparent)]
    Report(#[from] ReportError),
    /// The evaluation cache rejected a duplicate entry.
    #[error(transparent)]
    Cache(#[from] CacheError),
    /// The audit sink failed; the controller must terminate.
    #[error(transparent)]
    Audit(#[from] SinkError),
    /// The governed commit failed.
    #[error(transparent)]
    Commit(#[from] CommitError),
    /// Autonomy processing failed.
    #[error(transparent)]
    Autonomy(#[from] AutonomyError),
    /// Permit construction failed.
    #[error(transparent)]
    Permit(#[from] PermitError),
    /// Canonical input construction failed.
    #[error(transparent)]
    Hash(#[from] HashError),
    /// The policy interpreter rejected its configuration or inputs.
    #[error(transparent)]
    Interpreter(#[from] InterpreterError),
    /// The governance context was not loaded before the cycle.
    #[error("supervisor context missing")]
    ContextMissing,
}

impl CycleError {
    /// Returns true when the error must terminate the controller.
    #[must_use]
    pub const fn is_kill_switch(&self) -> bool {
        matches!(self, Self::Audit(_))
    }
}

/// How a dispatched task ended.
enum HandledTask {
    /// Verified, committed when required, closed.
    Completed,
    /// The task left the eligible set without completing.
    NotCompleted,
}

// ============================================================================
// SECTION: Supervisor
// ============================================================================

/// The single-writer supervisor loop state.
///
/// # Invariants
/// - All mutable control-plane state (execution lock, evaluation cache,
///   policy baseline, prior-cycle flags) is owned here; there are no hidden
///   globals.
pub struct Supervisor<'a> {
    /// Loop configuration.
    config: SupervisorConfig,
    /// Forge seam.
    forge: &'a dyn ForgeApi,
    /// Token sink.
    reporter: &'a dyn Reporter,
    /// Governance enforcer.
    enforcer: GovernanceEnforcer,
    /// Process-wide execution lock.
    lock: ExecutionLock,
    /// Gate evaluation cache.
    cache: EvaluationCache,
    /// Captured policy baseline, after the first gate pass.
    baseline: Option<PolicyBaseline>,
    /// Gate log stream.
    gate_log: GateLog,
    /// Governance hash captured at startup.
    governance_hash: Option<String>,
    /// Sticky flags from the prior cycle.
    prior_cycle: PriorCycleFlags,
    /// Autonomy cooldown state.
    autonomy: AutonomyState,
}

impl<'a> Supervisor<'a> {
    /// Creates a supervisor over a forge seam and a token sink.
    #[must_use]
    pub fn new(
        config: SupervisorConfig,
        forge: &'a dyn ForgeApi,
        reporter: &'a dyn Reporter,
    ) -> Self {
        let enforcer = GovernanceEnforcer::new(
            &config.governance_path,
            &config.environment_path,
            &config.violation_log_path,
        );
        let gate_log = GateLog::new(&config.gate_log_path);
        Self {
            config,
            forge,
            reporter,
            enforcer,
            lock: ExecutionLock::new(),
            cache: EvaluationCache::new(),
            baseline: None,
            gate_log,
            governance_hash: None,
            prior_cycle: PriorCycleFlags::default(),
            autonomy: AutonomyState::default(),
        }
    }

    /// Returns the interpreter configuration the supervisor operates under.
    fn interpreter_config() -> PolicyInterpretationConfig {
        PolicyInterpretationConfig {
            interpretation_authority: "supervisor".to_string(),
            conflict_resolution_mode: ConflictResolutionMode::DenyWins,
            tie_breaker: TieBreaker::StableOrder,
            stable_order_mode: StableOrderMode::LexicalRuleId,
        }
    }

    /// Runs the control loop until a task is handled, the cycle budget is
    /// exhausted, or a kill-switch fires.
    pub fn run(&mut self) -> ControlExit {
        // Initialization guardrails: the supervisor emits allow/block only,
        // so no review-ledger resolver is required.
        let interpreter = Self::interpreter_config();
        if validate_secure_layer_initialization(
            &interpreter,
            &[Severity::Allow, Severity::Block],
            None,
        )
        .is_err()
        {
            self.reporter.emit(&self.enforcer.compliance_report_block());
            return ControlExit::GovernanceStartupFailure;
        }

        match self.enforcer.load_context() {
            Ok(context) => self.governance_hash = Some(context.governance_hash),
            Err(_) => {
                self.reporter.emit(&self.enforcer.compliance_report_block());
                return ControlExit::GovernanceStartupFailure;
            }
        }

        let mut cycles = 0u64;
        loop {
            match self.run_cycle() {
                Ok(CycleOutcome::TaskHandled) => return ControlExit::TaskHandled,
                Ok(CycleOutcome::Idle) => {}
                Err(err) if err.is_kill_switch() => return ControlExit::KillSwitch,
                Err(_) => {}
            }
            cycles += 1;
            if let Some(max_cycles) = self.config.max_cycles
                && cycles >= max_cycles
            {
                return ControlExit::Idle;
            }
            thread::sleep(Duration::from_secs(self.config.sleep_seconds));
        }
    }

    /// Runs one cycle of the state machine.
    ///
    /// # Errors
    ///
    /// Returns [`CycleError`]; only audit-sink variants are kill-switches.
    pub fn run_cycle(&mut self) -> Result<CycleOutcome, CycleError> {
        if self.governance_hash.is_none() {
            let context = self
                .enforcer
                .load_context()
                .map_err(|_| CycleError::ContextMissing)?;
            self.governance_hash = Some(context.governance_hash);
        }

        // VALIDATE_ENV
        let paths = EnvironmentPaths {
            repo_root: self.config.repo_root.clone(),
            governance_path: self.config.governance_path.clone(),
            environment_path: self.config.environment_path.clone(),
            runtime_probe: self.config.runtime_probe.clone(),
        };
        let report =
            validate_environment(self.forge, &paths, self.config.has_token, CLAIM_LABEL);
        if !report.environment_valid {
            self.prior_cycle.environment_failure = true;
            self.gate_log
                .event("environment", &format!("invalid failed={}", report.checks_failed.join(",")));
            return Ok(CycleOutcome::Idle);
        }
        self.prior_cycle.environment_failure = false;

        // RUN_PR_GATE (policy-hash lockdown included)
        self.run_pr_gate()?;

        // RELEASE_STALE_CLAIMS
        self.release_stale_claims()?;

        // DETECT_ACTIVE_PHASE
        let issues = self.forge.list_issues("open")?;
        let Some(phase) = Self::detect_active_phase(&issues) else {
            self.reporter.emit("PHASE_STATUS=complete");
            return self.run_autonomy();
        };
        self.reporter.emit(&format!("PHASE_GATE_ACTIVE phase={phase}"));
        self.reporter.emit(&format!("ACTIVE_PHASE {phase}"));

        // SELECT_TASK
        let mut eligible = Self::eligible_tasks(&issues, phase);
        self.reporter.emit(&format!("ELIGIBLE_TASK_COUNT {}", eligible.len()));
        eligible.sort_by_key(|issue| issue.number);
        let Some(task) = eligible.first().cloned() else {
            self.reporter.emit("PHASE_STATUS=running");
            return Ok(CycleOutcome::Idle);
        };
        self.reporter.emit(&format!("PHASE_GATE_SELECTED issue={}", task.number));

        let instruction = if task.body.is_empty() {
            task.title.clone()
        } else {
            format!("{}\n\n{}", task.title, task.body)
        };
        let intended_outcome = format!("Claim issue #{} as in-progress", task.number);
        if self.enforcer.validate_pre_computation(&instruction, &intended_outcome).is_err() {
            self.prior_cycle.governance_violation = true;
            self.reporter.emit(&self.enforcer.compliance_report_block());
            return Ok(CycleOutcome::Idle);
        }
        self.prior_cycle.governance_violation = false;

        // CLAIM
        if !self.claim_task(task.number)? {
            return Ok(CycleOutcome::Idle);
        }
        self.reporter.emit(&format!("CLAIMED issue #{}", task.number));

        // DISPATCH -> VERIFY -> {COMMIT | RETRY} -> TRANSITION
        match self.dispatch_and_handle(&task, &instruction)? {
            HandledTask::Completed => {
                let issues = self.forge.list_issues("open")?;
                let drained = !issues.iter().any(|issue| {
                    issue.state == "open"
                        && issue.has_label(BUILD_LABEL)
                        && issue
                            .milestone
                            .as_ref()
                            .is_some_and(|milestone| milestone.title == phase)
                });
                if drained {
                    self.reporter.emit("PHASE_STATUS=complete");
                    self.reporter.emit(&format!("PHASE_COMPLETE phase={phase}"));
                    if let Some(next) = Self::next_phase(phase) {
                        self.reporter.emit(&format!("PHASE_PROMOTED phase={next}"));
                    }
                } else {
                    self.reporter.emit("PHASE_STATUS=running");
                }
                self.reporter.emit(&format!(
                    "TASK_COMPLETED issue={} final_state=completed",
                    task.number
                ));
                Ok(CycleOutcome::TaskHandled)
            }
            HandledTask::NotCompleted => Ok(CycleOutcome::Idle),
        }
    }

    // ========================================================================
    // SECTION: PR Gate
    // ========================================================================

    /// Runs one standalone PR gate pass without claiming any task.
    ///
    /// # Errors
    ///
    /// Returns [`CycleError`] exactly as a full cycle's gate stage would.
    pub fn run_gate_only(&mut self) -> Result<(), CycleError> {
        self.run_pr_gate()
    }

    /// Runs the PR gate over every open pull request targeting a protected
    /// branch, under the policy-hash lockdown.
    fn run_pr_gate(&mut self) -> Result<(), CycleError> {
        let policy: GatePolicy = match &self.baseline {
            None => {
                let (baseline, policy) =
                    PolicyBaseline::capture(&self.config.policy_path, Some(&self.gate_log))?;
                baseline.write_artifact(&self.config.repo_root)?;
                self.baseline = Some(baseline);
                policy
            }
            Some(baseline) => match baseline.recheck(Some(&self.gate_log)) {
                Ok(policy) => policy,
                Err(LockdownError::Mismatch {
                    baseline,
                    current,
                }) => {
                    self.reporter
                        .emit(&format!("POLICY_LOCKDOWN baseline={baseline} current={current}"));
                    return Err(CycleError::Lockdown(LockdownError::Mismatch {
                        baseline,
                        current,
                    }));
                }
                Err(err) => return Err(CycleError::Lockdown(err)),
            },
        };
        let policy_hash = self
            .baseline
            .as_ref()
            .map(|baseline| baseline.baseline_hash().to_string())
            .ok_or(CycleError::ContextMissing)?;

        let pulls = self.forge.open_pulls()?;
        let gated: Vec<_> = pulls
            .iter()
            .filter(|pull| self.config.protected_branches.contains(&pull.base.name))
            .cloned()
            .collect();
        for pull in &gated {
            let head_sha = pull.head.sha.clone();
            if self.cache.get(pull.number, &head_sha, &policy_hash).is_some() {
                continue;
            }
            self.forge.publish_status(
                &head_sha,
                StatusState::Pending,
                GOVERNANCE_STATUS_CONTEXT,
                "governance evaluation in flight",
            )?;

            let files = self.forge.pull_files(pull.number)?;
            let reviews = self.forge.pull_reviews(pull.number)?;
            let commits = self.forge.pull_commits(pull.number)?;
            let statuses = self.forge.commit_statuses(&head_sha)?;
            let report =
                evaluate_pr(&policy, pull, &pulls, &commits, &files, &reviews, &statuses)?;

            let line = gate_report_line(pull.number, &head_sha, &policy_hash, &report)?;
            self.reporter.emit(&line);
            write_gate_artifact(
                &self.config.repo_root,
                pull.number,
                &head_sha,
                &policy_hash,
                &report,
                Some(&self.gate_log),
            )?;

            let (state, description) = if report.passed {
                (StatusState::Success, "all governance gates passed".to_string())
            } else {
                (StatusState::Failure, format!("failed gates: {}", report.failed_gates.join(",")))
            };
            self.forge.publish_status(&head_sha, state, GOVERNANCE_STATUS_CONTEXT, &description)?;
            self.cache.insert_once(pull.number, &head_sha, &policy_hash, report.passed)?;
        }
        Ok(())
    }

    // ========================================================================
    // SECTION: Stale Claims
    // ========================================================================

    /// Releases claims whose newest claim-label event is older than the TTL.
    fn release_stale_claims(&mut self) -> Result<(), CycleError> {
        let issues = self.forge.list_issues("open")?;
        let now = OffsetDateTime::now_utc();
        let ttl = i64::try_from(self.config.claim_ttl_seconds).unwrap_or(i64::MAX);
        for issue in issues.iter().filter(|issue| issue.has_label(CLAIM_LABEL)) {
            let timeline = self.forge.issue_timeline(issue.number)?;
            let newest_claim = timeline
                .iter()
                .filter(|event| {
                    event.event_type == "label"
                        && event
                            .label
                            .as_ref()
                            .is_some_and(|label| label.name == CLAIM_LABEL)
                })
                .map(|event| event.created_at.clone())
                .max();
            let Some(claimed_at) = newest_claim else {
                continue;
            };
            let Ok(claimed_at) = OffsetDateTime::parse(&claimed_at, &Rfc3339) else {
                continue;
            };
            if (now - claimed_at).whole_seconds() > ttl {
                self.remove_claim_label(issue.number)?;
                self.forge.post_comment(
                    issue.number,
                    "Stale claim released: the in-progress TTL expired.",
                )?;
                self.gate_log
                    .event("stale_claims", &format!("released issue={}", issue.number));
            }
        }
        Ok(())
    }

    // ========================================================================
    // SECTION: Phase Detection and Selection
    // ========================================================================

    /// Returns the earliest phase still holding open build-tagged work.
    fn detect_active_phase(issues: &[Issue]) -> Option<&'static str> {
        PHASES.into_iter().find(|phase| {
            issues.iter().any(|issue| {
                issue.state == "open"
                    && issue.has_label(BUILD_LABEL)
                    && issue
                        .milestone
                        .as_ref()
                        .is_some_and(|milestone| milestone.title == *phase)
            })
        })
    }

    /// Returns the phase after the given one, when any.
    fn next_phase(phase: &str) -> Option<&'static str> {
        let index = PHASES.iter().position(|candidate| *candidate == phase)?;
        PHASES.get(index + 1).copied()
    }

    /// Returns the eligible tasks of a phase: open, build-tagged, unclaimed.
    fn eligible_tasks(issues: &[Issue], phase: &str) -> Vec<Issue> {
        issues
            .iter()
            .filter(|issue| {
                issue.state == "open"
                    && issue.has_label(BUILD_LABEL)
                    && !issue.has_label(CLAIM_LABEL)
                    && issue
                        .milestone
                        .as_ref()
                        .is_some_and(|milestone| milestone.title == phase)
            })
            .cloned()
            .collect()
    }

    // ========================================================================
    // SECTION: Claiming
    // ========================================================================

    /// Claims a task: ensure the label exists, attach it, verify presence.
    fn claim_task(&mut self, number: u64) -> Result<bool, CycleError> {
        let Some(label_id) = self.ensure_claim_label()? else {
            return Ok(false);
        };
        self.forge.add_label(number, label_id)?;
        let labels = self.forge.issue_labels(number)?;
        Ok(labels.iter().any(|label| label.name == CLAIM_LABEL))
    }

    /// Finds or deterministically creates the claim label.
    fn ensure_claim_label(&mut self) -> Result<Option<i64>, CycleError> {
        if let Some(label) =
            self.forge.list_labels()?.into_iter().find(|label| label.name == CLAIM_LABEL)
        {
            return Ok(Some(label.id));
        }
        match self.forge.create_label(
            CLAIM_LABEL,
            "f29513",
            "Task currently claimed by supervisor",
        ) {
            Ok(label) => Ok(Some(label.id)),
            // The label may have been created concurrently; re-fetch once.
            Err(_) => Ok(self
                .forge
                .list_labels()?
                .into_iter()
                .find(|label| label.name == CLAIM_LABEL)
                .map(|label| label.id)),
        }
    }

    /// Removes the claim label from an issue when present.
    fn remove_claim_label(&mut self, number: u64) -> Result<(), CycleError> {
        let labels = self.forge.issue_labels(number)?;
        if let Some(label) = labels.into_iter().find(|label| label.name == CLAIM_LABEL) {
            self.forge.remove_label(number, label.id)?;
        }
        Ok(())
    }

    // ========================================================================
    // SECTION: Permit Issuance and Audit
    // ========================================================================

    /// Builds the one-shot permit binding this dispatch to the task stream.
    fn issue_permit(&self, task_id: u64) -> Result<ExecutionPermit, CycleError> {
        let governance_hash =
            self.governance_hash.clone().ok_or(CycleError::ContextMissing)?;
        let fingerprint_input = build_request_fingerprint_input(
            "supervisor",
            "executor.dispatch_task_once",
            "execute_capability",
            &format!("task:{task_id}"),
            &governance_hash,
        )?;
        let request_fingerprint =
            domain_hash_map(DOMAIN_REQUEST_FINGERPRINT, &fingerprint_input)?;

        let mut capability = CanonMap::new();
        capability.insert("name".to_string(), CanonValue::from("executor.dispatch_task_once"));
        capability.insert("target".to_string(), CanonValue::from(format!("task:{task_id}")));

        let sequence = i64::try_from(task_id).map_err(|_| {
            CycleError::Permit(PermitError::IssuedAtSequence)
        })?;
        let mut expiry = CanonMap::new();
        expiry.insert(
            "valid_for_sequence_range".to_string(),
            CanonValue::List(vec![CanonValue::Int(sequence), CanonValue::Int(sequence)]),
        );

        // The dispatch decision flows through the interpreter so overlap
        // resolution stays uniform across the control plane.
        let matches = [RuleMatch {
            rule_id: "executor.dispatch_task_once".to_string(),
            effect: Severity::Allow,
            specificity: 0,
            priority: 0,
            order_index: 0,
        }];
        let decision = resolve_overlapping_rules(&matches, &Self::interpreter_config())?;

        let mut permit = ExecutionPermit {
            permit_id: String::new(),
            policy_hash: governance_hash.clone(),
            request_fingerprint,
            capability,
            decision: decision.effect,
            severity_to_gating: canonical_severity_gating(),
            issued_by: "supervisor".to_string(),
            issued_at_sequence: task_id,
            stream_id: format!("task-{task_id}"),
            prev_event_hash: governance_hash,
            permit_scope: PermitScope::OneShot,
            expiry_condition: expiry,
        };
        permit.permit_id = compute_permit_id(&permit)?;
        Ok(permit)
    }

    /// Appends the `permit.used` event at the task stream's next position
    /// and re-verifies the stream.
    fn append_permit_used(
        &self,
        permit: &ExecutionPermit,
        stream_id: &str,
    ) -> Result<(), CycleError> {
        let (sequence, prev_event_hash) =
            next_stream_position(&self.config.repo_root, stream_id)?;

        let mut payload = CanonMap::new();
        payload.insert("permit_id".to_string(), CanonValue::from(permit.permit_id.as_str()));
        payload.insert("capability".to_string(), CanonValue::Map(permit.capability.clone()));
        payload.insert("decision".to_string(), CanonValue::from(permit.decision.as_str()));
        payload
            .insert("permit_scope".to_string(), CanonValue::from(permit.permit_scope.as_str()));
        let issued_at = i64::try_from(permit.issued_at_sequence)
            .map_err(|_| CycleError::Permit(PermitError::IssuedAtSequence))?;
        payload.insert("issued_at_sequence".to_string(), CanonValue::Int(issued_at));

        let event = AuditEvent {
            event_id: permit.permit_id.clone(),
            event_type: AuditEventType::PermitUsed,
            policy_hash: permit.policy_hash.clone(),
            request_fingerprint: permit.request_fingerprint.clone(),
            sequence,
            stream_id: stream_id.to_string(),
            prev_event_hash,
            payload,
        };
        let writer = RepoAuditWriter::new(&self.config.repo_root, "supervisor");
        writer.write_event(&event).map_err(CycleError::Audit)?;
        verify_audit_stream(&self.config.repo_root, stream_id).map_err(CycleError::Audit)?;
        Ok(())
    }

    // ========================================================================
    // SECTION: Dispatch and Transition
    // ========================================================================

    /// Dispatches the claimed task and drives it to a terminal transition.
    fn dispatch_and_handle(
        &mut self,
        task: &Issue,
        instruction: &str,
    ) -> Result<HandledTask, CycleError> {
        let governance_hash =
            self.governance_hash.clone().ok_or(CycleError::ContextMissing)?;
        let allowed_files: Vec<String> =
            extract_allowed_files(instruction).into_iter().collect();
        let input = DispatchInput {
            task_id: task.number,
            instruction: instruction.to_string(),
            allowed_files,
            expected_outcome: format!(
                "Execute build task #{} within its declared scope",
                task.number
            ),
            governance_hash: governance_hash.clone(),
            timestamp: utc_timestamp(),
        };
        let permit = self.issue_permit(task.number)?;
        let stream_id = format!("task-{}", task.number);

        let dispatched = dispatch_task_once(
            &input,
            Some(&permit),
            &stream_id,
            task.number,
            &governance_hash,
            &self.lock,
            &self.config.executor_command,
            self.config.max_duration_seconds,
        );
        let (result, _metadata) = match dispatched {
            Ok(outcome) => outcome,
            Err(ExecError::LockViolation) => {
                // Contention is deterministic: the task transitions to
                // blocked and keeps its claim until an operator intervenes.
                self.forge
                    .post_comment(task.number, "Task blocked: execution.lock.violation")?;
                return Ok(HandledTask::NotCompleted);
            }
            Err(err) => {
                // Dispatch-shape and permit errors make this one task
                // ineligible; release the claim for the next cycle.
                self.remove_claim_label(task.number)?;
                self.forge.post_comment(task.number, &format!("Task rejected: {err}"))?;
                return Ok(HandledTask::NotCompleted);
            }
        };

        // AUDIT: record the consumed permit; sink failures are fatal.
        self.append_permit_used(&permit, &stream_id)?;

        // VERIFY
        if result.timed_out {
            self.remove_claim_label(task.number)?;
            self.forge
                .post_comment(task.number, "Task retry_pending: execution.timeout")?;
            return Ok(HandledTask::NotCompleted);
        }
        let verified = verify_result(&result, &input.allowed_files);
        if !verified || result.status != "success" || !result.tests_passed {
            self.remove_claim_label(task.number)?;
            self.forge
                .post_comment(task.number, "Task retry_pending: unverified executor result")?;
            return Ok(HandledTask::NotCompleted);
        }

        // COMMIT (skipped without throwing on policy violations)
        let commit_message = governed_commit_message(task.number);
        let mut commit_hash = None;
        if !result.changed_files.is_empty() {
            if self
                .enforcer
                .validate_commit_policy(instruction, &result.changed_files, &commit_message)
                .is_err()
            {
                self.prior_cycle.governance_violation = true;
                self.prior_cycle.commit_scope_mismatch = true;
                self.remove_claim_label(task.number)?;
                self.forge.post_comment(
                    task.number,
                    "Commit skipped: commit policy violation; task retry_pending.",
                )?;
                self.reporter.emit(&self.enforcer.compliance_report_block());
                return Ok(HandledTask::NotCompleted);
            }
            commit_hash =
                create_governed_commit(&self.config.repo_root, task.number, &result.changed_files)?;
            self.prior_cycle.commit_scope_mismatch = false;
        }

        // CLOSE
        self.forge.close_issue(task.number)?;
        self.remove_claim_label(task.number)?;
        let comment = commit_hash.as_ref().map_or_else(
            || "Task completed: verified success with no file changes.".to_string(),
            |hash| format!("Task completed via governed commit {hash}."),
        );
        self.forge.post_comment(task.number, &comment)?;

        if task.has_label(AUTONOMOUS_LABEL) {
            self.autonomy.record_autonomous_close(task.has_label(RECURSIVE_LABEL));
        }
        Ok(HandledTask::Completed)
    }

    // ========================================================================
    // SECTION: Autonomy
    // ========================================================================

    /// Runs one autonomy step after all phases are complete.
    fn run_autonomy(&mut self) -> Result<CycleOutcome, CycleError> {
        let final_phase = PHASES[PHASES.len() - 1];
        let milestone = self
            .forge
            .list_milestones()?
            .into_iter()
            .find(|milestone| milestone.title == final_phase)
            .map(|milestone| milestone.id);
        let outcome = autonomy_step(
            self.forge,
            &self.config.autonomy_backlog_path,
            BUILD_LABEL,
            milestone,
            &mut self.autonomy,
            self.prior_cycle,
        )?;
        match outcome {
            AutonomyOutcome::Created {
                issue,
                ..
            } => {
                self.gate_log.event("autonomy", &format!("created issue={issue}"));
            }
            AutonomyOutcome::Blocked {
                reason,
            } => {
                self.reporter.emit(&format!("RECURSION_BLOCKED reason={reason}"));
            }
            AutonomyOutcome::Idle => self.reporter.emit("AUTONOMY_IDLE"),
            AutonomyOutcome::Complete => self.reporter.emit("AUTONOMY_COMPLETE"),
        }
        Ok(CycleOutcome::Idle)
    }
}
