// crates/steward-policy/src/interpreter.rs
// ============================================================================
// Module: Policy Interpreter
// Description: Deterministic resolution of overlapping policy rules.
// Purpose: Resolve rule conflicts identically on every replay.
// Dependencies: steward-core, serde
// ============================================================================

//! ## Overview
//! The interpreter resolves overlapping rule matches under one of three
//! conflict-resolution modes, always terminating in the stable pick: a fixed
//! total order over candidates. Ties never resolve by time, insertion order,
//! or randomness.
//!
//! Initialization guardrails fail closed: only the supervisor may hold
//! interpretation authority, and a `review` severity may only be emitted
//! when a ledger resolver is wired in.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use steward_core::Severity;

use crate::ledger::ReviewLedgerResolver;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Conflict resolution mode for overlapping rule matches.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolutionMode {
    /// Any blocking match wins outright.
    DenyWins,
    /// The most specific matches survive.
    MostSpecific,
    /// The highest-priority matches survive.
    ExplicitPriority,
}

/// Tie breaker applied after conflict resolution.
///
/// # Invariants
/// - `stable_order` is the only admissible tie breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreaker {
    /// Deterministic total order over candidates.
    StableOrder,
}

/// Total order used by the stable pick.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StableOrderMode {
    /// Ascending rule identifier.
    LexicalRuleId,
    /// Ascending `(order_index, rule_id)`.
    OrderIndex,
}

/// Interpreter configuration fixed at initialization.
///
/// # Invariants
/// - `interpretation_authority` must be `supervisor`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyInterpretationConfig {
    /// Authority allowed to interpret policy.
    pub interpretation_authority: String,
    /// Conflict resolution mode.
    pub conflict_resolution_mode: ConflictResolutionMode,
    /// Tie breaker; fixed to stable order.
    pub tie_breaker: TieBreaker,
    /// Total order used by the stable pick.
    pub stable_order_mode: StableOrderMode,
}

/// Initialization and configuration errors.
///
/// # Invariants
/// - Display forms are stable error codes that appear in tests.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InterpreterError {
    /// Interpretation authority was not the supervisor.
    #[error("secure_layer.init.invalid interpretation_authority must be supervisor")]
    Authority,
    /// A review severity was declared without a ledger resolver.
    #[error("secure_layer.init.invalid review severity requires ledger resolver")]
    ReviewWithoutLedger,
}

/// Validates an interpreter configuration.
///
/// # Errors
///
/// Returns [`InterpreterError::Authority`] when the authority is not the
/// supervisor. Mode vocabularies are closed at the type level.
pub fn validate_policy_interpretation_config(
    config: &PolicyInterpretationConfig,
) -> Result<(), InterpreterError> {
    if config.interpretation_authority != "supervisor" {
        return Err(InterpreterError::Authority);
    }
    Ok(())
}

/// Validates secure-layer initialization as a whole.
///
/// # Errors
///
/// Returns [`InterpreterError`] when the configuration is invalid or a
/// `review` severity is emitted without a ledger resolver.
pub fn validate_secure_layer_initialization(
    config: &PolicyInterpretationConfig,
    emitted_severities: &[Severity],
    review_ledger_resolver: Option<&dyn ReviewLedgerResolver>,
) -> Result<(), InterpreterError> {
    validate_policy_interpretation_config(config)?;
    if emitted_severities.contains(&Severity::Review) && review_ledger_resolver.is_none() {
        return Err(InterpreterError::ReviewWithoutLedger);
    }
    Ok(())
}

// ============================================================================
// SECTION: Rule Matches and Decisions
// ============================================================================

/// One rule match produced by policy evaluation.
///
/// # Invariants
/// - `rule_id` is unique within a match set for meaningful tie breaking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleMatch {
    /// Rule identifier.
    pub rule_id: String,
    /// Effect the rule mandates.
    pub effect: Severity,
    /// Match specificity; larger is more specific.
    #[serde(default)]
    pub specificity: i64,
    /// Explicit rule priority; larger wins under explicit priority.
    #[serde(default)]
    pub priority: i64,
    /// Declaration order of the rule in its document.
    #[serde(default)]
    pub order_index: i64,
}

/// Reason a decision was selected.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    /// A blocking match short-circuited resolution.
    DenyWins,
    /// No blocking match existed; the stable pick decided.
    DenyWinsFallback,
    /// The most specific candidate was selected.
    MostSpecific,
    /// The highest-priority candidate was selected.
    ExplicitPriority,
    /// The match set was empty; evaluation fails closed.
    NoMatchingRule,
}

/// Resolved decision for a request.
///
/// # Invariants
/// - `selected_rule_id` is `None` only for [`DecisionReason::NoMatchingRule`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// Effect of the decision.
    pub effect: Severity,
    /// Identifier of the selected rule, when one matched.
    pub selected_rule_id: Option<String>,
    /// Why this decision was selected.
    pub reason: DecisionReason,
}

// ============================================================================
// SECTION: Resolution
// ============================================================================

/// Deterministically resolves overlapping rule matches.
///
/// The empty match set fails closed to a block with
/// [`DecisionReason::NoMatchingRule`].
///
/// # Errors
///
/// Returns [`InterpreterError`] when the configuration is invalid.
pub fn resolve_overlapping_rules(
    matches: &[RuleMatch],
    config: &PolicyInterpretationConfig,
) -> Result<Decision, InterpreterError> {
    validate_policy_interpretation_config(config)?;
    let Some(_) = matches.first() else {
        return Ok(Decision {
            effect: Severity::Block,
            selected_rule_id: None,
            reason: DecisionReason::NoMatchingRule,
        });
    };

    match config.conflict_resolution_mode {
        ConflictResolutionMode::DenyWins => {
            let blocked: Vec<&RuleMatch> =
                matches.iter().filter(|candidate| candidate.effect == Severity::Block).collect();
            if let Some(selected) = stable_pick(&blocked, config.stable_order_mode) {
                return Ok(Decision {
                    effect: Severity::Block,
                    selected_rule_id: Some(selected.rule_id.clone()),
                    reason: DecisionReason::DenyWins,
                });
            }
            let all: Vec<&RuleMatch> = matches.iter().collect();
            let selected = stable_pick(&all, config.stable_order_mode)
                .unwrap_or(&matches[0]);
            Ok(Decision {
                effect: selected.effect,
                selected_rule_id: Some(selected.rule_id.clone()),
                reason: DecisionReason::DenyWinsFallback,
            })
        }
        ConflictResolutionMode::MostSpecific => {
            let best = matches.iter().map(|candidate| candidate.specificity).max().unwrap_or(0);
            let candidates: Vec<&RuleMatch> =
                matches.iter().filter(|candidate| candidate.specificity == best).collect();
            let selected =
                stable_pick(&candidates, config.stable_order_mode).unwrap_or(&matches[0]);
            Ok(Decision {
                effect: selected.effect,
                selected_rule_id: Some(selected.rule_id.clone()),
                reason: DecisionReason::MostSpecific,
            })
        }
        ConflictResolutionMode::ExplicitPriority => {
            let best = matches.iter().map(|candidate| candidate.priority).max().unwrap_or(0);
            let candidates: Vec<&RuleMatch> =
                matches.iter().filter(|candidate| candidate.priority == best).collect();
            let selected =
                stable_pick(&candidates, config.stable_order_mode).unwrap_or(&matches[0]);
            Ok(Decision {
                effect: selected.effect,
                selected_rule_id: Some(selected.rule_id.clone()),
                reason: DecisionReason::ExplicitPriority,
            })
        }
    }
}

/// Picks the first candidate under the configured total order.
fn stable_pick<'a>(candidates: &[&'a RuleMatch], mode: StableOrderMode) -> Option<&'a RuleMatch> {
    match mode {
        StableOrderMode::LexicalRuleId => candidates
            .iter()
            .min_by(|left, right| left.rule_id.cmp(&right.rule_id))
            .copied(),
        StableOrderMode::OrderIndex => candidates
            .iter()
            .min_by(|left, right| {
                (left.order_index, &left.rule_id).cmp(&(right.order_index, &right.rule_id))
            })
            .copied(),
    }
}
