// crates/steward-policy/tests/proptest_stable_pick.rs
// ============================================================================
// Module: Stable Pick Property Tests
// Description: Resolution must not depend on match presentation order.
// ============================================================================
//! ## Overview
//! The stable pick is a fixed total order: presenting the same match set in
//! any order must produce the same decision.

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

use proptest::prelude::*;
use steward_core::Severity;
use steward_policy::ConflictResolutionMode;
use steward_policy::PolicyInterpretationConfig;
use steward_policy::RuleMatch;
use steward_policy::StableOrderMode;
use steward_policy::TieBreaker;
use steward_policy::resolve_overlapping_rules;

/// Strategy for one rule match with a unique suffix supplied by the caller.
fn match_strategy(index: usize) -> impl Strategy<Value = RuleMatch> {
    (
        prop_oneof![
            Just(Severity::Allow),
            Just(Severity::Warn),
            Just(Severity::Block),
            Just(Severity::Review),
        ],
        0i64 .. 5,
        0i64 .. 5,
        0i64 .. 5,
    )
        .prop_map(move |(effect, specificity, priority, order_index)| RuleMatch {
            rule_id: format!("rule-{index}"),
            effect,
            specificity,
            priority,
            order_index,
        })
}

/// Strategy for a non-empty set of matches with unique rule identifiers.
fn matches_strategy() -> impl Strategy<Value = Vec<RuleMatch>> {
    (1usize ..= 6).prop_flat_map(|len| {
        (0 .. len).map(match_strategy).collect::<Vec<_>>()
    })
}

proptest! {
    #[test]
    fn resolution_ignores_presentation_order(
        matches in matches_strategy(),
        mode in prop_oneof![
            Just(ConflictResolutionMode::DenyWins),
            Just(ConflictResolutionMode::MostSpecific),
            Just(ConflictResolutionMode::ExplicitPriority),
        ],
        order in prop_oneof![
            Just(StableOrderMode::LexicalRuleId),
            Just(StableOrderMode::OrderIndex),
        ],
    ) {
        let config = PolicyInterpretationConfig {
            interpretation_authority: "supervisor".to_string(),
            conflict_resolution_mode: mode,
            tie_breaker: TieBreaker::StableOrder,
            stable_order_mode: order,
        };
        let mut reversed = matches.clone();
        reversed.reverse();

        let forward = resolve_overlapping_rules(&matches, &config).expect("forward");
        let backward = resolve_overlapping_rules(&reversed, &config).expect("backward");
        prop_assert_eq!(forward, backward);
    }
}
