//! Per-action rule evaluation
//!
//! Rules are evaluated in declaration order within a policy. A rule
//! matches when every guard passes: the action is covered, the role and
//! derived-role guards overlap the effective set, and the condition (if
//! any) evaluates to true. The first matching rule decides the action for
//! that policy. A condition that fails to evaluate skips the rule and is
//! recorded as a trace event.

use tracing::warn;

use crate::cel::{ConditionEvaluator, EvalContext};
use crate::policy::Rule;
use crate::types::{Effect, TraceEvent, TraceStage};

/// A rule that matched an action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMatch {
    /// The matched rule's effect
    pub effect: Effect,

    /// Owning policy name
    pub policy: String,

    /// Matching rule name
    pub rule: String,
}

/// Evaluate one policy's rules against one action
///
/// Returns the first matching rule, or `None` when no rule matches.
pub fn evaluate(
    policy_name: &str,
    rules: &[Rule],
    action: &str,
    effective_roles: &[String],
    ctx: &EvalContext,
    evaluator: &dyn ConditionEvaluator,
    trace: &mut Vec<TraceEvent>,
) -> Option<RuleMatch> {
    for rule in rules {
        if !rule.covers_action(action) {
            continue;
        }

        if !rule.roles.is_empty()
            && !rule
                .roles
                .iter()
                .any(|role| effective_roles.iter().any(|held| held == role))
        {
            continue;
        }

        if !rule.derived_roles.is_empty()
            && !rule
                .derived_roles
                .iter()
                .any(|role| effective_roles.iter().any(|held| held == role))
        {
            continue;
        }

        if let Some(expr) = &rule.condition {
            match evaluator.evaluate_bool(expr, ctx) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    warn!(
                        policy = policy_name,
                        rule = %rule.name,
                        error = %e,
                        "rule condition failed to evaluate; rule skipped"
                    );
                    trace.push(TraceEvent {
                        stage: TraceStage::Rule,
                        subject: format!("{}/{}", policy_name, rule.name),
                        message: e.to_string(),
                    });
                    continue;
                }
            }
        }

        return Some(RuleMatch {
            effect: rule.effect,
            policy: policy_name.to_string(),
            rule: rule.name.clone(),
        });
    }

    None
}
