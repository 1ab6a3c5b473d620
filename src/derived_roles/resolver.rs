//! Iterative fixed-point resolution of derived roles
//!
//! Resolution starts from the principal's base roles and repeatedly sweeps
//! the unresolved definitions: a derived role activates when every parent
//! pattern matches a role in the current effective set and its condition
//! (if any) holds. The loop ends when a full pass adds nothing. Activation
//! through chains of derived roles therefore needs no explicit topological
//! order; the graph is only consulted for cycle detection, which runs
//! before the first pass and aborts the request on a cycle.
//!
//! A condition that fails to evaluate does not abort the pass: the role
//! simply never activates and the failure is recorded as a trace event, so
//! one malformed definition cannot deny unrelated authorizations.

use std::collections::BTreeSet;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use super::graph::RoleGraph;
use super::types::DerivedRole;
use crate::cel::{ConditionEvaluator, EvalContext};
use crate::error::{EngineError, Result};
use crate::types::{Principal, Resource, TraceEvent, TraceStage};

/// Resolves a principal's effective role set for one request
pub struct DerivedRoleResolver {
    evaluator: Arc<dyn ConditionEvaluator>,
}

impl DerivedRoleResolver {
    /// Create a resolver backed by the given condition evaluator
    pub fn new(evaluator: Arc<dyn ConditionEvaluator>) -> Self {
        Self { evaluator }
    }

    /// Compute the effective role set
    ///
    /// Returns the principal's base roles plus every activated derived-role
    /// name, sorted ascending. `trace` collects contained condition
    /// failures.
    pub fn resolve(
        &self,
        principal: &Principal,
        resource: &Resource,
        context: &HashMap<String, serde_json::Value>,
        definitions: &[DerivedRole],
        trace: &mut Vec<TraceEvent>,
    ) -> Result<Vec<String>> {
        if principal.id.is_empty() {
            return Err(EngineError::InvalidInput(
                "principal id cannot be empty".to_string(),
            ));
        }

        RoleGraph::build(definitions).check_acyclic()?;

        let mut effective: BTreeSet<String> = principal.roles.iter().cloned().collect();
        if definitions.is_empty() {
            return Ok(effective.into_iter().collect());
        }

        // Conditions observe the principal's base roles
        let ctx = EvalContext::for_request(principal, resource, context, &principal.roles);

        // `resolved` marks definitions whose outcome is final: activated, or
        // parents satisfied but condition false/erroring (the context is
        // fixed for the request, so that outcome cannot change)
        let mut resolved = vec![false; definitions.len()];

        loop {
            let mut grew = false;

            for (i, definition) in definitions.iter().enumerate() {
                if resolved[i] {
                    continue;
                }

                let snapshot: Vec<String> = effective.iter().cloned().collect();
                if !definition.parents_satisfied(&snapshot) {
                    continue;
                }

                resolved[i] = true;
                let activated = match &definition.condition {
                    None => true,
                    Some(expr) => match self.evaluator.evaluate_bool(expr, &ctx) {
                        Ok(value) => value,
                        Err(e) => {
                            warn!(
                                derived_role = %definition.name,
                                error = %e,
                                "derived-role condition failed to evaluate; role not activated"
                            );
                            trace.push(TraceEvent {
                                stage: TraceStage::DerivedRoles,
                                subject: definition.name.clone(),
                                message: e.to_string(),
                            });
                            false
                        }
                    },
                };

                if activated && effective.insert(definition.name.clone()) {
                    grew = true;
                }
            }

            if !grew {
                break;
            }
        }

        Ok(effective.into_iter().collect())
    }
}
