//! Decision engine: pipeline orchestration and precedence arbitration
//!
//! `check` runs the full pipeline for one request:
//!
//! ```text
//! request → decision-cache probe
//!         → derived-roles resolution (role cache)
//!         → scope walk + candidate selection
//!         → per-action rule evaluation
//!         → precedence arbitration → response (+ cache write)
//! ```
//!
//! Precedence, highest to lowest: deny in a principal policy, allow in a
//! principal policy, deny in a resource policy, allow in a resource policy,
//! default deny. Within one stage a deny from any matching rule overrides
//! earlier allows from other policies of the same stage.
//!
//! The engine is re-entrant and safe for concurrent calls from many
//! threads. The owner must call [`DecisionEngine::clear_caches`] after
//! mutating the policy store; invalidation is deliberately coarse.

pub mod cache;
pub mod matcher;
pub mod metrics;
pub mod rules;

pub use cache::{CacheStats, DecisionCache};
pub use matcher::Candidates;
pub use metrics::{EngineMetrics, MetricsCollector};
pub use rules::RuleMatch;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use crate::cel::{CelEvaluator, ConditionEvaluator, EvalContext};
use crate::derived_roles::{self, DerivedRoleResolver, RoleCache};
use crate::error::{EngineError, Result};
use crate::policy::{Policy, PolicyStore};
use crate::types::{
    CheckRequest, CheckResponse, Decision, Effect, ResponseMeta, TraceEvent,
};

/// Decision engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Enable the per-request decision cache
    pub enable_decision_cache: bool,

    /// Decision cache capacity (entries)
    pub decision_cache_capacity: usize,

    /// Enable the derived-roles cache
    pub enable_role_cache: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enable_decision_cache: true,
            decision_cache_capacity: 10_000,
            enable_role_cache: true,
        }
    }
}

/// Policy decision point
pub struct DecisionEngine {
    store: Arc<PolicyStore>,
    evaluator: Arc<dyn ConditionEvaluator>,
    role_resolver: DerivedRoleResolver,
    role_cache: RoleCache,
    decision_cache: Option<DecisionCache>,
    metrics: MetricsCollector,
    config: EngineConfig,
}

impl DecisionEngine {
    /// Create an engine over the given store with the bundled CEL evaluator
    pub fn new(config: EngineConfig, store: Arc<PolicyStore>) -> Self {
        Self::with_evaluator(config, store, Arc::new(CelEvaluator::new()))
    }

    /// Create an engine with a custom condition evaluator
    pub fn with_evaluator(
        config: EngineConfig,
        store: Arc<PolicyStore>,
        evaluator: Arc<dyn ConditionEvaluator>,
    ) -> Self {
        let decision_cache = config
            .enable_decision_cache
            .then(|| DecisionCache::new(config.decision_cache_capacity));

        info!(
            decision_cache = config.enable_decision_cache,
            role_cache = config.enable_role_cache,
            "decision engine initialized"
        );

        Self {
            store,
            role_resolver: DerivedRoleResolver::new(evaluator.clone()),
            evaluator,
            role_cache: RoleCache::new(),
            decision_cache,
            metrics: MetricsCollector::new(),
            config,
        }
    }

    /// The policy store this engine reads from
    pub fn store(&self) -> &Arc<PolicyStore> {
        &self.store
    }

    /// Evaluate a check request
    ///
    /// See the module docs for the pipeline and precedence model. Input
    /// validation failures, derived-role cycles, and cancellation surface
    /// as errors; expression failures are contained and traced.
    pub fn check(&self, request: &CheckRequest) -> Result<CheckResponse> {
        let start = Instant::now();

        if request.principal.id.is_empty() {
            return Err(EngineError::InvalidInput(
                "principal id cannot be empty".to_string(),
            ));
        }
        if request.resource.kind.is_empty() {
            return Err(EngineError::InvalidInput(
                "resource kind cannot be empty".to_string(),
            ));
        }
        if request.actions.is_empty() {
            return Err(EngineError::InvalidInput(
                "actions cannot be empty".to_string(),
            ));
        }

        let request_id = if request.request_id.is_empty() {
            uuid::Uuid::new_v4().to_string()
        } else {
            request.request_id.clone()
        };

        self.metrics.record_request();

        // Stage 0: decision-cache probe
        let cache_key = self
            .decision_cache
            .as_ref()
            .map(|_| cache::fingerprint(request));
        if let (Some(cache), Some(key)) = (&self.decision_cache, &cache_key) {
            if let Some(mut cached) = cache.get(key) {
                self.metrics.record_cache_hit();
                debug!(request_id = %request_id, "decision cache hit");
                cached.request_id = request_id;
                cached.meta.cache_hit = true;
                return Ok(cached);
            }
            self.metrics.record_cache_miss();
        }

        let mut trace: Vec<TraceEvent> = Vec::new();

        // Stage 1: effective roles
        let effective_roles = self.effective_roles(request, &mut trace)?;
        debug!(request_id = %request_id, roles = ?effective_roles, "effective roles resolved");
        if request.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        // Stage 2: scope walk + candidate selection
        let candidates = matcher::select(
            &self.store,
            &request.principal,
            &effective_roles,
            &request.resource,
        );
        debug!(
            request_id = %request_id,
            principal_candidates = candidates.principal.len(),
            resource_candidates = candidates.resource.len(),
            matched_scope = %candidates.scope_walk.matched_scope,
            "candidates selected"
        );
        if request.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        // Stage 3: per-action arbitration
        let ctx = EvalContext::for_request(
            &request.principal,
            &request.resource,
            &request.context,
            &effective_roles,
        );

        let mut results: BTreeMap<String, Decision> = BTreeMap::new();
        let mut matched_policies: Vec<String> = Vec::new();
        let mut policies_evaluated: u64 = 0;

        for action in &request.actions {
            if results.contains_key(action) {
                continue; // duplicate action collapses into one verdict
            }
            if request.is_cancelled() {
                return Err(EngineError::Cancelled);
            }

            let principal_verdict = self.evaluate_stage(
                &candidates.principal,
                action,
                &effective_roles,
                &ctx,
                &mut trace,
                &mut policies_evaluated,
            );
            let verdict = match principal_verdict {
                Some(m) => Some(m),
                None => self.evaluate_stage(
                    &candidates.resource,
                    action,
                    &effective_roles,
                    &ctx,
                    &mut trace,
                    &mut policies_evaluated,
                ),
            };

            let decision = match verdict {
                Some(m) => {
                    if !matched_policies.contains(&m.policy) {
                        matched_policies.push(m.policy.clone());
                    }
                    Decision::matched(m.effect, m.policy, m.rule)
                }
                None => Decision::default_deny(),
            };

            self.metrics.record_decision(decision.is_allowed());
            results.insert(action.clone(), decision);
        }

        let response = CheckResponse {
            request_id,
            results,
            meta: ResponseMeta {
                evaluation_duration_us: start.elapsed().as_micros() as u64,
                policies_evaluated,
                matched_policies,
                cache_hit: false,
                scope_resolution: Some(
                    candidates.scope_walk.resolution(&request.resource.scope),
                ),
                derived_roles: effective_roles,
                trace,
            },
        };

        // Stage 4: decision-cache write (misses always finish evaluation first)
        if let (Some(cache), Some(key)) = (&self.decision_cache, cache_key) {
            cache.put(key, response.clone());
        }

        Ok(response)
    }

    /// Resolve the effective role set, consulting the role cache
    fn effective_roles(
        &self,
        request: &CheckRequest,
        trace: &mut Vec<TraceEvent>,
    ) -> Result<Vec<String>> {
        let key = self
            .config
            .enable_role_cache
            .then(|| derived_roles::fingerprint(&request.principal, &request.resource));

        if let Some(key) = &key {
            if let Some(cached) = self.role_cache.get(key) {
                return Ok(cached);
            }
        }

        let definitions = self.store.derived_roles();
        let resolved = self.role_resolver.resolve(
            &request.principal,
            &request.resource,
            &request.context,
            &definitions,
            trace,
        )?;

        if let Some(key) = key {
            self.role_cache.set(key, &resolved);
        }

        Ok(resolved)
    }

    /// Evaluate one stage's candidates for one action
    ///
    /// Returns the stage verdict: the first deny from any matching rule, or
    /// else the first allow, or `None` when nothing matched. Candidates are
    /// visited in store-insertion order.
    fn evaluate_stage(
        &self,
        candidates: &[Arc<Policy>],
        action: &str,
        effective_roles: &[String],
        ctx: &EvalContext,
        trace: &mut Vec<TraceEvent>,
        policies_evaluated: &mut u64,
    ) -> Option<RuleMatch> {
        let mut first_allow: Option<RuleMatch> = None;

        for policy in candidates {
            let (name, rule_list) = match policy.as_ref() {
                Policy::Resource(p) => (p.name.as_str(), &p.rules),
                Policy::Principal(p) => (p.name.as_str(), &p.rules),
                Policy::DerivedRoles(_) => continue,
            };

            *policies_evaluated += 1;
            if let Some(matched) = rules::evaluate(
                name,
                rule_list,
                action,
                effective_roles,
                ctx,
                self.evaluator.as_ref(),
                trace,
            ) {
                if matched.effect == Effect::Deny {
                    // Deny-override within the stage
                    return Some(matched);
                }
                first_allow.get_or_insert(matched);
            }
        }

        first_allow
    }

    /// Decision-cache statistics
    pub fn cache_stats(&self) -> CacheStats {
        self.decision_cache
            .as_ref()
            .map(DecisionCache::stats)
            .unwrap_or_default()
    }

    /// Engine activity counters
    pub fn metrics(&self) -> EngineMetrics {
        self.metrics.snapshot()
    }

    /// Purge both caches
    ///
    /// Must be called after any policy-store mutation; cached decisions and
    /// role sets are not invalidated automatically.
    pub fn clear_caches(&self) {
        if let Some(cache) = &self.decision_cache {
            cache.clear();
        }
        self.role_cache.clear();
        info!("engine caches cleared");
    }
}
