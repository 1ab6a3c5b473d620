//! Most-specific-first scope walk over the policy store

use std::sync::Arc;

use tracing::debug;

use crate::policy::{Policy, PolicyStore};
use crate::types::ScopeResolution;

/// Matched-scope marker reported when the walk fell back to global policies
pub const GLOBAL_SCOPE: &str = "(global)";

/// Outcome of a scope walk
#[derive(Debug, Clone)]
pub struct ScopeWalk {
    /// Policies found at the matched scope (or the global fallback)
    pub policies: Vec<Arc<Policy>>,

    /// The scope that supplied the policies, or [`GLOBAL_SCOPE`]
    pub matched_scope: String,

    /// Scopes inspected, most-specific first; ends with [`GLOBAL_SCOPE`]
    /// when the walk exhausted without a scoped hit
    pub chain: Vec<String>,
}

impl ScopeWalk {
    /// Metadata view of this walk for the given requested scope
    pub fn resolution(&self, requested_scope: &str) -> ScopeResolution {
        ScopeResolution {
            requested_scope: requested_scope.to_string(),
            matched_scope: self.matched_scope.clone(),
            chain: self.chain.clone(),
        }
    }
}

/// Walk the scope hierarchy for `(kind, scope)` until policies are found
///
/// Starting from the full scope, the last dot-delimited segment is stripped
/// after each miss. The first scope with a non-empty result wins. When the
/// walk exhausts (or the scope was empty to begin with), the global
/// empty-scope policies of the kind are returned with a matched scope of
/// `"(global)"`.
pub fn resolve(store: &PolicyStore, kind: &str, scope: &str) -> ScopeWalk {
    let mut chain = Vec::new();
    let mut current = scope;

    while !current.is_empty() {
        chain.push(current.to_string());
        let hits = store.find_by_scope(current, kind);
        if !hits.is_empty() {
            debug!(kind, scope = current, policies = hits.len(), "scope matched");
            return ScopeWalk {
                policies: hits,
                matched_scope: current.to_string(),
                chain,
            };
        }
        current = match current.rfind('.') {
            Some(idx) => &current[..idx],
            None => "",
        };
    }

    chain.push(GLOBAL_SCOPE.to_string());
    let policies = store.find_by_scope("", kind);
    debug!(kind, policies = policies.len(), "falling back to global policies");
    ScopeWalk {
        policies,
        matched_scope: GLOBAL_SCOPE.to_string(),
        chain,
    }
}
