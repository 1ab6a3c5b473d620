//! Candidate policy selection for a request
//!
//! Runs after derived-role and scope resolution. Principal policies are
//! gathered from the principal-ID and role indices and filtered by their
//! selectors; resource policies come from the scope walk. Principal
//! policies take precedence over resource policies in the decision stage.

use std::sync::Arc;

use crate::policy::{Policy, PolicyStore, PrincipalPolicy, PrincipalSelector};
use crate::scope::{self, ScopeWalk};
use crate::types::{Principal, Resource};

/// Candidate policies for one request, in evaluation order
#[derive(Debug, Clone)]
pub struct Candidates {
    /// Matching principal policies (higher precedence stage)
    pub principal: Vec<Arc<Policy>>,

    /// Resource policies from the scope walk (lower precedence stage)
    pub resource: Vec<Arc<Policy>>,

    /// The scope walk that produced the resource candidates
    pub scope_walk: ScopeWalk,
}

/// Whether a selector accepts this principal
///
/// Every present field must match: id by equality, roles any-of against the
/// effective set, scope by equality.
fn selector_matches(
    selector: &PrincipalSelector,
    principal: &Principal,
    effective_roles: &[String],
) -> bool {
    if let Some(id) = &selector.id {
        if id != &principal.id {
            return false;
        }
    }
    if !selector.roles.is_empty()
        && !selector
            .roles
            .iter()
            .any(|role| effective_roles.iter().any(|held| held == role))
    {
        return false;
    }
    if let Some(scope) = &selector.scope {
        if scope != &principal.scope {
            return false;
        }
    }
    true
}

/// Whether a principal policy applies to this request
fn principal_policy_applies(
    policy: &PrincipalPolicy,
    principal: &Principal,
    effective_roles: &[String],
    resource: &Resource,
) -> bool {
    selector_matches(&policy.principal, principal, effective_roles)
        && policy
            .resources
            .iter()
            .any(|selector| selector.matches(&resource.kind, &resource.scope))
}

/// Gather the candidate policies for a request
pub fn select(
    store: &PolicyStore,
    principal: &Principal,
    effective_roles: &[String],
    resource: &Resource,
) -> Candidates {
    let principal_candidates = store
        .find_principal_candidates(&principal.id, effective_roles, &resource.kind)
        .into_iter()
        .filter(|policy| {
            policy
                .as_principal()
                .is_some_and(|p| principal_policy_applies(p, principal, effective_roles, resource))
        })
        .collect();

    let scope_walk = scope::resolve(store, &resource.kind, &resource.scope);
    let resource_candidates = scope_walk
        .policies
        .iter()
        .filter(|policy| policy.as_resource().is_some())
        .cloned()
        .collect();

    Candidates {
        principal: principal_candidates,
        resource: resource_candidates,
        scope_walk,
    }
}
