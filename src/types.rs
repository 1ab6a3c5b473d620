//! Core data model: principals, resources, requests, and decisions

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Allow/deny outcome of a matched rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    /// Allow the action
    Allow,
    /// Deny the action
    Deny,
}

/// Principal (user, service account, agent) making the request
///
/// Created by the embedding layer; read-only inside the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    /// Principal identifier (e.g., "alice@example.com", "agent:shopping-bot")
    pub id: String,

    /// Base roles assigned to the principal
    #[serde(default)]
    pub roles: Vec<String>,

    /// Additional attributes (scalar, nested mapping, or list)
    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,

    /// Dot-separated hierarchical scope (e.g., "acme.corp.engineering"); empty = none
    #[serde(default)]
    pub scope: String,
}

impl Principal {
    /// Create a new principal with the given id
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            roles: Vec::new(),
            attributes: HashMap::new(),
            scope: String::new(),
        }
    }

    /// Add a role to the principal
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    /// Replace the principal's role list
    pub fn with_roles(mut self, roles: Vec<String>) -> Self {
        self.roles = roles;
        self
    }

    /// Add an attribute to the principal
    pub fn with_attribute(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Set the principal's scope
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }
}

/// Resource being acted upon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Resource kind (document, api, database, etc.)
    pub kind: String,

    /// Opaque resource identifier
    pub id: String,

    /// Additional attributes (owner, classification, etc.)
    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,

    /// Dot-separated hierarchical scope; empty = none
    #[serde(default)]
    pub scope: String,
}

impl Resource {
    /// Create a new resource of the given kind
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
            attributes: HashMap::new(),
            scope: String::new(),
        }
    }

    /// Add an attribute to the resource
    pub fn with_attribute(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Set the resource's scope
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }
}

/// Cancellation signal carried by a [`CheckRequest`]
///
/// The embedding transport keeps one end and trips it to abandon the
/// evaluation; the engine checks it at each stage boundary.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a new, untripped token
    pub fn new() -> Self {
        Self::default()
    }

    /// Trip the token
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Whether the token has been tripped
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Authorization check request
///
/// Immutable during evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckRequest {
    /// Caller-supplied request identifier; assigned a UUID when empty
    #[serde(default)]
    pub request_id: String,

    /// Who is making the request
    pub principal: Principal,

    /// What resource is being accessed
    pub resource: Resource,

    /// Requested actions (non-empty; duplicates collapse in the result)
    pub actions: Vec<String>,

    /// Free-form context, available to conditions as `aux` (or `context`)
    #[serde(default)]
    pub context: HashMap<String, serde_json::Value>,

    /// Optional cancellation signal, checked at stage boundaries
    #[serde(skip)]
    pub cancel: Option<CancelToken>,
}

impl CheckRequest {
    /// Create a request for a single principal/resource/action triple
    pub fn new(principal: Principal, resource: Resource, actions: Vec<String>) -> Self {
        Self {
            request_id: String::new(),
            principal,
            resource,
            actions,
            context: HashMap::new(),
            cancel: None,
        }
    }

    /// Attach free-form request context
    pub fn with_context(mut self, context: HashMap<String, serde_json::Value>) -> Self {
        self.context = context;
        self
    }

    /// Attach a cancellation token
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|c| c.is_cancelled())
    }
}

/// Per-action verdict
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// The allow/deny outcome
    pub effect: Effect,

    /// Name of the policy whose rule produced the verdict
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<String>,

    /// Name of the matching rule
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,

    /// Whether any rule matched (false = default-deny fallback)
    pub matched: bool,
}

impl Decision {
    /// Verdict produced by a matching rule
    pub fn matched(effect: Effect, policy: impl Into<String>, rule: impl Into<String>) -> Self {
        Self {
            effect,
            policy: Some(policy.into()),
            rule: Some(rule.into()),
            matched: true,
        }
    }

    /// Default-deny fallback when no rule matched
    pub fn default_deny() -> Self {
        Self {
            effect: Effect::Deny,
            policy: None,
            rule: None,
            matched: false,
        }
    }

    /// Whether the action is allowed
    pub fn is_allowed(&self) -> bool {
        self.effect == Effect::Allow
    }
}

/// Scope-walk outcome reported in response metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeResolution {
    /// The scope the request asked for
    pub requested_scope: String,

    /// The scope that supplied the policies, or `"(global)"` on fallback
    pub matched_scope: String,

    /// Scopes inspected during the walk, most-specific first
    pub chain: Vec<String>,
}

/// Pipeline stage that produced a trace event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TraceStage {
    /// Derived-role condition evaluation
    DerivedRoles,
    /// Rule condition evaluation
    Rule,
}

/// Record of a locally-contained expression failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEvent {
    /// Stage where the failure occurred
    pub stage: TraceStage,

    /// Derived role name, or "policy/rule" for rule conditions
    pub subject: String,

    /// Evaluator error message
    pub message: String,
}

/// Observability metadata attached to every response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMeta {
    /// Wall-clock evaluation time in microseconds
    pub evaluation_duration_us: u64,

    /// Number of (policy, action) evaluations performed
    pub policies_evaluated: u64,

    /// Names of policies that contributed a matching rule
    pub matched_policies: Vec<String>,

    /// Whether the response came from the decision cache
    pub cache_hit: bool,

    /// Scope-walk outcome
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope_resolution: Option<ScopeResolution>,

    /// The principal's effective role set, sorted ascending
    pub derived_roles: Vec<String>,

    /// Locally-contained expression failures
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trace: Vec<TraceEvent>,
}

/// Response to a [`CheckRequest`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResponse {
    /// Echo of the request identifier
    pub request_id: String,

    /// Verdict per requested action (duplicates collapsed)
    pub results: BTreeMap<String, Decision>,

    /// Observability metadata
    pub meta: ResponseMeta,
}

impl CheckResponse {
    /// Convenience accessor for a single action's verdict
    pub fn decision(&self, action: &str) -> Option<&Decision> {
        self.results.get(action)
    }

    /// Whether the given action was allowed
    pub fn is_allowed(&self, action: &str) -> bool {
        self.results.get(action).is_some_and(Decision::is_allowed)
    }
}
