//! Policy definitions and the in-memory policy store
//!
//! A policy is one of three variants: a resource policy (rules attached to
//! a resource kind, optionally scoped), a principal policy (rules attached
//! to a principal selector and a set of resource selectors), or a named
//! group of derived-role definitions. The serialized form is JSON or YAML
//! with camelCase field names; the variant is recognized structurally
//! (`principalPolicy: true` marks a principal policy, `definitions` marks a
//! derived-roles group, `resourceKind` marks a resource policy).

use serde::{Deserialize, Serialize};

use crate::derived_roles::DerivedRole;
use crate::error::{EngineError, Result};
use crate::types::Effect;

pub mod store;
pub mod validate;

pub use store::PolicyStore;

/// Default `apiVersion` for serialized policies
pub const API_VERSION: &str = "v1";

fn default_api_version() -> String {
    API_VERSION.to_string()
}

/// The smallest unit carrying an effect
///
/// Rules are evaluated top-to-bottom within their policy; the first rule
/// whose guards all pass decides the action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    /// Rule name, reported in the decision
    pub name: String,

    /// Actions this rule covers (literal or `"*"`)
    pub actions: Vec<String>,

    /// Allow or deny
    pub effect: Effect,

    /// Required roles, any-of; empty = any principal
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,

    /// Required derived roles, any-of
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub derived_roles: Vec<String>,

    /// Optional condition expression; absent = always true
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

impl Rule {
    /// Create a rule covering the given actions
    pub fn new(name: impl Into<String>, actions: Vec<String>, effect: Effect) -> Self {
        Self {
            name: name.into(),
            actions,
            effect,
            roles: Vec::new(),
            derived_roles: Vec::new(),
            condition: None,
        }
    }

    /// Restrict the rule to principals holding any of these roles
    pub fn with_roles(mut self, roles: Vec<String>) -> Self {
        self.roles = roles;
        self
    }

    /// Restrict the rule to principals holding any of these derived roles
    pub fn with_derived_roles(mut self, derived_roles: Vec<String>) -> Self {
        self.derived_roles = derived_roles;
        self
    }

    /// Guard the rule with a condition expression
    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    /// Whether this rule covers the requested action
    pub fn covers_action(&self, action: &str) -> bool {
        self.actions.iter().any(|a| a == "*" || a == action)
    }
}

/// Selects the principals a principal policy applies to
///
/// All present fields must match: `id` by equality, `roles` any-of against
/// the effective role set, `scope` by equality.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrincipalSelector {
    /// Literal principal id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Any-of role match
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,

    /// Literal scope match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// Selects the resources a principal policy applies to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSelector {
    /// Resource kind, literal or `"*"`
    pub kind: String,

    /// Scope: literal match, or empty / `"**"` for any scope
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl ResourceSelector {
    /// Selector matching any resource of the given kind in any scope
    pub fn any_scope(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            scope: Some("**".to_string()),
        }
    }

    /// Whether this selector matches the given resource kind and scope
    pub fn matches(&self, kind: &str, scope: &str) -> bool {
        if self.kind != "*" && self.kind != kind {
            return false;
        }
        match self.scope.as_deref() {
            None | Some("") | Some("**") => true,
            Some(literal) => literal == scope,
        }
    }
}

/// Rules attached to a resource kind, optionally at a scope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourcePolicy {
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Unique policy name
    pub name: String,

    /// Resource kind the policy applies to
    pub resource_kind: String,

    /// Dot-separated scope; empty = global
    #[serde(default)]
    pub scope: String,

    /// Ordered rules
    pub rules: Vec<Rule>,
}

impl ResourcePolicy {
    /// Create an unscoped (global) resource policy
    pub fn new(name: impl Into<String>, resource_kind: impl Into<String>) -> Self {
        Self {
            api_version: default_api_version(),
            name: name.into(),
            resource_kind: resource_kind.into(),
            scope: String::new(),
            rules: Vec::new(),
        }
    }

    /// Attach the policy to a scope
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    /// Append a rule
    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }
}

/// Rules attached to a principal selector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrincipalPolicy {
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Unique policy name
    pub name: String,

    /// Structural marker distinguishing the serialized form
    #[serde(rename = "principalPolicy")]
    pub principal_policy: bool,

    /// Which principals the policy applies to
    pub principal: PrincipalSelector,

    /// Which resources the policy applies to (at least one must match)
    pub resources: Vec<ResourceSelector>,

    /// Ordered rules
    pub rules: Vec<Rule>,
}

impl PrincipalPolicy {
    /// Create a principal policy for the given selector
    pub fn new(name: impl Into<String>, principal: PrincipalSelector) -> Self {
        Self {
            api_version: default_api_version(),
            name: name.into(),
            principal_policy: true,
            principal,
            resources: Vec::new(),
            rules: Vec::new(),
        }
    }

    /// Append a resource selector
    pub fn with_resource(mut self, selector: ResourceSelector) -> Self {
        self.resources.push(selector);
        self
    }

    /// Append a rule
    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }
}

/// Named group of derived-role definitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedRolesPolicy {
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Unique policy name
    pub name: String,

    /// The derived-role definitions this group contributes
    pub definitions: Vec<DerivedRole>,
}

impl DerivedRolesPolicy {
    /// Create a derived-roles group
    pub fn new(name: impl Into<String>, definitions: Vec<DerivedRole>) -> Self {
        Self {
            api_version: default_api_version(),
            name: name.into(),
            definitions,
        }
    }
}

/// A policy in the store
///
/// Dispatch on the variant happens at the matcher and validator; the rest
/// of the pipeline works with the concrete payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Policy {
    /// Rules attached to a principal selector
    Principal(PrincipalPolicy),
    /// A named group of derived-role definitions
    DerivedRoles(DerivedRolesPolicy),
    /// Rules attached to a resource kind
    Resource(ResourcePolicy),
}

impl Policy {
    /// The policy's unique name
    pub fn name(&self) -> &str {
        match self {
            Policy::Resource(p) => &p.name,
            Policy::Principal(p) => &p.name,
            Policy::DerivedRoles(p) => &p.name,
        }
    }

    /// The resource-policy payload, if this is one
    pub fn as_resource(&self) -> Option<&ResourcePolicy> {
        match self {
            Policy::Resource(p) => Some(p),
            _ => None,
        }
    }

    /// The principal-policy payload, if this is one
    pub fn as_principal(&self) -> Option<&PrincipalPolicy> {
        match self {
            Policy::Principal(p) => Some(p),
            _ => None,
        }
    }

    /// Parse a policy from its JSON exchange form
    pub fn from_json(input: &str) -> Result<Self> {
        serde_json::from_str(input)
            .map_err(|e| EngineError::InvalidInput(format!("malformed policy JSON: {}", e)))
    }

    /// Parse a policy from its YAML exchange form
    pub fn from_yaml(input: &str) -> Result<Self> {
        serde_yaml::from_str(input)
            .map_err(|e| EngineError::InvalidInput(format!("malformed policy YAML: {}", e)))
    }

    /// Serialize to the JSON exchange form
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| EngineError::InvalidInput(format!("cannot serialize policy: {}", e)))
    }

    /// Serialize to the YAML exchange form
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| EngineError::InvalidInput(format!("cannot serialize policy: {}", e)))
    }
}

impl From<ResourcePolicy> for Policy {
    fn from(p: ResourcePolicy) -> Self {
        Policy::Resource(p)
    }
}

impl From<PrincipalPolicy> for Policy {
    fn from(p: PrincipalPolicy) -> Self {
        Policy::Principal(p)
    }
}

impl From<DerivedRolesPolicy> for Policy {
    fn from(p: DerivedRolesPolicy) -> Self {
        Policy::DerivedRoles(p)
    }
}
