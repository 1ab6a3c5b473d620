//! Evaluation context for condition expressions

use crate::types::{Principal, Resource};
use serde_json::Value;
use std::collections::HashMap;

/// Variables available during condition evaluation
///
/// Expressions see `principal` (`id`, `roles`, `attr`, `scope`), `resource`
/// (`kind`, `id`, `attr`, `scope`) and the free-form request context under
/// both `aux` and `context`. `P` and `R` are shorthand aliases for
/// `principal` and `resource`.
#[derive(Debug, Clone, Default)]
pub struct EvalContext {
    /// Principal variables
    pub principal: HashMap<String, Value>,

    /// Resource variables
    pub resource: HashMap<String, Value>,

    /// Free-form request context
    pub aux: HashMap<String, Value>,
}

impl EvalContext {
    /// Create an empty evaluation context
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the context for a request
    ///
    /// `roles` is the role set the expression should observe: the base
    /// roles during derived-role resolution, the effective set during rule
    /// evaluation.
    pub fn for_request(
        principal: &Principal,
        resource: &Resource,
        aux: &HashMap<String, Value>,
        roles: &[String],
    ) -> Self {
        let mut principal_vars = HashMap::new();
        principal_vars.insert("id".to_string(), Value::String(principal.id.clone()));
        principal_vars.insert(
            "roles".to_string(),
            Value::Array(roles.iter().cloned().map(Value::String).collect()),
        );
        principal_vars.insert("scope".to_string(), Value::String(principal.scope.clone()));
        principal_vars.insert(
            "attr".to_string(),
            Value::Object(
                principal
                    .attributes
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            ),
        );

        let mut resource_vars = HashMap::new();
        resource_vars.insert("kind".to_string(), Value::String(resource.kind.clone()));
        resource_vars.insert("id".to_string(), Value::String(resource.id.clone()));
        resource_vars.insert("scope".to_string(), Value::String(resource.scope.clone()));
        resource_vars.insert(
            "attr".to_string(),
            Value::Object(
                resource
                    .attributes
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            ),
        );

        Self {
            principal: principal_vars,
            resource: resource_vars,
            aux: aux.clone(),
        }
    }

    /// Replace the context's principal variables
    pub fn with_principal(mut self, principal: HashMap<String, Value>) -> Self {
        self.principal = principal;
        self
    }

    /// Replace the context's resource variables
    pub fn with_resource(mut self, resource: HashMap<String, Value>) -> Self {
        self.resource = resource;
        self
    }

    /// Replace the context's auxiliary variables
    pub fn with_aux(mut self, aux: HashMap<String, Value>) -> Self {
        self.aux = aux;
        self
    }

    /// Flatten into the variable map handed to the expression engine
    pub fn to_variables(&self) -> HashMap<String, Value> {
        let as_object = |map: &HashMap<String, Value>| {
            Value::Object(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        };

        let mut vars = HashMap::new();
        vars.insert("principal".to_string(), as_object(&self.principal));
        vars.insert("P".to_string(), as_object(&self.principal));
        vars.insert("resource".to_string(), as_object(&self.resource));
        vars.insert("R".to_string(), as_object(&self.resource));
        vars.insert("aux".to_string(), as_object(&self.aux));
        vars.insert("context".to_string(), as_object(&self.aux));
        vars
    }
}
