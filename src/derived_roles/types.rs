//! Derived role definitions

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::pattern;

/// A role computed at request time
///
/// A derived role activates when the principal's current role set satisfies
/// **every** parent pattern (AND semantics, each pattern matching at least
/// one held role) and the condition, when present, evaluates to true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedRole {
    /// Unique derived role name (e.g., "document_approver")
    pub name: String,

    /// Parent role patterns (literal, `*`, `prefix:*`, `*:suffix`)
    pub parent_roles: Vec<String>,

    /// Optional condition expression; absent = always true
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

impl DerivedRole {
    /// Create a new derived role
    pub fn new(name: impl Into<String>, parent_roles: Vec<String>) -> Self {
        Self {
            name: name.into(),
            parent_roles,
            condition: None,
        }
    }

    /// Guard activation with a condition expression
    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    /// Validate the definition at admission time
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(EngineError::InvalidInput(
                "derived role name cannot be empty".to_string(),
            ));
        }

        if self.parent_roles.is_empty() {
            return Err(EngineError::InvalidInput(format!(
                "derived role '{}' must have at least one parent role",
                self.name
            )));
        }

        for parent in &self.parent_roles {
            if parent == &self.name {
                return Err(EngineError::InvalidInput(format!(
                    "derived role '{}' cannot be its own parent",
                    self.name
                )));
            }
            pattern::validate(parent).map_err(|e| {
                EngineError::InvalidInput(format!(
                    "derived role '{}': invalid parent pattern: {}",
                    self.name, e
                ))
            })?;
        }

        Ok(())
    }

    /// Whether every parent pattern matches at least one of the given roles
    ///
    /// Note that `"*"` requires the principal to hold at least one role; an
    /// empty role set satisfies no pattern.
    pub fn parents_satisfied(&self, roles: &[String]) -> bool {
        !self.parent_roles.is_empty()
            && self
                .parent_roles
                .iter()
                .all(|parent| roles.iter().any(|role| pattern::matches(parent, role)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roles(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_builder() {
        let role = DerivedRole::new("approver", roles(&["reviewer"]))
            .with_condition("principal.attr.seniority >= 5");

        assert_eq!(role.name, "approver");
        assert_eq!(role.parent_roles, roles(&["reviewer"]));
        assert!(role.condition.is_some());
    }

    #[test]
    fn test_validation() {
        assert!(DerivedRole::new("approver", roles(&["reviewer"])).validate().is_ok());
        assert!(DerivedRole::new("", roles(&["reviewer"])).validate().is_err());
        assert!(DerivedRole::new("approver", vec![]).validate().is_err());
        assert!(DerivedRole::new("approver", roles(&["approver"])).validate().is_err());
        assert!(DerivedRole::new("approver", roles(&["re*viewer"])).validate().is_err());
    }

    #[test]
    fn test_all_parents_required() {
        let role = DerivedRole::new("super_approver", roles(&["reviewer", "admin:*"]));

        assert!(role.parents_satisfied(&roles(&["reviewer", "admin:full"])));
        assert!(!role.parents_satisfied(&roles(&["reviewer"])));
        assert!(!role.parents_satisfied(&roles(&["admin:full"])));
    }

    #[test]
    fn test_universal_parent_requires_a_role() {
        let role = DerivedRole::new("anyone", roles(&["*"]));

        assert!(role.parents_satisfied(&roles(&["viewer"])));
        assert!(!role.parents_satisfied(&[]));
    }
}
