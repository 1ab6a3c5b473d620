//! Structural and semantic validation of policies at store admission

use crate::error::{EngineError, Result};
use crate::pattern;
use crate::policy::{Policy, PrincipalPolicy, ResourcePolicy, Rule};

/// Validate a policy before it is admitted to the store
pub fn validate_policy(policy: &Policy) -> Result<()> {
    if policy.name().is_empty() {
        return Err(EngineError::InvalidInput(
            "policy name cannot be empty".to_string(),
        ));
    }

    match policy {
        Policy::Resource(p) => validate_resource_policy(p),
        Policy::Principal(p) => validate_principal_policy(p),
        Policy::DerivedRoles(p) => {
            if p.definitions.is_empty() {
                return Err(EngineError::InvalidInput(format!(
                    "derived-roles group '{}' has no definitions",
                    p.name
                )));
            }
            for definition in &p.definitions {
                definition.validate()?;
            }
            Ok(())
        }
    }
}

fn validate_resource_policy(policy: &ResourcePolicy) -> Result<()> {
    if policy.resource_kind.is_empty() {
        return Err(EngineError::InvalidInput(format!(
            "resource policy '{}' has an empty resource kind",
            policy.name
        )));
    }
    validate_rules(&policy.name, &policy.rules)
}

fn validate_principal_policy(policy: &PrincipalPolicy) -> Result<()> {
    let selector = &policy.principal;
    if selector.id.is_none() && selector.roles.is_empty() {
        return Err(EngineError::InvalidInput(format!(
            "principal policy '{}' must select by id or roles",
            policy.name
        )));
    }

    if policy.resources.is_empty() {
        return Err(EngineError::InvalidInput(format!(
            "principal policy '{}' has no resource selectors",
            policy.name
        )));
    }
    for selector in &policy.resources {
        if selector.kind.is_empty() {
            return Err(EngineError::InvalidInput(format!(
                "principal policy '{}' has a resource selector with an empty kind",
                policy.name
            )));
        }
        if selector.kind != "*" && selector.kind.contains('*') {
            return Err(EngineError::InvalidInput(format!(
                "principal policy '{}': resource kind must be a literal or '*'",
                policy.name
            )));
        }
    }

    validate_rules(&policy.name, &policy.rules)
}

fn validate_rules(policy_name: &str, rules: &[Rule]) -> Result<()> {
    if rules.is_empty() {
        return Err(EngineError::InvalidInput(format!(
            "policy '{}' has no rules",
            policy_name
        )));
    }

    for rule in rules {
        if rule.name.is_empty() {
            return Err(EngineError::InvalidInput(format!(
                "policy '{}' contains a rule with an empty name",
                policy_name
            )));
        }
        if rule.actions.is_empty() {
            return Err(EngineError::InvalidInput(format!(
                "rule '{}/{}' lists no actions",
                policy_name, rule.name
            )));
        }
        for action in &rule.actions {
            if action != "*" && action.contains('*') {
                return Err(EngineError::InvalidInput(format!(
                    "rule '{}/{}': action must be a literal or '*'",
                    policy_name, rule.name
                )));
            }
        }
        for role in &rule.roles {
            pattern::validate(role).map_err(|e| {
                EngineError::InvalidInput(format!(
                    "rule '{}/{}': invalid role pattern: {}",
                    policy_name, rule.name, e
                ))
            })?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{PrincipalSelector, ResourceSelector};
    use crate::types::Effect;

    fn read_rule() -> Rule {
        Rule::new("readers", vec!["read".to_string()], Effect::Allow)
    }

    #[test]
    fn test_valid_resource_policy() {
        let policy = Policy::from(ResourcePolicy::new("p1", "document").with_rule(read_rule()));
        assert!(validate_policy(&policy).is_ok());
    }

    #[test]
    fn test_rejects_empty_kind() {
        let policy = Policy::from(ResourcePolicy::new("p1", "").with_rule(read_rule()));
        assert!(validate_policy(&policy).is_err());
    }

    #[test]
    fn test_rejects_ruleless_policy() {
        let policy = Policy::from(ResourcePolicy::new("p1", "document"));
        assert!(validate_policy(&policy).is_err());
    }

    #[test]
    fn test_rejects_glob_action() {
        let rule = Rule::new("bad", vec!["re*d".to_string()], Effect::Allow);
        let policy = Policy::from(ResourcePolicy::new("p1", "document").with_rule(rule));
        assert!(validate_policy(&policy).is_err());
    }

    #[test]
    fn test_principal_policy_needs_selector_and_resources() {
        let unselective = Policy::from(
            PrincipalPolicy::new("p1", PrincipalSelector::default())
                .with_resource(ResourceSelector::any_scope("*"))
                .with_rule(read_rule()),
        );
        assert!(validate_policy(&unselective).is_err());

        let selector = PrincipalSelector {
            id: Some("u1".to_string()),
            ..Default::default()
        };
        let no_resources =
            Policy::from(PrincipalPolicy::new("p2", selector.clone()).with_rule(read_rule()));
        assert!(validate_policy(&no_resources).is_err());

        let ok = Policy::from(
            PrincipalPolicy::new("p3", selector)
                .with_resource(ResourceSelector::any_scope("*"))
                .with_rule(read_rule()),
        );
        assert!(validate_policy(&ok).is_ok());
    }
}
