//! Decision pipeline integration tests
//!
//! Covers the end-to-end flow: derived-role resolution, scope walk,
//! candidate selection, rule evaluation, and precedence arbitration.

use proptest::prelude::*;
use std::sync::Arc;
use verdict::engine::{DecisionEngine, EngineConfig};
use verdict::error::EngineError;
use verdict::policy::{
    PolicyStore, PrincipalPolicy, PrincipalSelector, ResourcePolicy, ResourceSelector, Rule,
};
use verdict::types::{CheckRequest, Effect, Principal, Resource};
use verdict::DerivedRole;

fn engine_with(store: Arc<PolicyStore>) -> DecisionEngine {
    // RUST_LOG=verdict=debug surfaces the pipeline stage logs
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
    DecisionEngine::new(EngineConfig::default(), store)
}

fn read_request(principal: Principal, resource: Resource) -> CheckRequest {
    CheckRequest::new(principal, resource, vec!["read".to_string()])
}

// ============================================================================
// END-TO-END SCENARIOS
// ============================================================================

#[test]
fn test_default_deny_on_empty_store() {
    // S1: empty store, any request denies with matched=false
    let engine = engine_with(Arc::new(PolicyStore::new()));

    let request = read_request(
        Principal::new("u").with_role("viewer"),
        Resource::new("document", "d"),
    );
    let response = engine.check(&request).unwrap();

    let decision = response.decision("read").unwrap();
    assert_eq!(decision.effect, Effect::Deny);
    assert!(!decision.matched);
    assert!(decision.policy.is_none());
}

#[test]
fn test_role_allow() {
    // S2: a resource policy granting read to role "viewer"
    let store = Arc::new(PolicyStore::new());
    store
        .add(
            ResourcePolicy::new("p1", "document")
                .with_rule(
                    Rule::new("viewers-read", vec!["read".to_string()], Effect::Allow)
                        .with_roles(vec!["viewer".to_string()]),
                )
                .into(),
        )
        .unwrap();

    let engine = engine_with(store);
    let request = read_request(
        Principal::new("u").with_role("viewer"),
        Resource::new("document", "d"),
    );
    let response = engine.check(&request).unwrap();

    let decision = response.decision("read").unwrap();
    assert_eq!(decision.effect, Effect::Allow);
    assert!(decision.matched);
    assert_eq!(decision.policy.as_deref(), Some("p1"));
    assert_eq!(decision.rule.as_deref(), Some("viewers-read"));
    assert_eq!(response.meta.matched_policies, vec!["p1".to_string()]);
}

#[test]
fn test_scope_inheritance() {
    // S3: policy at "acme", request at "acme.corp.eng"
    let store = Arc::new(PolicyStore::new());
    store
        .add(
            ResourcePolicy::new("acme-wide", "document")
                .with_scope("acme")
                .with_rule(
                    Rule::new("members-read", vec!["read".to_string()], Effect::Allow)
                        .with_roles(vec!["member".to_string()]),
                )
                .into(),
        )
        .unwrap();

    let engine = engine_with(store);
    let request = read_request(
        Principal::new("u").with_role("member"),
        Resource::new("document", "d").with_scope("acme.corp.eng"),
    );
    let response = engine.check(&request).unwrap();

    assert!(response.is_allowed("read"));
    let resolution = response.meta.scope_resolution.as_ref().unwrap();
    assert_eq!(resolution.matched_scope, "acme");
    assert_eq!(resolution.requested_scope, "acme.corp.eng");
    assert_eq!(
        resolution.chain,
        vec![
            "acme.corp.eng".to_string(),
            "acme.corp".to_string(),
            "acme".to_string(),
        ]
    );
}

#[test]
fn test_derived_role_activation() {
    // S4: derived role "owner" gates read access by ownership
    let store = Arc::new(PolicyStore::new());
    store
        .add_derived_role(
            DerivedRole::new("owner", vec!["user".to_string()])
                .with_condition("resource.attr.ownerId == principal.id"),
        )
        .unwrap();
    store
        .add(
            ResourcePolicy::new("owner-read", "document")
                .with_rule(
                    Rule::new("owners", vec!["read".to_string()], Effect::Allow)
                        .with_roles(vec!["owner".to_string()]),
                )
                .into(),
        )
        .unwrap();

    let engine = engine_with(store);

    let owned = read_request(
        Principal::new("u1").with_role("user"),
        Resource::new("document", "d").with_attribute("ownerId", "u1"),
    );
    let response = engine.check(&owned).unwrap();
    assert!(response.is_allowed("read"));
    assert!(response.meta.derived_roles.contains(&"owner".to_string()));

    let foreign = read_request(
        Principal::new("u1").with_role("user"),
        Resource::new("document", "d").with_attribute("ownerId", "u2"),
    );
    let response = engine.check(&foreign).unwrap();
    assert!(!response.is_allowed("read"));
    assert!(!response.meta.derived_roles.contains(&"owner".to_string()));
}

#[test]
fn test_derived_role_cycle_aborts_check() {
    // S5: A -> B -> A surfaces CIRCULAR_DEPENDENCY from check
    let store = Arc::new(PolicyStore::new());
    store
        .add_derived_role(DerivedRole::new("role_a", vec!["role_b".to_string()]))
        .unwrap();
    store
        .add_derived_role(DerivedRole::new("role_b", vec!["role_a".to_string()]))
        .unwrap();

    let engine = engine_with(store);
    let request = read_request(Principal::new("u"), Resource::new("document", "d"));

    match engine.check(&request) {
        Err(EngineError::CircularDependency { path }) => {
            assert!(path.contains("role_a"));
            assert!(path.contains("role_b"));
        }
        other => panic!("expected CircularDependency, got {:?}", other),
    }
}

#[test]
fn test_principal_policy_precedence() {
    // S6: a principal-policy deny beats a resource-policy allow
    let store = Arc::new(PolicyStore::new());
    store
        .add(
            PrincipalPolicy::new(
                "u-veto",
                PrincipalSelector {
                    roles: vec!["admin".to_string()],
                    ..Default::default()
                },
            )
            .with_resource(ResourceSelector::any_scope("*"))
            .with_rule(Rule::new("no-delete", vec!["delete".to_string()], Effect::Deny))
            .into(),
        )
        .unwrap();
    store
        .add(
            ResourcePolicy::new("admin-delete", "document")
                .with_rule(
                    Rule::new("admins", vec!["delete".to_string()], Effect::Allow)
                        .with_roles(vec!["admin".to_string()]),
                )
                .into(),
        )
        .unwrap();

    let engine = engine_with(store);
    let request = CheckRequest::new(
        Principal::new("u").with_role("admin"),
        Resource::new("document", "d"),
        vec!["delete".to_string()],
    );

    let response = engine.check(&request).unwrap();
    let decision = response.decision("delete").unwrap();
    assert_eq!(decision.effect, Effect::Deny);
    assert_eq!(decision.policy.as_deref(), Some("u-veto"));
}

// ============================================================================
// PRECEDENCE AND ARBITRATION
// ============================================================================

#[test]
fn test_principal_allow_beats_resource_deny() {
    let store = Arc::new(PolicyStore::new());
    store
        .add(
            PrincipalPolicy::new(
                "u1-exception",
                PrincipalSelector {
                    id: Some("u1".to_string()),
                    ..Default::default()
                },
            )
            .with_resource(ResourceSelector::any_scope("document"))
            .with_rule(Rule::new("let-u1", vec!["read".to_string()], Effect::Allow))
            .into(),
        )
        .unwrap();
    store
        .add(
            ResourcePolicy::new("lockdown", "document")
                .with_rule(Rule::new("deny-all", vec!["*".to_string()], Effect::Deny))
                .into(),
        )
        .unwrap();

    let engine = engine_with(store);

    // u1 has a principal-policy allow, so the resource stage is never reached
    let response = engine
        .check(&read_request(Principal::new("u1"), Resource::new("document", "d")))
        .unwrap();
    assert!(response.is_allowed("read"));

    // everyone else hits the resource-policy deny
    let response = engine
        .check(&read_request(Principal::new("u2"), Resource::new("document", "d")))
        .unwrap();
    assert!(!response.is_allowed("read"));
}

#[test]
fn test_per_action_verdicts_are_independent() {
    let store = Arc::new(PolicyStore::new());
    store
        .add(
            ResourcePolicy::new("p1", "document")
                .with_rule(Rule::new("read-ok", vec!["read".to_string()], Effect::Allow))
                .with_rule(Rule::new("no-delete", vec!["delete".to_string()], Effect::Deny))
                .into(),
        )
        .unwrap();

    let engine = engine_with(store);
    let request = CheckRequest::new(
        Principal::new("u"),
        Resource::new("document", "d"),
        vec!["read".to_string(), "delete".to_string(), "write".to_string()],
    );

    let response = engine.check(&request).unwrap();
    assert!(response.is_allowed("read"));
    assert_eq!(response.decision("delete").unwrap().effect, Effect::Deny);
    assert!(response.decision("delete").unwrap().matched);
    // "write" matches no rule: default deny
    let write = response.decision("write").unwrap();
    assert_eq!(write.effect, Effect::Deny);
    assert!(!write.matched);
}

#[test]
fn test_rule_condition_error_is_contained() {
    let store = Arc::new(PolicyStore::new());
    store
        .add(
            ResourcePolicy::new("p1", "document")
                .with_rule(
                    Rule::new("broken", vec!["read".to_string()], Effect::Allow)
                        .with_condition("@#$ not parseable"),
                )
                .with_rule(Rule::new("sound", vec!["read".to_string()], Effect::Allow))
                .into(),
        )
        .unwrap();

    let engine = engine_with(store);
    let response = engine
        .check(&read_request(Principal::new("u"), Resource::new("document", "d")))
        .unwrap();

    // The malformed rule is skipped, the next rule still allows
    let decision = response.decision("read").unwrap();
    assert!(decision.is_allowed());
    assert_eq!(decision.rule.as_deref(), Some("sound"));
    assert_eq!(response.meta.trace.len(), 1);
    assert_eq!(response.meta.trace[0].subject, "p1/broken");
}

// ============================================================================
// DETERMINISM
// ============================================================================

#[test]
fn test_responses_are_byte_identical_modulo_timing() {
    let store = Arc::new(PolicyStore::new());
    store
        .add(
            ResourcePolicy::new("p1", "document")
                .with_rule(
                    Rule::new("viewers", vec!["read".to_string()], Effect::Allow)
                        .with_roles(vec!["viewer".to_string()]),
                )
                .into(),
        )
        .unwrap();

    // Caches disabled so both runs take the full pipeline
    let config = EngineConfig {
        enable_decision_cache: false,
        enable_role_cache: false,
        ..Default::default()
    };
    let engine = DecisionEngine::new(config, store);

    let mut request = read_request(
        Principal::new("u").with_role("viewer"),
        Resource::new("document", "d").with_scope("acme.corp"),
    );
    request.request_id = "fixed".to_string();

    let mut first = engine.check(&request).unwrap();
    let mut second = engine.check(&request).unwrap();
    first.meta.evaluation_duration_us = 0;
    second.meta.evaluation_duration_us = 0;

    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

proptest! {
    #[test]
    fn test_decision_determinism(
        principal_id in "[a-z]{3,10}",
        resource_id in "[a-z0-9]{3,10}",
        action in "(read|write|delete)"
    ) {
        let store = Arc::new(PolicyStore::new());
        store
            .add(
                ResourcePolicy::new("p1", "document")
                    .with_rule(Rule::new("readers", vec!["read".to_string()], Effect::Allow))
                    .into(),
            )
            .unwrap();
        let engine = engine_with(store);

        let request = CheckRequest::new(
            Principal::new(principal_id),
            Resource::new("document", resource_id),
            vec![action.clone()],
        );

        let first = engine.check(&request).unwrap();
        let second = engine.check(&request).unwrap();
        prop_assert_eq!(
            first.decision(&action).unwrap(),
            second.decision(&action).unwrap()
        );
    }

    #[test]
    fn test_role_order_never_changes_the_verdict(
        roles in proptest::collection::vec("(viewer|editor|admin|auditor)", 1..4)
    ) {
        let store = Arc::new(PolicyStore::new());
        store
            .add(
                ResourcePolicy::new("p1", "document")
                    .with_rule(
                        Rule::new("editors", vec!["write".to_string()], Effect::Allow)
                            .with_roles(vec!["editor".to_string()]),
                    )
                    .into(),
            )
            .unwrap();
        let engine = engine_with(store);

        let forward = Principal::new("u").with_roles(roles.clone());
        let mut reversed_roles = roles.clone();
        reversed_roles.reverse();
        let reversed = Principal::new("u").with_roles(reversed_roles);

        let first = engine
            .check(&CheckRequest::new(forward, Resource::new("document", "d"), vec!["write".to_string()]))
            .unwrap();
        let second = engine
            .check(&CheckRequest::new(reversed, Resource::new("document", "d"), vec!["write".to_string()]))
            .unwrap();

        prop_assert_eq!(
            first.decision("write").unwrap(),
            second.decision("write").unwrap()
        );
    }
}

// ============================================================================
// CONCURRENT ACCESS
// ============================================================================

#[test]
fn test_concurrent_checks() {
    let store = Arc::new(PolicyStore::new());
    store
        .add(
            ResourcePolicy::new("p1", "document")
                .with_rule(Rule::new("all-read", vec!["read".to_string()], Effect::Allow))
                .into(),
        )
        .unwrap();

    let engine = Arc::new(engine_with(store));
    let mut handles = Vec::new();

    for i in 0..16 {
        let engine = Arc::clone(&engine);
        handles.push(std::thread::spawn(move || {
            for j in 0..50 {
                let request = read_request(
                    Principal::new(format!("user-{}", i)),
                    Resource::new("document", format!("doc-{}", j)),
                );
                let response = engine.check(&request).unwrap();
                assert!(response.is_allowed("read"));
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(engine.metrics().total_requests, 16 * 50);
}

#[test]
fn test_checks_interleaved_with_store_writes() {
    let store = Arc::new(PolicyStore::new());
    store
        .add(
            ResourcePolicy::new("base", "document")
                .with_rule(Rule::new("all-read", vec!["read".to_string()], Effect::Allow))
                .into(),
        )
        .unwrap();

    let engine = Arc::new(engine_with(Arc::clone(&store)));

    let reader = {
        let engine = Arc::clone(&engine);
        std::thread::spawn(move || {
            for i in 0..100 {
                let request = read_request(
                    Principal::new(format!("u{}", i)),
                    Resource::new("document", "d"),
                );
                let _ = engine.check(&request).unwrap();
            }
        })
    };

    let writer = std::thread::spawn(move || {
        for i in 0..20 {
            store
                .add(
                    ResourcePolicy::new(format!("extra-{}", i), "image")
                        .with_rule(Rule::new("r", vec!["read".to_string()], Effect::Allow))
                        .into(),
                )
                .unwrap();
        }
    });

    reader.join().unwrap();
    writer.join().unwrap();
}

// ============================================================================
// METADATA
// ============================================================================

#[test]
fn test_metadata_counts_policies() {
    let store = Arc::new(PolicyStore::new());
    store
        .add(
            ResourcePolicy::new("p1", "document")
                .with_rule(
                    Rule::new("viewers", vec!["read".to_string()], Effect::Allow)
                        .with_roles(vec!["viewer".to_string()]),
                )
                .into(),
        )
        .unwrap();

    let engine = engine_with(store);
    let response = engine
        .check(&read_request(
            Principal::new("u").with_role("viewer"),
            Resource::new("document", "d"),
        ))
        .unwrap();

    assert_eq!(response.meta.policies_evaluated, 1);
    assert!(!response.meta.cache_hit);
    assert_eq!(
        response.meta.derived_roles,
        vec!["viewer".to_string()]
    );
}
