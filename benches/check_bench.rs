//! Decision pipeline benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use verdict::engine::{DecisionEngine, EngineConfig};
use verdict::policy::{PolicyStore, ResourcePolicy, Rule};
use verdict::types::{CheckRequest, Effect, Principal, Resource};
use verdict::DerivedRole;

fn populated_store(policy_count: usize) -> Arc<PolicyStore> {
    let store = Arc::new(PolicyStore::new());
    for i in 0..policy_count {
        store
            .add(
                ResourcePolicy::new(format!("policy-{}", i), format!("kind-{}", i % 50))
                    .with_rule(
                        Rule::new(
                            "r",
                            vec!["read".to_string()],
                            if i % 2 == 0 { Effect::Allow } else { Effect::Deny },
                        )
                        .with_roles(vec![format!("role-{}", i % 10)]),
                    )
                    .into(),
            )
            .unwrap();
    }
    store
        .add(
            ResourcePolicy::new("target", "document")
                .with_rule(
                    Rule::new("viewers", vec!["read".to_string()], Effect::Allow)
                        .with_roles(vec!["viewer".to_string()]),
                )
                .into(),
        )
        .unwrap();
    store
}

fn read_request() -> CheckRequest {
    CheckRequest::new(
        Principal::new("alice").with_role("viewer"),
        Resource::new("document", "d1"),
        vec!["read".to_string()],
    )
}

fn bench_check(c: &mut Criterion) {
    let mut group = c.benchmark_group("check");

    for policy_count in [10usize, 100, 1000] {
        group.bench_with_input(
            BenchmarkId::new("policies", policy_count),
            &policy_count,
            |b, &count| {
                let config = EngineConfig {
                    enable_decision_cache: false,
                    enable_role_cache: false,
                    ..Default::default()
                };
                let engine = DecisionEngine::new(config, populated_store(count));
                let request = read_request();

                b.iter(|| {
                    let response = engine.check(black_box(&request)).unwrap();
                    black_box(response);
                });
            },
        );
    }

    group.finish();
}

fn bench_check_cached(c: &mut Criterion) {
    let engine = DecisionEngine::new(EngineConfig::default(), populated_store(100));
    let request = read_request();

    // Warm the cache
    let _ = engine.check(&request).unwrap();

    c.bench_function("check_cached", |b| {
        b.iter(|| {
            let response = engine.check(black_box(&request)).unwrap();
            black_box(response);
        });
    });
}

fn bench_derived_roles(c: &mut Criterion) {
    let store = Arc::new(PolicyStore::new());
    for i in 0..20 {
        let parent = if i == 0 {
            "base".to_string()
        } else {
            format!("derived-{}", i - 1)
        };
        store
            .add_derived_role(DerivedRole::new(format!("derived-{}", i), vec![parent]))
            .unwrap();
    }
    store
        .add(
            ResourcePolicy::new("top", "document")
                .with_rule(
                    Rule::new("r", vec!["read".to_string()], Effect::Allow)
                        .with_roles(vec!["derived-19".to_string()]),
                )
                .into(),
        )
        .unwrap();

    let config = EngineConfig {
        enable_decision_cache: false,
        enable_role_cache: false,
        ..Default::default()
    };
    let engine = DecisionEngine::new(config, store);
    let request = CheckRequest::new(
        Principal::new("alice").with_role("base"),
        Resource::new("document", "d1"),
        vec!["read".to_string()],
    );

    c.bench_function("derived_role_chain_20", |b| {
        b.iter(|| {
            let response = engine.check(black_box(&request)).unwrap();
            black_box(response);
        });
    });
}

criterion_group!(benches, bench_check, bench_check_cached, bench_derived_roles);
criterion_main!(benches);
