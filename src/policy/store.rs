//! In-memory policy repository with multi-dimensional lookup indices
//!
//! The store keeps every policy under a reader-writer lock together with
//! four incrementally-maintained indices:
//!
//! - **kind index**: resource kind → resource policies
//! - **scope index**: (kind, scope) → resource policies, non-empty scopes only
//! - **principal-ID index**: (principal id, kind) → principal policies
//! - **role index**: (role, kind) → principal policies
//!
//! A principal policy whose resource selectors name kind `"*"` is indexed
//! under a wildcard bucket consulted for any kind. All index updates for a
//! policy happen under one exclusive lock acquisition, so readers never
//! observe partial updates. Lookups return candidates deduplicated and in
//! store-insertion order (a monotonic sequence number assigned at admission
//! and retained across `update`), which keeps rule precedence stable.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::derived_roles::DerivedRole;
use crate::error::{EngineError, Result};
use crate::policy::{validate::validate_policy, Policy};

struct StoredPolicy {
    seq: u64,
    policy: Arc<Policy>,
}

#[derive(Default)]
struct Indices {
    /// kind → resource policy names
    kind: HashMap<String, Vec<String>>,
    /// (kind, scope) → resource policy names, non-empty scopes only
    scope: HashMap<(String, String), Vec<String>>,
    /// (principal id, kind or "*") → principal policy names
    principal: HashMap<(String, String), Vec<String>>,
    /// (role, kind or "*") → principal policy names
    role: HashMap<(String, String), Vec<String>>,
}

impl Indices {
    fn insert(&mut self, policy: &Policy) {
        match policy {
            Policy::Resource(p) => {
                push_unique(self.kind.entry(p.resource_kind.clone()).or_default(), &p.name);
                if !p.scope.is_empty() {
                    push_unique(
                        self.scope
                            .entry((p.resource_kind.clone(), p.scope.clone()))
                            .or_default(),
                        &p.name,
                    );
                }
            }
            Policy::Principal(p) => {
                for selector in &p.resources {
                    if let Some(id) = &p.principal.id {
                        push_unique(
                            self.principal
                                .entry((id.clone(), selector.kind.clone()))
                                .or_default(),
                            &p.name,
                        );
                    }
                    for role in &p.principal.roles {
                        push_unique(
                            self.role
                                .entry((role.clone(), selector.kind.clone()))
                                .or_default(),
                            &p.name,
                        );
                    }
                }
            }
            Policy::DerivedRoles(_) => {}
        }
    }

    fn remove(&mut self, policy: &Policy) {
        match policy {
            Policy::Resource(p) => {
                remove_name(&mut self.kind, &p.resource_kind, &p.name);
                if !p.scope.is_empty() {
                    remove_name_pair(
                        &mut self.scope,
                        &(p.resource_kind.clone(), p.scope.clone()),
                        &p.name,
                    );
                }
            }
            Policy::Principal(p) => {
                for selector in &p.resources {
                    if let Some(id) = &p.principal.id {
                        remove_name_pair(
                            &mut self.principal,
                            &(id.clone(), selector.kind.clone()),
                            &p.name,
                        );
                    }
                    for role in &p.principal.roles {
                        remove_name_pair(
                            &mut self.role,
                            &(role.clone(), selector.kind.clone()),
                            &p.name,
                        );
                    }
                }
            }
            Policy::DerivedRoles(_) => {}
        }
    }
}

fn push_unique(bucket: &mut Vec<String>, name: &str) {
    if !bucket.iter().any(|n| n == name) {
        bucket.push(name.to_string());
    }
}

fn remove_name(index: &mut HashMap<String, Vec<String>>, key: &str, name: &str) {
    if let Some(bucket) = index.get_mut(key) {
        bucket.retain(|n| n != name);
        if bucket.is_empty() {
            index.remove(key);
        }
    }
}

fn remove_name_pair(
    index: &mut HashMap<(String, String), Vec<String>>,
    key: &(String, String),
    name: &str,
) {
    if let Some(bucket) = index.get_mut(key) {
        bucket.retain(|n| n != name);
        if bucket.is_empty() {
            index.remove(key);
        }
    }
}

#[derive(Default)]
struct Inner {
    next_seq: u64,
    policies: HashMap<String, StoredPolicy>,
    indices: Indices,
    derived: HashMap<String, DerivedRole>,
    derived_order: Vec<String>,
}

impl Inner {
    /// Resolve names to policies, dedup by name, in insertion order
    fn collect<'a>(&self, names: impl IntoIterator<Item = &'a String>) -> Vec<Arc<Policy>> {
        let mut hits: Vec<&StoredPolicy> = Vec::new();
        for name in names {
            if let Some(stored) = self.policies.get(name) {
                if !hits.iter().any(|s| s.seq == stored.seq) {
                    hits.push(stored);
                }
            }
        }
        hits.sort_by_key(|s| s.seq);
        hits.into_iter().map(|s| s.policy.clone()).collect()
    }

    fn register_definitions(&mut self, definitions: &[DerivedRole]) -> Result<()> {
        for definition in definitions {
            if self.derived.contains_key(&definition.name) {
                return Err(EngineError::DuplicateName(definition.name.clone()));
            }
        }
        for definition in definitions {
            self.derived
                .insert(definition.name.clone(), definition.clone());
            self.derived_order.push(definition.name.clone());
        }
        Ok(())
    }

    fn unregister_definitions(&mut self, definitions: &[DerivedRole]) {
        for definition in definitions {
            self.derived.remove(&definition.name);
        }
        let derived = &self.derived;
        self.derived_order.retain(|name| derived.contains_key(name));
    }
}

/// Thread-safe in-memory policy store
///
/// Reads are shared, writes exclusive. Lookup results are snapshots: the
/// caller receives cloned `Arc`s and the lock is released before any
/// condition evaluation happens.
#[derive(Default)]
pub struct PolicyStore {
    inner: RwLock<Inner>,
}

impl PolicyStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a policy
    ///
    /// Validates the policy, rejects duplicate names, and updates every
    /// index before the write becomes visible. A derived-roles group also
    /// registers each of its definitions (all-or-nothing on name clashes).
    pub fn add(&self, policy: Policy) -> Result<()> {
        validate_policy(&policy)?;

        let mut inner = self.inner.write();
        if inner.policies.contains_key(policy.name()) {
            return Err(EngineError::DuplicateName(policy.name().to_string()));
        }

        if let Policy::DerivedRoles(group) = &policy {
            inner.register_definitions(&group.definitions)?;
        }

        inner.indices.insert(&policy);
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.policies.insert(
            policy.name().to_string(),
            StoredPolicy {
                seq,
                policy: Arc::new(policy),
            },
        );
        Ok(())
    }

    /// Replace a policy wholesale, keeping its position in insertion order
    pub fn update(&self, policy: Policy) -> Result<()> {
        validate_policy(&policy)?;

        let mut inner = self.inner.write();
        let old = inner
            .policies
            .remove(policy.name())
            .ok_or_else(|| EngineError::NotFound(policy.name().to_string()))?;

        inner.indices.remove(&old.policy);
        if let Policy::DerivedRoles(group) = old.policy.as_ref() {
            inner.unregister_definitions(&group.definitions);
        }

        if let Policy::DerivedRoles(group) = &policy {
            if let Err(e) = inner.register_definitions(&group.definitions) {
                // Roll the previous version back so the failed update is a no-op
                if let Policy::DerivedRoles(old_group) = old.policy.as_ref() {
                    inner
                        .register_definitions(&old_group.definitions)
                        .expect("re-registering previously held names");
                }
                inner.indices.insert(&old.policy);
                inner.policies.insert(policy.name().to_string(), old);
                return Err(e);
            }
        }

        inner.indices.insert(&policy);
        inner.policies.insert(
            policy.name().to_string(),
            StoredPolicy {
                seq: old.seq,
                policy: Arc::new(policy),
            },
        );
        Ok(())
    }

    /// Remove a policy and all of its index entries
    pub fn delete(&self, name: &str) -> Result<()> {
        let mut inner = self.inner.write();
        let stored = inner
            .policies
            .remove(name)
            .ok_or_else(|| EngineError::NotFound(name.to_string()))?;

        inner.indices.remove(&stored.policy);
        if let Policy::DerivedRoles(group) = stored.policy.as_ref() {
            inner.unregister_definitions(&group.definitions);
        }
        Ok(())
    }

    /// Fetch a policy by name
    pub fn get(&self, name: &str) -> Result<Arc<Policy>> {
        let inner = self.inner.read();
        inner
            .policies
            .get(name)
            .map(|s| s.policy.clone())
            .ok_or_else(|| EngineError::NotFound(name.to_string()))
    }

    /// All policies in insertion order
    pub fn list(&self) -> Vec<Arc<Policy>> {
        let inner = self.inner.read();
        let mut stored: Vec<&StoredPolicy> = inner.policies.values().collect();
        stored.sort_by_key(|s| s.seq);
        stored.into_iter().map(|s| s.policy.clone()).collect()
    }

    /// Resource policies for a kind, in insertion order
    pub fn find_by_resource_kind(&self, kind: &str) -> Vec<Arc<Policy>> {
        let inner = self.inner.read();
        match inner.indices.kind.get(kind) {
            Some(names) => inner.collect(names),
            None => Vec::new(),
        }
    }

    /// Resource policies at an exact (kind, scope) pair
    ///
    /// An empty scope queries the global policies of the kind (resource
    /// policies with no scope); non-empty scopes hit the scope index.
    pub fn find_by_scope(&self, scope: &str, kind: &str) -> Vec<Arc<Policy>> {
        let inner = self.inner.read();
        if scope.is_empty() {
            let Some(names) = inner.indices.kind.get(kind) else {
                return Vec::new();
            };
            return inner
                .collect(names)
                .into_iter()
                .filter(|p| p.as_resource().is_some_and(|r| r.scope.is_empty()))
                .collect();
        }
        match inner
            .indices
            .scope
            .get(&(kind.to_string(), scope.to_string()))
        {
            Some(names) => inner.collect(names),
            None => Vec::new(),
        }
    }

    /// Principal policies selecting this principal id for this kind
    ///
    /// Consults both the exact kind bucket and the `"*"` wildcard bucket.
    pub fn find_by_principal_id(&self, id: &str, kind: &str) -> Vec<Arc<Policy>> {
        let inner = self.inner.read();
        let exact = inner
            .indices
            .principal
            .get(&(id.to_string(), kind.to_string()));
        let wildcard = inner
            .indices
            .principal
            .get(&(id.to_string(), "*".to_string()));
        inner.collect(exact.into_iter().flatten().chain(wildcard.into_iter().flatten()))
    }

    /// Principal policies selecting any of these roles for this kind
    ///
    /// Hits for each role are combined with set-union, deduplicated by
    /// policy name, and returned in insertion order.
    pub fn find_by_roles(&self, roles: &[String], kind: &str) -> Vec<Arc<Policy>> {
        let inner = self.inner.read();
        let names = roles.iter().flat_map(|role| {
            let exact = inner.indices.role.get(&(role.clone(), kind.to_string()));
            let wildcard = inner.indices.role.get(&(role.clone(), "*".to_string()));
            exact.into_iter().flatten().chain(wildcard.into_iter().flatten())
        });
        inner.collect(names)
    }

    /// Union of [`find_by_principal_id`] and [`find_by_roles`] under one
    /// lock acquisition, deduplicated and in insertion order
    ///
    /// [`find_by_principal_id`]: Self::find_by_principal_id
    /// [`find_by_roles`]: Self::find_by_roles
    pub fn find_principal_candidates(
        &self,
        id: &str,
        roles: &[String],
        kind: &str,
    ) -> Vec<Arc<Policy>> {
        let inner = self.inner.read();
        let by_id = [
            inner
                .indices
                .principal
                .get(&(id.to_string(), kind.to_string())),
            inner
                .indices
                .principal
                .get(&(id.to_string(), "*".to_string())),
        ];
        let by_role = roles.iter().flat_map(|role| {
            [
                inner.indices.role.get(&(role.clone(), kind.to_string())),
                inner.indices.role.get(&(role.clone(), "*".to_string())),
            ]
        });
        let names = by_id
            .into_iter()
            .chain(by_role)
            .flatten()
            .flatten();
        inner.collect(names)
    }

    /// Register a standalone derived role
    pub fn add_derived_role(&self, role: DerivedRole) -> Result<()> {
        role.validate()?;
        let mut inner = self.inner.write();
        inner.register_definitions(std::slice::from_ref(&role))
    }

    /// Fetch a derived role by name
    pub fn get_derived_role(&self, name: &str) -> Result<DerivedRole> {
        let inner = self.inner.read();
        inner
            .derived
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(name.to_string()))
    }

    /// Snapshot of every derived-role definition, in registration order
    pub fn derived_roles(&self) -> Vec<DerivedRole> {
        let inner = self.inner.read();
        inner
            .derived_order
            .iter()
            .filter_map(|name| inner.derived.get(name).cloned())
            .collect()
    }

    /// Number of policies in the store
    pub fn len(&self) -> usize {
        self.inner.read().policies.len()
    }

    /// Whether the store holds no policies
    pub fn is_empty(&self) -> bool {
        self.inner.read().policies.is_empty()
    }

    /// Drop every policy, derived role, and index entry
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        *inner = Inner::default();
    }
}
