//! Cache of resolved role sets keyed by a request fingerprint
//!
//! The key covers the principal's sorted roles, id and scope, the
//! resource's kind, id and scope, and a canonical serialization of the
//! resource's attributes (keys sorted recursively, stable scalar
//! encoding), hashed with SHA-256 and rendered as lowercase hex. Sorting
//! the roles makes the key independent of role-list order.
//!
//! Stored values are defensive copies: mutating the caller's list after a
//! `set` does not alter cached state.

use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::{Principal, Resource};

/// Canonical encoding of a JSON value: object keys sorted recursively,
/// scalars via their serde_json display form
fn write_canonical(value: &serde_json::Value, out: &mut String) {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for key in keys {
                out.push_str(key);
                out.push('=');
                write_canonical(&map[key], out);
                out.push(';');
            }
            out.push('}');
        }
        serde_json::Value::Array(items) => {
            out.push('[');
            for item in items {
                write_canonical(item, out);
                out.push(';');
            }
            out.push(']');
        }
        other => out.push_str(&other.to_string()),
    }
}

/// Compute the derived-roles cache key for a (principal, resource) pair
pub fn fingerprint(principal: &Principal, resource: &Resource) -> String {
    let mut roles = principal.roles.clone();
    roles.sort();

    let mut attrs = String::new();
    let mut keys: Vec<&String> = resource.attributes.keys().collect();
    keys.sort();
    for key in keys {
        attrs.push_str(key);
        attrs.push('=');
        write_canonical(&resource.attributes[key], &mut attrs);
        attrs.push(';');
    }

    let mut hasher = Sha256::new();
    for role in &roles {
        hasher.update(role.as_bytes());
        hasher.update([0x1f]);
    }
    hasher.update(principal.id.as_bytes());
    hasher.update([0x1f]);
    hasher.update(principal.scope.as_bytes());
    hasher.update([0x1f]);
    hasher.update(resource.kind.as_bytes());
    hasher.update([0x1f]);
    hasher.update(resource.id.as_bytes());
    hasher.update([0x1f]);
    hasher.update(resource.scope.as_bytes());
    hasher.update([0x1f]);
    hasher.update(attrs.as_bytes());

    hex::encode(hasher.finalize())
}

/// Thread-safe cache of resolved role sets
#[derive(Default)]
pub struct RoleCache {
    entries: RwLock<HashMap<String, Vec<String>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl RoleCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a resolved role set
    pub fn get(&self, key: &str) -> Option<Vec<String>> {
        let entries = self.entries.read();
        match entries.get(key) {
            Some(roles) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(roles.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store a resolved role set (a copy of `roles`)
    pub fn set(&self, key: impl Into<String>, roles: &[String]) {
        let mut entries = self.entries.write();
        entries.insert(key.into(), roles.to_vec());
    }

    /// Number of cached role sets
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Cache hit count
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Cache miss count
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Atomically drop every entry
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_is_role_order_independent() {
        let resource = Resource::new("document", "d1");
        let a = Principal::new("u1").with_role("viewer").with_role("editor");
        let b = Principal::new("u1").with_role("editor").with_role("viewer");

        assert_eq!(fingerprint(&a, &resource), fingerprint(&b, &resource));
    }

    #[test]
    fn test_key_is_attribute_order_independent() {
        let principal = Principal::new("u1").with_role("user");
        let a = Resource::new("document", "d1")
            .with_attribute("x", 1)
            .with_attribute("y", json!({"b": 2, "a": 1}));
        let b = Resource::new("document", "d1")
            .with_attribute("y", json!({"a": 1, "b": 2}))
            .with_attribute("x", 1);

        assert_eq!(fingerprint(&principal, &a), fingerprint(&principal, &b));
    }

    #[test]
    fn test_key_distinguishes_attributes() {
        let principal = Principal::new("u1").with_role("user");
        let mine = Resource::new("document", "d1").with_attribute("ownerId", "u1");
        let theirs = Resource::new("document", "d1").with_attribute("ownerId", "u2");

        assert_ne!(fingerprint(&principal, &mine), fingerprint(&principal, &theirs));
    }

    #[test]
    fn test_key_is_lowercase_hex_sha256() {
        let key = fingerprint(&Principal::new("u1"), &Resource::new("document", "d1"));
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_get_set_and_stats() {
        let cache = RoleCache::new();
        assert!(cache.get("k1").is_none());
        assert_eq!(cache.misses(), 1);

        cache.set("k1", &["a".to_string(), "b".to_string()]);
        assert_eq!(cache.get("k1"), Some(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_stored_value_is_a_copy() {
        let cache = RoleCache::new();
        let mut roles = vec!["viewer".to_string()];
        cache.set("k1", &roles);

        roles.push("admin".to_string());
        roles[0] = "mutated".to_string();

        assert_eq!(cache.get("k1"), Some(vec!["viewer".to_string()]));
    }

    #[test]
    fn test_clear() {
        let cache = RoleCache::new();
        cache.set("k1", &["a".to_string()]);
        cache.clear();
        assert!(cache.is_empty());
    }
}
