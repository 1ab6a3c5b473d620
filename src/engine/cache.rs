//! Bounded LRU cache of full decision responses
//!
//! The key is the lowercase hex SHA-256 of the principal id, scope and
//! sorted roles, the resource kind, id and scope, and the requested-actions
//! list, each field separated by `0x1f`. Principal/resource attributes and
//! the request context are deliberately not part of the key: policies whose
//! conditions depend on them must either run with the decision cache
//! disabled or fold those values into the principal/resource attributes
//! that feed the derived-roles cache.

use lru::LruCache;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::{CheckRequest, CheckResponse};

/// Decision cache statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
}

impl CacheStats {
    /// Fraction of lookups served from the cache
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Compute the decision-cache key for a request
pub fn fingerprint(request: &CheckRequest) -> String {
    let mut roles = request.principal.roles.clone();
    roles.sort();

    let mut hasher = Sha256::new();
    hasher.update(request.principal.id.as_bytes());
    hasher.update([0x1f]);
    hasher.update(request.principal.scope.as_bytes());
    hasher.update([0x1f]);
    for role in &roles {
        hasher.update(role.as_bytes());
        hasher.update([0x1f]);
    }
    hasher.update(request.resource.kind.as_bytes());
    hasher.update([0x1f]);
    hasher.update(request.resource.id.as_bytes());
    hasher.update([0x1f]);
    hasher.update(request.resource.scope.as_bytes());
    for action in &request.actions {
        hasher.update([0x1f]);
        hasher.update(action.as_bytes());
    }

    hex::encode(hasher.finalize())
}

/// Thread-safe, size-bounded decision cache with LRU eviction
pub struct DecisionCache {
    entries: RwLock<LruCache<String, CheckResponse>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl DecisionCache {
    /// Create a cache bounded to `capacity` entries
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: RwLock::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Look up a cached response, refreshing its recency
    pub fn get(&self, key: &str) -> Option<CheckResponse> {
        let mut entries = self.entries.write();
        match entries.get(key) {
            Some(response) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(response.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store a response, evicting the least recently used entry when full
    pub fn put(&self, key: impl Into<String>, response: CheckResponse) {
        self.entries.write().put(key.into(), response);
    }

    /// Atomically drop every entry
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Current statistics snapshot
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            size: self.entries.read().len(),
        }
    }
}
