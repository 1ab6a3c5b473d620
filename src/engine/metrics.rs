//! Engine-level counters for observability

use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of engine activity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineMetrics {
    /// Total number of check requests processed
    pub total_requests: u64,

    /// Per-action allow verdicts
    pub allowed_decisions: u64,

    /// Per-action deny verdicts
    pub denied_decisions: u64,

    /// Decision-cache hits
    pub cache_hits: u64,

    /// Decision-cache misses
    pub cache_misses: u64,
}

impl EngineMetrics {
    /// Fraction of lookups served from the decision cache
    pub fn cache_hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }

    /// Fraction of per-action verdicts that were allows
    pub fn allow_rate(&self) -> f64 {
        let total = self.allowed_decisions + self.denied_decisions;
        if total == 0 {
            0.0
        } else {
            self.allowed_decisions as f64 / total as f64
        }
    }
}

/// Lock-free metrics collector
#[derive(Default)]
pub struct MetricsCollector {
    total_requests: AtomicU64,
    allowed: AtomicU64,
    denied: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decision(&self, allowed: bool) {
        if allowed {
            self.allowed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.denied.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Consistent-enough snapshot of all counters
    pub fn snapshot(&self) -> EngineMetrics {
        EngineMetrics {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            allowed_decisions: self.allowed.load(Ordering::Relaxed),
            denied_decisions: self.denied.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
        }
    }
}
