//! Translation cache metrics.
//!
//! Counters for cache hits, live loads and failures, owned by one
//! [`crate::i18n::TranslationCache`] instance.

use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct CacheMetrics {
    /// Requests answered from the in-memory map
    memory_hits: AtomicUsize,

    /// Cold misses answered from a persisted snapshot
    persisted_hits: AtomicUsize,

    /// Cold misses that had to load live (or fall back)
    misses: AtomicUsize,

    /// Live loads attempted against the data store
    live_loads: AtomicUsize,

    /// Live loads that failed with a hard error
    load_failures: AtomicUsize,

    /// Live loads that exceeded their deadline
    timeouts: AtomicUsize,

    /// Bundles built from static data only
    fallbacks: AtomicUsize,

    /// Background refreshes started
    refreshes_started: AtomicUsize,

    /// Refresh requests dropped by the in-flight guard or the breaker
    refreshes_skipped: AtomicUsize,
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_memory_hit(&self) {
        self.memory_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_persisted_hit(&self) {
        self.persisted_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_live_load(&self) {
        self.live_loads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_load_failure(&self) {
        self.load_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fallback(&self) {
        self.fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_refresh_started(&self) {
        self.refreshes_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_refresh_skipped(&self) {
        self.refreshes_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn live_loads(&self) -> usize {
        self.live_loads.load(Ordering::Relaxed)
    }

    pub fn refreshes_started(&self) -> usize {
        self.refreshes_started.load(Ordering::Relaxed)
    }

    /// Snapshot every counter.
    pub fn report(&self) -> MetricsReport {
        let memory_hits = self.memory_hits.load(Ordering::Relaxed);
        let persisted_hits = self.persisted_hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = memory_hits + persisted_hits + misses;
        let cache_hit_rate = if total > 0 {
            ((memory_hits + persisted_hits) as f64 / total as f64) * 100.0
        } else {
            0.0
        };

        MetricsReport {
            memory_hits,
            persisted_hits,
            misses,
            cache_hit_rate,
            live_loads: self.live_loads(),
            load_failures: self.load_failures.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            refreshes_started: self.refreshes_started(),
            refreshes_skipped: self.refreshes_skipped.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of [`CacheMetrics`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsReport {
    pub memory_hits: usize,
    pub persisted_hits: usize,
    pub misses: usize,

    /// Hits (memory or persisted) as a percentage of all lookups (0-100)
    pub cache_hit_rate: f64,

    pub live_loads: usize,
    pub load_failures: usize,
    pub timeouts: usize,
    pub fallbacks: usize,
    pub refreshes_started: usize,
    pub refreshes_skipped: usize,
}
