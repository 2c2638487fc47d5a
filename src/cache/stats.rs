//! Cache Statistics Module
//!
//! Tracks local tier hits, misses and removals by cause, plus the
//! two-tier counters kept by each named cache.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::cache::RemovalCause;

// == Local Tier Stats ==
/// Local tier metrics. Mutated under the local tier lock.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalTierStats {
    /// Local lookups that found a live entry
    pub hits: u64,
    /// Local lookups that found nothing or an expired entry
    pub misses: u64,
    /// Entries purged because a TTL elapsed
    pub expired: u64,
    /// Entries evicted to stay within `maximum_size`
    pub size_evictions: u64,
    /// Entries removed by invalidate / invalidate_all
    pub explicit_removals: u64,
    /// Current number of entries
    pub total_entries: usize,
}

impl LocalTierStats {
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        hit_rate(self.hits, self.misses)
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    /// Counts one removal under its cause.
    pub fn record_removal(&mut self, cause: RemovalCause) {
        match cause {
            RemovalCause::Expired => self.expired += 1,
            RemovalCause::Size => self.size_evictions += 1,
            RemovalCause::Explicit => self.explicit_removals += 1,
        }
    }

    /// Total removals that were not asked for (expiry + size).
    pub fn evictions(&self) -> u64 {
        self.expired + self.size_evictions
    }

    pub fn set_total_entries(&mut self, count: usize) {
        self.total_entries = count;
    }
}

// == Named Cache Counters ==
/// Lock-free counters for the two-tier read and load paths.
#[derive(Debug, Default)]
pub struct TierCounters {
    store_hits: AtomicU64,
    store_misses: AtomicU64,
    loads: AtomicU64,
    load_failures: AtomicU64,
}

impl TierCounters {
    pub fn record_store_hit(&self) {
        self.store_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_store_miss(&self) {
        self.store_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_load(&self) {
        self.loads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_load_failure(&self) {
        self.load_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Combines these counters with a local tier snapshot.
    pub fn snapshot(&self, name: &str, local: LocalTierStats) -> NamedCacheStats {
        let store_hits = self.store_hits.load(Ordering::Relaxed);
        let store_misses = self.store_misses.load(Ordering::Relaxed);
        // A lookup misses overall only when both tiers miss
        let hit_rate = hit_rate(local.hits + store_hits, store_misses);
        NamedCacheStats {
            name: name.to_string(),
            store_hits,
            store_misses,
            loads: self.loads.load(Ordering::Relaxed),
            load_failures: self.load_failures.load(Ordering::Relaxed),
            hit_rate,
            local,
        }
    }
}

/// Point-in-time statistics of one named cache.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedCacheStats {
    pub name: String,
    pub local: LocalTierStats,
    /// Local misses served by the entry store
    pub store_hits: u64,
    /// Lookups that missed both tiers
    pub store_misses: u64,
    /// Successful loader invocations
    pub loads: u64,
    /// Loader invocations that returned an error
    pub load_failures: u64,
    /// Fraction of lookups answered by either tier
    pub hit_rate: f64,
}

fn hit_rate(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}
