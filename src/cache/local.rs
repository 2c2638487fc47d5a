//! Local Tier Module
//!
//! Bounded, process-private map with independent expire-after-write and
//! expire-after-access policies. Never performs I/O; every operation takes
//! a short synchronous lock.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::cache::{CacheEntry, LocalTierStats, LruTracker};
use crate::config::LocalTierConfig;

/// Why an entry left the local tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RemovalCause {
    /// A write or access TTL elapsed
    Expired,
    /// Evicted to respect `maximum_size`
    Size,
    /// Removed by `invalidate` or `invalidate_all`
    Explicit,
}

impl fmt::Display for RemovalCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RemovalCause::Expired => "EXPIRED",
            RemovalCause::Size => "SIZE",
            RemovalCause::Explicit => "EXPLICIT",
        };
        f.write_str(label)
    }
}

/// Callback invoked after an entry is removed, outside the tier lock.
pub type RemovalListener = Arc<dyn Fn(&str, RemovalCause) + Send + Sync>;

#[derive(Debug)]
struct Inner {
    entries: HashMap<String, CacheEntry>,
    lru: LruTracker,
    stats: LocalTierStats,
}

// == Local Tier ==
/// In-memory first tier of a named cache.
pub struct LocalTier {
    name: String,
    inner: Mutex<Inner>,
    maximum_size: usize,
    write_ttl: Option<Duration>,
    access_ttl: Option<Duration>,
    listener: Option<RemovalListener>,
}

impl LocalTier {
    // == Constructor ==
    /// Creates a local tier from configured policy.
    pub fn new(name: impl Into<String>, config: &LocalTierConfig) -> Self {
        let mut tier = Self::with_ttls(
            name,
            config.maximum_size,
            config.write_ttl(),
            config.access_ttl(),
        );
        tier.reserve(config.initial_capacity);
        tier
    }

    /// Creates a local tier with explicit TTLs; `None` disables a policy.
    pub fn with_ttls(
        name: impl Into<String>,
        maximum_size: usize,
        write_ttl: Option<Duration>,
        access_ttl: Option<Duration>,
    ) -> Self {
        Self {
            name: name.into(),
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                lru: LruTracker::new(),
                stats: LocalTierStats::new(),
            }),
            maximum_size,
            write_ttl,
            access_ttl,
            listener: None,
        }
    }

    /// Registers a callback for removal events.
    pub fn with_removal_listener(mut self, listener: RemovalListener) -> Self {
        self.listener = Some(listener);
        self
    }

    fn reserve(&mut self, capacity: usize) {
        let inner = self.inner.get_mut().unwrap_or_else(PoisonError::into_inner);
        inner.entries.reserve(capacity);
        inner.lru = LruTracker::with_capacity(capacity);
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // No invariant spans a panic inside the lock, so a poisoned map is still usable
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Size evictions follow access order only when access expiry is on.
    fn tracks_access(&self) -> bool {
        self.access_ttl.is_some()
    }

    // == Get ==
    /// Returns the live value for `key`, purging it if it has expired.
    pub fn get(&self, key: &str) -> Option<Value> {
        let mut removed = Vec::new();
        let value = {
            let mut inner = self.lock();
            let inner = &mut *inner;
            let expired = match inner.entries.get(key) {
                None => {
                    inner.stats.record_miss();
                    return None;
                }
                Some(entry) => entry.is_expired(self.write_ttl, self.access_ttl),
            };

            if expired {
                inner.entries.remove(key);
                inner.lru.remove(key);
                inner.stats.record_removal(RemovalCause::Expired);
                inner.stats.record_miss();
                inner.stats.set_total_entries(inner.entries.len());
                removed.push((key.to_string(), RemovalCause::Expired));
                None
            } else {
                let entry = inner.entries.get_mut(key)?;
                entry.touch();
                let value = entry.value.clone();
                if self.tracks_access() {
                    inner.lru.touch(key);
                }
                inner.stats.record_hit();
                Some(value)
            }
        };
        self.notify(removed);
        value
    }

    // == Contains ==
    /// Checks for a live entry without touching it or counting a lookup.
    pub fn contains(&self, key: &str) -> bool {
        self.lock()
            .entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired(self.write_ttl, self.access_ttl))
    }

    // == Put ==
    /// Inserts or overwrites `key`, restarting its write countdown.
    ///
    /// When the tier grows past `maximum_size`, the oldest entry by the
    /// tracked order is evicted.
    pub fn put(&self, key: &str, value: Value) {
        let mut removed = Vec::new();
        {
            let mut inner = self.lock();
            inner.entries.insert(key.to_string(), CacheEntry::new(value));
            inner.lru.touch(key);

            while inner.entries.len() > self.maximum_size {
                let Some(victim) = inner.lru.evict_oldest() else {
                    break;
                };
                inner.entries.remove(&victim);
                inner.stats.record_removal(RemovalCause::Size);
                removed.push((victim, RemovalCause::Size));
            }

            let len = inner.entries.len();
            inner.stats.set_total_entries(len);
        }
        self.notify(removed);
    }

    // == Invalidate ==
    /// Removes one key. Returns whether it was present.
    pub fn invalidate(&self, key: &str) -> bool {
        let present = {
            let mut inner = self.lock();
            let present = inner.entries.remove(key).is_some();
            if present {
                inner.lru.remove(key);
                inner.stats.record_removal(RemovalCause::Explicit);
                let len = inner.entries.len();
                inner.stats.set_total_entries(len);
            }
            present
        };
        if present {
            self.notify(vec![(key.to_string(), RemovalCause::Explicit)]);
        }
        present
    }

    /// Removes every entry. Returns how many were dropped.
    pub fn invalidate_all(&self) -> usize {
        let removed: Vec<(String, RemovalCause)> = {
            let mut inner = self.lock();
            let keys: Vec<String> = inner.entries.drain().map(|(key, _)| key).collect();
            inner.lru.clear();
            for _ in &keys {
                inner.stats.record_removal(RemovalCause::Explicit);
            }
            inner.stats.set_total_entries(0);
            keys.into_iter()
                .map(|key| (key, RemovalCause::Explicit))
                .collect()
        };
        let count = removed.len();
        self.notify(removed);
        count
    }

    // == Purge Expired ==
    /// Physically removes every expired entry. Returns the number removed.
    pub fn purge_expired(&self) -> usize {
        let removed: Vec<(String, RemovalCause)> = {
            let mut inner = self.lock();
            let expired: Vec<String> = inner
                .entries
                .iter()
                .filter(|(_, entry)| entry.is_expired(self.write_ttl, self.access_ttl))
                .map(|(key, _)| key.clone())
                .collect();

            for key in &expired {
                inner.entries.remove(key);
                inner.lru.remove(key);
                inner.stats.record_removal(RemovalCause::Expired);
            }
            let len = inner.entries.len();
            inner.stats.set_total_entries(len);
            expired
                .into_iter()
                .map(|key| (key, RemovalCause::Expired))
                .collect()
        };
        let count = removed.len();
        self.notify(removed);
        count
    }

    fn notify(&self, removed: Vec<(String, RemovalCause)>) {
        for (key, cause) in removed {
            debug!(cache = %self.name, key = %key, cause = %cause, "local tier removal");
            if let Some(listener) = &self.listener {
                listener(&key, cause);
            }
        }
    }

    // == Stats ==
    pub fn stats(&self) -> LocalTierStats {
        let inner = self.lock();
        let mut stats = inner.stats.clone();
        stats.set_total_entries(inner.entries.len());
        stats
    }

    /// Current number of entries, including ones not yet purged.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Keys currently held, expired or not.
    pub fn keys(&self) -> Vec<String> {
        self.lock().entries.keys().cloned().collect()
    }
}

impl fmt::Debug for LocalTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalTier")
            .field("name", &self.name)
            .field("maximum_size", &self.maximum_size)
            .field("write_ttl", &self.write_ttl)
            .field("access_ttl", &self.access_ttl)
            .field("len", &self.len())
            .finish()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::thread::sleep;

    fn tier(max: usize) -> LocalTier {
        LocalTier::with_ttls("test", max, Some(Duration::from_secs(300)), None)
    }

    #[test]
    fn test_put_and_get() {
        let tier = tier(100);

        tier.put("key1", json!("value1"));
        assert_eq!(tier.get("key1"), Some(json!("value1")));
        assert_eq!(tier.len(), 1);
    }

    #[test]
    fn test_get_missing() {
        let tier = tier(100);
        assert_eq!(tier.get("nonexistent"), None);
        assert_eq!(tier.stats().misses, 1);
    }

    #[test]
    fn test_overwrite() {
        let tier = tier(100);

        tier.put("key1", json!(1));
        tier.put("key1", json!(2));

        assert_eq!(tier.get("key1"), Some(json!(2)));
        assert_eq!(tier.len(), 1);
    }

    #[test]
    fn test_null_is_a_value() {
        let tier = tier(100);
        tier.put("nothing", Value::Null);
        assert_eq!(tier.get("nothing"), Some(Value::Null));
    }

    #[test]
    fn test_write_expiry_purges_lazily() {
        let tier = LocalTier::with_ttls("test", 100, Some(Duration::from_millis(50)), None);

        tier.put("key1", json!("v"));
        assert!(tier.get("key1").is_some());

        sleep(Duration::from_millis(80));

        assert_eq!(tier.get("key1"), None);
        assert!(tier.is_empty());
        assert_eq!(tier.stats().expired, 1);
    }

    #[test]
    fn test_access_expiry_resets_on_read() {
        let tier = LocalTier::with_ttls("test", 100, None, Some(Duration::from_millis(150)));

        tier.put("hot", json!(1));
        tier.put("cold", json!(2));

        for _ in 0..3 {
            sleep(Duration::from_millis(70));
            assert!(tier.get("hot").is_some());
        }

        assert!(tier.get("hot").is_some());
        assert_eq!(tier.get("cold"), None);
    }

    #[test]
    fn test_size_eviction_by_write_order() {
        let tier = tier(3);

        tier.put("key1", json!(1));
        tier.put("key2", json!(2));
        tier.put("key3", json!(3));
        // Reads do not reorder without access expiry
        tier.get("key1");
        tier.put("key4", json!(4));

        assert_eq!(tier.len(), 3);
        assert!(!tier.contains("key1"));
        assert!(tier.contains("key2"));
        assert!(tier.contains("key4"));
        assert_eq!(tier.stats().size_evictions, 1);
    }

    #[test]
    fn test_size_eviction_by_access_order() {
        let tier = LocalTier::with_ttls("test", 3, None, Some(Duration::from_secs(300)));

        tier.put("key1", json!(1));
        tier.put("key2", json!(2));
        tier.put("key3", json!(3));
        tier.get("key1");
        tier.put("key4", json!(4));

        assert!(tier.contains("key1"));
        assert!(!tier.contains("key2"));
    }

    #[test]
    fn test_invalidate() {
        let tier = tier(100);

        tier.put("key1", json!(1));
        assert!(tier.invalidate("key1"));
        assert!(!tier.invalidate("key1"));
        assert!(tier.is_empty());
        assert_eq!(tier.stats().explicit_removals, 1);
    }

    #[test]
    fn test_invalidate_all() {
        let tier = tier(100);

        tier.put("a", json!(1));
        tier.put("b", json!(2));

        assert_eq!(tier.invalidate_all(), 2);
        assert!(tier.is_empty());
        assert_eq!(tier.stats().explicit_removals, 2);
    }

    #[test]
    fn test_purge_expired() {
        let tier = LocalTier::with_ttls("test", 100, Some(Duration::from_millis(50)), None);

        tier.put("a", json!(1));
        tier.put("b", json!(2));
        sleep(Duration::from_millis(80));
        tier.put("c", json!(3));

        assert_eq!(tier.purge_expired(), 2);
        assert_eq!(tier.keys(), vec!["c".to_string()]);
    }

    #[test]
    fn test_removal_listener_sees_causes() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let tier = tier(1).with_removal_listener(Arc::new(move |key: &str, cause: RemovalCause| {
            sink.lock().unwrap().push((key.to_string(), cause));
        }));

        tier.put("a", json!(1));
        tier.put("b", json!(2));
        tier.invalidate("b");

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                ("a".to_string(), RemovalCause::Size),
                ("b".to_string(), RemovalCause::Explicit),
            ]
        );
    }

    #[test]
    fn test_from_config() {
        let config = LocalTierConfig {
            maximum_size: 2,
            ..LocalTierConfig::default()
        };
        let tier = LocalTier::new("goods", &config);

        tier.put("a", json!(1));
        tier.put("b", json!(2));
        tier.put("c", json!(3));
        assert_eq!(tier.len(), 2);
    }
}
