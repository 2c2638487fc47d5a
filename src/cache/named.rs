//! Named Cache Module
//!
//! One logical cache spanning the process-local tier and the shared entry
//! store. Reads go local first, then store (repopulating local); writes go
//! store first, then local; evictions and clears are broadcast to peers.

use std::future::Future;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::backend::EntryStore;
use crate::cache::{KeyLocks, LocalTier, NamedCacheStats, TierCounters};
use crate::config::StoreConfig;
use crate::error::{BoxError, CacheError, Result};
use crate::sync::Synchronizer;

pub struct NamedCache {
    name: String,
    key_prefix: String,
    local: LocalTier,
    store: Arc<dyn EntryStore>,
    sync: Arc<Synchronizer>,
    config: StoreConfig,
    loads: KeyLocks,
    counters: TierCounters,
}

impl NamedCache {
    // == Constructor ==
    pub fn new(
        name: impl Into<String>,
        local: LocalTier,
        store: Arc<dyn EntryStore>,
        sync: Arc<Synchronizer>,
        config: StoreConfig,
    ) -> Self {
        let name = name.into();
        Self {
            key_prefix: format!("{}:", escape_name(&name)),
            name,
            local,
            store,
            sync,
            config,
            loads: KeyLocks::new(),
            counters: TierCounters::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    /// Key under which `key` lives in the shared store.
    ///
    /// The prefix ends at the first unescaped `:`, so two caches never share
    /// a store key whatever their names or keys contain.
    pub fn store_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    pub fn local(&self) -> &LocalTier {
        &self.local
    }

    pub fn allows_null_values(&self) -> bool {
        self.config.cache_null_values
    }

    // == Lookup ==
    /// Two-level read.
    ///
    /// Returns `Some(Value::Null)` for a cached null and `None` when neither
    /// tier holds the key. A store hit repopulates the local tier; a store
    /// miss writes nothing. Store failures are returned, not treated as a miss.
    pub async fn lookup(&self, key: &str) -> Result<Option<Value>> {
        if let Some(value) = self.local.get(key) {
            debug!(cache = %self.name, key, "local tier hit");
            return Ok(Some(value));
        }

        let Some(bytes) = self.store.get(&self.store_key(key)).await? else {
            self.counters.record_store_miss();
            return Ok(None);
        };

        let value: Value = serde_json::from_slice(&bytes)?;
        if value.is_null() && !self.config.cache_null_values {
            self.counters.record_store_miss();
            return Ok(None);
        }

        debug!(cache = %self.name, key, "entry store hit");
        self.counters.record_store_hit();
        self.local.put(key, value.clone());
        Ok(Some(value))
    }

    // == Get (read-through) ==
    /// Returns the cached value or loads, stores and returns it.
    ///
    /// Concurrent misses on the same key run `loader` once: the first caller
    /// loads under the key's lock, later callers re-check after the lock is
    /// released and find the value. Other keys are never blocked. A loader
    /// error is returned to its caller and nothing is cached.
    pub async fn get<F, Fut, E>(&self, key: &str, loader: F) -> Result<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<Value, E>>,
        E: Into<BoxError>,
    {
        if let Some(value) = self.lookup(key).await? {
            return Ok(value);
        }

        let _guard = self.loads.acquire(key).await;

        if let Some(value) = self.lookup(key).await? {
            return Ok(value);
        }

        match loader().await {
            Ok(value) => {
                self.counters.record_load();
                self.put(key, value.clone()).await?;
                Ok(value)
            }
            Err(e) => {
                self.counters.record_load_failure();
                let err = CacheError::load_failure(&self.name, key, e);
                warn!(cache = %self.name, key, error = %err, "cache loader failed");
                Err(err)
            }
        }
    }

    // == Put ==
    /// Writes `value` to the store, then to the local tier, then tells peers
    /// to drop their stale copy.
    ///
    /// A null with null caching disabled is an [`evict`](Self::evict).
    pub async fn put(&self, key: &str, value: Value) -> Result<()> {
        let is_null = value.is_null();
        if is_null && !self.config.cache_null_values {
            return self.evict(key).await;
        }

        let bytes = serde_json::to_vec(&value)?;
        self.store
            .set(&self.store_key(key), bytes, self.config.ttl_for(is_null))
            .await?;
        self.local.put(key, value);
        self.sync.publish_evict(&self.name, key).await;

        debug!(cache = %self.name, key, "wrote both tiers");
        Ok(())
    }

    // == Put If Absent ==
    /// Writes `value` only when no tier holds `key`.
    ///
    /// Returns the existing value when one was found, `None` when `value`
    /// was written. A null with null caching disabled is an
    /// [`evict`](Self::evict), same as [`put`](Self::put). The store-side check uses the store's conditional set,
    /// so two instances racing on the same key agree on a single winner.
    pub async fn put_if_absent(&self, key: &str, value: Value) -> Result<Option<Value>> {
        if let Some(existing) = self.lookup(key).await? {
            return Ok(Some(existing));
        }

        let is_null = value.is_null();
        if is_null && !self.config.cache_null_values {
            self.evict(key).await?;
            return Ok(None);
        }

        let store_key = self.store_key(key);
        let bytes = serde_json::to_vec(&value)?;
        let written = self
            .store
            .set_if_absent(&store_key, bytes, self.config.ttl_for(is_null))
            .await?;

        if written {
            self.local.put(key, value);
            self.sync.publish_evict(&self.name, key).await;
            return Ok(None);
        }

        // Lost the race; adopt the winner's value
        match self.store.get(&store_key).await? {
            Some(bytes) => {
                let existing: Value = serde_json::from_slice(&bytes)?;
                self.local.put(key, existing.clone());
                Ok(Some(existing))
            }
            None => {
                // Winner's entry vanished in between (evicted or expired)
                self.put(key, value).await?;
                Ok(None)
            }
        }
    }

    // == Evict ==
    /// Deletes `key` from the store, then the local tier, then broadcasts.
    ///
    /// The store goes first so that a concurrent local reader cannot
    /// repopulate the local tier from a value that is about to disappear.
    pub async fn evict(&self, key: &str) -> Result<()> {
        self.store.delete(&self.store_key(key)).await?;
        self.local.invalidate(key);
        self.sync.publish_evict(&self.name, key).await;

        debug!(cache = %self.name, key, "evicted from both tiers");
        Ok(())
    }

    // == Clear ==
    /// Empties this local tier and every peer's local tier.
    ///
    /// The shared store is not scanned: entries under this cache's prefix
    /// stay readable there until their TTL lapses.
    pub async fn clear(&self) {
        let dropped = self.local.invalidate_all();
        warn!(
            cache = %self.name,
            dropped,
            "cleared local tiers; entry store keys expire by TTL, prefer evict"
        );
        self.sync.publish_clear(&self.name).await;
    }

    /// Applies a peer's invalidation: one key, or everything for `None`.
    /// Never broadcasts.
    pub fn clear_local(&self, key: Option<&str>) {
        match key {
            Some(key) => {
                self.local.invalidate(key);
                debug!(cache = %self.name, key, "local entry invalidated");
            }
            None => {
                self.local.invalidate_all();
                debug!(cache = %self.name, "local tier invalidated");
            }
        }
    }

    /// Drops expired local entries. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.local.purge_expired()
    }

    pub fn stats(&self) -> NamedCacheStats {
        self.counters.snapshot(&self.name, self.local.stats())
    }

    // == Typed Helpers ==
    /// [`lookup`](Self::lookup) decoded into `T`.
    ///
    /// A cached null only decodes into a type that accepts `null`. With null
    /// caching enabled, ask for `Option<T>`: `Some(None)` is a cached null,
    /// `None` is absent. A plain `T` gets a serialization error instead.
    pub async fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.lookup(key).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// [`put`](Self::put) of any serializable value.
    pub async fn put_as<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.put(key, serde_json::to_value(value)?).await
    }

    /// [`get`](Self::get) with a typed loader.
    pub async fn get_or_load_as<T, F, Fut, E>(&self, key: &str, loader: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Into<BoxError>,
    {
        let value = self
            .get(key, || async move {
                let loaded = loader().await.map_err(Into::<BoxError>::into)?;
                serde_json::to_value(loaded).map_err(BoxError::from)
            })
            .await?;
        Ok(serde_json::from_value(value)?)
    }
}

/// Escapes backslashes and `:` so the cache name cannot run into the key part.
fn escape_name(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len());
    for c in name.chars() {
        if c == '\\' || c == ':' {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

impl std::fmt::Debug for NamedCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamedCache")
            .field("name", &self.name)
            .field("local", &self.local)
            .field("config", &self.config)
            .finish()
    }
}
