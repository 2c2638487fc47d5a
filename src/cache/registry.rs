//! Cache Registry Module
//!
//! Process-wide map from cache name to named cache. Caches are created on
//! first access with the configured policy and live for the whole process.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::info;
use uuid::Uuid;

use crate::backend::{BroadcastChannel, EntryStore};
use crate::cache::{LocalTier, NamedCache, NamedCacheStats};
use crate::config::CacheConfig;
use crate::error::Result;
use crate::sync::Synchronizer;

pub struct CacheRegistry {
    caches: RwLock<HashMap<String, Arc<NamedCache>>>,
    store: Arc<dyn EntryStore>,
    synchronizer: Arc<Synchronizer>,
    config: CacheConfig,
}

impl CacheRegistry {
    // == Constructor ==
    /// Creates a registry whose synchronizer is still idle.
    pub fn new(
        config: CacheConfig,
        store: Arc<dyn EntryStore>,
        channel: Arc<dyn BroadcastChannel>,
    ) -> Arc<Self> {
        let synchronizer = Arc::new(Synchronizer::new(channel, config.sync_topic.clone()));
        info!(
            instance_id = %synchronizer.instance_id(),
            topic = %config.sync_topic,
            "cache registry initialized"
        );
        Arc::new(Self {
            caches: RwLock::new(HashMap::new()),
            store,
            synchronizer,
            config,
        })
    }

    /// Creates a registry and subscribes it to the sync topic.
    pub async fn start(
        config: CacheConfig,
        store: Arc<dyn EntryStore>,
        channel: Arc<dyn BroadcastChannel>,
    ) -> Result<Arc<Self>> {
        let registry = Self::new(config, store, channel);
        registry.subscribe().await?;
        Ok(registry)
    }

    /// Starts receiving invalidations from peers.
    pub async fn subscribe(self: &Arc<Self>) -> Result<()> {
        self.synchronizer.subscribe(Arc::downgrade(self)).await
    }

    // == Get Cache ==
    /// Returns the cache called `name`, creating it on first use.
    ///
    /// Concurrent first calls for the same name get the same instance.
    pub fn get_cache(&self, name: &str) -> Arc<NamedCache> {
        if let Some(cache) = self.lookup(name) {
            return cache;
        }

        let mut caches = self.caches.write().unwrap_or_else(PoisonError::into_inner);
        caches
            .entry(name.to_string())
            .or_insert_with(|| self.create_cache(name))
            .clone()
    }

    /// Returns the cache called `name` without creating it.
    pub fn lookup(&self, name: &str) -> Option<Arc<NamedCache>> {
        self.caches
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    fn create_cache(&self, name: &str) -> Arc<NamedCache> {
        let local = LocalTier::new(name, &self.config.local);
        info!(
            cache = name,
            maximum_size = self.config.local.maximum_size,
            expire_after_write = self.config.local.expire_after_write,
            expire_after_access = self.config.local.expire_after_access,
            "created two-level cache"
        );
        Arc::new(NamedCache::new(
            name,
            local,
            self.store.clone(),
            self.synchronizer.clone(),
            self.config.store.clone(),
        ))
    }

    /// Names of every cache created so far.
    pub fn cache_names(&self) -> BTreeSet<String> {
        self.caches
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    pub fn caches(&self) -> Vec<Arc<NamedCache>> {
        self.caches
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// Statistics for every cache, ordered by name.
    pub fn stats(&self) -> Vec<NamedCacheStats> {
        let mut stats: Vec<NamedCacheStats> =
            self.caches().iter().map(|cache| cache.stats()).collect();
        stats.sort_by(|a, b| a.name.cmp(&b.name));
        stats
    }

    /// Drops expired local entries in every cache.
    pub fn purge_expired(&self) -> usize {
        self.caches()
            .iter()
            .map(|cache| cache.purge_expired())
            .sum()
    }

    pub fn synchronizer(&self) -> &Arc<Synchronizer> {
        &self.synchronizer
    }

    pub fn instance_id(&self) -> Uuid {
        self.synchronizer.instance_id()
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Stops receiving peer invalidations.
    pub fn shutdown(&self) {
        self.synchronizer.shutdown();
    }
}

impl std::fmt::Debug for CacheRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheRegistry")
            .field("caches", &self.cache_names())
            .field("synchronizer", &self.synchronizer)
            .finish()
    }
}
