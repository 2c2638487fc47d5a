//! Entry Store
//!
//! The shared, networked key-value tier. Named caches only need get, set
//! with TTL, delete and a conditional set; anything that speaks those four
//! operations (Redis, Memcached, a test double) can back the second tier.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::Result;

/// Shared key-value backend with per-key TTL.
///
/// Implementations report connectivity problems as
/// [`CacheError::BackendUnavailable`](crate::error::CacheError::BackendUnavailable);
/// a missing key is `Ok(None)`, never an error.
#[async_trait]
pub trait EntryStore: Send + Sync {
    /// Reads the blob stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Writes `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()>;

    /// Writes `value` only if `key` holds nothing. Returns whether it wrote.
    async fn set_if_absent(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<bool>;

    /// Deletes `key`. Returns whether it existed.
    async fn delete(&self, key: &str) -> Result<bool>;
}

#[derive(Debug, Clone)]
struct StoredBlob {
    bytes: Vec<u8>,
    /// `None` when the TTL runs past what `Instant` can represent
    expires_at: Option<Instant>,
}

impl StoredBlob {
    fn new(bytes: Vec<u8>, ttl: Duration) -> Self {
        Self {
            bytes,
            expires_at: Instant::now().checked_add(ttl),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|expires_at| Instant::now() >= expires_at)
    }
}

// == Memory Entry Store ==
/// In-process entry store. Sharing one `Arc<MemoryEntryStore>` between
/// several registries models several instances talking to one server.
#[derive(Debug, Default)]
pub struct MemoryEntryStore {
    entries: RwLock<HashMap<String, StoredBlob>>,
}

impl MemoryEntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remaining TTL of `key`, `None` if absent or expired.
    /// A blob that never expires reports `Duration::MAX`.
    pub async fn ttl(&self, key: &str) -> Option<Duration> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|blob| !blob.is_expired())
            .map(|blob| match blob.expires_at {
                Some(expires_at) => expires_at.saturating_duration_since(Instant::now()),
                None => Duration::MAX,
            })
    }

    /// Removes every expired blob. Returns how many were dropped.
    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, blob| !blob.is_expired());
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, "entry store purged expired blobs");
        }
        removed
    }

    /// Number of live keys.
    pub async fn len(&self) -> usize {
        let entries = self.entries.read().await;
        entries.values().filter(|blob| !blob.is_expired()).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl EntryStore for MemoryEntryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return Ok(None),
                Some(blob) if !blob.is_expired() => return Ok(Some(blob.bytes.clone())),
                Some(_) => {}
            }
        }

        // Expired: purge lazily, re-checking under the write lock
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(StoredBlob::is_expired) {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), StoredBlob::new(value, ttl));
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<bool> {
        let mut entries = self.entries.write().await;
        let occupied = entries.get(key).is_some_and(|blob| !blob.is_expired());
        if occupied {
            return Ok(false);
        }
        entries.insert(key.to_string(), StoredBlob::new(value, ttl));
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut entries = self.entries.write().await;
        Ok(entries
            .remove(key)
            .is_some_and(|blob| !blob.is_expired()))
    }
}
