//! Expiry Sweep Task
//!
//! Background task that periodically purges expired local tier entries.
//! Reads already purge lazily; the sweep bounds memory held by keys that
//! are never read again.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::CacheRegistry;

/// Spawns a task that sweeps every named cache in `registry` once per
/// `interval_secs`. Abort the returned handle to stop it.
///
/// # Example
/// ```ignore
/// let sweep = spawn_sweep_task(registry.clone(), 1);
/// // Later, during shutdown:
/// sweep.abort();
/// ```
pub fn spawn_sweep_task(registry: Arc<CacheRegistry>, interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting local tier sweep task with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = registry.purge_expired();
            if removed > 0 {
                info!("Local tier sweep: removed {} expired entries", removed);
            } else {
                debug!("Local tier sweep: no expired entries found");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MemoryBroadcast, MemoryEntryStore};
    use crate::config::{CacheConfig, LocalTierConfig};
    use serde_json::json;

    fn registry(expire_after_write: u64) -> Arc<CacheRegistry> {
        let config = CacheConfig {
            local: LocalTierConfig {
                expire_after_write,
                ..LocalTierConfig::default()
            },
            ..CacheConfig::default()
        };
        CacheRegistry::new(
            config,
            Arc::new(MemoryEntryStore::new()),
            Arc::new(MemoryBroadcast::new()),
        )
    }

    #[tokio::test]
    async fn test_sweep_removes_expired_entries() {
        let registry = registry(1);
        let cache = registry.get_cache("goods");
        cache.put("expire_soon", json!("v")).await.unwrap();

        let handle = spawn_sweep_task(registry.clone(), 1);
        tokio::time::sleep(Duration::from_millis(2500)).await;

        // Purged without any read touching it
        assert!(cache.local().is_empty());
        assert_eq!(cache.local().stats().expired, 1);

        handle.abort();
    }

    #[tokio::test]
    async fn test_sweep_preserves_live_entries() {
        let registry = registry(3600);
        let cache = registry.get_cache("goods");
        cache.put("long_lived", json!("v")).await.unwrap();

        let handle = spawn_sweep_task(registry.clone(), 1);
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert!(cache.local().contains("long_lived"));
        handle.abort();
    }

    #[tokio::test]
    async fn test_sweep_task_can_be_aborted() {
        let handle = spawn_sweep_task(registry(1), 1);

        handle.abort();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
