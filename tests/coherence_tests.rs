//! Integration Tests for Multi-Instance Coherence
//!
//! Several registries share one entry store and one broadcast channel,
//! standing in for separate processes talking to the same backends.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tiered_cache::backend::Subscription;
use tiered_cache::config::{CacheConfig, LocalTierConfig};
use tiered_cache::{
    CacheError, CacheRegistry, EntryStore, MemoryBroadcast, MemoryEntryStore, Result,
};

// == Helper Functions ==

struct Cluster {
    store: Arc<MemoryEntryStore>,
    nodes: Vec<Arc<CacheRegistry>>,
}

async fn cluster(nodes: usize, config: CacheConfig) -> Cluster {
    let store = Arc::new(MemoryEntryStore::new());
    let channel = Arc::new(MemoryBroadcast::new());

    let mut registries = Vec::with_capacity(nodes);
    for _ in 0..nodes {
        let registry = CacheRegistry::start(config.clone(), store.clone(), channel.clone())
            .await
            .unwrap();
        registries.push(registry);
    }

    Cluster {
        store,
        nodes: registries,
    }
}

fn small_config(maximum_size: usize) -> CacheConfig {
    CacheConfig {
        local: LocalTierConfig {
            maximum_size,
            ..LocalTierConfig::default()
        },
        ..CacheConfig::default()
    }
}

/// Polls until `check` holds or a second has passed.
async fn eventually<F: Fn() -> bool>(check: F) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

async fn stored(store: &MemoryEntryStore, key: &str) -> Option<Value> {
    store
        .get(key)
        .await
        .unwrap()
        .map(|bytes| serde_json::from_slice(&bytes).unwrap())
}

// == Read-Through / Write-Through ==

#[tokio::test]
async fn test_read_through_populates_local_tier() {
    let cluster = cluster(2, CacheConfig::default()).await;
    let a = cluster.nodes[0].get_cache("goods");
    let b = cluster.nodes[1].get_cache("goods");

    a.put("1", json!({"title": "pen"})).await.unwrap();
    assert!(!b.local().contains("1"));

    assert_eq!(b.lookup("1").await.unwrap(), Some(json!({"title": "pen"})));
    assert_eq!(b.local().get("1"), Some(json!({"title": "pen"})));
}

#[tokio::test]
async fn test_write_through_reaches_both_tiers() {
    let cluster = cluster(1, CacheConfig::default()).await;
    let cache = cluster.nodes[0].get_cache("goods");

    cache.put("1", json!(42)).await.unwrap();

    assert_eq!(stored(&cluster.store, "goods:1").await, Some(json!(42)));
    assert_eq!(cache.local().get("1"), Some(json!(42)));
}

#[tokio::test]
async fn test_store_entry_carries_default_expiration() {
    let cluster = cluster(1, CacheConfig::default()).await;
    cluster.nodes[0].get_cache("goods").put("1", json!(1)).await.unwrap();

    let ttl = cluster.store.ttl("goods:1").await.unwrap();
    assert!(ttl > Duration::from_secs(7100));
    assert!(ttl <= Duration::from_secs(7200));
}

#[tokio::test]
async fn test_local_capacity_does_not_bound_store() {
    let cluster = cluster(1, small_config(2)).await;
    let goods = cluster.nodes[0].get_cache("goods");

    goods.put("a", json!(1)).await.unwrap();
    goods.put("b", json!(2)).await.unwrap();
    goods.put("c", json!(3)).await.unwrap();

    assert_eq!(goods.local().len(), 2);
    assert!(!goods.local().contains("a"));
    for (key, value) in [("a", 1), ("b", 2), ("c", 3)] {
        let store_key = format!("goods:{}", key);
        assert_eq!(stored(&cluster.store, &store_key).await, Some(json!(value)));
    }
}

// == Single-Flight Loading ==

#[tokio::test]
async fn test_concurrent_misses_load_once() {
    let cluster = cluster(1, CacheConfig::default()).await;
    let cache = cluster.nodes[0].get_cache("goods");
    let calls = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..20)
        .map(|_| {
            let cache = cache.clone();
            let calls = calls.clone();
            tokio::spawn(async move {
                cache
                    .get("hot", || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok::<_, CacheError>(json!("loaded"))
                    })
                    .await
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), json!("loaded"));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.stats().loads, 1);
}

#[tokio::test]
async fn test_slow_loader_serves_late_caller() {
    let cluster = cluster(1, CacheConfig::default()).await;
    let cache = cluster.nodes[0].get_cache("goods");
    let second_called = Arc::new(AtomicUsize::new(0));

    let first = {
        let cache = cache.clone();
        tokio::spawn(async move {
            cache
                .get("x", || async {
                    tokio::time::sleep(Duration::from_millis(500)).await;
                    Ok::<_, CacheError>(json!("slow"))
                })
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(10)).await;

    let counter = second_called.clone();
    let second = cache
        .get("x", || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, CacheError>(json!("fast"))
        })
        .await
        .unwrap();

    assert_eq!(first.await.unwrap().unwrap(), json!("slow"));
    assert_eq!(second, json!("slow"));
    assert_eq!(second_called.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_slow_load_does_not_block_other_keys() {
    let cluster = cluster(1, CacheConfig::default()).await;
    let cache = cluster.nodes[0].get_cache("goods");

    let slow = {
        let cache = cache.clone();
        tokio::spawn(async move {
            cache
                .get("slow", || async {
                    tokio::time::sleep(Duration::from_millis(500)).await;
                    Ok::<_, CacheError>(json!(1))
                })
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    let started = tokio::time::Instant::now();
    let fast = cache
        .get("fast", || async { Ok::<_, CacheError>(json!(2)) })
        .await
        .unwrap();

    assert_eq!(fast, json!(2));
    assert!(started.elapsed() < Duration::from_millis(400));
    slow.await.unwrap().unwrap();
}

// == Invalidation Propagation ==

#[tokio::test]
async fn test_evict_propagates_to_peers() {
    let cluster = cluster(3, CacheConfig::default()).await;
    let caches: Vec<_> = cluster
        .nodes
        .iter()
        .map(|node| node.get_cache("goods"))
        .collect();

    caches[0].put("1", json!("v1")).await.unwrap();
    for cache in &caches[1..] {
        assert_eq!(cache.lookup("1").await.unwrap(), Some(json!("v1")));
    }

    caches[0].evict("1").await.unwrap();

    // Store is clean immediately, peers once their subscriber catches up
    assert_eq!(stored(&cluster.store, "goods:1").await, None);
    assert!(!caches[0].local().contains("1"));
    for cache in &caches[1..] {
        assert!(eventually(|| !cache.local().contains("1")).await);
        assert_eq!(cache.lookup("1").await.unwrap(), None);
    }
}

#[tokio::test]
async fn test_put_drops_stale_peer_copies() {
    let cluster = cluster(2, CacheConfig::default()).await;
    let a = cluster.nodes[0].get_cache("goods");
    let b = cluster.nodes[1].get_cache("goods");

    a.put("1", json!("old")).await.unwrap();
    assert_eq!(b.lookup("1").await.unwrap(), Some(json!("old")));

    a.put("1", json!("new")).await.unwrap();

    assert!(eventually(|| !b.local().contains("1")).await);
    assert_eq!(b.lookup("1").await.unwrap(), Some(json!("new")));
}

#[tokio::test]
async fn test_own_messages_do_not_touch_local_tier() {
    let cluster = cluster(1, CacheConfig::default()).await;
    let cache = cluster.nodes[0].get_cache("goods");

    cache.put("1", json!(1)).await.unwrap();
    // Give the subscriber time to receive its own EVICT
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(cache.local().get("1"), Some(json!(1)));
    assert_eq!(cache.stats().local.explicit_removals, 0);
}

#[tokio::test]
async fn test_clear_empties_all_local_tiers_but_keeps_store() {
    let cluster = cluster(2, CacheConfig::default()).await;
    let a = cluster.nodes[0].get_cache("orders");
    let b = cluster.nodes[1].get_cache("orders");

    a.put("1", json!(1)).await.unwrap();
    a.put("2", json!(2)).await.unwrap();
    b.lookup("1").await.unwrap();
    b.lookup("2").await.unwrap();
    assert_eq!(b.local().len(), 2);

    a.clear().await;

    assert!(a.local().is_empty());
    assert!(eventually(|| b.local().is_empty()).await);
    assert_eq!(stored(&cluster.store, "orders:1").await, Some(json!(1)));
    assert_eq!(stored(&cluster.store, "orders:2").await, Some(json!(2)));
}

#[tokio::test]
async fn test_messages_for_unknown_cache_are_ignored() {
    let cluster = cluster(2, CacheConfig::default()).await;
    cluster.nodes[0].get_cache("orders").clear().await;

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(cluster.nodes[1].lookup("orders").is_none());
}

// == Null Handling ==

#[tokio::test]
async fn test_null_values_cached_when_enabled() {
    let cluster = cluster(2, CacheConfig::default()).await;
    let a = cluster.nodes[0].get_cache("members");
    let b = cluster.nodes[1].get_cache("members");

    a.put("ghost", Value::Null).await.unwrap();

    assert_eq!(b.lookup("ghost").await.unwrap(), Some(Value::Null));
    assert_eq!(b.lookup("other").await.unwrap(), None);

    let ttl = cluster.store.ttl("members:ghost").await.unwrap();
    assert!(ttl <= Duration::from_secs(60));
}

#[tokio::test]
async fn test_null_put_evicts_when_disabled() {
    let mut config = CacheConfig::default();
    config.store.cache_null_values = false;
    let cluster = cluster(2, config).await;
    let a = cluster.nodes[0].get_cache("members");
    let b = cluster.nodes[1].get_cache("members");

    a.put("1", json!("alice")).await.unwrap();
    b.lookup("1").await.unwrap();

    a.put("1", Value::Null).await.unwrap();

    assert_eq!(stored(&cluster.store, "members:1").await, None);
    assert!(!a.local().contains("1"));
    assert!(eventually(|| !b.local().contains("1")).await);
}

// == Conditional Writes ==

#[tokio::test]
async fn test_put_if_absent_single_winner_across_nodes() {
    let cluster = cluster(4, CacheConfig::default()).await;

    let handles: Vec<_> = cluster
        .nodes
        .iter()
        .enumerate()
        .map(|(i, node)| {
            let cache = node.get_cache("goods");
            tokio::spawn(async move { cache.put_if_absent("k", json!(i)).await })
        })
        .collect();

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap().is_none() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);

    let value = stored(&cluster.store, "goods:k").await.unwrap();
    for node in &cluster.nodes {
        let cache = node.get_cache("goods");
        assert_eq!(cache.lookup("k").await.unwrap(), Some(value.clone()));
    }
}

// == Backend Failures ==

struct UnreachableStore;

#[async_trait]
impl EntryStore for UnreachableStore {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
        Err(CacheError::BackendUnavailable("connection refused".into()))
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> Result<()> {
        Err(CacheError::BackendUnavailable("connection refused".into()))
    }

    async fn set_if_absent(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> Result<bool> {
        Err(CacheError::BackendUnavailable("connection refused".into()))
    }

    async fn delete(&self, _key: &str) -> Result<bool> {
        Err(CacheError::BackendUnavailable("connection refused".into()))
    }
}

#[tokio::test]
async fn test_store_outage_surfaces_as_error() {
    let registry = CacheRegistry::new(
        CacheConfig::default(),
        Arc::new(UnreachableStore),
        Arc::new(MemoryBroadcast::new()),
    );
    let cache = registry.get_cache("goods");

    assert!(matches!(
        cache.lookup("1").await,
        Err(CacheError::BackendUnavailable(_))
    ));
    assert!(matches!(
        cache.put("1", json!(1)).await,
        Err(CacheError::BackendUnavailable(_))
    ));
    assert!(!cache.local().contains("1"));

    let loaded = cache
        .get("1", || async { Ok::<_, CacheError>(json!(1)) })
        .await;
    assert!(matches!(loaded, Err(CacheError::BackendUnavailable(_))));
}

struct ClosedChannel;

#[async_trait]
impl tiered_cache::BroadcastChannel for ClosedChannel {
    async fn publish(&self, _topic: &str, _payload: Vec<u8>) -> Result<()> {
        Err(CacheError::Broadcast("channel closed".into()))
    }

    async fn subscribe(&self, _topic: &str) -> Result<Subscription> {
        Err(CacheError::Broadcast("channel closed".into()))
    }
}

#[tokio::test]
async fn test_broadcast_outage_does_not_fail_writes() {
    let store = Arc::new(MemoryEntryStore::new());
    let registry = CacheRegistry::new(
        CacheConfig::default(),
        store.clone(),
        Arc::new(ClosedChannel),
    );
    assert!(registry.subscribe().await.is_err());

    let cache = registry.get_cache("goods");
    cache.put("1", json!(1)).await.unwrap();
    cache.evict("1").await.unwrap();
    cache.clear().await;

    assert!(store.is_empty().await);
}

// == Lifecycle ==

#[tokio::test]
async fn test_shutdown_stops_receiving() {
    let cluster = cluster(2, CacheConfig::default()).await;
    let a = cluster.nodes[0].get_cache("goods");
    let b = cluster.nodes[1].get_cache("goods");

    a.put("1", json!(1)).await.unwrap();
    b.lookup("1").await.unwrap();

    cluster.nodes[1].shutdown();
    a.evict("1").await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Stale until its own TTL; nothing delivered the EVICT
    assert!(b.local().contains("1"));
}
