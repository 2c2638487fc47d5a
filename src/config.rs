//! Configuration Module
//!
//! Handles loading cache policy and node settings from environment variables.
//! Policy is read once, when a named cache is constructed.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Default pub/sub topic used for invalidation messages.
pub const DEFAULT_SYNC_TOPIC: &str = "cache:sync:topic";

/// Local tier sizing and expiry policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalTierConfig {
    /// Capacity hint for the backing map
    pub initial_capacity: usize,
    /// Maximum number of entries held per named cache
    pub maximum_size: usize,
    /// Seconds after a write before an entry expires, 0 = disabled
    pub expire_after_write: u64,
    /// Seconds after the last access before an entry expires, 0 = disabled
    pub expire_after_access: u64,
}

impl LocalTierConfig {
    pub fn write_ttl(&self) -> Option<Duration> {
        (self.expire_after_write > 0).then(|| Duration::from_secs(self.expire_after_write))
    }

    pub fn access_ttl(&self) -> Option<Duration> {
        (self.expire_after_access > 0).then(|| Duration::from_secs(self.expire_after_access))
    }
}

impl Default for LocalTierConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 100,
            maximum_size: 10_000,
            expire_after_write: 300,
            expire_after_access: 0,
        }
    }
}

/// Entry store expiry and null-value policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// TTL in seconds applied to every stored value
    pub default_expiration: u64,
    /// Whether a null value is cached or treated as an eviction
    pub cache_null_values: bool,
    /// TTL in seconds for cached nulls, 0 = use `default_expiration`
    pub null_value_expiration: u64,
}

impl StoreConfig {
    /// TTL for a stored value, picking the null TTL when it applies.
    pub fn ttl_for(&self, is_null: bool) -> Duration {
        if is_null && self.null_value_expiration > 0 {
            Duration::from_secs(self.null_value_expiration)
        } else {
            Duration::from_secs(self.default_expiration)
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            default_expiration: 7200,
            cache_null_values: true,
            null_value_expiration: 60,
        }
    }
}

/// Complete configuration for a cache node.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub local: LocalTierConfig,
    pub store: StoreConfig,
    /// Broadcast topic for invalidation messages
    pub sync_topic: String,
    /// Background sweep interval in seconds
    pub sweep_interval: u64,
    /// HTTP port of the admin surface
    pub server_port: u16,
}

impl CacheConfig {
    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_LOCAL_INITIAL_CAPACITY` (default: 100)
    /// - `CACHE_LOCAL_MAXIMUM_SIZE` (default: 10000)
    /// - `CACHE_LOCAL_EXPIRE_AFTER_WRITE` seconds (default: 300)
    /// - `CACHE_LOCAL_EXPIRE_AFTER_ACCESS` seconds (default: 0)
    /// - `CACHE_DEFAULT_EXPIRATION` seconds (default: 7200)
    /// - `CACHE_NULL_VALUES` (default: true)
    /// - `CACHE_NULL_VALUE_EXPIRATION` seconds (default: 60)
    /// - `CACHE_SYNC_TOPIC` (default: `cache:sync:topic`)
    /// - `CACHE_SWEEP_INTERVAL` seconds (default: 1)
    /// - `SERVER_PORT` (default: 3000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            local: LocalTierConfig {
                initial_capacity: env_or(
                    "CACHE_LOCAL_INITIAL_CAPACITY",
                    defaults.local.initial_capacity,
                ),
                maximum_size: env_or("CACHE_LOCAL_MAXIMUM_SIZE", defaults.local.maximum_size),
                expire_after_write: env_or(
                    "CACHE_LOCAL_EXPIRE_AFTER_WRITE",
                    defaults.local.expire_after_write,
                ),
                expire_after_access: env_or(
                    "CACHE_LOCAL_EXPIRE_AFTER_ACCESS",
                    defaults.local.expire_after_access,
                ),
            },
            store: StoreConfig {
                default_expiration: env_or(
                    "CACHE_DEFAULT_EXPIRATION",
                    defaults.store.default_expiration,
                ),
                cache_null_values: env_or("CACHE_NULL_VALUES", defaults.store.cache_null_values),
                null_value_expiration: env_or(
                    "CACHE_NULL_VALUE_EXPIRATION",
                    defaults.store.null_value_expiration,
                ),
            },
            sync_topic: env::var("CACHE_SYNC_TOPIC").unwrap_or(defaults.sync_topic),
            sweep_interval: env_or("CACHE_SWEEP_INTERVAL", defaults.sweep_interval),
            server_port: env_or("SERVER_PORT", defaults.server_port),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            local: LocalTierConfig::default(),
            store: StoreConfig::default(),
            sync_topic: DEFAULT_SYNC_TOPIC.to_string(),
            sweep_interval: 1,
            server_port: 3000,
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
