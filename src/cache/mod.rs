//! Cache Module
//!
//! Two-tier caching: a bounded local tier per process in front of the shared
//! entry store, grouped into named caches held by a process-wide registry.

mod entry;
mod key_lock;
mod local;
mod lru;
mod named;
mod registry;
mod stats;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use entry::CacheEntry;
pub use key_lock::{KeyLockGuard, KeyLocks};
pub use local::{LocalTier, RemovalCause, RemovalListener};
pub use lru::LruTracker;
pub use named::NamedCache;
pub use registry::CacheRegistry;
pub use stats::{LocalTierStats, NamedCacheStats, TierCounters};

// == Public Constants ==
/// Maximum allowed cache name length in bytes
pub const MAX_NAME_LENGTH: usize = 128;

/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;
