//! Tiered Cache - a local cache backed by a shared entry store
//!
//! Each process keeps a bounded local tier per named cache in front of a
//! shared key-value store. Evictions and clears are broadcast over a
//! publish/subscribe channel so peer processes drop their stale local copies.

pub mod api;
pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod sync;
pub mod tasks;

pub use api::AppState;
pub use backend::{BroadcastChannel, EntryStore, MemoryBroadcast, MemoryEntryStore};
pub use cache::{CacheRegistry, LocalTier, NamedCache, RemovalCause};
pub use config::CacheConfig;
pub use error::{BoxError, CacheError, Result};
pub use sync::{SyncMessage, Synchronizer};
pub use tasks::spawn_sweep_task;
