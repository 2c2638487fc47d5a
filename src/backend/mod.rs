//! Backend Module
//!
//! External collaborators consumed through narrow interfaces: the shared
//! entry store and the broadcast channel, plus in-memory implementations.

mod channel;
mod store;

pub use channel::{BroadcastChannel, MemoryBroadcast, Subscription, DEFAULT_QUEUE_CAPACITY};
pub use store::{EntryStore, MemoryEntryStore};
