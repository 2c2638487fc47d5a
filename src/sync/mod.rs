//! Sync Module
//!
//! Cross-instance invalidation over the broadcast channel.

mod message;
mod synchronizer;

pub use message::{SyncMessage, SyncOp};
pub use synchronizer::{SyncOutcome, SyncState, Synchronizer};
