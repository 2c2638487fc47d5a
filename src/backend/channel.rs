//! Broadcast Channel
//!
//! Named topics delivering byte messages to every live subscriber. Delivery
//! is best-effort: no ordering across publishers, and a message may be lost
//! or delivered more than once.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::warn;

use crate::error::Result;

/// Incoming messages for one subscription. Closed when the channel drops it.
pub type Subscription = mpsc::Receiver<Vec<u8>>;

/// Default per-subscriber queue depth of [`MemoryBroadcast`].
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Publish/subscribe transport shared by every instance.
#[async_trait]
pub trait BroadcastChannel: Send + Sync {
    /// Sends `payload` to every current subscriber of `topic`.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()>;

    /// Registers a new subscriber on `topic`.
    async fn subscribe(&self, topic: &str) -> Result<Subscription>;
}

// == Memory Broadcast ==
/// In-process broadcast hub. Subscribers whose queue is full miss the
/// message; subscribers that hung up are pruned on the next publish.
#[derive(Debug)]
pub struct MemoryBroadcast {
    topics: Mutex<HashMap<String, Vec<mpsc::Sender<Vec<u8>>>>>,
    queue_capacity: usize,
}

impl MemoryBroadcast {
    pub fn new() -> Self {
        Self::with_queue_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_queue_capacity(queue_capacity: usize) -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Live subscribers on `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(topic)
            .map(|subscribers| subscribers.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }
}

impl Default for MemoryBroadcast {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BroadcastChannel for MemoryBroadcast {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        let mut topics = self.topics.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(subscribers) = topics.get_mut(topic) else {
            return Ok(());
        };

        subscribers.retain(|tx| match tx.try_send(payload.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(topic, "subscriber queue full, message dropped");
                true
            }
            Err(TrySendError::Closed(_)) => false,
        });
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<Subscription> {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        self.topics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(topic.to_string())
            .or_default()
            .push(tx);
        Ok(rx)
    }
}
