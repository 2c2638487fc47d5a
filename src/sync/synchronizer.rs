//! Synchronizer
//!
//! Turns local evict/clear calls into broadcast messages and applies
//! messages from peer instances to the matching local tier.
//!
//! Lifecycle: `Idle` until [`Synchronizer::subscribe`] registers the receive
//! loop, then `Subscribed` until [`Synchronizer::shutdown`]. Publishing works
//! in both states.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::backend::BroadcastChannel;
use crate::cache::CacheRegistry;
use crate::error::{CacheError, Result};
use crate::sync::{SyncMessage, SyncOp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SyncState {
    Idle,
    Subscribed,
}

/// What the receive handler did with one payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The named cache dropped the key or its whole local tier
    Applied,
    /// Published by this instance; ignored
    SelfEcho,
    /// No cache of that name exists here; ignored
    UnknownCache,
    /// Payload did not decode; dropped
    Malformed,
}

pub struct Synchronizer {
    instance_id: Uuid,
    topic: String,
    channel: Arc<dyn BroadcastChannel>,
    subscribed: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Synchronizer {
    /// Creates an idle synchronizer with a fresh random instance id.
    pub fn new(channel: Arc<dyn BroadcastChannel>, topic: impl Into<String>) -> Self {
        Self {
            instance_id: Uuid::new_v4(),
            topic: topic.into(),
            channel,
            subscribed: AtomicBool::new(false),
            task: Mutex::new(None),
        }
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn state(&self) -> SyncState {
        if self.subscribed.load(Ordering::Acquire) {
            SyncState::Subscribed
        } else {
            SyncState::Idle
        }
    }

    // == Publish ==
    /// Tells peers to drop `key` from their local tier of `cache_name`.
    pub async fn publish_evict(&self, cache_name: &str, key: &str) {
        self.publish(SyncMessage::evict(self.instance_id, cache_name, key))
            .await;
    }

    /// Tells peers to empty their local tier of `cache_name`.
    pub async fn publish_clear(&self, cache_name: &str) {
        self.publish(SyncMessage::clear(self.instance_id, cache_name))
            .await;
    }

    /// Best-effort: failures are logged, never returned. The caller's store
    /// and local mutations have already happened.
    async fn publish(&self, message: SyncMessage) {
        let payload = match message.encode() {
            Ok(payload) => payload,
            Err(e) => {
                error!(cache = %message.cache_name, error = %e, "failed to encode sync message");
                return;
            }
        };

        match self.channel.publish(&self.topic, payload).await {
            Ok(()) => debug!(
                cache = %message.cache_name,
                key = ?message.key(),
                topic = %self.topic,
                "published sync message"
            ),
            Err(e) => error!(
                cache = %message.cache_name,
                key = ?message.key(),
                topic = %self.topic,
                error = %e,
                "failed to publish sync message"
            ),
        }
    }

    // == Subscribe ==
    /// Registers the receive loop on the sync topic. Messages are resolved
    /// against `registry`; the loop ends once the registry is dropped or the
    /// channel closes the subscription.
    pub async fn subscribe(&self, registry: Weak<CacheRegistry>) -> Result<()> {
        if self
            .subscribed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(CacheError::AlreadySubscribed);
        }

        let mut subscription = match self.channel.subscribe(&self.topic).await {
            Ok(subscription) => subscription,
            Err(e) => {
                self.subscribed.store(false, Ordering::Release);
                return Err(e);
            }
        };

        let instance_id = self.instance_id;
        let handle = tokio::spawn(async move {
            while let Some(payload) = subscription.recv().await {
                let Some(registry) = registry.upgrade() else {
                    break;
                };
                dispatch(instance_id, &payload, &registry);
            }
            debug!(%instance_id, "sync subscriber loop finished");
        });

        *self.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        info!(
            topic = %self.topic,
            instance_id = %self.instance_id,
            "cache sync listener registered"
        );
        Ok(())
    }

    // == Receive ==
    /// Applies one received payload to `registry`.
    pub fn handle_payload(&self, payload: &[u8], registry: &CacheRegistry) -> SyncOutcome {
        dispatch(self.instance_id, payload, registry)
    }

    /// Stops the receive loop. Publishing keeps working.
    pub fn shutdown(&self) {
        if let Some(handle) = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
            self.subscribed.store(false, Ordering::Release);
        }
    }
}

impl Drop for Synchronizer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Synchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Synchronizer")
            .field("instance_id", &self.instance_id)
            .field("topic", &self.topic)
            .field("state", &self.state())
            .finish()
    }
}

fn dispatch(instance_id: Uuid, payload: &[u8], registry: &CacheRegistry) -> SyncOutcome {
    let message = match SyncMessage::decode(payload) {
        Ok(message) => message,
        Err(e) => {
            warn!(error = %e, "dropping malformed sync message");
            return SyncOutcome::Malformed;
        }
    };

    if message.origin_instance_id == instance_id {
        return SyncOutcome::SelfEcho;
    }

    let Some(cache) = registry.lookup(&message.cache_name) else {
        debug!(cache = %message.cache_name, "sync message for unknown cache ignored");
        return SyncOutcome::UnknownCache;
    };

    match &message.op {
        SyncOp::Evict { key } => {
            cache.clear_local(Some(key));
            debug!(cache = %message.cache_name, key = %key, "applied remote evict");
        }
        SyncOp::Clear => {
            cache.clear_local(None);
            debug!(cache = %message.cache_name, "applied remote clear");
        }
    }
    SyncOutcome::Applied
}
