//! Sync Message
//!
//! Wire payload describing one invalidation event. Encoded as JSON:
//!
//! ```text
//! {"originInstanceId":"<uuid>","cacheName":"goods","type":"EVICT","key":"a"}
//! {"originInstanceId":"<uuid>","cacheName":"goods","type":"CLEAR"}
//! ```

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CacheError, Result};

/// What the receiver should drop from its local tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncOp {
    /// Drop one key
    Evict { key: String },
    /// Drop the whole local tier
    Clear,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncMessage {
    /// Instance that published the message
    pub origin_instance_id: Uuid,
    pub cache_name: String,
    #[serde(flatten)]
    pub op: SyncOp,
}

impl SyncMessage {
    pub fn evict(origin: Uuid, cache_name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            origin_instance_id: origin,
            cache_name: cache_name.into(),
            op: SyncOp::Evict { key: key.into() },
        }
    }

    pub fn clear(origin: Uuid, cache_name: impl Into<String>) -> Self {
        Self {
            origin_instance_id: origin,
            cache_name: cache_name.into(),
            op: SyncOp::Clear,
        }
    }

    /// The evicted key, `None` for a clear.
    pub fn key(&self) -> Option<&str> {
        match &self.op {
            SyncOp::Evict { key } => Some(key),
            SyncOp::Clear => None,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| CacheError::MalformedMessage(e.to_string()))
    }
}
