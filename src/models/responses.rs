//! Response DTOs for the admin API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::cache::NamedCacheStats;
use crate::sync::SyncState;

/// Response body for GET /caches/:name/entries/:key
#[derive(Debug, Clone, Serialize)]
pub struct EntryResponse {
    pub cache: String,
    pub key: String,
    /// `null` when a null is cached
    pub value: Value,
}

impl EntryResponse {
    pub fn new(cache: impl Into<String>, key: impl Into<String>, value: Value) -> Self {
        Self {
            cache: cache.into(),
            key: key.into(),
            value,
        }
    }
}

/// Response body for PUT /caches/:name/entries/:key
#[derive(Debug, Clone, Serialize)]
pub struct PutEntryResponse {
    pub message: String,
    pub cache: String,
    pub key: String,
    /// False when `ifAbsent` found an existing value
    pub written: bool,
    /// The existing value that prevented an `ifAbsent` write
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<Value>,
}

impl PutEntryResponse {
    pub fn written(cache: impl Into<String>, key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' stored successfully", key),
            cache: cache.into(),
            key,
            written: true,
            previous: None,
        }
    }

    pub fn kept(cache: impl Into<String>, key: impl Into<String>, previous: Value) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' already present", key),
            cache: cache.into(),
            key,
            written: false,
            previous: Some(previous),
        }
    }
}

/// Response body for DELETE /caches/:name/entries/:key
#[derive(Debug, Clone, Serialize)]
pub struct EvictResponse {
    pub message: String,
    pub cache: String,
    pub key: String,
}

impl EvictResponse {
    pub fn new(cache: impl Into<String>, key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' evicted successfully", key),
            cache: cache.into(),
            key,
        }
    }
}

/// Response body for DELETE /caches/:name
#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    pub message: String,
    pub cache: String,
}

impl ClearResponse {
    pub fn new(cache: impl Into<String>) -> Self {
        let cache = cache.into();
        Self {
            message: format!(
                "Local tiers of '{}' cleared; entry store keys expire by TTL",
                cache
            ),
            cache,
        }
    }
}

/// Response body for GET /caches
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheListResponse {
    pub instance_id: Uuid,
    pub caches: Vec<String>,
}

/// Response body for GET /stats and GET /caches/:name/stats
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub instance_id: Uuid,
    pub caches: Vec<NamedCacheStats>,
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    pub instance_id: Uuid,
    /// Whether peer invalidations are being received
    pub sync: SyncState,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    pub fn healthy(instance_id: Uuid, sync: SyncState) -> Self {
        Self {
            status: "healthy".to_string(),
            instance_id,
            sync,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
