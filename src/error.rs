//! Error types for the tiered cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

/// Boxed error returned by caller-supplied loaders.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

// == Cache Error Enum ==
/// Unified error type for the tiered cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The loader passed to `NamedCache::get` failed; nothing was cached
    #[error("Loader failed for key '{key}' in cache '{cache}': {source}")]
    LoadFailure {
        cache: String,
        key: String,
        #[source]
        source: BoxError,
    },

    /// The shared entry store could not be reached
    #[error("Entry store unavailable: {0}")]
    BackendUnavailable(String),

    /// Publishing to the broadcast channel failed
    #[error("Broadcast failed: {0}")]
    Broadcast(String),

    /// A sync message could not be decoded
    #[error("Malformed sync message: {0}")]
    MalformedMessage(String),

    /// Value could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The synchronizer already has a live subscription
    #[error("Synchronizer is already subscribed")]
    AlreadySubscribed,

    /// Cache or key not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl CacheError {
    /// Wraps a loader error for the given cache and key.
    pub fn load_failure(cache: &str, key: &str, source: impl Into<BoxError>) -> Self {
        CacheError::LoadFailure {
            cache: cache.to_string(),
            key: key.to_string(),
            source: source.into(),
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::BackendUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::LoadFailure { .. } => StatusCode::BAD_GATEWAY,
            CacheError::Broadcast(_)
            | CacheError::MalformedMessage(_)
            | CacheError::Serialization(_)
            | CacheError::AlreadySubscribed => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the tiered cache.
pub type Result<T> = std::result::Result<T, CacheError>;
