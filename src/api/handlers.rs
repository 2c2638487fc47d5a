//! API Handlers
//!
//! HTTP request handlers for the admin surface of a cache node.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};

use crate::cache::{CacheRegistry, NamedCache};
use crate::error::{CacheError, Result};
use crate::models::{
    validate_cache_name, validate_key, CacheListResponse, ClearResponse, EntryResponse,
    EvictResponse, HealthResponse, PutEntryRequest, PutEntryResponse, StatsResponse,
};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<CacheRegistry>,
}

impl AppState {
    pub fn new(registry: Arc<CacheRegistry>) -> Self {
        Self { registry }
    }

    /// Resolves a cache for an entry operation, creating it on first use.
    fn cache(&self, name: &str) -> Result<Arc<NamedCache>> {
        if let Some(error_msg) = validate_cache_name(name) {
            return Err(CacheError::InvalidRequest(error_msg));
        }
        Ok(self.registry.get_cache(name))
    }
}

fn check_key(key: &str) -> Result<()> {
    match validate_key(key) {
        Some(error_msg) => Err(CacheError::InvalidRequest(error_msg)),
        None => Ok(()),
    }
}

/// Handler for GET /caches/:name/entries/:key
///
/// Two-level lookup; 404 when neither tier holds the key.
pub async fn get_entry_handler(
    State(state): State<AppState>,
    Path((name, key)): Path<(String, String)>,
) -> Result<Json<EntryResponse>> {
    check_key(&key)?;
    let cache = state.cache(&name)?;

    match cache.lookup(&key).await? {
        Some(value) => Ok(Json(EntryResponse::new(name, key, value))),
        None => Err(CacheError::NotFound(format!("{}:{}", name, key))),
    }
}

/// Handler for PUT /caches/:name/entries/:key
pub async fn put_entry_handler(
    State(state): State<AppState>,
    Path((name, key)): Path<(String, String)>,
    Json(req): Json<PutEntryRequest>,
) -> Result<Json<PutEntryResponse>> {
    check_key(&key)?;
    let cache = state.cache(&name)?;

    if req.if_absent {
        if let Some(previous) = cache.put_if_absent(&key, req.value).await? {
            return Ok(Json(PutEntryResponse::kept(name, key, previous)));
        }
    } else {
        cache.put(&key, req.value).await?;
    }

    Ok(Json(PutEntryResponse::written(name, key)))
}

/// Handler for DELETE /caches/:name/entries/:key
pub async fn evict_entry_handler(
    State(state): State<AppState>,
    Path((name, key)): Path<(String, String)>,
) -> Result<Json<EvictResponse>> {
    check_key(&key)?;
    let cache = state.cache(&name)?;
    cache.evict(&key).await?;

    Ok(Json(EvictResponse::new(name, key)))
}

/// Handler for DELETE /caches/:name
pub async fn clear_cache_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ClearResponse>> {
    let cache = state.cache(&name)?;
    cache.clear().await;

    Ok(Json(ClearResponse::new(name)))
}

/// Handler for GET /caches
pub async fn list_caches_handler(State(state): State<AppState>) -> Json<CacheListResponse> {
    Json(CacheListResponse {
        instance_id: state.registry.instance_id(),
        caches: state.registry.cache_names().into_iter().collect(),
    })
}

/// Handler for GET /caches/:name/stats
///
/// Does not create the cache; 404 if it does not exist on this node.
pub async fn cache_stats_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<StatsResponse>> {
    let cache = state
        .registry
        .lookup(&name)
        .ok_or_else(|| CacheError::NotFound(format!("cache '{}'", name)))?;

    Ok(Json(StatsResponse {
        instance_id: state.registry.instance_id(),
        caches: vec![cache.stats()],
    }))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        instance_id: state.registry.instance_id(),
        caches: state.registry.stats(),
    })
}

/// Handler for GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::healthy(
        state.registry.instance_id(),
        state.registry.synchronizer().state(),
    ))
}
