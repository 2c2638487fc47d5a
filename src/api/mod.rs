//! API Module
//!
//! Admin HTTP surface of a cache node.
//!
//! # Endpoints
//! - `GET /caches/:name/entries/:key` - Two-level lookup
//! - `PUT /caches/:name/entries/:key` - Write through both tiers
//! - `DELETE /caches/:name/entries/:key` - Evict from both tiers and peers
//! - `DELETE /caches/:name` - Clear local tiers on this node and peers
//! - `GET /caches` - Cache names on this node
//! - `GET /caches/:name/stats` - Statistics of one cache
//! - `GET /stats` - Statistics of every cache
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
