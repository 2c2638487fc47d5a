//! Tiered Cache node
//!
//! Runs one cache instance with in-memory backends and serves the admin API.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tiered_cache::api::create_router;
use tiered_cache::{
    spawn_sweep_task, AppState, CacheConfig, CacheRegistry, MemoryBroadcast, MemoryEntryStore,
};

/// Main entry point for a cache node.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create the registry and subscribe it to the sync topic
/// 4. Start background expiry sweep
/// 5. Serve the admin API on the configured port
/// 6. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tiered_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting tiered cache node");

    let config = CacheConfig::from_env();
    info!(
        "Configuration loaded: maximum_size={}, expire_after_write={}s, default_expiration={}s, topic={}, port={}",
        config.local.maximum_size,
        config.local.expire_after_write,
        config.store.default_expiration,
        config.sync_topic,
        config.server_port
    );

    let registry = CacheRegistry::start(
        config.clone(),
        Arc::new(MemoryEntryStore::new()),
        Arc::new(MemoryBroadcast::new()),
    )
    .await
    .context("failed to subscribe to the sync topic")?;
    info!(instance_id = %registry.instance_id(), "Cache registry ready");

    let sweep_handle = spawn_sweep_task(registry.clone(), config.sweep_interval);

    let app = create_router(AppState::new(registry.clone()));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Admin API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    sweep_handle.abort();
    registry.shutdown();
    warn!("Sweep task and sync subscriber stopped");
    info!("Node shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
