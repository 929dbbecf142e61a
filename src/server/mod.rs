// src/server/mod.rs

//! The HTTP shell around the core: routing, body decoding and the response
//! envelope.

use crate::config::Config;
use crate::core::registry::Connector;
use anyhow::{Context, Result};
use axum::Router;
use axum::routing::{get, post};
use std::sync::Arc;
use tracing::info;

mod context;
mod error;
mod handlers;
mod initialization;
mod metrics_server;
mod request;
mod response;

pub use context::{AppState, ServerContext};
pub use error::ApiError;
pub use request::TargetSpec;
pub use response::{DeleteResponse, Envelope};

/// Builds the API router over any connector.
pub fn router<K: Connector>(state: Arc<AppState<K>>, metrics_enabled: bool) -> Router {
    let mut app = Router::new()
        .route("/api/keys/scan", post(handlers::handle_scan::<K>))
        .route("/api/keys/preview", post(handlers::handle_preview::<K>))
        .route("/api/keys/mutate", post(handlers::handle_mutate::<K>))
        .route("/api/keys/delete", post(handlers::handle_delete::<K>))
        .route("/api/keys/ttl", post(handlers::handle_ttl::<K>))
        .route("/api/sessions", get(handlers::handle_sessions::<K>));
    if metrics_enabled {
        app = app.route("/metrics", get(metrics_server::metrics_handler));
    }
    app.with_state(state)
}

/// The main server startup function: bind, serve until a shutdown signal,
/// then close every backend session.
pub async fn run(config: Config) -> Result<()> {
    let ctx = initialization::setup(config).await?;
    let state = Arc::clone(&ctx.state);
    let app = router(Arc::clone(&ctx.state), ctx.metrics_enabled);

    axum::serve(ctx.listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    state.registry.clear();
    info!("SpinelScope shut down.");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("SIGINT received, initiating graceful shutdown."),
                    _ = sigterm.recv() => info!("SIGTERM received, initiating graceful shutdown."),
                }
                return;
            }
            Err(e) => tracing::warn!("Failed to register SIGTERM handler: {}", e),
        }
    }
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("SIGINT received, initiating graceful shutdown.");
    }
}
