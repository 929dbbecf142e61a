// src/server/initialization.rs

//! Handles the server initialization process, from the validated configuration
//! to a bound listener and the shared application state.

use super::context::{AppState, ServerContext};
use crate::config::Config;
use crate::core::profile::StaticProfileStore;
use crate::core::registry::RedisConnector;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Initializes all server components before serving requests.
pub async fn setup(config: Config) -> Result<ServerContext> {
    log_startup_info(&config);

    let profiles = StaticProfileStore::new(config.connections.iter().cloned());
    if profiles.is_empty() {
        warn!("No connection profiles configured; only explicit targets can be used.");
    } else {
        info!("Loaded {} connection profile(s).", profiles.len());
    }

    let state = Arc::new(AppState::new(
        RedisConnector,
        Arc::new(profiles),
        config.registry.retry_policy(),
        config.scan.defaults(),
    ));
    info!("Session registry initialized.");

    let listener = TcpListener::bind((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", config.host, config.port))?;
    info!("SpinelScope listening on http://{}:{}", config.host, config.port);

    Ok(ServerContext {
        state,
        listener,
        metrics_enabled: config.metrics.enabled,
    })
}

fn log_startup_info(config: &Config) {
    info!(
        "Connect policy: {} retr{} with {:?} backoff.",
        config.registry.connect_retries,
        if config.registry.connect_retries == 1 { "y" } else { "ies" },
        config.registry.retry_backoff
    );
    info!(
        "Scan defaults: hard cap {} keys, page size {}.",
        config.scan.hard_cap, config.scan.page_size
    );
    if config.metrics.enabled {
        info!("Prometheus metrics enabled on /metrics.");
    }
}
