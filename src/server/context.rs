// src/server/context.rs

use crate::core::profile::ProfileStore;
use crate::core::registry::{ConnectionRegistry, Connector, RedisConnector, RetryPolicy};
use crate::core::scanner::ScanOptions;
use std::sync::Arc;
use tokio::net::TcpListener;

/// State shared by every request handler.
pub struct AppState<K: Connector = RedisConnector> {
    pub registry: ConnectionRegistry<K>,
    /// Scan knobs used when a request leaves them out.
    pub scan_defaults: ScanOptions,
}

impl<K: Connector> AppState<K> {
    pub fn new(
        connector: K,
        profiles: Arc<dyn ProfileStore>,
        retry: RetryPolicy,
        scan_defaults: ScanOptions,
    ) -> Self {
        Self {
            registry: ConnectionRegistry::new(connector, profiles, retry),
            scan_defaults,
        }
    }
}

/// Holds all the initialized state required to run the HTTP server.
pub struct ServerContext {
    pub state: Arc<AppState>,
    pub listener: TcpListener,
    pub metrics_enabled: bool,
}
