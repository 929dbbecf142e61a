// src/core/registry/connector.rs

//! Establishes physical connections for the registry.

use super::session::{SessionHealth, StoreConnection};
use crate::core::profile::ConnectionParams;
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncConnectionConfig, PushKind, RedisResult};
use tokio::sync::mpsc;
use tracing::debug;

/// Opens one physical connection for a set of parameters.
///
/// `health` exists before the connect runs. An implementation must arrange for
/// `health.mark_error()` to be called when the transport goes away, so the
/// registry can replace a dead session before handing it out again.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Connection: StoreConnection;

    async fn connect(
        &self,
        params: &ConnectionParams,
        health: SessionHealth,
    ) -> RedisResult<Self::Connection>;
}

/// Connects with the `redis` crate's multiplexed async connection.
///
/// The handshake (`AUTH`, `SELECT db`) runs as part of `connect`; a failed
/// handshake drops the half-open socket before the error is returned.
#[derive(Debug, Default, Clone, Copy)]
pub struct RedisConnector;

#[async_trait]
impl Connector for RedisConnector {
    type Connection = MultiplexedConnection;

    async fn connect(
        &self,
        params: &ConnectionParams,
        health: SessionHealth,
    ) -> RedisResult<MultiplexedConnection> {
        let client = redis::Client::open(params.connection_info())?;

        // The driver reports a disconnect on this channel and drops the sender
        // when it stops; either ends the session.
        let (push_tx, mut push_rx) = mpsc::unbounded_channel();
        let config = AsyncConnectionConfig::new().set_push_sender(push_tx);

        let mut conn = client
            .get_multiplexed_async_connection_with_config(&config)
            .await?;
        // A server that accepts the socket but refuses commands is not ready.
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;

        // Pushes sent before this point stay buffered in the channel.
        let label = params.display_key();
        tokio::spawn(async move {
            while let Some(push) = push_rx.recv().await {
                if push.kind == PushKind::Disconnection {
                    break;
                }
            }
            debug!("Connection to {} closed", label);
            health.mark_error();
        });
        Ok(conn)
    }
}
