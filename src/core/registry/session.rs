// src/core/registry/session.rs

//! A single live connection to a backend endpoint at one database index.

use crate::core::SpinelScopeError;
use crate::core::profile::CompositeKey;
use redis::aio::ConnectionLike;
use redis::{Cmd, FromRedisValue, Pipeline, RedisError, RedisResult};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use tracing::warn;

/// Any cloneable async connection the registry can hand out.
///
/// `redis::aio::MultiplexedConnection` is the production implementation;
/// clones share one socket.
pub trait StoreConnection: ConnectionLike + Clone + Send + Sync + 'static {}

impl<T> StoreConnection for T where T: ConnectionLike + Clone + Send + Sync + 'static {}

/// The lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// The connect attempt is still in flight.
    Connecting,
    Ready,
    /// A connection-level failure was observed; evicted on the next acquire.
    Error,
}

const STATE_READY: u8 = 0;
const STATE_ERROR: u8 = 1;

/// The health flag of one session.
///
/// Created before the connect runs and handed to the [`Connector`], which wires
/// it to whatever disconnect notification its transport offers. Clones share
/// the flag.
///
/// [`Connector`]: super::Connector
#[derive(Debug, Clone)]
pub struct SessionHealth {
    label: Arc<str>,
    state: Arc<AtomicU8>,
}

impl SessionHealth {
    pub fn new(label: impl Into<Arc<str>>) -> Self {
        Self {
            label: label.into(),
            state: Arc::new(AtomicU8::new(STATE_READY)),
        }
    }

    pub fn state(&self) -> SessionState {
        match self.state.load(Ordering::Acquire) {
            STATE_READY => SessionState::Ready,
            _ => SessionState::Error,
        }
    }

    pub fn mark_error(&self) {
        if self.state.swap(STATE_ERROR, Ordering::AcqRel) != STATE_ERROR {
            warn!("Session {} marked as failed", self.label);
        }
    }
}

/// One live socket, shared by every request that resolves to the same
/// composite key. Only the registry creates or drops sessions.
#[derive(Debug)]
pub struct Session<C> {
    key: CompositeKey,
    connection: C,
    health: SessionHealth,
}

impl<C: StoreConnection> Session<C> {
    pub(crate) fn new(key: CompositeKey, connection: C, health: SessionHealth) -> Self {
        Self {
            key,
            connection,
            health,
        }
    }

    pub fn key(&self) -> &CompositeKey {
        &self.key
    }

    pub fn db(&self) -> i64 {
        self.key.db()
    }

    /// The state of an established session is either `Ready` or `Error`;
    /// `Connecting` is only ever reported by the registry for pending slots.
    pub fn state(&self) -> SessionState {
        self.health.state()
    }

    pub fn is_usable(&self) -> bool {
        self.state() == SessionState::Ready
    }

    pub fn mark_error(&self) {
        self.health.mark_error();
    }

    /// Runs a single command and records connection-level failures.
    pub async fn query<T: FromRedisValue>(&self, cmd: &Cmd) -> Result<T, SpinelScopeError> {
        let mut conn = self.connection.clone();
        let result: RedisResult<T> = cmd.query_async(&mut conn).await;
        self.observe(result)
    }

    /// Runs a pipeline in one round trip and records connection-level failures.
    pub async fn query_pipeline<T: FromRedisValue>(&self, pipe: &Pipeline) -> Result<T, SpinelScopeError> {
        let mut conn = self.connection.clone();
        let result: RedisResult<T> = pipe.query_async(&mut conn).await;
        self.observe(result)
    }

    /// Command-level rejections (`WRONGTYPE`, unknown command, ...) leave the
    /// session healthy and surface as `BackendCommand`. Broken transports flip
    /// it to `Error` and surface as `BackendUnreachable`.
    fn observe<T>(&self, result: RedisResult<T>) -> Result<T, SpinelScopeError> {
        result.map_err(|e| {
            if is_connection_failure(&e) {
                self.mark_error();
                SpinelScopeError::BackendUnreachable {
                    target: self.key.display_key(),
                    reason: e.to_string(),
                }
            } else {
                SpinelScopeError::BackendCommand(e.to_string())
            }
        })
    }
}

fn is_connection_failure(e: &RedisError) -> bool {
    e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal()
}
