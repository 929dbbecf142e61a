// src/core/registry/mod.rs

//! The connection registry: the sole owner of backend sessions.
//!
//! Sessions are keyed by their physical parameters (host, port, db and
//! credential), not by the profile identifier, so any number of saved profiles
//! that point at the same endpoint share one socket.
//!
//! Each map slot holds a shared connect future. The first caller for a new key
//! inserts the future; every concurrent caller for the same key awaits that same
//! future, so exactly one physical connect attempt happens and all callers see
//! the same session or the same failure.

pub mod connector;
pub mod session;

pub use connector::{Connector, RedisConnector};
pub use session::{Session, SessionHealth, SessionState, StoreConnection};

use crate::core::SpinelScopeError;
use crate::core::metrics;
use crate::core::profile::{CompositeKey, ConnectionParams, ConnectionTarget, ProfileStore};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

type SessionResult<C> = Result<Arc<Session<C>>, Arc<SpinelScopeError>>;
type SessionSlot<C> = Shared<BoxFuture<'static, SessionResult<C>>>;

/// Bounded retry for connection establishment.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Fixed delay between attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff: Duration::from_millis(200),
        }
    }
}

/// One row of [`ConnectionRegistry::snapshot`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub display_key: String,
    pub db: i64,
    pub state: SessionState,
}

/// What a lookup found in a slot, captured before the entry is modified.
enum SlotStatus<C> {
    Ready(Arc<Session<C>>),
    Pending(SessionSlot<C>),
    Stale,
    Failed,
}

/// Maps composite keys to live sessions and owns their lifecycle.
pub struct ConnectionRegistry<K: Connector> {
    connector: Arc<K>,
    profiles: Arc<dyn ProfileStore>,
    sessions: DashMap<CompositeKey, SessionSlot<K::Connection>>,
    retry: RetryPolicy,
}

impl<K: Connector> ConnectionRegistry<K> {
    pub fn new(connector: K, profiles: Arc<dyn ProfileStore>, retry: RetryPolicy) -> Self {
        Self {
            connector: Arc::new(connector),
            profiles,
            sessions: DashMap::new(),
            retry,
        }
    }

    pub fn connector(&self) -> &K {
        &self.connector
    }

    /// Resolves a target into physical parameters without touching any session.
    pub async fn resolve(
        &self,
        target: &ConnectionTarget,
        db_override: Option<i64>,
    ) -> Result<ConnectionParams, SpinelScopeError> {
        match target {
            ConnectionTarget::Profile(id) => {
                let profile = self
                    .profiles
                    .resolve(id)
                    .await?
                    .ok_or_else(|| SpinelScopeError::ConnectionNotFound(id.clone()))?;
                Ok(ConnectionParams::from_profile(&profile, db_override))
            }
            ConnectionTarget::Explicit {
                host,
                port,
                username,
                password,
                db,
            } => Ok(ConnectionParams {
                host: host.clone(),
                port: *port,
                db: db_override.or(*db).unwrap_or(0),
                username: username.clone(),
                password: password.clone(),
            }),
        }
    }

    /// Returns the session for `target`, creating it if needed.
    ///
    /// A `Ready` or `Connecting` slot is returned as-is; staleness is only
    /// detected lazily, when a session has already flipped to `Error`.
    pub async fn acquire(
        &self,
        target: &ConnectionTarget,
        db_override: Option<i64>,
    ) -> Result<Arc<Session<K::Connection>>, SpinelScopeError> {
        let params = self.resolve(target, db_override).await?;
        self.acquire_params(params).await
    }

    /// Like [`acquire`](Self::acquire) for parameters that are already resolved.
    pub async fn acquire_params(
        &self,
        params: ConnectionParams,
    ) -> Result<Arc<Session<K::Connection>>, SpinelScopeError> {
        let key = params.composite_key();

        let pending = match self.sessions.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                let status = match occupied.get().peek() {
                    Some(Ok(session)) if session.is_usable() => SlotStatus::Ready(session.clone()),
                    Some(Ok(_)) => SlotStatus::Stale,
                    Some(Err(_)) => SlotStatus::Failed,
                    None => SlotStatus::Pending(occupied.get().clone()),
                };
                match status {
                    SlotStatus::Ready(session) => return Ok(session),
                    SlotStatus::Pending(slot) => {
                        debug!("Session {} is connecting; joining the attempt", key);
                        slot
                    }
                    SlotStatus::Stale => {
                        // Dropping the old slot releases our handle; requests still
                        // holding the session finish on it and then drop it too.
                        info!("Evicting failed session {}", key);
                        metrics::SESSION_EVICTIONS_TOTAL.inc();
                        metrics::LIVE_SESSIONS.dec();
                        let slot = self.connect_slot(params);
                        occupied.insert(slot.clone());
                        slot
                    }
                    SlotStatus::Failed => {
                        let slot = self.connect_slot(params);
                        occupied.insert(slot.clone());
                        slot
                    }
                }
            }
            Entry::Vacant(vacant) => {
                debug!("No session for {}; creating one", key);
                let slot = self.connect_slot(params);
                vacant.insert(slot.clone());
                slot
            }
        };

        // The map guard is released above; awaiting here never blocks other keys.
        match pending.await {
            Ok(session) => Ok(session),
            Err(e) => {
                self.sessions
                    .remove_if(&key, |_, slot| matches!(slot.peek(), Some(Err(_))));
                Err((*e).clone())
            }
        }
    }

    /// Builds the lazy connect future for a slot. Nothing runs until it is polled.
    fn connect_slot(&self, params: ConnectionParams) -> SessionSlot<K::Connection> {
        let connector = Arc::clone(&self.connector);
        let retry = self.retry;
        async move {
            connect_with_retry(connector.as_ref(), params, retry)
                .await
                .map(Arc::new)
                .map_err(Arc::new)
        }
        .boxed()
        .shared()
    }

    /// Number of slots currently held, pending ones included.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Lists all slots with their credential-free label and state.
    pub fn snapshot(&self) -> Vec<SessionInfo> {
        let mut rows: Vec<SessionInfo> = self
            .sessions
            .iter()
            .map(|entry| SessionInfo {
                display_key: entry.key().display_key(),
                db: entry.key().db(),
                state: slot_state(entry.value()),
            })
            .collect();
        rows.sort_by(|a, b| a.display_key.cmp(&b.display_key));
        rows
    }

    /// Drops the session for `target`. Returns whether a slot existed.
    pub async fn evict(
        &self,
        target: &ConnectionTarget,
        db_override: Option<i64>,
    ) -> Result<bool, SpinelScopeError> {
        let params = self.resolve(target, db_override).await?;
        let removed = self.sessions.remove(&params.composite_key());
        if let Some((key, slot)) = &removed {
            info!("Session {} evicted on request", key);
            metrics::SESSION_EVICTIONS_TOTAL.inc();
            if matches!(slot.peek(), Some(Ok(_))) {
                metrics::LIVE_SESSIONS.dec();
            }
        }
        Ok(removed.is_some())
    }

    /// Drops every session. Used on shutdown.
    pub fn clear(&self) {
        let live = self
            .sessions
            .iter()
            .filter(|entry| matches!(entry.value().peek(), Some(Ok(_))))
            .count();
        self.sessions.clear();
        metrics::LIVE_SESSIONS.sub(live as f64);
        info!("Closed {} backend session(s)", live);
    }
}

fn slot_state<C: StoreConnection>(slot: &SessionSlot<C>) -> SessionState {
    match slot.peek() {
        None => SessionState::Connecting,
        Some(Ok(session)) => session.state(),
        Some(Err(_)) => SessionState::Error,
    }
}

/// At most `1 + max_retries` attempts with a fixed backoff in between. Each
/// attempt gets a fresh health flag, attached before the connect runs.
async fn connect_with_retry<K: Connector>(
    connector: &K,
    params: ConnectionParams,
    retry: RetryPolicy,
) -> Result<Session<K::Connection>, SpinelScopeError> {
    let label = params.display_key();
    let mut attempt: u32 = 0;
    loop {
        metrics::CONNECT_ATTEMPTS_TOTAL.inc();
        let health = SessionHealth::new(label.as_str());
        match connector.connect(&params, health.clone()).await {
            Ok(connection) => {
                info!("Connected to {} (attempt {})", label, attempt + 1);
                metrics::LIVE_SESSIONS.inc();
                return Ok(Session::new(params.composite_key(), connection, health));
            }
            Err(e) if attempt < retry.max_retries => {
                attempt += 1;
                warn!(
                    "Connect to {} failed: {}. Retrying in {:?} ({}/{})",
                    label, e, retry.backoff, attempt, retry.max_retries
                );
                tokio::time::sleep(retry.backoff).await;
            }
            Err(e) => {
                error!("Giving up on {} after {} attempt(s): {}", label, attempt + 1, e);
                metrics::CONNECT_FAILURES_TOTAL.inc();
                return Err(SpinelScopeError::BackendUnreachable {
                    target: label,
                    reason: e.to_string(),
                });
            }
        }
    }
}
