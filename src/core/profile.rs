// src/core/profile.rs

//! Connection profiles and the read-only boundary to the profile store.
//!
//! Profiles are owned by an external configuration store; the core only ever
//! resolves them. A resolved profile, or an explicit set of parameters supplied
//! by the caller, is turned into [`ConnectionParams`], whose [`CompositeKey`]
//! decides which live session serves the request.

use crate::core::SpinelScopeError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A saved connection profile as handed out by the profile store.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionProfile {
    pub id: String,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default, alias = "default_db")]
    pub default_db: Option<i64>,
    #[serde(default, alias = "display_name")]
    pub display_name: Option<String>,
}

fn default_port() -> u16 {
    6379
}

// Hand-written so passwords never end up in log lines.
impl fmt::Debug for ConnectionProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionProfile")
            .field("id", &self.id)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("default_db", &self.default_db)
            .field("display_name", &self.display_name)
            .finish()
    }
}

/// How a request names the backend it wants to talk to.
#[derive(Clone, PartialEq, Eq)]
pub enum ConnectionTarget {
    /// A saved profile, resolved through the [`ProfileStore`].
    Profile(String),
    /// Literal parameters that bypass the profile store.
    Explicit {
        host: String,
        port: u16,
        username: Option<String>,
        password: Option<String>,
        db: Option<i64>,
    },
}

impl fmt::Debug for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionTarget::Profile(id) => f.debug_tuple("Profile").field(id).finish(),
            ConnectionTarget::Explicit { host, port, db, .. } => f
                .debug_struct("Explicit")
                .field("host", host)
                .field("port", port)
                .field("db", db)
                .finish_non_exhaustive(),
        }
    }
}

/// The fully resolved physical parameters of a session.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    pub host: String,
    pub port: u16,
    pub db: i64,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ConnectionParams {
    /// Builds the parameters for a profile, applying `dbOverride ?? defaultDb ?? 0`.
    pub fn from_profile(profile: &ConnectionProfile, db_override: Option<i64>) -> Self {
        Self {
            host: profile.host.clone(),
            port: profile.port,
            db: db_override.or(profile.default_db).unwrap_or(0),
            username: profile.username.clone(),
            password: profile.password.clone(),
        }
    }

    /// The key that decides session sharing. Includes the credential.
    pub fn composite_key(&self) -> CompositeKey {
        CompositeKey {
            host: self.host.clone(),
            port: self.port,
            db: self.db,
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }

    /// A `host:port/db` label safe for logs.
    pub fn display_key(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.db)
    }

    /// Converts the parameters into the `redis` crate's connection description.
    pub fn connection_info(&self) -> redis::ConnectionInfo {
        redis::ConnectionInfo {
            addr: redis::ConnectionAddr::Tcp(self.host.clone(), self.port),
            redis: redis::RedisConnectionInfo {
                db: self.db,
                username: self.username.clone(),
                password: self.password.clone(),
                ..Default::default()
            },
        }
    }
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConnectionParams({})", self.display_key())
    }
}

/// `host:port:db:credential`. Two profiles with different passwords to the same
/// endpoint never share a session.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CompositeKey {
    host: String,
    port: u16,
    db: i64,
    username: Option<String>,
    password: Option<String>,
}

impl CompositeKey {
    /// The credential-free label used when logging about this key.
    pub fn display_key(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.db)
    }

    pub fn db(&self) -> i64 {
        self.db
    }
}

impl fmt::Debug for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CompositeKey({})", self.display_key())
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_key())
    }
}

/// The read-only interface of the external connection-profile store.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Resolves an identifier to a profile, or `None` when it is unknown.
    async fn resolve(&self, id: &str) -> Result<Option<ConnectionProfile>, SpinelScopeError>;
}

/// A profile store backed by the `[[connections]]` entries of the config file.
#[derive(Debug, Default)]
pub struct StaticProfileStore {
    profiles: HashMap<String, ConnectionProfile>,
}

impl StaticProfileStore {
    pub fn new(profiles: impl IntoIterator<Item = ConnectionProfile>) -> Self {
        Self {
            profiles: profiles.into_iter().map(|p| (p.id.clone(), p)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[async_trait]
impl ProfileStore for StaticProfileStore {
    async fn resolve(&self, id: &str) -> Result<Option<ConnectionProfile>, SpinelScopeError> {
        Ok(self.profiles.get(id).cloned())
    }
}
