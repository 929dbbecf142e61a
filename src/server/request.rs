// src/server/request.rs

//! HTTP request bodies.
//!
//! Bodies are decoded by hand rather than through the `Json` extractor so that a
//! malformed body is reported in the same envelope as every other failure.

use crate::core::SpinelScopeError;
use crate::core::profile::ConnectionTarget;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

const DEFAULT_BACKEND_PORT: u16 = 6379;

/// Decodes a JSON body; any shape error becomes a validation failure.
pub fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, SpinelScopeError> {
    Ok(serde_json::from_slice(body)?)
}

/// The part of every request that names the backend: a saved profile or
/// literal connection parameters, plus an optional database override.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetSpec {
    #[serde(default)]
    pub connection_id: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default, alias = "dbOverride")]
    pub db: Option<i64>,
}

impl TargetSpec {
    /// Returns the target and the database override. A profile identifier wins
    /// over explicit parameters when both are present.
    pub fn into_target(self) -> Result<(ConnectionTarget, Option<i64>), SpinelScopeError> {
        if let Some(db) = self.db
            && db < 0
        {
            return Err(SpinelScopeError::invalid(format!(
                "db must be a non-negative index, got {db}"
            )));
        }
        if let Some(id) = self.connection_id.filter(|id| !id.trim().is_empty()) {
            return Ok((ConnectionTarget::Profile(id), self.db));
        }
        match self.host.filter(|host| !host.trim().is_empty()) {
            Some(host) => Ok((
                ConnectionTarget::Explicit {
                    host,
                    port: self.port.unwrap_or(DEFAULT_BACKEND_PORT),
                    username: self.username,
                    password: self.password,
                    db: None,
                },
                self.db,
            )),
            None => Err(SpinelScopeError::invalid("connectionId or host is required")),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRequest {
    #[serde(flatten)]
    pub target: TargetSpec,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub hard_cap: Option<usize>,
    #[serde(default)]
    pub page_size: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewRequest {
    #[serde(flatten)]
    pub target: TargetSpec,
    #[serde(default)]
    pub key: String,
    #[serde(default, deserialize_with = "lenient_limit")]
    pub preview_limit: Option<i64>,
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default, deserialize_with = "lenient_offset")]
    pub start_offset: Option<i64>,
}

/// Accepts any JSON number or numeric string. Fractions are truncated and
/// huge values saturate, so the inspector's clamp applies. Anything else
/// reads as absent and gets the default.
fn lenient_limit<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    let number = match &value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f as i64))
        }
        _ => None,
    };
    Ok(number)
}

/// Only a whole number is an offset; anything else reads as absent, which
/// starts the list at 0.
fn lenient_offset<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_i64())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRequest {
    #[serde(flatten)]
    pub target: TargetSpec,
    #[serde(default)]
    pub keys: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TtlRequest {
    #[serde(flatten)]
    pub target: TargetSpec,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub ttl: Option<i64>,
}
