// src/core/mutation/scalar.rs

//! Full-value replacement of strings and documents.

use crate::core::SpinelScopeError;
use crate::core::registry::{Session, StoreConnection};

/// `SET key value`. Replaces any existing value and clears its expiry.
pub async fn set_string<C: StoreConnection>(
    session: &Session<C>,
    key: &str,
    value: &str,
) -> Result<Option<i64>, SpinelScopeError> {
    session
        .query::<()>(redis::cmd("SET").arg(key).arg(value))
        .await?;
    Ok(None)
}

/// `JSON.SET key $ <document>`. Requires the document module on the backend.
pub async fn set_json<C: StoreConnection>(
    session: &Session<C>,
    key: &str,
    document: &serde_json::Value,
) -> Result<Option<i64>, SpinelScopeError> {
    let serialized = serde_json::to_string(document)
        .map_err(|e| SpinelScopeError::Internal(format!("failed to serialize document: {e}")))?;
    session
        .query::<()>(redis::cmd("JSON.SET").arg(key).arg("$").arg(serialized))
        .await?;
    Ok(None)
}
