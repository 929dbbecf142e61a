// src/core/mutation/list.rs

//! List writes.
//!
//! The store has no delete-by-index primitive. [`remove_at`] overwrites the
//! element with a marker unique to this call and then removes that marker by
//! value.

use super::PushPosition;
use crate::core::SpinelScopeError;
use crate::core::registry::{Session, StoreConnection};
use uuid::Uuid;

const REMOVAL_MARKER_PREFIX: &str = "__spinelscope_removed__:";

/// A value no other element can hold: it embeds a fresh v4 UUID.
pub fn removal_marker() -> String {
    format!("{REMOVAL_MARKER_PREFIX}{}", Uuid::new_v4())
}

/// `LPUSH`/`RPUSH`. Returns the new length.
pub async fn push<C: StoreConnection>(
    session: &Session<C>,
    key: &str,
    values: &[String],
    position: PushPosition,
) -> Result<Option<i64>, SpinelScopeError> {
    let command = match position {
        PushPosition::Head => "LPUSH",
        PushPosition::Tail => "RPUSH",
    };
    let len: i64 = session.query(redis::cmd(command).arg(key).arg(values)).await?;
    Ok(Some(len))
}

/// `LSET key index value`.
pub async fn set_at<C: StoreConnection>(
    session: &Session<C>,
    key: &str,
    index: i64,
    value: &str,
) -> Result<Option<i64>, SpinelScopeError> {
    session
        .query::<()>(redis::cmd("LSET").arg(key).arg(index).arg(value))
        .await?;
    Ok(None)
}

/// Removes the element at `index`: `LSET` a unique marker, then `LREM key 1 marker`.
///
/// Between the two calls the marker is visible to other readers.
pub async fn remove_at<C: StoreConnection>(
    session: &Session<C>,
    key: &str,
    index: i64,
) -> Result<Option<i64>, SpinelScopeError> {
    let marker = removal_marker();
    session
        .query::<()>(redis::cmd("LSET").arg(key).arg(index).arg(&marker))
        .await?;
    let removed: i64 = session
        .query(redis::cmd("LREM").arg(key).arg(1).arg(&marker))
        .await?;
    Ok(Some(removed))
}
