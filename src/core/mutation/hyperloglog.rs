// src/core/mutation/hyperloglog.rs

//! Probabilistic-set writes.

use crate::core::SpinelScopeError;
use crate::core::registry::{Session, StoreConnection};

/// `PFADD key element...`. Returns 1 when the estimate changed.
pub async fn add<C: StoreConnection>(
    session: &Session<C>,
    key: &str,
    elements: &[String],
) -> Result<Option<i64>, SpinelScopeError> {
    let changed: i64 = session
        .query(redis::cmd("PFADD").arg(key).arg(elements))
        .await?;
    Ok(Some(changed))
}

/// Replaces the key with an empty probabilistic set: `DEL` then a bare `PFADD`
/// in one transaction.
pub async fn reset<C: StoreConnection>(
    session: &Session<C>,
    key: &str,
) -> Result<Option<i64>, SpinelScopeError> {
    let mut pipe = redis::pipe();
    pipe.atomic()
        .cmd("DEL")
        .arg(key)
        .ignore()
        .cmd("PFADD")
        .arg(key);
    let replies: Vec<i64> = session.query_pipeline(&pipe).await?;
    Ok(replies.first().copied())
}

/// `PFMERGE key source...`. The destination itself is part of the union.
pub async fn merge<C: StoreConnection>(
    session: &Session<C>,
    key: &str,
    sources: &[String],
) -> Result<Option<i64>, SpinelScopeError> {
    session
        .query::<()>(redis::cmd("PFMERGE").arg(key).arg(sources))
        .await?;
    Ok(None)
}
