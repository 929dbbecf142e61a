// src/core/mutation/set.rs

//! Member-level writes for sets and sorted sets.

use super::ScoredMember;
use crate::core::SpinelScopeError;
use crate::core::registry::{Session, StoreConnection};

pub async fn add_members<C: StoreConnection>(
    session: &Session<C>,
    key: &str,
    members: &[String],
) -> Result<Option<i64>, SpinelScopeError> {
    let added: i64 = session
        .query(redis::cmd("SADD").arg(key).arg(members))
        .await?;
    Ok(Some(added))
}

pub async fn remove_members<C: StoreConnection>(
    session: &Session<C>,
    key: &str,
    members: &[String],
) -> Result<Option<i64>, SpinelScopeError> {
    let removed: i64 = session
        .query(redis::cmd("SREM").arg(key).arg(members))
        .await?;
    Ok(Some(removed))
}

/// `ZADD key score member ...`. Existing members get their score updated.
pub async fn zadd_members<C: StoreConnection>(
    session: &Session<C>,
    key: &str,
    members: &[ScoredMember],
) -> Result<Option<i64>, SpinelScopeError> {
    let mut cmd = redis::cmd("ZADD");
    cmd.arg(key);
    for scored in members {
        cmd.arg(scored.score).arg(&scored.member);
    }
    let added: i64 = session.query(&cmd).await?;
    Ok(Some(added))
}

pub async fn zremove_members<C: StoreConnection>(
    session: &Session<C>,
    key: &str,
    members: &[String],
) -> Result<Option<i64>, SpinelScopeError> {
    let removed: i64 = session
        .query(redis::cmd("ZREM").arg(key).arg(members))
        .await?;
    Ok(Some(removed))
}
