// src/core/mutation/hash.rs

//! Hash writes: whole-object replacement and field-level edits.

use crate::core::SpinelScopeError;
use crate::core::registry::{Session, StoreConnection};
use indexmap::IndexMap;
use serde_json::Value;

/// Hash values are flat: strings, numbers and booleans are stored as their
/// textual form, anything nested is rejected.
pub fn scalar_to_string(field: &str, value: &Value) -> Result<String, SpinelScopeError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(SpinelScopeError::invalid(format!(
            "value of field '{field}' must be a string, number or boolean"
        ))),
    }
}

/// Replaces the whole hash: `DEL` then `HSET` in one transaction.
pub async fn replace<C: StoreConnection>(
    session: &Session<C>,
    key: &str,
    fields: &IndexMap<String, Value>,
) -> Result<Option<i64>, SpinelScopeError> {
    let mut pipe = redis::pipe();
    pipe.atomic().cmd("DEL").arg(key).ignore().cmd("HSET").arg(key);
    for (field, value) in fields {
        pipe.arg(field).arg(scalar_to_string(field, value)?);
    }
    let replies: Vec<i64> = session.query_pipeline(&pipe).await?;
    Ok(replies.first().copied())
}

/// `HSET key field value`. Returns 1 when the field is new.
pub async fn set_field<C: StoreConnection>(
    session: &Session<C>,
    key: &str,
    field: &str,
    value: &str,
) -> Result<Option<i64>, SpinelScopeError> {
    let added: i64 = session
        .query(redis::cmd("HSET").arg(key).arg(field).arg(value))
        .await?;
    Ok(Some(added))
}

/// `HDEL key field...`. Returns how many fields existed.
pub async fn delete_fields<C: StoreConnection>(
    session: &Session<C>,
    key: &str,
    fields: &[String],
) -> Result<Option<i64>, SpinelScopeError> {
    let removed: i64 = session
        .query(redis::cmd("HDEL").arg(key).arg(fields))
        .await?;
    Ok(Some(removed))
}
