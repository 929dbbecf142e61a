// src/core/mutation/mod.rs

//! Type-specific writes.
//!
//! A [`Mutation`] names a key, an optional TTL and one [`MutationOp`]. It is
//! validated in full before the first backend call, so a malformed request never
//! causes a partial write. The TTL is applied by a separate call after the
//! primary write succeeds; the two are not atomic, and a failure between them
//! leaves the value persisted without its TTL.

pub mod hash;
pub mod hyperloglog;
pub mod list;
pub mod scalar;
pub mod set;

use crate::core::SpinelScopeError;
use crate::core::registry::{Session, StoreConnection};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Where a list push inserts its values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PushPosition {
    Head,
    #[default]
    Tail,
}

/// A sorted-set member with its score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredMember {
    pub member: String,
    pub score: f64,
}

/// One write, tagged by `op` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum MutationOp {
    /// Replaces the key with a plain string.
    SetString { value: String },
    /// Replaces the key with a document.
    SetJson { document: serde_json::Value },
    /// Replaces the key with a hash built from a flat object.
    SetHash {
        fields: IndexMap<String, serde_json::Value>,
    },
    HashSetField { field: String, value: String },
    HashDeleteField { fields: Vec<String> },
    ListPush {
        values: Vec<String>,
        #[serde(default)]
        position: PushPosition,
    },
    ListSet { index: i64, value: String },
    ListRemove { index: i64 },
    SetAdd { members: Vec<String> },
    SetRemove { members: Vec<String> },
    ZSetAdd { members: Vec<ScoredMember> },
    ZSetRemove { members: Vec<String> },
    HllAdd { elements: Vec<String> },
    HllReset,
    HllMerge { sources: Vec<String> },
}

impl MutationOp {
    pub fn name(&self) -> &'static str {
        match self {
            MutationOp::SetString { .. } => "setString",
            MutationOp::SetJson { .. } => "setJson",
            MutationOp::SetHash { .. } => "setHash",
            MutationOp::HashSetField { .. } => "hashSetField",
            MutationOp::HashDeleteField { .. } => "hashDeleteField",
            MutationOp::ListPush { .. } => "listPush",
            MutationOp::ListSet { .. } => "listSet",
            MutationOp::ListRemove { .. } => "listRemove",
            MutationOp::SetAdd { .. } => "setAdd",
            MutationOp::SetRemove { .. } => "setRemove",
            MutationOp::ZSetAdd { .. } => "zSetAdd",
            MutationOp::ZSetRemove { .. } => "zSetRemove",
            MutationOp::HllAdd { .. } => "hllAdd",
            MutationOp::HllReset => "hllReset",
            MutationOp::HllMerge { .. } => "hllMerge",
        }
    }
}

/// A write against one key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mutation {
    #[serde(default)]
    pub key: String,
    /// Seconds; `-1` removes any expiry; absent leaves it untouched.
    #[serde(default)]
    pub ttl: Option<i64>,
    #[serde(flatten)]
    pub op: MutationOp,
}

/// The result of a successful write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationAck {
    pub key: String,
    pub op: String,
    /// The integer reply of the primary write, where the store gives one.
    pub affected: Option<i64>,
    pub ttl_applied: bool,
}

/// How a TTL argument translates into a follow-up command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    Keep,
    Persist,
    Seconds(u64),
}

impl Expiry {
    pub fn from_ttl(ttl: Option<i64>) -> Result<Self, SpinelScopeError> {
        match ttl {
            None => Ok(Expiry::Keep),
            Some(-1) => Ok(Expiry::Persist),
            Some(t) if t > 0 => Ok(Expiry::Seconds(t as u64)),
            Some(t) => Err(SpinelScopeError::invalid(format!(
                "ttl must be a positive number of seconds or -1, got {t}"
            ))),
        }
    }
}

impl Mutation {
    /// Checks the key, the TTL and the payload shape. Issues no backend calls.
    pub fn validate(&self) -> Result<Expiry, SpinelScopeError> {
        require_key(&self.key)?;
        let expiry = Expiry::from_ttl(self.ttl)?;
        match &self.op {
            MutationOp::SetString { .. } => {}
            MutationOp::SetJson { document } => {
                if document.is_null() {
                    return Err(SpinelScopeError::invalid("document is required"));
                }
            }
            MutationOp::SetHash { fields } => {
                if fields.is_empty() {
                    return Err(SpinelScopeError::invalid("fields must not be empty"));
                }
                for (field, value) in fields {
                    hash::scalar_to_string(field, value)?;
                }
            }
            MutationOp::HashSetField { field, .. } => require_non_empty("field", field)?,
            MutationOp::HashDeleteField { fields } => require_items("fields", fields)?,
            MutationOp::ListPush { values, .. } => require_items("values", values)?,
            MutationOp::ListSet { .. } | MutationOp::ListRemove { .. } => {}
            MutationOp::SetAdd { members } | MutationOp::SetRemove { members } => {
                require_items("members", members)?
            }
            MutationOp::ZSetAdd { members } => {
                if members.is_empty() {
                    return Err(SpinelScopeError::invalid("members must not be empty"));
                }
                if let Some(bad) = members.iter().find(|m| !m.score.is_finite()) {
                    return Err(SpinelScopeError::invalid(format!(
                        "score of '{}' must be a finite number",
                        bad.member
                    )));
                }
            }
            MutationOp::ZSetRemove { members } => require_items("members", members)?,
            MutationOp::HllAdd { elements } => require_items("elements", elements)?,
            MutationOp::HllReset => {}
            MutationOp::HllMerge { sources } => {
                require_items("sources", sources)?;
                for source in sources {
                    require_key(source)?;
                }
            }
        }
        Ok(expiry)
    }
}

/// Validates and applies a mutation, then applies its TTL.
pub async fn apply<C: StoreConnection>(
    session: &Session<C>,
    mutation: &Mutation,
) -> Result<MutationAck, SpinelScopeError> {
    let expiry = mutation.validate()?;
    let key = mutation.key.as_str();

    let affected = match &mutation.op {
        MutationOp::SetString { value } => scalar::set_string(session, key, value).await?,
        MutationOp::SetJson { document } => scalar::set_json(session, key, document).await?,
        MutationOp::SetHash { fields } => hash::replace(session, key, fields).await?,
        MutationOp::HashSetField { field, value } => {
            hash::set_field(session, key, field, value).await?
        }
        MutationOp::HashDeleteField { fields } => hash::delete_fields(session, key, fields).await?,
        MutationOp::ListPush { values, position } => {
            list::push(session, key, values, *position).await?
        }
        MutationOp::ListSet { index, value } => list::set_at(session, key, *index, value).await?,
        MutationOp::ListRemove { index } => list::remove_at(session, key, *index).await?,
        MutationOp::SetAdd { members } => set::add_members(session, key, members).await?,
        MutationOp::SetRemove { members } => set::remove_members(session, key, members).await?,
        MutationOp::ZSetAdd { members } => set::zadd_members(session, key, members).await?,
        MutationOp::ZSetRemove { members } => set::zremove_members(session, key, members).await?,
        MutationOp::HllAdd { elements } => hyperloglog::add(session, key, elements).await?,
        MutationOp::HllReset => hyperloglog::reset(session, key).await?,
        MutationOp::HllMerge { sources } => hyperloglog::merge(session, key, sources).await?,
    };

    let ttl_applied = apply_expiry(session, key, expiry).await?;
    debug!(
        "Applied {} to '{}' on {} (ttl applied: {})",
        mutation.op.name(),
        key,
        session.key(),
        ttl_applied
    );

    Ok(MutationAck {
        key: mutation.key.clone(),
        op: mutation.op.name().to_string(),
        affected,
        ttl_applied,
    })
}

/// Changes only the expiry of an existing key.
pub async fn update_ttl<C: StoreConnection>(
    session: &Session<C>,
    key: &str,
    ttl: Option<i64>,
) -> Result<MutationAck, SpinelScopeError> {
    let expiry = validate_ttl_update(key, ttl)?;
    let ttl_applied = apply_expiry(session, key, expiry).await?;
    Ok(MutationAck {
        key: key.to_string(),
        op: "updateTtl".to_string(),
        affected: None,
        ttl_applied,
    })
}

/// A standalone TTL update needs both a key and an explicit TTL.
pub fn validate_ttl_update(key: &str, ttl: Option<i64>) -> Result<Expiry, SpinelScopeError> {
    require_key(key)?;
    match Expiry::from_ttl(ttl)? {
        Expiry::Keep => Err(SpinelScopeError::invalid("ttl is required")),
        expiry => Ok(expiry),
    }
}

/// Deletes whole keys. Returns how many existed.
pub async fn delete_keys<C: StoreConnection>(
    session: &Session<C>,
    keys: &[String],
) -> Result<i64, SpinelScopeError> {
    validate_keys(keys)?;
    let deleted: i64 = session.query(redis::cmd("DEL").arg(keys)).await?;
    Ok(deleted)
}

pub fn validate_keys(keys: &[String]) -> Result<(), SpinelScopeError> {
    require_items("keys", keys)?;
    keys.iter().try_for_each(|key| require_key(key))
}

/// Returns whether the expiry command reported a change.
async fn apply_expiry<C: StoreConnection>(
    session: &Session<C>,
    key: &str,
    expiry: Expiry,
) -> Result<bool, SpinelScopeError> {
    match expiry {
        Expiry::Keep => Ok(false),
        Expiry::Persist => {
            let changed: i64 = session.query(redis::cmd("PERSIST").arg(key)).await?;
            Ok(changed == 1)
        }
        Expiry::Seconds(seconds) => {
            let changed: i64 = session.query(redis::cmd("EXPIRE").arg(key).arg(seconds)).await?;
            Ok(changed == 1)
        }
    }
}

fn require_key(key: &str) -> Result<(), SpinelScopeError> {
    if key.is_empty() {
        Err(SpinelScopeError::KeyRequired)
    } else {
        Ok(())
    }
}

fn require_non_empty(name: &str, value: &str) -> Result<(), SpinelScopeError> {
    if value.is_empty() {
        Err(SpinelScopeError::invalid(format!("{name} is required")))
    } else {
        Ok(())
    }
}

fn require_items<T>(name: &str, items: &[T]) -> Result<(), SpinelScopeError> {
    if items.is_empty() {
        Err(SpinelScopeError::invalid(format!("{name} must not be empty")))
    } else {
        Ok(())
    }
}
