// src/core/scanner.rs

//! Bounded, deduplicated enumeration of the keyspace.

use crate::core::SpinelScopeError;
use crate::core::metrics;
use crate::core::registry::{Session, StoreConnection};
use indexmap::IndexSet;
use redis::Value;
use serde::Serialize;
use tracing::{debug, warn};

pub const DEFAULT_HARD_CAP: usize = 1000;
pub const DEFAULT_PAGE_SIZE: usize = 100;
const MAX_HARD_CAP: usize = 10_000;
const MAX_PAGE_SIZE: usize = 1000;

/// Type reported for keys whose type lookup failed.
pub const UNKNOWN_TYPE: &str = "unknown";

/// Parameters of one keyspace scan.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub pattern: String,
    /// Maximum number of unique keys returned. Truncation is silent.
    pub hard_cap: usize,
    /// `COUNT` hint passed to every `SCAN` step.
    pub page_size: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            pattern: "*".to_string(),
            hard_cap: DEFAULT_HARD_CAP,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ScanOptions {
    /// Fills in defaults and clamps the numeric knobs to sane bounds.
    pub fn normalized(
        pattern: Option<String>,
        hard_cap: Option<usize>,
        page_size: Option<usize>,
        defaults: &ScanOptions,
    ) -> Self {
        let pattern = pattern
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| defaults.pattern.clone());
        Self {
            pattern,
            hard_cap: hard_cap.unwrap_or(defaults.hard_cap).clamp(1, MAX_HARD_CAP),
            page_size: page_size.unwrap_or(defaults.page_size).clamp(1, MAX_PAGE_SIZE),
        }
    }
}

/// A key and its native type name.
///
/// Keys that are not valid UTF-8 are rendered with `U+FFFD` in place of the
/// invalid bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyEntry {
    pub key: String,
    #[serde(rename = "type")]
    pub key_type: String,
}

/// Enumerates keys matching `options.pattern`.
///
/// `SCAN` may return a key more than once; results are deduplicated on the raw
/// key bytes in first-seen order, so binary keys that render alike stay apart. Enumeration stops when the cursor returns to `"0"` or
/// `hard_cap` unique keys have been collected. Types are then fetched in one
/// pipelined round trip.
pub async fn scan_keys<C: StoreConnection>(
    session: &Session<C>,
    options: &ScanOptions,
) -> Result<Vec<KeyEntry>, SpinelScopeError> {
    let mut keys: IndexSet<Vec<u8>> = IndexSet::new();
    let mut cursor = "0".to_string();

    'scan: loop {
        let (next_cursor, batch): (String, Vec<Vec<u8>>) = session
            .query(
                redis::cmd("SCAN")
                    .arg(&cursor)
                    .arg("MATCH")
                    .arg(&options.pattern)
                    .arg("COUNT")
                    .arg(options.page_size),
            )
            .await?;

        for key in batch {
            keys.insert(key);
            if keys.len() >= options.hard_cap {
                debug!(
                    "Scan of '{}' on {} stopped at the cap of {} keys",
                    options.pattern,
                    session.key(),
                    options.hard_cap
                );
                break 'scan;
            }
        }

        if next_cursor == "0" {
            break;
        }
        cursor = next_cursor;
    }

    let keys: Vec<Vec<u8>> = keys.into_iter().collect();
    let types = lookup_types(session, &keys).await;

    Ok(keys
        .iter()
        .zip(types)
        .map(|(key, key_type)| KeyEntry {
            key: String::from_utf8_lossy(key).into_owned(),
            key_type,
        })
        .collect())
}

/// Fetches the type of every key. Never fails: an unreadable reply becomes
/// `"unknown"` for that key alone.
async fn lookup_types<C: StoreConnection>(session: &Session<C>, keys: &[Vec<u8>]) -> Vec<String> {
    if keys.is_empty() {
        return Vec::new();
    }

    let mut pipe = redis::pipe();
    for key in keys {
        pipe.cmd("TYPE").arg(key);
    }

    match session.query_pipeline::<Vec<Value>>(&pipe).await {
        Ok(replies) => (0..keys.len())
            .map(|i| replies.get(i).map_or_else(|| UNKNOWN_TYPE.to_string(), type_name))
            .collect(),
        Err(e) => {
            warn!(
                "Pipelined TYPE lookup for {} keys failed ({}); falling back to per-key lookups",
                keys.len(),
                e
            );
            let mut types = Vec::with_capacity(keys.len());
            for key in keys {
                let key_type = match session.query::<String>(redis::cmd("TYPE").arg(key)).await {
                    Ok(t) => t,
                    Err(_) => {
                        metrics::SWALLOWED_LOOKUP_FAILURES_TOTAL
                            .with_label_values(&["type"])
                            .inc();
                        UNKNOWN_TYPE.to_string()
                    }
                };
                types.push(key_type);
            }
            types
        }
    }
}

fn type_name(reply: &Value) -> String {
    match reply {
        Value::SimpleString(s) => s.clone(),
        Value::BulkString(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        _ => UNKNOWN_TYPE.to_string(),
    }
}
