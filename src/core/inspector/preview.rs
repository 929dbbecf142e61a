// src/core/inspector/preview.rs

//! Request normalization and the response envelope of the inspection protocol.

use crate::core::SpinelScopeError;
use serde::Serialize;

pub const DEFAULT_PREVIEW_LIMIT: usize = 200;
pub const MAX_PREVIEW_LIMIT: usize = 1000;

/// Cursor value meaning "start of the collection" on input and "no more pages"
/// on output.
pub const CURSOR_DONE: &str = "0";

/// Normalized inputs of one inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewOptions {
    pub key: String,
    /// Clamped to `[1, MAX_PREVIEW_LIMIT]`.
    pub limit: usize,
    /// Opaque resumption token for hash and set previews.
    pub cursor: String,
    /// First list index to return.
    pub start_offset: u64,
}

impl PreviewOptions {
    /// Applies the protocol's defaults and silent clamping. Out-of-range numbers
    /// are corrected, never rejected.
    pub fn new(
        key: impl Into<String>,
        limit: Option<i64>,
        cursor: Option<String>,
        start_offset: Option<i64>,
    ) -> Self {
        let limit = match limit {
            Some(n) if n < 1 => 1,
            Some(n) => (n as u64).min(MAX_PREVIEW_LIMIT as u64) as usize,
            None => DEFAULT_PREVIEW_LIMIT,
        };
        let cursor = cursor
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| CURSOR_DONE.to_string());
        let start_offset = start_offset.filter(|s| *s >= 0).unwrap_or(0) as u64;
        Self {
            key: key.into(),
            limit,
            cursor,
            start_offset,
        }
    }

    /// Rejects an empty key or a malformed cursor. Issues no backend calls.
    pub fn validate(&self) -> Result<ResumeCursor, SpinelScopeError> {
        if self.key.is_empty() {
            return Err(SpinelScopeError::KeyRequired);
        }
        ResumeCursor::parse(&self.cursor)
    }

    pub fn is_first_page(&self) -> bool {
        self.cursor == CURSOR_DONE
    }
}

/// A position inside a hash/set scan: the store's native cursor plus the number
/// of entries of that step already handed out.
///
/// Rendered as `"<native>"`, or `"<native>@<skip>/<count>"` when resuming inside
/// a step. Small collections come back whole from a single step whatever
/// `COUNT` says, and larger ones may return more than asked, so a preview
/// smaller than the step resumes by skipping into it. The step is replayed with
/// the `COUNT` it was first run with, which keeps it identical even when the
/// next request asks for a different limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResumeCursor {
    pub native: u64,
    pub skip: usize,
    /// `COUNT` of the step `skip` points into. `None` for `"<native>@<skip>"`
    /// tokens, which replay with the current limit.
    pub step_count: Option<usize>,
}

impl ResumeCursor {
    pub const START: ResumeCursor = ResumeCursor {
        native: 0,
        skip: 0,
        step_count: None,
    };

    /// The start of a fresh step.
    pub fn at(native: u64) -> Self {
        Self {
            native,
            skip: 0,
            step_count: None,
        }
    }

    pub fn parse(raw: &str) -> Result<Self, SpinelScopeError> {
        let invalid = || SpinelScopeError::invalid(format!("invalid cursor '{raw}'"));
        let Some((native, position)) = raw.split_once('@') else {
            return Ok(Self::at(raw.parse::<u64>().map_err(|_| invalid())?));
        };
        let (skip, step_count) = match position.split_once('/') {
            Some((skip, count)) => {
                let count = count.parse::<usize>().map_err(|_| invalid())?;
                if count == 0 {
                    return Err(invalid());
                }
                (skip, Some(count))
            }
            None => (position, None),
        };
        Ok(Self {
            native: native.parse::<u64>().map_err(|_| invalid())?,
            skip: skip.parse::<usize>().map_err(|_| invalid())?,
            step_count,
        })
    }

    /// The `COUNT` to run this cursor's step with.
    pub fn count_for(&self, limit: usize) -> usize {
        match self.step_count {
            Some(count) if self.skip > 0 => count,
            _ => limit,
        }
    }

    pub fn is_done(&self) -> bool {
        self.native == 0 && self.skip == 0
    }
}

impl std::fmt::Display for ResumeCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.skip, self.step_count) {
            (0, _) => write!(f, "{}", self.native),
            (skip, Some(count)) => write!(f, "{}@{}/{}", self.native, skip, count),
            (skip, None) => write!(f, "{}@{}", self.native, skip),
        }
    }
}

/// The type reported to the caller, after reclassification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyKind {
    None,
    String,
    /// A string whose bytes are a probabilistic-set encoding.
    HyperLogLog,
    Hash,
    List,
    Set,
    ZSet,
    Json,
    Unsupported(String),
}

impl KeyKind {
    /// Maps the store's `TYPE` reply. Both document-module type names map to `Json`.
    pub fn from_native(native: &str) -> Self {
        match native {
            "none" => KeyKind::None,
            "string" => KeyKind::String,
            "hash" => KeyKind::Hash,
            "list" => KeyKind::List,
            "set" => KeyKind::Set,
            "zset" => KeyKind::ZSet,
            "ReJSON-RL" | "json" => KeyKind::Json,
            // Stores that expose the encoding natively skip the check entirely.
            "hyperloglog" => KeyKind::HyperLogLog,
            other => KeyKind::Unsupported(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            KeyKind::None => "none",
            KeyKind::String => "string",
            KeyKind::HyperLogLog => "hyperloglog",
            KeyKind::Hash => "hash",
            KeyKind::List => "list",
            KeyKind::Set => "set",
            KeyKind::ZSet => "zset",
            KeyKind::Json => "json",
            KeyKind::Unsupported(native) => native,
        }
    }
}

/// Metadata attached to every preview. Only `memory_bytes` is always present;
/// the other fields appear for the types that produce them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewMeta {
    /// Best-effort `MEMORY USAGE`; `null` when the lookup fails.
    pub memory_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub truncated: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<i64>,
    /// Approximate cardinality of a probabilistic set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    /// Encoded size of a probabilistic set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<u64>,
}

/// The single response shape of the inspection protocol.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResponse {
    #[serde(rename = "type")]
    pub key_type: String,
    pub value: serde_json::Value,
    /// Whole seconds; `-1` when the key has no expiry or does not exist.
    pub ttl_seconds: i64,
    pub meta: PreviewMeta,
}
