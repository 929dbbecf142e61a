// src/core/inspector/mod.rs

//! The value inspection protocol.
//!
//! One entry point, [`inspect`], classifies a key and produces a bounded preview
//! of its value. Every branch fills the same [`PreviewMeta`] envelope, so callers
//! only ever switch on the reported `type`.

pub mod preview;

pub use preview::{
    KeyKind, PreviewMeta, PreviewOptions, PreviewResponse, ResumeCursor, CURSOR_DONE,
    DEFAULT_PREVIEW_LIMIT, MAX_PREVIEW_LIMIT,
};

use crate::core::SpinelScopeError;
use crate::core::metrics;
use crate::core::registry::{Session, StoreConnection};
use serde_json::{Map, Value, json};
use tracing::debug;

/// Inspects `options.key` and returns its preview.
///
/// An absent key is not an error: it is reported with type `"none"`.
pub async fn inspect<C: StoreConnection>(
    session: &Session<C>,
    options: &PreviewOptions,
) -> Result<PreviewResponse, SpinelScopeError> {
    // Reject bad input before talking to the backend.
    let resume = options.validate()?;
    let key = options.key.as_str();

    let mut type_cmd = redis::cmd("TYPE");
    type_cmd.arg(key);
    let mut ttl_cmd = redis::cmd("TTL");
    ttl_cmd.arg(key);

    let (native, ttl, memory_bytes) = tokio::join!(
        session.query::<String>(&type_cmd),
        session.query::<i64>(&ttl_cmd),
        lookup_memory(session, key),
    );
    let native = native?;
    let ttl_seconds = normalize_ttl(ttl?);

    let mut meta = PreviewMeta {
        memory_bytes,
        ..Default::default()
    };

    let (kind, value) = match KeyKind::from_native(&native) {
        KeyKind::None => (KeyKind::None, Value::Null),
        KeyKind::String => preview_string(session, key, &mut meta).await?,
        KeyKind::HyperLogLog => {
            let count: u64 = session.query(redis::cmd("PFCOUNT").arg(key)).await?;
            meta.count = Some(count);
            meta.bytes = lookup_strlen(session, key).await;
            (KeyKind::HyperLogLog, Value::Null)
        }
        KeyKind::Hash => (
            KeyKind::Hash,
            preview_hash(session, options, resume, &mut meta).await?,
        ),
        KeyKind::List => (KeyKind::List, preview_list(session, options, &mut meta).await?),
        KeyKind::Set => (
            KeyKind::Set,
            preview_set(session, options, resume, &mut meta).await?,
        ),
        KeyKind::ZSet => (KeyKind::ZSet, preview_zset(session, key, &mut meta).await?),
        KeyKind::Json => (KeyKind::Json, preview_json(session, key).await?),
        KeyKind::Unsupported(native) => {
            debug!("Key '{}' has unsupported type '{}'", key, native);
            let value = json!({ "unsupported": true, "nativeType": native });
            (KeyKind::Unsupported(native), value)
        }
    };

    Ok(PreviewResponse {
        key_type: kind.as_str().to_string(),
        value,
        ttl_seconds,
        meta,
    })
}

/// `TTL` replies `-1` for persistent keys and `-2` for missing ones; both mean
/// "no expiry" to the caller.
fn normalize_ttl(ttl: i64) -> i64 {
    if ttl < 0 { -1 } else { ttl }
}

async fn lookup_memory<C: StoreConnection>(session: &Session<C>, key: &str) -> Option<u64> {
    let mut cmd = redis::cmd("MEMORY");
    cmd.arg("USAGE").arg(key);
    match session.query::<Option<u64>>(&cmd).await {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!("MEMORY USAGE lookup for '{}' failed: {}", key, e);
            metrics::SWALLOWED_LOOKUP_FAILURES_TOTAL
                .with_label_values(&["memory"])
                .inc();
            None
        }
    }
}

async fn lookup_strlen<C: StoreConnection>(session: &Session<C>, key: &str) -> Option<u64> {
    session.query(redis::cmd("STRLEN").arg(key)).await.ok()
}

/// A `string` may really be a probabilistic-set encoding. `PFCOUNT` only
/// succeeds on such values, so its success reclassifies the key. Its failure is
/// the common case and simply means "plain string".
async fn preview_string<C: StoreConnection>(
    session: &Session<C>,
    key: &str,
    meta: &mut PreviewMeta,
) -> Result<(KeyKind, Value), SpinelScopeError> {
    match session.query::<u64>(redis::cmd("PFCOUNT").arg(key)).await {
        Ok(count) => {
            meta.count = Some(count);
            meta.bytes = lookup_strlen(session, key).await;
            Ok((KeyKind::HyperLogLog, Value::Null))
        }
        Err(e) => {
            debug!("'{}' is a plain string (PFCOUNT: {})", key, e);
            let raw: Option<Vec<u8>> = session.query(redis::cmd("GET").arg(key)).await?;
            let value = raw.map_or(Value::Null, |bytes| Value::String(lossy(bytes)));
            Ok((KeyKind::String, value))
        }
    }
}

/// One `HSCAN` step bounded by the preview limit.
async fn preview_hash<C: StoreConnection>(
    session: &Session<C>,
    options: &PreviewOptions,
    resume: ResumeCursor,
    meta: &mut PreviewMeta,
) -> Result<Value, SpinelScopeError> {
    let key = options.key.as_str();
    let total: u64 = session.query(redis::cmd("HLEN").arg(key)).await?;
    let count = resume.count_for(options.limit);
    let (step_next, flat) = scan_step(session, "HSCAN", key, resume, count).await?;

    let pairs: Vec<(String, String)> = flat
        .chunks_exact(2)
        .map(|pair| (lossy_ref(&pair[0]), lossy_ref(&pair[1])))
        .collect();
    let page = take_page(resume, pairs, step_next, count, options.limit);

    let fields: Map<String, Value> = page
        .items
        .into_iter()
        .map(|(field, value)| (field, Value::String(value)))
        .collect();

    fill_scan_meta(meta, options, total, fields.len() as u64, page.next);
    Ok(Value::Object(fields))
}

/// One `SSCAN` step bounded by the preview limit.
async fn preview_set<C: StoreConnection>(
    session: &Session<C>,
    options: &PreviewOptions,
    resume: ResumeCursor,
    meta: &mut PreviewMeta,
) -> Result<Value, SpinelScopeError> {
    let key = options.key.as_str();
    let total: u64 = session.query(redis::cmd("SCARD").arg(key)).await?;
    let count = resume.count_for(options.limit);
    let (step_next, members) = scan_step(session, "SSCAN", key, resume, count).await?;

    let members: Vec<String> = members.into_iter().map(lossy).collect();
    let page = take_page(resume, members, step_next, count, options.limit);
    let count = page.items.len() as u64;

    fill_scan_meta(meta, options, total, count, page.next);
    Ok(Value::Array(page.items.into_iter().map(Value::String).collect()))
}

/// An inclusive `LRANGE` window starting at `start_offset`.
async fn preview_list<C: StoreConnection>(
    session: &Session<C>,
    options: &PreviewOptions,
    meta: &mut PreviewMeta,
) -> Result<Value, SpinelScopeError> {
    let key = options.key.as_str();
    let start = options.start_offset;
    let fetch_end = start + options.limit as u64 - 1;

    let total: u64 = session.query(redis::cmd("LLEN").arg(key)).await?;
    let items: Vec<Vec<u8>> = session
        .query(redis::cmd("LRANGE").arg(key).arg(start).arg(fetch_end))
        .await?;

    let count = items.len() as u64;
    meta.total = Some(total);
    meta.preview_count = Some(count);
    meta.truncated = Some(start + count < total);
    meta.start = Some(start);
    // The last index actually returned, so `start + previewCount == end + 1`.
    meta.end = Some(start as i64 + count as i64 - 1);

    Ok(Value::Array(
        items.into_iter().map(|v| Value::String(lossy(v))).collect(),
    ))
}

/// The whole sorted set as an interleaved member/score sequence. Not paginated.
async fn preview_zset<C: StoreConnection>(
    session: &Session<C>,
    key: &str,
    meta: &mut PreviewMeta,
) -> Result<Value, SpinelScopeError> {
    let flat: Vec<Vec<u8>> = session
        .query(redis::cmd("ZRANGE").arg(key).arg(0).arg(-1).arg("WITHSCORES"))
        .await?;
    let members = (flat.len() / 2) as u64;
    meta.total = Some(members);
    meta.preview_count = Some(members);
    meta.truncated = Some(false);
    Ok(Value::Array(
        flat.into_iter().map(|v| Value::String(lossy(v))).collect(),
    ))
}

/// Parsing the document is a display convenience; unparsable text is returned raw.
async fn preview_json<C: StoreConnection>(
    session: &Session<C>,
    key: &str,
) -> Result<Value, SpinelScopeError> {
    let raw: Option<String> = session.query(redis::cmd("JSON.GET").arg(key)).await?;
    Ok(match raw {
        Some(text) => serde_json::from_str(&text).unwrap_or(Value::String(text)),
        None => Value::Null,
    })
}

/// Runs one `HSCAN`/`SSCAN` step from the native part of `resume`.
async fn scan_step<C: StoreConnection>(
    session: &Session<C>,
    command: &str,
    key: &str,
    resume: ResumeCursor,
    count: usize,
) -> Result<(u64, Vec<Vec<u8>>), SpinelScopeError> {
    let (next, items): (String, Vec<Vec<u8>>) = session
        .query(
            redis::cmd(command)
                .arg(key)
                .arg(resume.native)
                .arg("COUNT")
                .arg(count),
        )
        .await?;
    let next = next.parse::<u64>().map_err(|_| {
        SpinelScopeError::BackendCommand(format!("{command} returned a non-numeric cursor '{next}'"))
    })?;
    Ok((next, items))
}

struct Page<T> {
    items: Vec<T>,
    next: ResumeCursor,
}

/// Cuts at most `limit` entries out of one scan step run with `step_count`,
/// skipping those already handed out. If the step has entries left over, the
/// next cursor points back into the same step instead of past it.
fn take_page<T>(
    resume: ResumeCursor,
    step: Vec<T>,
    step_next: u64,
    step_count: usize,
    limit: usize,
) -> Page<T> {
    let step_len = step.len();
    let items: Vec<T> = step.into_iter().skip(resume.skip).take(limit).collect();
    let consumed = resume.skip + items.len();
    let next = if consumed < step_len {
        ResumeCursor {
            native: resume.native,
            skip: consumed,
            step_count: Some(step_count),
        }
    } else {
        ResumeCursor::at(step_next)
    };
    Page { items, next }
}

fn fill_scan_meta(
    meta: &mut PreviewMeta,
    options: &PreviewOptions,
    total: u64,
    preview_count: u64,
    next: ResumeCursor,
) {
    // `total > previewCount` only says something about the first page; later
    // pages are judged by the cursor alone so resumption terminates.
    let truncated = !next.is_done() || (options.is_first_page() && total > preview_count);
    meta.total = Some(total);
    meta.preview_count = Some(preview_count);
    meta.truncated = Some(truncated);
    meta.cursor = Some(options.cursor.clone());
    meta.next_cursor = Some(next.to_string());
}

fn lossy(bytes: Vec<u8>) -> String {
    String::from_utf8(bytes).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

fn lossy_ref(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
