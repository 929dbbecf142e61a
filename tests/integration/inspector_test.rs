// tests/integration/inspector_test.rs

//! Integration tests for value inspection
//! Tests type classification, pagination and the metadata envelope

use super::fixtures::{
    HASH_KEY, JSON_KEY, LIST_KEY, SET_KEY, USER_KEY, VISITS_KEY, ZSET_KEY, hash_fields, seed_hash,
    seed_list, seed_set, seed_string, set_members,
};
use super::mock_backend::Entry;
use super::test_helpers::TestContext;
use serde_json::json;
use spinelscope::core::SpinelScopeError;
use spinelscope::core::inspector::{PreviewOptions, ResumeCursor, inspect};
use std::collections::BTreeSet;

fn options(key: &str, limit: i64, cursor: &str) -> PreviewOptions {
    PreviewOptions::new(key, Some(limit), Some(cursor.to_string()), None)
}

// ===== Scalars =====

#[tokio::test]
async fn test_string_preview() {
    let ctx = TestContext::new();
    seed_string(&ctx.store, 0, USER_KEY, "hello");
    let session = ctx.session().await;

    let preview = inspect(&session, &PreviewOptions::new(USER_KEY, None, None, None))
        .await
        .unwrap();

    assert_eq!(preview.key_type, "string");
    assert_eq!(preview.value, json!("hello"));
    assert_eq!(preview.ttl_seconds, -1);
    assert!(preview.meta.memory_bytes.is_some());
    assert!(preview.meta.count.is_none());

    let rendered = serde_json::to_value(&preview).unwrap();
    assert_eq!(rendered["type"], "string");
    assert!(rendered["meta"]["memoryBytes"].is_u64());
    assert!(rendered["meta"].get("total").is_none());
}

#[tokio::test]
async fn test_hyperloglog_is_reclassified() {
    let ctx = TestContext::new();
    let session = ctx.session().await;
    let _: i64 = session
        .query(redis::cmd("PFADD").arg(VISITS_KEY).arg("a").arg("b").arg("a"))
        .await
        .unwrap();

    let preview = inspect(&session, &PreviewOptions::new(VISITS_KEY, None, None, None))
        .await
        .unwrap();

    assert_eq!(preview.key_type, "hyperloglog");
    assert_eq!(preview.value, serde_json::Value::Null);
    assert_eq!(preview.meta.count, Some(2));
    assert!(preview.meta.bytes.unwrap() > 0);
    // The raw encoding is never fetched.
    assert!(ctx.store.commands_named("GET").is_empty());
}

#[tokio::test]
async fn test_missing_key_reports_none() {
    let ctx = TestContext::new();
    let session = ctx.session().await;

    let preview = inspect(&session, &PreviewOptions::new("ghost", None, None, None))
        .await
        .unwrap();

    assert_eq!(preview.key_type, "none");
    assert_eq!(preview.value, serde_json::Value::Null);
    assert_eq!(preview.ttl_seconds, -1);
    assert_eq!(preview.meta.memory_bytes, None);
}

#[tokio::test]
async fn test_ttl_is_reported_in_seconds() {
    let ctx = TestContext::new();
    seed_string(&ctx.store, 0, USER_KEY, "hello");
    ctx.store.set_expiry(0, USER_KEY, 120);
    let session = ctx.session().await;

    let preview = inspect(&session, &PreviewOptions::new(USER_KEY, None, None, None))
        .await
        .unwrap();

    assert_eq!(preview.ttl_seconds, 120);
}

#[tokio::test]
async fn test_memory_lookup_failure_is_swallowed() {
    let ctx = TestContext::new();
    seed_string(&ctx.store, 0, USER_KEY, "hello");
    ctx.store.disable_memory_usage();
    let session = ctx.session().await;

    let preview = inspect(&session, &PreviewOptions::new(USER_KEY, None, None, None))
        .await
        .unwrap();

    assert_eq!(preview.value, json!("hello"));
    assert_eq!(preview.meta.memory_bytes, None);
    let rendered = serde_json::to_value(&preview).unwrap();
    assert!(rendered["meta"]["memoryBytes"].is_null());
    assert!(session.is_usable());
}

// ===== Hashes and sets =====

#[tokio::test]
async fn test_hash_pages_of_large_hash() {
    let ctx = TestContext::new();
    seed_hash(&ctx.store, 0, HASH_KEY, 250);
    let session = ctx.session().await;

    let first = inspect(&session, &options(HASH_KEY, 200, "0")).await.unwrap();
    assert_eq!(first.key_type, "hash");
    assert_eq!(first.meta.total, Some(250));
    assert_eq!(first.meta.preview_count, Some(200));
    assert_eq!(first.meta.truncated, Some(true));
    assert_eq!(first.meta.cursor.as_deref(), Some("0"));
    let next = first.meta.next_cursor.clone().unwrap();
    assert_ne!(next, "0");

    let second = inspect(&session, &options(HASH_KEY, 200, &next)).await.unwrap();
    assert_eq!(second.meta.preview_count, Some(50));
    assert_eq!(second.meta.truncated, Some(false));
    assert_eq!(second.meta.next_cursor.as_deref(), Some("0"));

    let mut seen = first.value.as_object().unwrap().clone();
    seen.extend(second.value.as_object().unwrap().clone());
    let expected = hash_fields(250);
    assert_eq!(seen.len(), expected.len());
    for (field, value) in &expected {
        assert_eq!(seen[field], json!(value));
    }
}

#[tokio::test]
async fn test_small_hash_is_paged_within_one_scan_step() {
    let ctx = TestContext::new();
    seed_hash(&ctx.store, 0, HASH_KEY, 100);
    let session = ctx.session().await;

    // The backend returns all 100 fields at once; the cursor must not lose any.
    let mut cursor = "0".to_string();
    let mut fields = serde_json::Map::new();
    let mut pages = 0;
    loop {
        let page = inspect(&session, &options(HASH_KEY, 30, &cursor)).await.unwrap();
        pages += 1;
        assert!(page.meta.preview_count.unwrap() <= 30);
        fields.extend(page.value.as_object().unwrap().clone());
        if page.meta.truncated == Some(false) {
            assert_eq!(page.meta.next_cursor.as_deref(), Some("0"));
            break;
        }
        cursor = page.meta.next_cursor.unwrap();
        assert!(pages < 10, "pagination did not terminate");
    }

    assert_eq!(pages, 4);
    assert_eq!(fields.len(), 100);
}

#[tokio::test]
async fn test_small_hash_fitting_the_limit_is_not_truncated() {
    let ctx = TestContext::new();
    seed_hash(&ctx.store, 0, HASH_KEY, 3);
    let session = ctx.session().await;

    let preview = inspect(&session, &PreviewOptions::new(HASH_KEY, None, None, None))
        .await
        .unwrap();

    assert_eq!(preview.meta.total, Some(3));
    assert_eq!(preview.meta.preview_count, Some(3));
    assert_eq!(preview.meta.truncated, Some(false));
    assert_eq!(preview.meta.next_cursor.as_deref(), Some("0"));
    assert_eq!(preview.value["field:0001"], json!("value:1"));
}

#[tokio::test]
async fn test_set_pages_cover_all_members() {
    let ctx = TestContext::new();
    seed_set(&ctx.store, 0, SET_KEY, 300);
    let session = ctx.session().await;

    let mut cursor = "0".to_string();
    let mut members = BTreeSet::new();
    loop {
        let page = inspect(&session, &options(SET_KEY, 70, &cursor)).await.unwrap();
        assert_eq!(page.key_type, "set");
        assert_eq!(page.meta.total, Some(300));
        for member in page.value.as_array().unwrap() {
            members.insert(member.as_str().unwrap().to_string());
        }
        if page.meta.truncated == Some(false) {
            break;
        }
        cursor = page.meta.next_cursor.unwrap();
    }

    let expected: BTreeSet<String> = set_members(300).into_iter().collect();
    assert_eq!(members, expected);
}

#[tokio::test]
async fn test_resume_replays_the_step_when_the_limit_changes() {
    let ctx = TestContext::new();
    ctx.store.set_scan_overshoot(20);
    seed_hash(&ctx.store, 0, HASH_KEY, 300);
    let session = ctx.session().await;

    // The first step returns 120 fields for COUNT 100.
    let first = inspect(&session, &options(HASH_KEY, 100, "0")).await.unwrap();
    assert_eq!(first.meta.preview_count, Some(100));
    assert_eq!(first.meta.next_cursor.as_deref(), Some("0@100/100"));

    ctx.store.clear_log();
    let second = inspect(&session, &options(HASH_KEY, 10, "0@100/100")).await.unwrap();
    assert_eq!(second.meta.preview_count, Some(10));
    assert_eq!(second.meta.next_cursor.as_deref(), Some("0@110/100"));
    let hscan = &ctx.store.commands_named("HSCAN")[0];
    assert_eq!(hscan.args, vec!["HSCAN", HASH_KEY, "0", "COUNT", "100"]);

    let third = inspect(&session, &options(HASH_KEY, 50, "0@110/100")).await.unwrap();
    assert_eq!(third.meta.preview_count, Some(10));
    assert_eq!(third.meta.truncated, Some(true));
    assert_eq!(third.meta.next_cursor.as_deref(), Some("120"));

    let mut seen = BTreeSet::new();
    for page in [&first, &second, &third] {
        for field in page.value.as_object().unwrap().keys() {
            assert!(seen.insert(field.clone()), "{field} handed out twice");
        }
    }
    assert_eq!(seen.len(), 120);
}

#[tokio::test]
async fn test_dropped_connection_is_reported_as_unreachable() {
    let ctx = TestContext::new();
    seed_string(&ctx.store, 0, USER_KEY, "hello");
    let session = ctx.session().await;
    ctx.store.break_connections();

    let err = inspect(&session, &PreviewOptions::new(USER_KEY, None, None, None))
        .await
        .unwrap_err();

    assert!(matches!(err, SpinelScopeError::BackendUnreachable { .. }));
    assert!(!session.is_usable());
}

#[tokio::test]
async fn test_malformed_cursor_is_rejected_before_backend_calls() {
    let ctx = TestContext::new();
    seed_hash(&ctx.store, 0, HASH_KEY, 3);
    let session = ctx.session().await;
    ctx.store.clear_log();

    let err = inspect(&session, &options(HASH_KEY, 10, "abc")).await.unwrap_err();

    assert!(matches!(err, SpinelScopeError::Validation(_)));
    assert!(ctx.store.commands().is_empty());
}

// ===== Lists =====

#[tokio::test]
async fn test_list_window() {
    let ctx = TestContext::new();
    seed_list(&ctx.store, 0, LIST_KEY, 10);
    let session = ctx.session().await;

    let preview = inspect(&session, &PreviewOptions::new(LIST_KEY, Some(4), None, Some(2)))
        .await
        .unwrap();

    assert_eq!(preview.key_type, "list");
    assert_eq!(preview.value, json!(["item:2", "item:3", "item:4", "item:5"]));
    assert_eq!(preview.meta.total, Some(10));
    assert_eq!(preview.meta.preview_count, Some(4));
    assert_eq!(preview.meta.truncated, Some(true));
    assert_eq!(preview.meta.start, Some(2));
    assert_eq!(preview.meta.end, Some(5));
    let lrange = &ctx.store.commands_named("LRANGE")[0];
    assert_eq!(lrange.args, vec!["LRANGE", LIST_KEY, "2", "5"]);
}

#[tokio::test]
async fn test_list_tail_window_is_not_truncated() {
    let ctx = TestContext::new();
    seed_list(&ctx.store, 0, LIST_KEY, 10);
    let session = ctx.session().await;

    let preview = inspect(&session, &PreviewOptions::new(LIST_KEY, Some(50), None, Some(7)))
        .await
        .unwrap();

    assert_eq!(preview.meta.preview_count, Some(3));
    assert_eq!(preview.meta.truncated, Some(false));
    assert_eq!(preview.meta.end, Some(9));
}

#[tokio::test]
async fn test_negative_start_offset_is_reset() {
    let ctx = TestContext::new();
    seed_list(&ctx.store, 0, LIST_KEY, 3);
    let session = ctx.session().await;

    let preview = inspect(&session, &PreviewOptions::new(LIST_KEY, Some(2), None, Some(-5)))
        .await
        .unwrap();

    assert_eq!(preview.meta.start, Some(0));
    assert_eq!(preview.value, json!(["item:0", "item:1"]));
}

// ===== Other types =====

#[tokio::test]
async fn test_zset_is_flat_member_score_sequence() {
    let ctx = TestContext::new();
    ctx.store.insert(
        0,
        ZSET_KEY,
        Entry::ZSet(vec![("bob".to_string(), 20.0), ("alice".to_string(), 10.5)]),
    );
    let session = ctx.session().await;

    let preview = inspect(&session, &PreviewOptions::new(ZSET_KEY, None, None, None))
        .await
        .unwrap();

    assert_eq!(preview.key_type, "zset");
    assert_eq!(preview.value, json!(["alice", "10.5", "bob", "20"]));
    assert_eq!(preview.meta.total, Some(2));
    assert_eq!(preview.meta.truncated, Some(false));
}

#[tokio::test]
async fn test_json_document_is_parsed() {
    let ctx = TestContext::new();
    ctx.store.insert(0, JSON_KEY, Entry::Json(r#"{"theme":"dark","size":3}"#.to_string()));
    ctx.store.insert(0, "doc:broken", Entry::Json("{not json".to_string()));
    let session = ctx.session().await;

    let parsed = inspect(&session, &PreviewOptions::new(JSON_KEY, None, None, None))
        .await
        .unwrap();
    let raw = inspect(&session, &PreviewOptions::new("doc:broken", None, None, None))
        .await
        .unwrap();

    assert_eq!(parsed.key_type, "json");
    assert_eq!(parsed.value, json!({"theme": "dark", "size": 3}));
    assert_eq!(raw.key_type, "json");
    assert_eq!(raw.value, json!("{not json"));
}

#[tokio::test]
async fn test_unsupported_type_sentinel() {
    let ctx = TestContext::new();
    ctx.store.insert(0, "events", Entry::Stream);
    let session = ctx.session().await;

    let preview = inspect(&session, &PreviewOptions::new("events", None, None, None))
        .await
        .unwrap();

    assert_eq!(preview.key_type, "stream");
    assert_eq!(preview.value, json!({"unsupported": true, "nativeType": "stream"}));
}

#[tokio::test]
async fn test_empty_key_is_rejected() {
    let ctx = TestContext::new();
    let session = ctx.session().await;
    ctx.store.clear_log();

    let err = inspect(&session, &PreviewOptions::new("", None, None, None))
        .await
        .unwrap_err();

    assert_eq!(err, SpinelScopeError::KeyRequired);
    assert!(ctx.store.commands().is_empty());
}

#[test]
fn test_preview_limit_is_clamped() {
    assert_eq!(PreviewOptions::new("k", None, None, None).limit, 200);
    assert_eq!(PreviewOptions::new("k", Some(0), None, None).limit, 1);
    assert_eq!(PreviewOptions::new("k", Some(-3), None, None).limit, 1);
    assert_eq!(PreviewOptions::new("k", Some(5000), None, None).limit, 1000);
    assert_eq!(PreviewOptions::new("k", None, Some("  ".into()), None).cursor, "0");
}

#[test]
fn test_resume_cursor_forms() {
    let inside = ResumeCursor::parse("42@7/100").unwrap();
    assert_eq!(inside.skip, 7);
    assert_eq!(inside.count_for(10), 100);
    assert_eq!(inside.to_string(), "42@7/100");

    // Tokens without a step count replay with the current limit.
    let legacy = ResumeCursor::parse("42@7").unwrap();
    assert_eq!(legacy.count_for(10), 10);

    assert_eq!(ResumeCursor::parse("42").unwrap().count_for(10), 10);
    assert!(ResumeCursor::parse("42@7/0").is_err());
    assert!(ResumeCursor::parse("42@x/5").is_err());
}
