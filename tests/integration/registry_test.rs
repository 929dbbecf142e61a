// tests/integration/registry_test.rs

//! Integration tests for the connection registry
//! Tests session sharing, single-flight connects, retries and eviction

use super::mock_backend::{MockConnector, MockStore, UNREACHABLE_HOST};
use super::test_helpers::{
    FAST_RETRY, LOCAL, LOCAL_ALIAS, LOCAL_DB3, LOCAL_SECURED, TestContext, UNREACHABLE,
};
use spinelscope::core::SpinelScopeError;
use spinelscope::core::profile::ConnectionTarget;
use spinelscope::core::registry::{RetryPolicy, SessionState};
use std::sync::Arc;
use std::time::Duration;

fn explicit(host: &str, password: Option<&str>, db: Option<i64>) -> ConnectionTarget {
    ConnectionTarget::Explicit {
        host: host.to_string(),
        port: 6379,
        username: None,
        password: password.map(str::to_string),
        db,
    }
}

// ===== Single-flight =====

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_acquire_connects_once() {
    let store = MockStore::new();
    let connector = MockConnector::with_delay(Arc::clone(&store), Duration::from_millis(50));
    let ctx = Arc::new(TestContext::with_connector(store, connector, FAST_RETRY));

    let mut handles = Vec::new();
    for _ in 0..16 {
        let ctx = Arc::clone(&ctx);
        handles.push(tokio::spawn(async move { ctx.session_for(LOCAL, None).await }));
    }

    let mut sessions = Vec::new();
    for handle in handles {
        sessions.push(handle.await.unwrap().unwrap());
    }

    assert_eq!(ctx.connector().connect_count(), 1);
    assert!(sessions.iter().all(|s| Arc::ptr_eq(s, &sessions[0])));
    assert_eq!(ctx.registry().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_acquire_shares_failure() {
    let store = MockStore::new();
    let connector = MockConnector::with_delay(Arc::clone(&store), Duration::from_millis(20));
    let no_retry = RetryPolicy {
        max_retries: 0,
        backoff: Duration::ZERO,
    };
    let ctx = Arc::new(TestContext::with_connector(store, connector, no_retry));

    let (a, b) = tokio::join!(
        ctx.session_for(UNREACHABLE, None),
        ctx.session_for(UNREACHABLE, None)
    );

    let (a, b) = (a.unwrap_err(), b.unwrap_err());
    assert_eq!(a, b);
    assert!(matches!(a, SpinelScopeError::BackendUnreachable { .. }));
    assert_eq!(ctx.connector().connect_count(), 1);
}

// ===== Sharing by composite key =====

#[tokio::test]
async fn test_profiles_with_same_parameters_share_a_session() {
    let ctx = TestContext::new();

    let a = ctx.session_for(LOCAL, None).await.unwrap();
    let b = ctx.session_for(LOCAL_ALIAS, None).await.unwrap();
    let c = ctx
        .registry()
        .acquire(&explicit("127.0.0.1", None, None), None)
        .await
        .unwrap();

    assert!(Arc::ptr_eq(&a, &b));
    assert!(Arc::ptr_eq(&a, &c));
    assert_eq!(ctx.connector().connect_count(), 1);
}

#[tokio::test]
async fn test_different_credentials_never_share() {
    let ctx = TestContext::new();

    let open = ctx.session_for(LOCAL, None).await.unwrap();
    let secured = ctx.session_for(LOCAL_SECURED, None).await.unwrap();
    let other_password = ctx
        .registry()
        .acquire(&explicit("127.0.0.1", Some("other"), None), None)
        .await
        .unwrap();

    assert!(!Arc::ptr_eq(&open, &secured));
    assert!(!Arc::ptr_eq(&secured, &other_password));
    assert_eq!(ctx.connector().connect_count(), 3);
}

#[tokio::test]
async fn test_db_override_takes_precedence() {
    let ctx = TestContext::new();

    let default_db = ctx.session_for(LOCAL_DB3, None).await.unwrap();
    let overridden = ctx.session_for(LOCAL_DB3, Some(5)).await.unwrap();
    let plain = ctx.session_for(LOCAL, None).await.unwrap();

    assert_eq!(default_db.db(), 3);
    assert_eq!(overridden.db(), 5);
    assert_eq!(plain.db(), 0);

    let dbs: Vec<i64> = ctx.connector().connected_params().iter().map(|p| p.db).collect();
    assert_eq!(dbs, vec![3, 5, 0]);
}

// ===== Failures =====

#[tokio::test]
async fn test_unknown_profile_is_not_found() {
    let ctx = TestContext::new();

    let err = ctx.session_for("missing", None).await.unwrap_err();

    assert_eq!(err, SpinelScopeError::ConnectionNotFound("missing".to_string()));
    assert_eq!(ctx.connector().connect_count(), 0);
    assert!(ctx.registry().is_empty());
}

#[tokio::test]
async fn test_unreachable_backend_retries_then_fails() {
    let ctx = TestContext::new();

    let err = ctx.session_for(UNREACHABLE, None).await.unwrap_err();

    match err {
        SpinelScopeError::BackendUnreachable { target, .. } => {
            assert_eq!(target, format!("{UNREACHABLE_HOST}:6379/0"));
        }
        other => panic!("expected BackendUnreachable, got {other:?}"),
    }
    // One attempt plus two retries.
    assert_eq!(ctx.connector().connect_count(), 3);
    // No half-built session survives.
    assert!(ctx.registry().is_empty());
}

#[tokio::test]
async fn test_transient_connect_failure_is_retried() {
    let ctx = TestContext::new();
    ctx.connector().fail_next(2);

    let session = ctx.session_for(LOCAL, None).await.unwrap();

    assert_eq!(session.state(), SessionState::Ready);
    assert_eq!(ctx.connector().connect_count(), 3);
}

#[tokio::test]
async fn test_failed_connect_is_retried_on_next_acquire() {
    let ctx = TestContext::new();
    ctx.connector().fail_next(3);

    assert!(ctx.session_for(LOCAL, None).await.is_err());
    let session = ctx.session_for(LOCAL, None).await.unwrap();

    assert!(session.is_usable());
    assert_eq!(ctx.connector().connect_count(), 4);
}

// ===== Lifecycle =====

#[tokio::test]
async fn test_connection_failure_marks_session_and_evicts_lazily() {
    let ctx = TestContext::new();
    let first = ctx.session().await;

    ctx.store.break_connections();
    let result: Result<String, SpinelScopeError> = first.query(&redis::cmd("PING")).await;
    assert!(matches!(
        result,
        Err(SpinelScopeError::BackendUnreachable { ref target, .. }) if target == "127.0.0.1:6379/0"
    ));
    assert_eq!(first.state(), SessionState::Error);

    // The broken session stays in the map until someone asks for it again.
    assert_eq!(ctx.registry().len(), 1);

    ctx.store.restore_connections();
    let second = ctx.session().await;

    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(second.state(), SessionState::Ready);
    assert_eq!(ctx.connector().connect_count(), 2);
    assert_eq!(ctx.registry().len(), 1);
}

#[tokio::test]
async fn test_idle_session_is_replaced_after_disconnect() {
    let ctx = TestContext::new();
    let first = ctx.session().await;

    // No command runs on `first`; only the transport reports the disconnect.
    ctx.store.break_connections();
    assert_eq!(first.state(), SessionState::Error);

    ctx.store.restore_connections();
    let second = ctx.session().await;

    assert!(!Arc::ptr_eq(&first, &second));
    assert!(second.is_usable());
    assert_eq!(ctx.connector().connect_count(), 2);
    let pong: String = second.query(&redis::cmd("PING")).await.unwrap();
    assert_eq!(pong, "PONG");
}

#[tokio::test]
async fn test_command_rejection_keeps_session_ready() {
    let ctx = TestContext::new();
    let session = ctx.session().await;

    let result: Result<String, SpinelScopeError> = session.query(&redis::cmd("NOSUCHCOMMAND")).await;

    assert!(matches!(result, Err(SpinelScopeError::BackendCommand(_))));
    assert!(session.is_usable());
    let again = ctx.session().await;
    assert!(Arc::ptr_eq(&session, &again));
}

#[tokio::test]
async fn test_snapshot_hides_credentials() {
    let ctx = TestContext::new();
    ctx.session_for(LOCAL_SECURED, None).await.unwrap();
    ctx.session_for(LOCAL_DB3, None).await.unwrap();

    let rows = ctx.registry().snapshot();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].display_key, "127.0.0.1:6379/0");
    assert_eq!(rows[1].display_key, "127.0.0.1:6379/3");
    assert!(rows.iter().all(|r| r.state == SessionState::Ready));
    let rendered = serde_json::to_string(&rows).unwrap();
    assert!(!rendered.contains("secret"));
}

#[tokio::test]
async fn test_evict_and_clear() {
    let ctx = TestContext::new();
    ctx.session_for(LOCAL, None).await.unwrap();
    ctx.session_for(LOCAL_DB3, None).await.unwrap();

    let target = ConnectionTarget::Profile(LOCAL.to_string());
    assert!(ctx.registry().evict(&target, None).await.unwrap());
    assert!(!ctx.registry().evict(&target, None).await.unwrap());
    assert_eq!(ctx.registry().len(), 1);

    ctx.registry().clear();
    assert!(ctx.registry().is_empty());

    ctx.session_for(LOCAL, None).await.unwrap();
    assert_eq!(ctx.connector().connect_count(), 3);
}
