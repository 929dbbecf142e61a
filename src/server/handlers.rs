// src/server/handlers.rs

//! HTTP route handlers.
//!
//! Each handler decodes and validates its body, acquires a session from the
//! registry and hands it to one core operation. Nothing here touches the
//! backend directly.

use super::context::AppState;
use super::error::ApiError;
use super::request::{DeleteRequest, PreviewRequest, ScanRequest, TargetSpec, TtlRequest, decode};
use super::response::{DeleteResponse, Envelope};
use crate::core::SpinelScopeError;
use crate::core::inspector::{self, PreviewOptions, PreviewResponse};
use crate::core::metrics;
use crate::core::mutation::{self, Mutation, MutationAck};
use crate::core::registry::{Connector, SessionInfo};
use crate::core::scanner::{self, KeyEntry, ScanOptions};
use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

pub type ApiResult<T> = Result<Json<Envelope<T>>, ApiError>;

/// Handle POST /api/keys/scan
pub async fn handle_scan<K: Connector>(
    State(state): State<Arc<AppState<K>>>,
    body: Bytes,
) -> ApiResult<Vec<KeyEntry>> {
    observe("scan", async {
        let request: ScanRequest = decode(&body)?;
        let (target, db) = request.target.into_target()?;
        let options = ScanOptions::normalized(
            request.pattern,
            request.hard_cap,
            request.page_size,
            &state.scan_defaults,
        );
        let session = state.registry.acquire(&target, db).await?;
        scanner::scan_keys(&session, &options).await
    })
    .await
}

/// Handle POST /api/keys/preview
pub async fn handle_preview<K: Connector>(
    State(state): State<Arc<AppState<K>>>,
    body: Bytes,
) -> ApiResult<PreviewResponse> {
    observe("preview", async {
        let request: PreviewRequest = decode(&body)?;
        let (target, db) = request.target.into_target()?;
        let options = PreviewOptions::new(
            request.key,
            request.preview_limit,
            request.cursor,
            request.start_offset,
        );
        options.validate()?;
        let session = state.registry.acquire(&target, db).await?;
        inspector::inspect(&session, &options).await
    })
    .await
}

/// Handle POST /api/keys/mutate
pub async fn handle_mutate<K: Connector>(
    State(state): State<Arc<AppState<K>>>,
    body: Bytes,
) -> ApiResult<MutationAck> {
    observe("mutate", async {
        let (target, db) = decode::<TargetSpec>(&body)?.into_target()?;
        let mutation: Mutation = decode(&body)?;
        mutation.validate()?;
        let session = state.registry.acquire(&target, db).await?;
        mutation::apply(&session, &mutation).await
    })
    .await
}

/// Handle POST /api/keys/delete
pub async fn handle_delete<K: Connector>(
    State(state): State<Arc<AppState<K>>>,
    body: Bytes,
) -> ApiResult<DeleteResponse> {
    observe("delete", async {
        let request: DeleteRequest = decode(&body)?;
        let (target, db) = request.target.into_target()?;
        mutation::validate_keys(&request.keys)?;
        let session = state.registry.acquire(&target, db).await?;
        let deleted = mutation::delete_keys(&session, &request.keys).await?;
        Ok(DeleteResponse { deleted })
    })
    .await
}

/// Handle POST /api/keys/ttl
pub async fn handle_ttl<K: Connector>(
    State(state): State<Arc<AppState<K>>>,
    body: Bytes,
) -> ApiResult<MutationAck> {
    observe("ttl", async {
        let request: TtlRequest = decode(&body)?;
        let (target, db) = request.target.into_target()?;
        mutation::validate_ttl_update(&request.key, request.ttl)?;
        let session = state.registry.acquire(&target, db).await?;
        mutation::update_ttl(&session, &request.key, request.ttl).await
    })
    .await
}

/// Handle GET /api/sessions
pub async fn handle_sessions<K: Connector>(
    State(state): State<Arc<AppState<K>>>,
) -> ApiResult<Vec<SessionInfo>> {
    observe("sessions", async { Ok(state.registry.snapshot()) }).await
}

/// Runs one operation, records its outcome and wraps it in the envelope.
async fn observe<T, F>(operation: &'static str, work: F) -> ApiResult<T>
where
    F: Future<Output = Result<T, SpinelScopeError>>,
{
    match work.await {
        Ok(data) => {
            metrics::REQUESTS_TOTAL
                .with_label_values(&[operation, "success"])
                .inc();
            Ok(Json(Envelope::ok(data)))
        }
        Err(e) => {
            metrics::REQUESTS_TOTAL
                .with_label_values(&[operation, "error"])
                .inc();
            match &e {
                SpinelScopeError::Validation(_) | SpinelScopeError::KeyRequired => {
                    debug!("Rejected {} request: {}", operation, e)
                }
                _ => warn!("{} request failed: {}", operation, e),
            }
            Err(ApiError(e))
        }
    }
}
