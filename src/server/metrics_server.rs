// src/server/metrics_server.rs

use crate::core::metrics::gather_metrics;
use axum::{http::StatusCode, response::IntoResponse};

/// Handles HTTP requests to the /metrics endpoint.
///
/// Encodes every registered metric in the Prometheus text format.
pub async fn metrics_handler() -> impl IntoResponse {
    let body = gather_metrics();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        body,
    )
}
