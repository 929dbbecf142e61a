// src/server/error.rs

//! HTTP error mapping.

use super::response::Envelope;
use crate::core::SpinelScopeError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Error wrapper for converting core errors to HTTP responses.
///
/// Every failure is a 500 carrying the error's message; callers are not expected
/// to tell client faults from backend faults by status code.
#[derive(Debug)]
pub struct ApiError(pub SpinelScopeError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Envelope::<()>::failure(self.0.to_string());
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

impl From<SpinelScopeError> for ApiError {
    fn from(err: SpinelScopeError) -> Self {
        ApiError(err)
    }
}
