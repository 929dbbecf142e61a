// src/server/response.rs

//! The uniform JSON envelope wrapped around every API reply.

use serde::Serialize;

/// `{success, data?, message?}`.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
        }
    }
}

/// Reply of `POST /api/keys/delete`.
#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: i64,
}
