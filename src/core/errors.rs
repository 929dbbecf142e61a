// src/core/errors.rs

//! Defines the primary error type for the entire application.

use thiserror::Error;

/// The main error enum, representing every failure the core can surface.
///
/// All variants are rendered to callers as a flat message string; the HTTP layer
/// does not distinguish client and server faults. `Clone` lets a single connect
/// failure be handed to every waiter of the shared connect future.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SpinelScopeError {
    /// The connection identifier does not resolve to a saved profile.
    #[error("Connection '{0}' not found")]
    ConnectionNotFound(String),

    /// A session could not be established, or its transport broke mid-request.
    #[error("Backend {target} is unreachable: {reason}")]
    BackendUnreachable { target: String, reason: String },

    /// The request was rejected before any backend call was issued.
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Key is required")]
    KeyRequired,

    /// The store rejected a command (e.g. `WRONGTYPE`).
    #[error("Backend command failed: {0}")]
    BackendCommand(String),

    #[error("Internal Error: {0}")]
    Internal(String),
}

impl SpinelScopeError {
    /// Shorthand for a validation failure with a formatted message.
    pub fn invalid(message: impl Into<String>) -> Self {
        SpinelScopeError::Validation(message.into())
    }
}

impl From<serde_json::Error> for SpinelScopeError {
    fn from(e: serde_json::Error) -> Self {
        SpinelScopeError::Validation(format!("malformed JSON payload: {e}"))
    }
}
