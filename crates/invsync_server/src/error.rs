//! Error types for the sync server.

use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur while handling sync requests.
#[derive(Error, Debug)]
pub enum ServerError {
    /// The request itself is malformed or exceeds limits. Per-item apply
    /// failures are *not* server errors; they travel in the push
    /// response's error list.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Internal serialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
