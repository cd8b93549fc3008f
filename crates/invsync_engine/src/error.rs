//! Error types for the sync engine.
//!
//! These errors stay inside the engine: the public pipeline entry points
//! fold them into outcome values (see `engine`), so a sync failure can
//! never crash a foreground operation.

use invsync_store::StoreError;
use thiserror::Error;

/// Result type for internal sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during a sync cycle.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network or transport failure (timeout, 5xx, connection refused).
    /// The whole cycle aborts with local state unchanged and is retried
    /// next cycle.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the next cycle is expected to succeed.
        retryable: bool,
    },

    /// The response body could not be decoded.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Token acquisition or refresh failed.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Local store failure while applying a delta.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if the next cycle may succeed without intervention.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::Protocol(_) | SyncError::Auth(_) | SyncError::Store(_) => false,
        }
    }
}
