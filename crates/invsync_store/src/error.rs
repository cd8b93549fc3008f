//! Error types for the client store.

use invsync_protocol::EntityKind;
use thiserror::Error;
use uuid::Uuid;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in the client store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The targeted row does not exist.
    #[error("{kind:?} {id} not found")]
    NotFound {
        /// Entity kind.
        kind: EntityKind,
        /// Entity id.
        id: Uuid,
    },

    /// A row with this id already exists.
    #[error("{kind:?} {id} already exists")]
    DuplicateId {
        /// Entity kind.
        kind: EntityKind,
        /// Entity id.
        id: Uuid,
    },

    /// An asset insert referenced a parent row that is not present locally.
    #[error("asset {asset_id} references missing {missing_kind:?} {missing_id}")]
    ForeignKeyViolation {
        /// The asset being inserted.
        asset_id: Uuid,
        /// Which reference table the dangling key points at.
        missing_kind: EntityKind,
        /// The dangling key.
        missing_id: Uuid,
    },

    /// A mutation payload could not be serialized.
    #[error("payload serialization failed: {0}")]
    Payload(#[from] serde_json::Error),
}
