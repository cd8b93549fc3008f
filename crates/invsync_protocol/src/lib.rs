//! # invsync Sync Protocol
//!
//! Protocol types and JSON codecs for the invsync delta sync protocol.
//!
//! This crate provides:
//! - Domain records (`AssetRecord`, `CategoryRecord`, ...)
//! - `SyncMutation` for queued client changes
//! - Protocol messages (Push, Pull)
//! - JSON encoding/decoding helpers
//!
//! This is a pure protocol crate with no I/O operations.
//!
//! ## Timestamps
//!
//! All `date_modified` values and sync watermarks are server-authoritative
//! epoch milliseconds (`i64`). A checkpoint equal to [`CHECKPOINT_EPOCH`]
//! means "never synced" and causes the server to return its entire dataset.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod entity;
mod messages;
mod mutation;

pub use entity::{
    AssetPatch, AssetRecord, AssetStatus, CategoryRecord, DepartmentRecord, EntityKind,
    LocationRecord, CHECKPOINT_EPOCH,
};
pub use messages::{PullRequest, PullResponse, PushError, PushRequest, PushResponse};
pub use mutation::{MutationKind, SyncMutation};

/// Errors produced when encoding or decoding protocol messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The JSON body could not be parsed or did not match the schema.
    #[error("invalid message: {0}")]
    InvalidMessage(#[from] serde_json::Error),
}

/// Result type for protocol codec operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;
