//! # invsync Client Store
//!
//! The disconnection-tolerant client's embedded store.
//!
//! This crate provides:
//! - Domain tables (assets plus the three reference tables) with local
//!   foreign-key enforcement
//! - The append-only mutation queue, written in the same transaction as
//!   every local entity write
//! - The per-device checkpoint bounding delta pulls
//!
//! ## Key Invariants
//!
//! - An asset row is never inserted while any of its three foreign keys is
//!   unresolved; such rows are deferred by the caller, not dropped.
//! - A local create/update/delete and its queue entry commit atomically,
//!   so the queue and the entity tables never diverge.
//! - The checkpoint is mutated only after a fully applied pull, or by an
//!   explicit reset.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod checkpoint;
mod error;
mod queue;
mod store;

pub use checkpoint::DeviceCheckpoint;
pub use error::{StoreError, StoreResult};
pub use queue::MutationQueueEntry;
pub use store::{AssetApplyOutcome, LocalStore, StoreTxn};
