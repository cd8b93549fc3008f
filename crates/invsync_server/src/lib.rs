//! # invsync Sync Server
//!
//! The server of record for the invsync delta sync protocol.
//!
//! This crate provides:
//! - `ApplyHandler`: idempotent replay of a client's queued mutations
//! - `DeltaBuilder`: changed-or-referenced rows since a client watermark
//! - `ServerStore`: the system of record, stamping `date_modified` on
//!   every write
//! - `SyncServer`: facade wiring the above behind `handle_push` and
//!   `handle_pull`
//!
//! The crate is transport-agnostic: an HTTP layer exposes the two handler
//! methods as POST endpoints and stays out of scope here.
//!
//! ## Key Invariants
//!
//! - Operations in one batch are applied strictly in client order.
//! - Create is idempotent by entity id; Delete is a no-op when absent.
//! - Update patches only the fields present in the payload (per-field
//!   last-write-wins).
//! - One bad operation never aborts the rest of the batch; it is reported
//!   in the response's error list.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod apply;
mod clock;
mod config;
mod delta;
mod error;
mod server;
mod store;

pub use apply::ApplyHandler;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::ServerConfig;
pub use delta::DeltaBuilder;
pub use error::{ServerError, ServerResult};
pub use server::SyncServer;
pub use store::ServerStore;
