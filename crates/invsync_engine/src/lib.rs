//! # invsync Sync Engine
//!
//! The disconnection-tolerant client's synchronization engine.
//!
//! This crate provides:
//! - Push pipeline: drains the mutation queue to the server in enqueue
//!   order, one batch per cycle
//! - Pull pipeline: applies the server delta in dependency order and
//!   advances the checkpoint all-or-nothing
//! - HTTP transport abstraction with a mutex-guarded bearer-token cache
//! - Connectivity and battery probes
//! - Background scheduler with a single guarded entry point
//!
//! ## Architecture
//!
//! The engine implements a **push-then-pull** cycle: local pending edits
//! go out first so a pull cannot overwrite them with server state that has
//! not seen them yet. Every apply is an upsert-by-id, so re-running a
//! cycle after a mid-apply failure is safe.
//!
//! ## Key Invariants
//!
//! - No connectivity is a skip, never an error.
//! - A transport failure leaves the queue and the checkpoint untouched.
//! - Reference rows are applied before assets; an asset whose parent is
//!   still missing is deferred, and the checkpoint stays put so the delta
//!   is re-requested.
//! - Sync failures never propagate past the engine boundary: callers get
//!   an outcome value, not a panic or an `Err`.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod applier;
mod config;
mod engine;
mod error;
mod http;
mod probes;
mod scheduler;
mod transport;

pub use applier::SyncStore;
pub use config::SyncConfig;
pub use engine::{PullOutcome, PushOutcome, SyncEngine, SyncStats, SyncSummary};
pub use error::{SyncError, SyncResult};
pub use http::{
    HttpClient, HttpResponse, HttpTransport, LoopbackClient, LoopbackServer, StaticTokenSource,
    TokenCache, TokenSource,
};
pub use probes::{
    ConnectivityProbe, MainsPower, MockConnectivity, MockPower, OnlineProbe, PowerProbe,
};
pub use scheduler::{SchedulerHandle, SkipReason, SyncScheduler, SyncTrigger};
pub use transport::{MockTransport, SyncTransport};
