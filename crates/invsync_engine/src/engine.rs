//! The push/pull sync engine.
//!
//! Entry points return outcome values instead of `Result`: a sync cycle
//! that cannot proceed (offline, server down, token rejected) reports why
//! and leaves local state exactly as it was. The mutation queue and the
//! checkpoint only move on confirmed progress.

use crate::applier::SyncStore;
use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::probes::{ConnectivityProbe, OnlineProbe};
use crate::transport::SyncTransport;
use invsync_protocol::{PullRequest, PushRequest};
use parking_lot::RwLock;
use std::sync::Arc;

/// Outcome of one push attempt.
#[derive(Debug, Clone)]
pub struct PushOutcome {
    /// True unless the attempt aborted before or during transport.
    pub success: bool,
    /// Mutations acknowledged and removed from the queue.
    pub pushed: usize,
    /// Mutations rejected per-item; they stay queued with a bumped
    /// retry count.
    pub rejected: usize,
    /// Why the attempt stopped, when it did.
    pub message: Option<String>,
}

impl PushOutcome {
    fn offline() -> Self {
        Self {
            success: false,
            pushed: 0,
            rejected: 0,
            message: Some("no network".into()),
        }
    }

    fn clean() -> Self {
        Self {
            success: true,
            pushed: 0,
            rejected: 0,
            message: None,
        }
    }

    fn failed(message: String) -> Self {
        Self {
            success: false,
            pushed: 0,
            rejected: 0,
            message: Some(message),
        }
    }
}

/// Outcome of one pull attempt.
#[derive(Debug, Clone)]
pub struct PullOutcome {
    /// True unless the attempt aborted before or during apply.
    pub success: bool,
    /// Records upserted locally (reference rows plus assets).
    pub applied: usize,
    /// Assets skipped because a parent row was missing; the checkpoint
    /// did not advance and they will be re-sent next pull.
    pub deferred: usize,
    /// Whether the watermark moved to the server timestamp.
    pub checkpoint_advanced: bool,
    /// Why the attempt stopped, when it did.
    pub message: Option<String>,
}

impl PullOutcome {
    fn offline() -> Self {
        Self {
            success: false,
            applied: 0,
            deferred: 0,
            checkpoint_advanced: false,
            message: Some("no network".into()),
        }
    }

    fn failed(message: String) -> Self {
        Self {
            success: false,
            applied: 0,
            deferred: 0,
            checkpoint_advanced: false,
            message: Some(message),
        }
    }
}

/// Outcome of a full push-then-pull cycle.
#[derive(Debug, Clone)]
pub struct SyncSummary {
    /// The push half.
    pub push: PushOutcome,
    /// The pull half.
    pub pull: PullOutcome,
}

impl SyncSummary {
    /// True if both halves completed.
    pub fn is_success(&self) -> bool {
        self.push.success && self.pull.success
    }
}

/// Running counters, for diagnostics surfaces.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Full cycles started.
    pub cycles: u64,
    /// Full cycles where both halves completed.
    pub cycles_succeeded: u64,
    /// Mutations acknowledged by the server, cumulative.
    pub mutations_pushed: u64,
    /// Records applied from pulls, cumulative.
    pub records_pulled: u64,
    /// Most recent failure message, if any.
    pub last_error: Option<String>,
}

/// The client-side synchronization engine.
///
/// Generic over the transport and the store seam so tests can substitute
/// either. Cheap to share: wrap in an `Arc` and hand it to the scheduler.
pub struct SyncEngine<T: SyncTransport, S: SyncStore> {
    config: SyncConfig,
    transport: Arc<T>,
    store: Arc<S>,
    connectivity: Arc<dyn ConnectivityProbe>,
    stats: RwLock<SyncStats>,
}

impl<T: SyncTransport, S: SyncStore> SyncEngine<T, S> {
    /// Creates an engine that assumes the network is always reachable.
    pub fn new(config: SyncConfig, transport: Arc<T>, store: Arc<S>) -> Self {
        Self::with_connectivity(config, transport, store, Arc::new(OnlineProbe))
    }

    /// Creates an engine with an explicit connectivity probe.
    pub fn with_connectivity(
        config: SyncConfig,
        transport: Arc<T>,
        store: Arc<S>,
        connectivity: Arc<dyn ConnectivityProbe>,
    ) -> Self {
        Self {
            config,
            transport,
            store,
            connectivity,
            stats: RwLock::new(SyncStats::default()),
        }
    }

    /// The engine configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Number of queued local mutations.
    pub fn pending_count(&self) -> usize {
        self.store.pending_count()
    }

    /// A snapshot of the running counters.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Forces a full re-download on the next pull.
    pub fn reset_checkpoint(&self) {
        self.store.reset_checkpoint();
    }

    /// Pushes the queued mutations, one batch, oldest first.
    ///
    /// Acknowledged entries leave the queue; rejected ones stay with an
    /// incremented retry count. A transport failure leaves the whole queue
    /// untouched.
    pub fn push(&self) -> PushOutcome {
        if !self.connectivity.has_network() {
            tracing::debug!("push skipped, no network");
            return PushOutcome::offline();
        }

        let entries = match self.store.pending_mutations() {
            Ok(entries) => entries,
            Err(e) => return self.push_failed(SyncError::from(e)),
        };
        if entries.is_empty() {
            return PushOutcome::clean();
        }

        let operations = entries.iter().map(|e| e.to_mutation()).collect();
        let request = PushRequest::new(self.store.device_id(), operations);
        tracing::info!(count = entries.len(), "pushing queued mutations");

        let response = match self.transport.push(&request) {
            Ok(response) => response,
            Err(e) => return self.push_failed(e),
        };

        let mut acked = Vec::new();
        let mut rejected = Vec::new();
        for entry in &entries {
            if response.rejected(entry.entity_id, entry.kind) {
                rejected.push(entry.queue_id);
            } else {
                acked.push(entry.queue_id);
            }
        }

        if let Err(e) = self.store.remove_mutations(&acked) {
            return self.push_failed(SyncError::from(e));
        }
        if let Err(e) = self.store.bump_retry(&rejected) {
            return self.push_failed(SyncError::from(e));
        }

        if !rejected.is_empty() {
            tracing::warn!(
                rejected = rejected.len(),
                "server rejected some mutations, left queued"
            );
        }
        self.stats.write().mutations_pushed += acked.len() as u64;

        PushOutcome {
            success: true,
            pushed: acked.len(),
            rejected: rejected.len(),
            message: response.errors.first().map(|e| e.message.clone()),
        }
    }

    /// Pulls the delta since the checkpoint and applies it.
    ///
    /// Reference rows land first, then assets; an asset whose parent is
    /// still missing is deferred and the checkpoint stays put, so the next
    /// pull re-requests the same window. Only a fully applied delta
    /// advances the watermark.
    pub fn pull(&self) -> PullOutcome {
        if !self.connectivity.has_network() {
            tracing::debug!("pull skipped, no network");
            return PullOutcome::offline();
        }

        let since = self.store.last_sync_timestamp();
        let request = PullRequest::new(self.store.device_id(), since);
        let delta = match self.transport.pull(&request) {
            Ok(delta) => delta,
            Err(e) => return self.pull_failed(e),
        };
        tracing::info!(
            since,
            records = delta.record_count(),
            "applying pulled delta"
        );

        let reference_applied = match self.store.apply_reference_delta(
            &delta.categories,
            &delta.locations,
            &delta.departments,
        ) {
            Ok(count) => count,
            Err(e) => return self.pull_failed(SyncError::from(e)),
        };

        let assets = match self.store.apply_asset_delta(&delta.assets) {
            Ok(outcome) => outcome,
            Err(e) => return self.pull_failed(SyncError::from(e)),
        };

        let checkpoint_advanced = assets.deferred.is_empty();
        if checkpoint_advanced {
            if let Err(e) = self.store.set_last_sync_timestamp(delta.server_timestamp) {
                return self.pull_failed(SyncError::from(e));
            }
        } else {
            tracing::warn!(
                deferred = assets.deferred.len(),
                "assets deferred, checkpoint held for re-request"
            );
        }

        let applied = reference_applied + assets.applied;
        self.stats.write().records_pulled += applied as u64;

        PullOutcome {
            success: true,
            applied,
            deferred: assets.deferred.len(),
            checkpoint_advanced,
            message: None,
        }
    }

    /// Runs one full cycle: push first, so a pull cannot clobber local
    /// edits the server has not seen yet, then pull.
    pub fn full_sync(&self) -> SyncSummary {
        self.stats.write().cycles += 1;

        let push = self.push();
        let pull = self.pull();
        let summary = SyncSummary { push, pull };

        if summary.is_success() {
            let mut stats = self.stats.write();
            stats.cycles_succeeded += 1;
            stats.last_error = None;
        }
        summary
    }

    fn push_failed(&self, error: SyncError) -> PushOutcome {
        tracing::warn!(error = %error, "push failed, queue untouched");
        self.stats.write().last_error = Some(error.to_string());
        PushOutcome::failed(error.to_string())
    }

    fn pull_failed(&self, error: SyncError) -> PullOutcome {
        tracing::warn!(error = %error, "pull failed, checkpoint untouched");
        self.stats.write().last_error = Some(error.to_string());
        PullOutcome::failed(error.to_string())
    }
}
