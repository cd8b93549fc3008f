//! Main sync server facade.

use crate::apply::ApplyHandler;
use crate::clock::{Clock, SystemClock};
use crate::config::ServerConfig;
use crate::delta::DeltaBuilder;
use crate::error::{ServerError, ServerResult};
use crate::store::ServerStore;
use invsync_protocol::{PullRequest, PullResponse, PushRequest, PushResponse};
use std::sync::Arc;

/// The sync server.
///
/// Wires the apply handler and the delta builder over one shared store.
/// An HTTP layer exposes [`SyncServer::handle_push`] and
/// [`SyncServer::handle_pull`] as POST endpoints; the server itself is
/// transport-agnostic, which is what makes network-free end-to-end tests
/// possible on the client side.
pub struct SyncServer {
    config: ServerConfig,
    store: Arc<ServerStore>,
    apply: ApplyHandler,
    delta: DeltaBuilder,
}

impl SyncServer {
    /// Creates a server on the wall clock.
    pub fn new(config: ServerConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates a server on an injected clock (deterministic tests).
    pub fn with_clock(config: ServerConfig, clock: Arc<dyn Clock>) -> Self {
        let store = Arc::new(ServerStore::new(clock));
        let apply = ApplyHandler::new(Arc::clone(&store));
        let delta = DeltaBuilder::new(Arc::clone(&store));
        Self {
            config,
            store,
            apply,
            delta,
        }
    }

    /// The underlying system of record. The out-of-scope CRUD API writes
    /// reference data through this same store, so its writes get the same
    /// `date_modified` stamping as synced ones.
    pub fn store(&self) -> &Arc<ServerStore> {
        &self.store
    }

    /// Handles a push request: replays the batch idempotently.
    pub fn handle_push(&self, request: &PushRequest) -> ServerResult<PushResponse> {
        if request.operations.len() > self.config.max_push_batch as usize {
            return Err(ServerError::InvalidRequest(format!(
                "batch of {} exceeds limit {}",
                request.operations.len(),
                self.config.max_push_batch
            )));
        }

        tracing::info!(
            device = %request.device_id,
            operations = request.operations.len(),
            "applying push batch"
        );
        Ok(self.apply.handle(request))
    }

    /// Handles a pull request: returns the delta since the watermark.
    pub fn handle_pull(&self, request: &PullRequest) -> ServerResult<PullResponse> {
        Ok(self.delta.handle(request))
    }
}
