//! Delta computation for pull requests.

use crate::store::ServerStore;
use invsync_protocol::{PullRequest, PullResponse};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

/// Computes the set of changed-or-referenced rows for a pull.
///
/// The asset list is every asset modified strictly after the client's
/// watermark. Each reference list is the union of rows modified after the
/// watermark and rows referenced by any asset in the result, even if that
/// parent row itself has not changed: the client's local foreign keys make
/// an asset delta useless without its parents, so they always travel in
/// the same round-trip.
pub struct DeltaBuilder {
    store: Arc<ServerStore>,
}

impl DeltaBuilder {
    /// Creates a builder over the given store.
    pub fn new(store: Arc<ServerStore>) -> Self {
        Self { store }
    }

    /// Builds the delta for one pull request.
    pub fn handle(&self, request: &PullRequest) -> PullResponse {
        let since = request.last_sync_timestamp;
        // The watermark is captured before any table scan: a write landing
        // while the delta is being assembled is stamped at or after it, so
        // the strictly-greater filter delivers that row on the next pull
        // instead of losing it below an already-advanced checkpoint.
        let server_timestamp = self.store.now_millis();
        let assets = self.store.assets_modified_after(since);

        let mut category_ids: HashSet<Uuid> = HashSet::new();
        let mut location_ids: HashSet<Uuid> = HashSet::new();
        let mut department_ids: HashSet<Uuid> = HashSet::new();
        for asset in &assets {
            category_ids.insert(asset.category_id);
            location_ids.insert(asset.location_id);
            department_ids.insert(asset.department_id);
        }

        let categories = merge_by_id(
            self.store.categories_modified_after(since),
            self.store.categories_by_ids(&category_ids),
            |c| c.id,
        );
        let locations = merge_by_id(
            self.store.locations_modified_after(since),
            self.store.locations_by_ids(&location_ids),
            |l| l.id,
        );
        let departments = merge_by_id(
            self.store.departments_modified_after(since),
            self.store.departments_by_ids(&department_ids),
            |d| d.id,
        );

        tracing::debug!(
            device = %request.device_id,
            since,
            assets = assets.len(),
            references = categories.len() + locations.len() + departments.len(),
            server_timestamp,
            "built delta"
        );

        PullResponse {
            categories,
            locations,
            departments,
            assets,
            server_timestamp,
        }
    }
}

/// Unions two row sets, deduplicating by id.
fn merge_by_id<T>(changed: Vec<T>, referenced: Vec<T>, id_of: impl Fn(&T) -> Uuid) -> Vec<T> {
    let mut seen: HashSet<Uuid> = HashSet::new();
    let mut merged = Vec::with_capacity(changed.len() + referenced.len());
    for row in changed.into_iter().chain(referenced) {
        if seen.insert(id_of(&row)) {
            merged.push(row);
        }
    }
    merged
}
