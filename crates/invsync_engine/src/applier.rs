//! The engine's seam to the local store.

use invsync_protocol::{AssetRecord, CategoryRecord, DepartmentRecord, LocationRecord};
use invsync_store::{AssetApplyOutcome, LocalStore, MutationQueueEntry, StoreResult};
use uuid::Uuid;

/// What the sync engine needs from the client's local store.
///
/// [`LocalStore`] is the production implementation; tests wrap it to
/// inject failures at phase boundaries (e.g. a crash between the
/// reference-data commit and the asset commit of a pull).
pub trait SyncStore: Send + Sync {
    /// The stable installation identifier.
    fn device_id(&self) -> Uuid;

    /// Queued mutations in push order (oldest first).
    fn pending_mutations(&self) -> StoreResult<Vec<MutationQueueEntry>>;

    /// Number of queued mutations.
    fn pending_count(&self) -> usize;

    /// Removes acknowledged entries.
    fn remove_mutations(&self, queue_ids: &[u64]) -> StoreResult<()>;

    /// Increments the retry count of rejected entries.
    fn bump_retry(&self, queue_ids: &[u64]) -> StoreResult<()>;

    /// Current pull watermark.
    fn last_sync_timestamp(&self) -> i64;

    /// Advances the pull watermark after a fully applied pull.
    fn set_last_sync_timestamp(&self, timestamp: i64) -> StoreResult<()>;

    /// Resets the watermark to the sentinel epoch.
    fn reset_checkpoint(&self);

    /// Applies pulled reference rows in one transaction.
    fn apply_reference_delta(
        &self,
        categories: &[CategoryRecord],
        locations: &[LocationRecord],
        departments: &[DepartmentRecord],
    ) -> StoreResult<usize>;

    /// Applies pulled assets in one transaction, deferring rows whose
    /// parents are missing.
    fn apply_asset_delta(&self, assets: &[AssetRecord]) -> StoreResult<AssetApplyOutcome>;
}

impl SyncStore for LocalStore {
    fn device_id(&self) -> Uuid {
        LocalStore::device_id(self)
    }

    fn pending_mutations(&self) -> StoreResult<Vec<MutationQueueEntry>> {
        Ok(LocalStore::pending_mutations(self))
    }

    fn pending_count(&self) -> usize {
        LocalStore::pending_count(self)
    }

    fn remove_mutations(&self, queue_ids: &[u64]) -> StoreResult<()> {
        LocalStore::remove_mutations(self, queue_ids);
        Ok(())
    }

    fn bump_retry(&self, queue_ids: &[u64]) -> StoreResult<()> {
        LocalStore::bump_retry(self, queue_ids);
        Ok(())
    }

    fn last_sync_timestamp(&self) -> i64 {
        self.checkpoint().last_sync_timestamp
    }

    fn set_last_sync_timestamp(&self, timestamp: i64) -> StoreResult<()> {
        self.set_checkpoint_timestamp(timestamp);
        Ok(())
    }

    fn reset_checkpoint(&self) {
        LocalStore::reset_checkpoint(self)
    }

    fn apply_reference_delta(
        &self,
        categories: &[CategoryRecord],
        locations: &[LocationRecord],
        departments: &[DepartmentRecord],
    ) -> StoreResult<usize> {
        LocalStore::apply_reference_delta(self, categories, locations, departments)
    }

    fn apply_asset_delta(&self, assets: &[AssetRecord]) -> StoreResult<AssetApplyOutcome> {
        LocalStore::apply_asset_delta(self, assets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_store_satisfies_the_seam() {
        let store = LocalStore::new();
        let seam: &dyn SyncStore = &store;

        assert_eq!(seam.pending_count(), 0);
        assert_eq!(
            seam.last_sync_timestamp(),
            invsync_protocol::CHECKPOINT_EPOCH
        );

        seam.set_last_sync_timestamp(42).unwrap();
        assert_eq!(seam.last_sync_timestamp(), 42);

        seam.reset_checkpoint();
        assert_eq!(
            seam.last_sync_timestamp(),
            invsync_protocol::CHECKPOINT_EPOCH
        );
    }
}
