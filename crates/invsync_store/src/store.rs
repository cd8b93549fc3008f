//! The embedded local store.

use crate::checkpoint::DeviceCheckpoint;
use crate::error::{StoreError, StoreResult};
use crate::queue::MutationQueueEntry;
use invsync_protocol::{
    AssetPatch, AssetRecord, CategoryRecord, DepartmentRecord, EntityKind, LocationRecord,
    MutationKind,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Current local wall clock in epoch milliseconds.
fn local_now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// All tables of one installation.
#[derive(Debug, Clone)]
struct Tables {
    categories: HashMap<Uuid, CategoryRecord>,
    locations: HashMap<Uuid, LocationRecord>,
    departments: HashMap<Uuid, DepartmentRecord>,
    assets: HashMap<Uuid, AssetRecord>,
    queue: Vec<MutationQueueEntry>,
    next_queue_id: u64,
    checkpoint: DeviceCheckpoint,
}

impl Tables {
    fn new() -> Self {
        Self {
            categories: HashMap::new(),
            locations: HashMap::new(),
            departments: HashMap::new(),
            assets: HashMap::new(),
            queue: Vec::new(),
            next_queue_id: 1,
            checkpoint: DeviceCheckpoint::new(),
        }
    }
}

/// Result of applying a pulled asset list.
#[derive(Debug, Clone, Default)]
pub struct AssetApplyOutcome {
    /// Assets upserted.
    pub applied: usize,
    /// Assets skipped because a parent row was missing locally. These are
    /// deferred, not dropped: the caller must leave the checkpoint where
    /// it was so the same delta is re-requested next cycle.
    pub deferred: Vec<Uuid>,
}

/// A staged view of the store inside a transaction.
///
/// Changes made through the transaction become visible only when the
/// closure returns `Ok`; an `Err` discards everything, so an entity write
/// and its queue entry commit or roll back together.
pub struct StoreTxn<'a> {
    tables: &'a mut Tables,
}

impl StoreTxn<'_> {
    /// Inserts a new asset, enforcing the three foreign keys.
    pub fn insert_asset(&mut self, record: AssetRecord) -> StoreResult<()> {
        if self.tables.assets.contains_key(&record.id) {
            return Err(StoreError::DuplicateId {
                kind: EntityKind::Asset,
                id: record.id,
            });
        }
        if let Some((missing_kind, missing_id)) = self.missing_parent(&record) {
            return Err(StoreError::ForeignKeyViolation {
                asset_id: record.id,
                missing_kind,
                missing_id,
            });
        }
        self.tables.assets.insert(record.id, record);
        Ok(())
    }

    /// Overwrites or inserts an asset without re-checking duplicates.
    ///
    /// Foreign keys are still enforced; use [`StoreTxn::missing_parent`]
    /// first when a dangling key must be handled as a deferral instead of
    /// an error.
    pub fn upsert_asset(&mut self, record: AssetRecord) -> StoreResult<()> {
        if let Some((missing_kind, missing_id)) = self.missing_parent(&record) {
            return Err(StoreError::ForeignKeyViolation {
                asset_id: record.id,
                missing_kind,
                missing_id,
            });
        }
        self.tables.assets.insert(record.id, record);
        Ok(())
    }

    /// Returns the first unresolved foreign key of an asset, if any.
    pub fn missing_parent(&self, record: &AssetRecord) -> Option<(EntityKind, Uuid)> {
        if !self.tables.categories.contains_key(&record.category_id) {
            return Some((EntityKind::Category, record.category_id));
        }
        if !self.tables.locations.contains_key(&record.location_id) {
            return Some((EntityKind::Location, record.location_id));
        }
        if !self.tables.departments.contains_key(&record.department_id) {
            return Some((EntityKind::Department, record.department_id));
        }
        None
    }

    /// Removes an asset row.
    pub fn delete_asset(&mut self, id: Uuid) -> StoreResult<()> {
        self.tables
            .assets
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound {
                kind: EntityKind::Asset,
                id,
            })
    }

    /// Gets a mutable asset row.
    pub fn asset_mut(&mut self, id: Uuid) -> StoreResult<&mut AssetRecord> {
        self.tables.assets.get_mut(&id).ok_or(StoreError::NotFound {
            kind: EntityKind::Asset,
            id,
        })
    }

    /// Upserts a category by id.
    pub fn upsert_category(&mut self, record: CategoryRecord) {
        self.tables.categories.insert(record.id, record);
    }

    /// Upserts a location by id.
    pub fn upsert_location(&mut self, record: LocationRecord) {
        self.tables.locations.insert(record.id, record);
    }

    /// Upserts a department by id.
    pub fn upsert_department(&mut self, record: DepartmentRecord) {
        self.tables.departments.insert(record.id, record);
    }

    /// Appends a mutation queue entry in the same transaction.
    pub fn enqueue(
        &mut self,
        entity_kind: EntityKind,
        entity_id: Uuid,
        kind: MutationKind,
        payload: serde_json::Value,
    ) {
        let queue_id = self.tables.next_queue_id;
        self.tables.next_queue_id += 1;
        self.tables.queue.push(MutationQueueEntry {
            queue_id,
            entity_kind,
            entity_id,
            kind,
            payload,
            created_at: local_now_millis(),
            retry_count: 0,
        });
    }
}

/// The client's embedded store.
///
/// All mutation goes through [`LocalStore::transaction`], which stages a
/// copy of the tables and commits it atomically on success. Domain write
/// helpers (`create_asset` and friends) enqueue the matching mutation in
/// the same transaction, so the queue and the entity tables never diverge.
pub struct LocalStore {
    inner: RwLock<Tables>,
    write_hook: RwLock<Option<Box<dyn Fn() + Send + Sync>>>,
}

impl LocalStore {
    /// Creates an empty store with a fresh device checkpoint.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Tables::new()),
            write_hook: RwLock::new(None),
        }
    }

    /// Registers a callback fired after every committed local write that
    /// queued a mutation. The host wires this to an immediate sync
    /// attempt (e.g. a scheduler wakeup); the callback runs on the
    /// writing thread and must not block. Whether the attempt succeeds is
    /// invisible here; the queue holds the change either way.
    pub fn set_write_hook(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.write_hook.write() = Some(Box::new(hook));
    }

    fn notify_write(&self) {
        if let Some(hook) = self.write_hook.read().as_ref() {
            hook();
        }
    }

    /// The stable installation identifier, generated at first run.
    pub fn device_id(&self) -> Uuid {
        self.inner.read().checkpoint.device_id
    }

    /// Runs a closure against a staged copy of the tables, committing the
    /// copy only if the closure succeeds.
    pub fn transaction<F, R>(&self, f: F) -> StoreResult<R>
    where
        F: FnOnce(&mut StoreTxn<'_>) -> StoreResult<R>,
    {
        let mut guard = self.inner.write();
        let mut staged = guard.clone();
        let result = f(&mut StoreTxn {
            tables: &mut staged,
        })?;
        *guard = staged;
        Ok(result)
    }

    // ----- local domain writes (each enqueues a mutation atomically) -----

    /// Creates an asset locally and queues a Create mutation.
    pub fn create_asset(&self, mut record: AssetRecord) -> StoreResult<()> {
        record.date_modified = local_now_millis();
        let payload = serde_json::to_value(&record)?;
        self.transaction(|txn| {
            let id = record.id;
            txn.insert_asset(record.clone())?;
            txn.enqueue(EntityKind::Asset, id, MutationKind::Create, payload.clone());
            Ok(())
        })?;
        self.notify_write();
        Ok(())
    }

    /// Patches an asset locally and queues an Update mutation carrying
    /// only the patched fields.
    pub fn update_asset(&self, id: Uuid, patch: &AssetPatch) -> StoreResult<()> {
        let payload = serde_json::to_value(patch)?;
        let queued = self.transaction(|txn| {
            let record = txn.asset_mut(id)?;
            // An empty patch changes nothing and wastes no queue entry.
            if patch.is_empty() {
                return Ok(false);
            }
            patch.apply_to(record);
            record.date_modified = local_now_millis();
            txn.enqueue(EntityKind::Asset, id, MutationKind::Update, payload.clone());
            Ok(true)
        })?;
        if queued {
            self.notify_write();
        }
        Ok(())
    }

    /// Deletes an asset locally and queues a Delete mutation.
    pub fn delete_asset(&self, id: Uuid) -> StoreResult<()> {
        self.transaction(|txn| {
            txn.delete_asset(id)?;
            txn.enqueue(
                EntityKind::Asset,
                id,
                MutationKind::Delete,
                serde_json::Value::Null,
            );
            Ok(())
        })?;
        self.notify_write();
        Ok(())
    }

    // ----- reads -----

    /// Gets an asset by id.
    pub fn asset(&self, id: Uuid) -> Option<AssetRecord> {
        self.inner.read().assets.get(&id).cloned()
    }

    /// Gets a category by id.
    pub fn category(&self, id: Uuid) -> Option<CategoryRecord> {
        self.inner.read().categories.get(&id).cloned()
    }

    /// Gets a location by id.
    pub fn location(&self, id: Uuid) -> Option<LocationRecord> {
        self.inner.read().locations.get(&id).cloned()
    }

    /// Gets a department by id.
    pub fn department(&self, id: Uuid) -> Option<DepartmentRecord> {
        self.inner.read().departments.get(&id).cloned()
    }

    /// Number of asset rows.
    pub fn asset_count(&self) -> usize {
        self.inner.read().assets.len()
    }

    // ----- mutation queue -----

    /// Pending mutations in push order: oldest first, so dependent creates
    /// are replayed before their updates.
    pub fn pending_mutations(&self) -> Vec<MutationQueueEntry> {
        let mut entries = self.inner.read().queue.clone();
        entries.sort_by_key(|e| (e.created_at, e.queue_id));
        entries
    }

    /// Number of queued mutations.
    pub fn pending_count(&self) -> usize {
        self.inner.read().queue.len()
    }

    /// Removes acknowledged entries from the queue.
    pub fn remove_mutations(&self, queue_ids: &[u64]) {
        self.inner
            .write()
            .queue
            .retain(|e| !queue_ids.contains(&e.queue_id));
    }

    /// Increments the retry count of rejected entries.
    pub fn bump_retry(&self, queue_ids: &[u64]) {
        let mut guard = self.inner.write();
        for entry in guard.queue.iter_mut() {
            if queue_ids.contains(&entry.queue_id) {
                entry.retry_count += 1;
            }
        }
    }

    // ----- checkpoint -----

    /// The current device checkpoint.
    pub fn checkpoint(&self) -> DeviceCheckpoint {
        self.inner.read().checkpoint.clone()
    }

    /// Advances the watermark after a fully applied pull.
    pub fn set_checkpoint_timestamp(&self, timestamp: i64) {
        self.inner.write().checkpoint.last_sync_timestamp = timestamp;
    }

    /// Resets the watermark to the sentinel epoch, forcing a full
    /// re-download on the next pull. Recovery path for local corruption.
    pub fn reset_checkpoint(&self) {
        tracing::warn!("checkpoint reset, next pull will re-download everything");
        self.inner.write().checkpoint.last_sync_timestamp =
            invsync_protocol::CHECKPOINT_EPOCH;
    }

    // ----- pull apply phases -----

    /// Upserts pulled reference rows in one transaction.
    ///
    /// Server records are taken wholesale, including their authoritative
    /// `date_modified`, which keeps re-application a no-op.
    pub fn apply_reference_delta(
        &self,
        categories: &[CategoryRecord],
        locations: &[LocationRecord],
        departments: &[DepartmentRecord],
    ) -> StoreResult<usize> {
        self.transaction(|txn| {
            for record in categories {
                txn.upsert_category(record.clone());
            }
            for record in locations {
                txn.upsert_location(record.clone());
            }
            for record in departments {
                txn.upsert_department(record.clone());
            }
            Ok(categories.len() + locations.len() + departments.len())
        })
    }

    /// Upserts pulled assets in one transaction, deferring any whose
    /// parent rows are still missing locally.
    pub fn apply_asset_delta(&self, assets: &[AssetRecord]) -> StoreResult<AssetApplyOutcome> {
        self.transaction(|txn| {
            let mut outcome = AssetApplyOutcome::default();
            for record in assets {
                if let Some((missing_kind, missing_id)) = txn.missing_parent(record) {
                    tracing::debug!(
                        asset = %record.id,
                        parent_kind = ?missing_kind,
                        parent = %missing_id,
                        "deferring asset, parent not present locally"
                    );
                    outcome.deferred.push(record.id);
                    continue;
                }
                txn.upsert_asset(record.clone())?;
                outcome.applied += 1;
            }
            Ok(outcome)
        })
    }
}

impl Default for LocalStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use invsync_protocol::AssetStatus;

    fn seeded_store() -> (LocalStore, CategoryRecord, LocationRecord, DepartmentRecord) {
        let store = LocalStore::new();
        let category = CategoryRecord::new("Laptops");
        let location = LocationRecord::new("HQ");
        let department = DepartmentRecord::new("Engineering");

        store
            .apply_reference_delta(
                &[category.clone()],
                &[location.clone()],
                &[department.clone()],
            )
            .unwrap();

        (store, category, location, department)
    }

    fn asset_for(
        category: &CategoryRecord,
        location: &LocationRecord,
        department: &DepartmentRecord,
    ) -> AssetRecord {
        AssetRecord {
            id: Uuid::new_v4(),
            name: "Thinkpad X1".into(),
            serial_number: None,
            status: AssetStatus::Available,
            notes: None,
            category_id: category.id,
            location_id: location.id,
            department_id: department.id,
            date_modified: 0,
        }
    }

    #[test]
    fn create_enqueues_atomically() {
        let (store, category, location, department) = seeded_store();
        let record = asset_for(&category, &location, &department);
        let id = record.id;

        store.create_asset(record).unwrap();

        assert!(store.asset(id).is_some());
        let pending = store.pending_mutations();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].entity_id, id);
        assert_eq!(pending[0].kind, MutationKind::Create);
    }

    #[test]
    fn create_with_dangling_fk_leaves_no_trace() {
        let store = LocalStore::new();
        let record = AssetRecord {
            id: Uuid::new_v4(),
            name: "orphan".into(),
            serial_number: None,
            status: AssetStatus::Available,
            notes: None,
            category_id: Uuid::new_v4(),
            location_id: Uuid::new_v4(),
            department_id: Uuid::new_v4(),
            date_modified: 0,
        };

        let err = store.create_asset(record).unwrap_err();
        assert!(matches!(err, StoreError::ForeignKeyViolation { .. }));

        // Neither the row nor the queue entry made it in.
        assert_eq!(store.asset_count(), 0);
        assert_eq!(store.pending_count(), 0);
    }

    #[test]
    fn no_queue_compaction() {
        let (store, category, location, department) = seeded_store();
        let record = asset_for(&category, &location, &department);
        let id = record.id;
        store.create_asset(record).unwrap();

        for i in 0..5 {
            let patch = AssetPatch {
                name: Some(format!("rev {i}")),
                ..AssetPatch::default()
            };
            store.update_asset(id, &patch).unwrap();
        }

        // One create plus five updates; nothing collapsed.
        assert_eq!(store.pending_count(), 6);
    }

    #[test]
    fn committed_writes_fire_the_hook_once_each() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let (store, category, location, department) = seeded_store();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        store.set_write_hook(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let record = asset_for(&category, &location, &department);
        let id = record.id;
        store.create_asset(record).unwrap();
        store
            .update_asset(
                id,
                &AssetPatch {
                    status: Some(AssetStatus::Assigned),
                    ..AssetPatch::default()
                },
            )
            .unwrap();
        store.delete_asset(id).unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 3);

        // A no-op patch and a failed write stay silent.
        let survivor = asset_for(&category, &location, &department);
        let survivor_id = survivor.id;
        store.create_asset(survivor).unwrap();
        store
            .update_asset(survivor_id, &AssetPatch::default())
            .unwrap();
        store.delete_asset(Uuid::new_v4()).unwrap_err();
        assert_eq!(fired.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn empty_patch_queues_nothing() {
        let (store, category, location, department) = seeded_store();
        let record = asset_for(&category, &location, &department);
        let id = record.id;
        store.create_asset(record).unwrap();

        let before = store.asset(id).unwrap();
        store.update_asset(id, &AssetPatch::default()).unwrap();

        assert_eq!(store.asset(id).unwrap(), before);
        assert_eq!(store.pending_count(), 1);
    }

    #[test]
    fn update_missing_asset_fails() {
        let store = LocalStore::new();
        let err = store
            .update_asset(Uuid::new_v4(), &AssetPatch::default())
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
        assert_eq!(store.pending_count(), 0);
    }

    #[test]
    fn remove_and_bump_retry() {
        let (store, category, location, department) = seeded_store();
        let a = asset_for(&category, &location, &department);
        let b = asset_for(&category, &location, &department);
        store.create_asset(a).unwrap();
        store.create_asset(b).unwrap();

        let pending = store.pending_mutations();
        let (first, second) = (pending[0].queue_id, pending[1].queue_id);

        store.remove_mutations(&[first]);
        store.bump_retry(&[second]);

        let pending = store.pending_mutations();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].queue_id, second);
        assert_eq!(pending[0].retry_count, 1);
    }

    #[test]
    fn pending_order_is_oldest_first() {
        let (store, category, location, department) = seeded_store();
        let record = asset_for(&category, &location, &department);
        let id = record.id;
        store.create_asset(record).unwrap();
        store
            .update_asset(
                id,
                &AssetPatch {
                    status: Some(AssetStatus::Assigned),
                    ..AssetPatch::default()
                },
            )
            .unwrap();

        let pending = store.pending_mutations();
        assert_eq!(pending[0].kind, MutationKind::Create);
        assert_eq!(pending[1].kind, MutationKind::Update);
    }

    #[test]
    fn checkpoint_reset_restores_sentinel() {
        let store = LocalStore::new();
        store.set_checkpoint_timestamp(9_999);
        assert!(!store.checkpoint().is_initial());

        store.reset_checkpoint();
        assert!(store.checkpoint().is_initial());
    }

    #[test]
    fn asset_delta_defers_on_missing_parent() {
        let (store, category, location, department) = seeded_store();

        let ok = asset_for(&category, &location, &department);
        let mut orphan = asset_for(&category, &location, &department);
        orphan.category_id = Uuid::new_v4();

        let outcome = store
            .apply_asset_delta(&[ok.clone(), orphan.clone()])
            .unwrap();

        assert_eq!(outcome.applied, 1);
        assert_eq!(outcome.deferred, vec![orphan.id]);
        assert!(store.asset(ok.id).is_some());
        assert!(store.asset(orphan.id).is_none());
    }

    #[test]
    fn reference_upsert_is_idempotent() {
        let (store, category, location, department) = seeded_store();

        // Re-applying the same delta changes nothing.
        store
            .apply_reference_delta(
                &[category.clone()],
                &[location.clone()],
                &[department.clone()],
            )
            .unwrap();

        assert_eq!(store.category(category.id).unwrap(), category);
    }

    #[test]
    fn reference_upsert_overwrites_scalars() {
        let (store, mut category, _, _) = seeded_store();
        category.name = "Workstations".into();
        category.date_modified = 777;

        store.apply_reference_delta(&[category.clone()], &[], &[]).unwrap();

        let stored = store.category(category.id).unwrap();
        assert_eq!(stored.name, "Workstations");
        assert_eq!(stored.date_modified, 777);
    }
}
