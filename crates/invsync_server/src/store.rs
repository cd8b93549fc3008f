//! The system of record.

use crate::clock::Clock;
use invsync_protocol::{
    AssetRecord, CategoryRecord, DepartmentRecord, EntityKind, LocationRecord,
};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Default)]
struct ServerTables {
    categories: HashMap<Uuid, CategoryRecord>,
    locations: HashMap<Uuid, LocationRecord>,
    departments: HashMap<Uuid, DepartmentRecord>,
    assets: HashMap<Uuid, AssetRecord>,
}

/// The server's entity tables.
///
/// Every write stamps `date_modified` from the server clock; that stamp is
/// the sole signal used for delta computation, so no other versioning
/// metadata is kept.
pub struct ServerStore {
    clock: Arc<dyn Clock>,
    tables: RwLock<ServerTables>,
}

macro_rules! reference_table_api {
    ($upsert:ident, $get:ident, $remove:ident, $modified_after:ident, $by_ids:ident, $has:ident, $field:ident, $record:ty) => {
        /// Inserts or overwrites a row, stamping `date_modified`.
        pub fn $upsert(&self, mut record: $record) {
            record.date_modified = self.clock.now_millis();
            self.tables.write().$field.insert(record.id, record);
        }

        /// Gets a row by id.
        pub fn $get(&self, id: Uuid) -> Option<$record> {
            self.tables.read().$field.get(&id).cloned()
        }

        /// Removes a row; returns false if it was already absent.
        pub fn $remove(&self, id: Uuid) -> bool {
            self.tables.write().$field.remove(&id).is_some()
        }

        /// Rows modified strictly after the given watermark.
        pub fn $modified_after(&self, timestamp: i64) -> Vec<$record> {
            self.tables
                .read()
                .$field
                .values()
                .filter(|r| r.date_modified > timestamp)
                .cloned()
                .collect()
        }

        /// Rows matching the given id set.
        pub fn $by_ids(&self, ids: &HashSet<Uuid>) -> Vec<$record> {
            self.tables
                .read()
                .$field
                .values()
                .filter(|r| ids.contains(&r.id))
                .cloned()
                .collect()
        }

        /// Returns true if the row exists.
        pub fn $has(&self, id: Uuid) -> bool {
            self.tables.read().$field.contains_key(&id)
        }
    };
}

impl ServerStore {
    /// Creates an empty store over the given clock.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            tables: RwLock::new(ServerTables::default()),
        }
    }

    /// Current server time in epoch milliseconds.
    pub fn now_millis(&self) -> i64 {
        self.clock.now_millis()
    }

    reference_table_api!(
        upsert_category,
        category,
        remove_category,
        categories_modified_after,
        categories_by_ids,
        has_category,
        categories,
        CategoryRecord
    );

    reference_table_api!(
        upsert_location,
        location,
        remove_location,
        locations_modified_after,
        locations_by_ids,
        has_location,
        locations,
        LocationRecord
    );

    reference_table_api!(
        upsert_department,
        department,
        remove_department,
        departments_modified_after,
        departments_by_ids,
        has_department,
        departments,
        DepartmentRecord
    );

    /// Inserts or overwrites an asset, stamping `date_modified`.
    pub fn upsert_asset(&self, mut record: AssetRecord) {
        record.date_modified = self.clock.now_millis();
        self.tables.write().assets.insert(record.id, record);
    }

    /// Gets an asset by id.
    pub fn asset(&self, id: Uuid) -> Option<AssetRecord> {
        self.tables.read().assets.get(&id).cloned()
    }

    /// Removes an asset; returns false if it was already absent.
    pub fn remove_asset(&self, id: Uuid) -> bool {
        self.tables.write().assets.remove(&id).is_some()
    }

    /// Returns true if the asset exists.
    pub fn has_asset(&self, id: Uuid) -> bool {
        self.tables.read().assets.contains_key(&id)
    }

    /// Assets modified strictly after the given watermark.
    pub fn assets_modified_after(&self, timestamp: i64) -> Vec<AssetRecord> {
        self.tables
            .read()
            .assets
            .values()
            .filter(|r| r.date_modified > timestamp)
            .cloned()
            .collect()
    }

    /// Number of asset rows.
    pub fn asset_count(&self) -> usize {
        self.tables.read().assets.len()
    }

    /// Returns true if any asset row points at the given reference row.
    pub fn asset_references(&self, kind: EntityKind, id: Uuid) -> bool {
        if !kind.is_reference() {
            return false;
        }
        self.tables.read().assets.values().any(|a| match kind {
            EntityKind::Category => a.category_id == id,
            EntityKind::Location => a.location_id == id,
            EntityKind::Department => a.department_id == id,
            EntityKind::Asset => false,
        })
    }

    /// The first reference table missing for the given asset, if any.
    pub fn missing_asset_parent(&self, record: &AssetRecord) -> Option<(&'static str, Uuid)> {
        if !self.has_category(record.category_id) {
            return Some(("category", record.category_id));
        }
        if !self.has_location(record.location_id) {
            return Some(("location", record.location_id));
        }
        if !self.has_department(record.department_id) {
            return Some(("department", record.department_id));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use invsync_protocol::AssetStatus;

    fn store_at(now: i64) -> (Arc<ManualClock>, ServerStore) {
        let clock = Arc::new(ManualClock::new(now));
        let store = ServerStore::new(Arc::clone(&clock) as Arc<dyn Clock>);
        (clock, store)
    }

    #[test]
    fn writes_are_stamped() {
        let (clock, store) = store_at(100);

        let category = CategoryRecord::new("Laptops");
        let id = category.id;
        store.upsert_category(category);
        assert_eq!(store.category(id).unwrap().date_modified, 100);

        clock.advance(50);
        store.upsert_category(CategoryRecord {
            id,
            ..store.category(id).unwrap()
        });
        assert_eq!(store.category(id).unwrap().date_modified, 150);
    }

    #[test]
    fn modified_after_is_strict() {
        let (clock, store) = store_at(100);
        store.upsert_category(CategoryRecord::new("at-100"));
        clock.advance(10);
        store.upsert_category(CategoryRecord::new("at-110"));

        assert_eq!(store.categories_modified_after(100).len(), 1);
        assert_eq!(store.categories_modified_after(99).len(), 2);
        assert_eq!(store.categories_modified_after(110).len(), 0);
    }

    #[test]
    fn missing_parent_detection() {
        let (_clock, store) = store_at(100);
        let category = CategoryRecord::new("Laptops");
        let location = LocationRecord::new("HQ");
        let department = DepartmentRecord::new("Eng");
        store.upsert_category(category.clone());
        store.upsert_location(location.clone());

        let record = AssetRecord {
            id: Uuid::new_v4(),
            name: "x".into(),
            serial_number: None,
            status: AssetStatus::Available,
            notes: None,
            category_id: category.id,
            location_id: location.id,
            department_id: department.id,
            date_modified: 0,
        };

        let (kind, id) = store.missing_asset_parent(&record).unwrap();
        assert_eq!(kind, "department");
        assert_eq!(id, department.id);

        store.upsert_department(department);
        assert!(store.missing_asset_parent(&record).is_none());
    }

    #[test]
    fn remove_is_idempotent() {
        let (_clock, store) = store_at(100);
        let category = CategoryRecord::new("Laptops");
        let id = category.id;
        store.upsert_category(category);

        assert!(store.remove_category(id));
        assert!(!store.remove_category(id));
    }
}
