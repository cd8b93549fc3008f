//! Domain entity records exchanged between client and server.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Checkpoint sentinel meaning "never synced".
///
/// A pull with this watermark returns the server's entire dataset, since
/// every `date_modified` is strictly greater than it.
pub const CHECKPOINT_EPOCH: i64 = 0;

/// The kind of entity a mutation or record refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// A tracked asset (child of the three reference tables).
    Asset,
    /// An asset category.
    Category,
    /// A physical location.
    Location,
    /// An owning department.
    Department,
}

impl EntityKind {
    /// Returns true for reference tables that assets point at.
    pub fn is_reference(&self) -> bool {
        !matches!(self, EntityKind::Asset)
    }
}

/// Lifecycle status of an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetStatus {
    /// In stock and assignable.
    Available,
    /// Checked out to a person or project.
    Assigned,
    /// Out for maintenance.
    InRepair,
    /// Removed from service.
    Retired,
}

/// An asset row as stored by the server of record.
///
/// `date_modified` is maintained by the server on every write and is the
/// sole signal used for delta computation. The three foreign keys are
/// enforced locally on the client, which is why reference rows must be
/// applied before assets during a pull.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRecord {
    /// Stable client-generated identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Manufacturer serial number, if known.
    pub serial_number: Option<String>,
    /// Lifecycle status.
    pub status: AssetStatus,
    /// Free-form notes.
    pub notes: Option<String>,
    /// Owning category.
    pub category_id: Uuid,
    /// Current location.
    pub location_id: Uuid,
    /// Owning department.
    pub department_id: Uuid,
    /// Server-authoritative modification time (epoch millis).
    pub date_modified: i64,
}

/// A sparse update to an asset.
///
/// Only fields that are `Some` are applied; this is last-write-wins per
/// field, so two devices editing different fields of the same asset while
/// both offline will merge without clobbering each other.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetPatch {
    /// New display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New serial number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    /// New lifecycle status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AssetStatus>,
    /// New notes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// New category.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<Uuid>,
    /// New location.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_id: Option<Uuid>,
    /// New department.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department_id: Option<Uuid>,
}

impl AssetPatch {
    /// Returns true if the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        *self == AssetPatch::default()
    }

    /// Applies the patch onto a record, leaving `id` and `date_modified`
    /// untouched.
    pub fn apply_to(&self, record: &mut AssetRecord) {
        if let Some(name) = &self.name {
            record.name = name.clone();
        }
        if let Some(serial) = &self.serial_number {
            record.serial_number = Some(serial.clone());
        }
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(notes) = &self.notes {
            record.notes = Some(notes.clone());
        }
        if let Some(category_id) = self.category_id {
            record.category_id = category_id;
        }
        if let Some(location_id) = self.location_id {
            record.location_id = location_id;
        }
        if let Some(department_id) = self.department_id {
            record.department_id = department_id;
        }
    }
}

macro_rules! reference_record {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        pub struct $name {
            /// Stable identifier.
            pub id: Uuid,
            /// Display name.
            pub name: String,
            /// Optional description.
            pub description: Option<String>,
            /// Server-authoritative modification time (epoch millis).
            pub date_modified: i64,
        }

        impl $name {
            /// Creates a record with a fresh id and unset modification time.
            pub fn new(name: impl Into<String>) -> Self {
                Self {
                    id: Uuid::new_v4(),
                    name: name.into(),
                    description: None,
                    date_modified: CHECKPOINT_EPOCH,
                }
            }
        }
    };
}

reference_record! {
    /// An asset category (reference table).
    CategoryRecord
}

reference_record! {
    /// A physical location (reference table).
    LocationRecord
}

reference_record! {
    /// An owning department (reference table).
    DepartmentRecord
}
