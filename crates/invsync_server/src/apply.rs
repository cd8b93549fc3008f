//! Idempotent replay of client mutation batches.

use crate::store::ServerStore;
use invsync_protocol::{
    AssetRecord, CategoryRecord, DepartmentRecord, EntityKind, LocationRecord, MutationKind,
    PushError, PushRequest, PushResponse, SyncMutation,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// Replays a client's queued operations against the system of record.
///
/// Operations are applied strictly in client-submitted order, so a Create
/// followed by an Update for the same id within one batch lands correctly
/// even though both are new to the server in the same request. A failing
/// operation is reported per item and never aborts the rest of the batch.
pub struct ApplyHandler {
    store: Arc<ServerStore>,
}

impl ApplyHandler {
    /// Creates a handler over the given store.
    pub fn new(store: Arc<ServerStore>) -> Self {
        Self { store }
    }

    /// Applies one batch and reports per-item outcomes.
    pub fn handle(&self, request: &PushRequest) -> PushResponse {
        let mut success_count = 0u32;
        let mut errors = Vec::new();

        for operation in &request.operations {
            match self.apply_one(operation) {
                Ok(()) => success_count += 1,
                Err(message) => {
                    tracing::warn!(
                        device = %request.device_id,
                        entity = %operation.entity_id,
                        kind = ?operation.kind,
                        %message,
                        "rejected operation"
                    );
                    errors.push(PushError {
                        entity_id: operation.entity_id,
                        kind: operation.kind,
                        entity_kind: operation.entity_kind,
                        message,
                    });
                }
            }
        }

        if errors.is_empty() {
            PushResponse::success(success_count)
        } else {
            PushResponse::with_errors(success_count, errors)
        }
    }

    fn apply_one(&self, op: &SyncMutation) -> Result<(), String> {
        macro_rules! reference_arms {
            ($record:ty, $get:ident, $upsert:ident, $remove:ident, $label:literal) => {
                match op.kind {
                    MutationKind::Create => {
                        // Idempotent: a row with this id means the create
                        // was already applied.
                        if self.store.$get(op.entity_id).is_some() {
                            return Ok(());
                        }
                        let record: $record = parse_payload(op)?;
                        self.store.$upsert(record);
                        Ok(())
                    }
                    MutationKind::Update => {
                        let existing = self
                            .store
                            .$get(op.entity_id)
                            .ok_or_else(|| format!("{} {} not found", $label, op.entity_id))?;
                        let merged: $record = merge_patch(&existing, &op.payload)?;
                        self.store.$upsert(merged);
                        Ok(())
                    }
                    MutationKind::Delete => {
                        // A reference row with live assets pointing at it
                        // cannot go: removing it would leave a dangling
                        // foreign key that pins every client's pull.
                        if self.store.asset_references(op.entity_kind, op.entity_id) {
                            return Err(format!(
                                "{} {} is referenced by existing assets",
                                $label, op.entity_id
                            ));
                        }
                        // Idempotent: absent rows are treated as already
                        // deleted.
                        self.store.$remove(op.entity_id);
                        Ok(())
                    }
                }
            };
        }

        match op.entity_kind {
            EntityKind::Asset => self.apply_asset(op),
            EntityKind::Category => {
                reference_arms!(
                    CategoryRecord,
                    category,
                    upsert_category,
                    remove_category,
                    "category"
                )
            }
            EntityKind::Location => {
                reference_arms!(
                    LocationRecord,
                    location,
                    upsert_location,
                    remove_location,
                    "location"
                )
            }
            EntityKind::Department => {
                reference_arms!(
                    DepartmentRecord,
                    department,
                    upsert_department,
                    remove_department,
                    "department"
                )
            }
        }
    }

    fn apply_asset(&self, op: &SyncMutation) -> Result<(), String> {
        match op.kind {
            MutationKind::Create => {
                if self.store.has_asset(op.entity_id) {
                    return Ok(());
                }
                let record: AssetRecord = parse_payload(op)?;
                self.check_asset_parents(&record)?;
                self.store.upsert_asset(record);
                Ok(())
            }
            MutationKind::Update => {
                let existing = self
                    .store
                    .asset(op.entity_id)
                    .ok_or_else(|| format!("asset {} not found", op.entity_id))?;
                let merged: AssetRecord = merge_patch(&existing, &op.payload)?;
                self.check_asset_parents(&merged)?;
                self.store.upsert_asset(merged);
                Ok(())
            }
            MutationKind::Delete => {
                self.store.remove_asset(op.entity_id);
                Ok(())
            }
        }
    }

    fn check_asset_parents(&self, record: &AssetRecord) -> Result<(), String> {
        match self.store.missing_asset_parent(record) {
            Some((kind, id)) => Err(format!("referenced {kind} {id} does not exist")),
            None => Ok(()),
        }
    }
}

/// Deserializes a Create payload and checks its id against the operation.
fn parse_payload<T: DeserializeOwned + HasId>(op: &SyncMutation) -> Result<T, String> {
    let record: T = serde_json::from_value(op.payload.clone())
        .map_err(|e| format!("malformed payload: {e}"))?;
    if record.id() != op.entity_id {
        return Err(format!(
            "payload id {} does not match operation target {}",
            record.id(),
            op.entity_id
        ));
    }
    Ok(record)
}

/// Overlays the non-null fields of a patch onto an existing record.
///
/// `id` and `date_modified` are never patchable: the id is the identity of
/// the row and the modification stamp belongs to the server clock.
fn merge_patch<T: Serialize + DeserializeOwned>(
    existing: &T,
    patch: &serde_json::Value,
) -> Result<T, String> {
    let mut base = serde_json::to_value(existing).map_err(|e| e.to_string())?;

    let patch_fields = patch
        .as_object()
        .ok_or_else(|| "update payload must be a JSON object".to_string())?;
    let base_fields = base
        .as_object_mut()
        .ok_or_else(|| "record did not serialize to an object".to_string())?;

    for (field, value) in patch_fields {
        if value.is_null() || field == "id" || field == "date_modified" {
            continue;
        }
        base_fields.insert(field.clone(), value.clone());
    }

    serde_json::from_value(base).map_err(|e| format!("patched record invalid: {e}"))
}

/// Access to the stable id every domain record carries.
trait HasId {
    fn id(&self) -> uuid::Uuid;
}

macro_rules! has_id {
    ($($record:ty),+) => {
        $(impl HasId for $record {
            fn id(&self) -> uuid::Uuid {
                self.id
            }
        })+
    };
}

has_id!(AssetRecord, CategoryRecord, LocationRecord, DepartmentRecord);
