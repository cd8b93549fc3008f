//! Queued client mutations.

use crate::entity::EntityKind;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The kind of change a mutation represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MutationKind {
    /// Entity was created locally; payload is the full record.
    Create,
    /// Entity was updated locally; payload is a sparse patch.
    Update,
    /// Entity was deleted locally; payload is null.
    Delete,
}

/// A single queued change replayed against the server of record.
///
/// Clients generate entity ids up front (UUIDv4), so offline-created rows
/// never collide and never need server-side id translation. `created_at`
/// is the client-local enqueue time and only orders operations within one
/// device's batch; it is never compared across devices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncMutation {
    /// Which table the mutation targets.
    pub entity_kind: EntityKind,
    /// Stable client-generated identifier of the entity.
    pub entity_id: Uuid,
    /// Create, Update or Delete.
    pub kind: MutationKind,
    /// Snapshot (Create) or sparse patch (Update) of the entity at
    /// mutation time; `null` for deletes.
    pub payload: serde_json::Value,
    /// Client-local enqueue time (epoch millis), used for ordering.
    pub created_at: i64,
}

impl SyncMutation {
    /// Creates a Create mutation from a serializable record.
    pub fn create<T: Serialize>(
        entity_kind: EntityKind,
        entity_id: Uuid,
        record: &T,
        created_at: i64,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            entity_kind,
            entity_id,
            kind: MutationKind::Create,
            payload: serde_json::to_value(record)?,
            created_at,
        })
    }

    /// Creates an Update mutation from a sparse patch.
    pub fn update<T: Serialize>(
        entity_kind: EntityKind,
        entity_id: Uuid,
        patch: &T,
        created_at: i64,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            entity_kind,
            entity_id,
            kind: MutationKind::Update,
            payload: serde_json::to_value(patch)?,
            created_at,
        })
    }

    /// Creates a Delete mutation.
    pub fn delete(entity_kind: EntityKind, entity_id: Uuid, created_at: i64) -> Self {
        Self {
            entity_kind,
            entity_id,
            kind: MutationKind::Delete,
            payload: serde_json::Value::Null,
            created_at,
        }
    }
}
