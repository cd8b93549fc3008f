//! The append-only mutation queue.

use invsync_protocol::{EntityKind, MutationKind, SyncMutation};
use uuid::Uuid;

/// One pending local change, waiting to be pushed.
///
/// Entries are appended in the same transaction as the entity write that
/// produced them and removed only once the server acknowledges them. There
/// is no compaction: five updates to the same entity queue five entries,
/// preserving audit-style ordering at the cost of bandwidth.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationQueueEntry {
    /// Monotonic local id, used as a stable tiebreaker for ordering and
    /// for acknowledgement.
    pub queue_id: u64,
    /// Which table the mutation targets.
    pub entity_kind: EntityKind,
    /// Stable client-generated identifier of the entity.
    pub entity_id: Uuid,
    /// Create, Update or Delete.
    pub kind: MutationKind,
    /// Snapshot or sparse patch of the entity at mutation time.
    pub payload: serde_json::Value,
    /// Client-local enqueue time (epoch millis).
    pub created_at: i64,
    /// How many push attempts have rejected this entry.
    pub retry_count: u32,
}

impl MutationQueueEntry {
    /// Converts the entry into its wire form.
    pub fn to_mutation(&self) -> SyncMutation {
        SyncMutation {
            entity_kind: self.entity_kind,
            entity_id: self.entity_id,
            kind: self.kind,
            payload: self.payload.clone(),
            created_at: self.created_at,
        }
    }
}
