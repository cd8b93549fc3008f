//! Push and pull protocol messages.

use crate::entity::{AssetRecord, CategoryRecord, DepartmentRecord, EntityKind, LocationRecord};
use crate::mutation::{MutationKind, SyncMutation};
use crate::ProtocolResult;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Push request from client: one batch of queued mutations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushRequest {
    /// Stable installation identifier.
    pub device_id: Uuid,
    /// Queued mutations in client enqueue order (oldest first).
    pub operations: Vec<SyncMutation>,
}

impl PushRequest {
    /// Creates a new push request.
    pub fn new(device_id: Uuid, operations: Vec<SyncMutation>) -> Self {
        Self {
            device_id,
            operations,
        }
    }

    /// Encodes to a JSON body.
    pub fn to_json(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes from a JSON body.
    pub fn from_json(bytes: &[u8]) -> ProtocolResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// A per-item failure reported by the server during apply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushError {
    /// Entity the failing operation targeted.
    pub entity_id: Uuid,
    /// The failing operation's kind.
    pub kind: MutationKind,
    /// Which table the operation targeted.
    pub entity_kind: EntityKind,
    /// Human-readable reason.
    pub message: String,
}

/// Push response from server.
///
/// An operation in the request that is not named in `errors` was applied
/// (or was an idempotent no-op) and may be removed from the client queue.
/// Operations named in `errors` must stay queued for retry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushResponse {
    /// Operations applied successfully (idempotent no-ops included).
    pub success_count: u32,
    /// Operations rejected.
    pub failure_count: u32,
    /// One entry per rejected operation.
    pub errors: Vec<PushError>,
}

impl PushResponse {
    /// Creates a response for a fully successful batch.
    pub fn success(success_count: u32) -> Self {
        Self {
            success_count,
            failure_count: 0,
            errors: Vec::new(),
        }
    }

    /// Creates a response with per-item failures.
    pub fn with_errors(success_count: u32, errors: Vec<PushError>) -> Self {
        Self {
            success_count,
            failure_count: errors.len() as u32,
            errors,
        }
    }

    /// Returns true if the given operation was rejected.
    pub fn rejected(&self, entity_id: Uuid, kind: MutationKind) -> bool {
        self.errors
            .iter()
            .any(|e| e.entity_id == entity_id && e.kind == kind)
    }

    /// Encodes to a JSON body.
    pub fn to_json(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes from a JSON body.
    pub fn from_json(bytes: &[u8]) -> ProtocolResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Pull request from client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    /// Stable installation identifier.
    pub device_id: Uuid,
    /// Watermark of the last fully applied pull (epoch millis).
    pub last_sync_timestamp: i64,
}

impl PullRequest {
    /// Creates a new pull request.
    pub fn new(device_id: Uuid, last_sync_timestamp: i64) -> Self {
        Self {
            device_id,
            last_sync_timestamp,
        }
    }

    /// Encodes to a JSON body.
    pub fn to_json(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes from a JSON body.
    pub fn from_json(bytes: &[u8]) -> ProtocolResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Pull response from server: the delta since the client's watermark.
///
/// Reference lists contain rows modified after the watermark **plus** rows
/// referenced by any asset in `assets`, even if unchanged, so the client
/// can always satisfy its local foreign keys in the same round-trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullResponse {
    /// Changed-or-referenced categories.
    pub categories: Vec<CategoryRecord>,
    /// Changed-or-referenced locations.
    pub locations: Vec<LocationRecord>,
    /// Changed-or-referenced departments.
    pub departments: Vec<DepartmentRecord>,
    /// Assets modified strictly after the watermark.
    pub assets: Vec<AssetRecord>,
    /// Server time to become the client's new checkpoint.
    pub server_timestamp: i64,
}

impl PullResponse {
    /// Creates an empty delta at the given server time.
    pub fn empty(server_timestamp: i64) -> Self {
        Self {
            categories: Vec::new(),
            locations: Vec::new(),
            departments: Vec::new(),
            assets: Vec::new(),
            server_timestamp,
        }
    }

    /// Total number of records in the delta.
    pub fn record_count(&self) -> usize {
        self.categories.len() + self.locations.len() + self.departments.len() + self.assets.len()
    }

    /// Encodes to a JSON body.
    pub fn to_json(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes from a JSON body.
    pub fn from_json(bytes: &[u8]) -> ProtocolResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::CHECKPOINT_EPOCH;

    #[test]
    fn push_request_roundtrip() {
        let device_id = Uuid::new_v4();
        let operations = vec![SyncMutation::delete(EntityKind::Asset, Uuid::new_v4(), 7)];

        let request = PushRequest::new(device_id, operations.clone());
        let bytes = request.to_json().unwrap();
        let decoded = PushRequest::from_json(&bytes).unwrap();

        assert_eq!(decoded.device_id, device_id);
        assert_eq!(decoded.operations, operations);
    }

    #[test]
    fn push_response_rejection_lookup() {
        let rejected_id = Uuid::new_v4();
        let response = PushResponse::with_errors(
            3,
            vec![PushError {
                entity_id: rejected_id,
                kind: MutationKind::Update,
                entity_kind: EntityKind::Asset,
                message: "asset not found".into(),
            }],
        );

        assert_eq!(response.failure_count, 1);
        assert!(response.rejected(rejected_id, MutationKind::Update));
        assert!(!response.rejected(rejected_id, MutationKind::Delete));
        assert!(!response.rejected(Uuid::new_v4(), MutationKind::Update));
    }

    #[test]
    fn pull_request_roundtrip() {
        let request = PullRequest::new(Uuid::new_v4(), CHECKPOINT_EPOCH);
        let bytes = request.to_json().unwrap();
        let decoded = PullRequest::from_json(&bytes).unwrap();
        assert_eq!(decoded.last_sync_timestamp, CHECKPOINT_EPOCH);
    }

    #[test]
    fn empty_pull_response() {
        let response = PullResponse::empty(500);
        assert_eq!(response.record_count(), 0);
        assert_eq!(response.server_timestamp, 500);
    }

    #[test]
    fn malformed_body_is_an_error() {
        assert!(PushRequest::from_json(b"{not json").is_err());
        assert!(PullResponse::from_json(b"[]").is_err());
    }
}
