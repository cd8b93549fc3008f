//! The per-device sync checkpoint.

use invsync_protocol::CHECKPOINT_EPOCH;
use uuid::Uuid;

/// One row per installation, bounding delta pulls.
///
/// `last_sync_timestamp` is server-authoritative: it is set to the
/// `server_timestamp` of the last fully applied pull and never derived
/// from the local clock. Resetting it to [`CHECKPOINT_EPOCH`] forces a
/// full re-download on the next pull.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceCheckpoint {
    /// Stable installation identifier, generated once at first run.
    pub device_id: Uuid,
    /// Watermark of the last fully applied pull (epoch millis).
    pub last_sync_timestamp: i64,
    /// Reserved for future use (opaque server continuation token).
    pub sync_token: Option<String>,
}

impl DeviceCheckpoint {
    /// Creates the checkpoint for a fresh installation.
    pub fn new() -> Self {
        Self {
            device_id: Uuid::new_v4(),
            last_sync_timestamp: CHECKPOINT_EPOCH,
            sync_token: None,
        }
    }

    /// Returns true if this device has never completed a pull.
    pub fn is_initial(&self) -> bool {
        self.last_sync_timestamp == CHECKPOINT_EPOCH
    }
}

impl Default for DeviceCheckpoint {
    fn default() -> Self {
        Self::new()
    }
}
