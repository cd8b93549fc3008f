//! Configuration for the sync engine and scheduler.

use std::time::Duration;

/// Configuration for sync operations.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Base URL of the sync server.
    pub server_url: String,
    /// Request timeout. No network call in a cycle may outlive this, so a
    /// cycle is bounded even without an explicit cancel signal.
    pub timeout: Duration,
    /// Interval between periodic scheduler ticks.
    pub sync_interval: Duration,
    /// Minimum elapsed time since the last sync *attempt* (not success)
    /// before another may start; absorbs bursts of manual triggers.
    pub min_attempt_gap: Duration,
    /// Battery charge fraction below which background sync is skipped
    /// unless the device is charging.
    pub battery_floor: f32,
}

impl SyncConfig {
    /// Creates a configuration for the given server.
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            timeout: Duration::from_secs(30),
            sync_interval: Duration::from_secs(15 * 60),
            min_attempt_gap: Duration::from_secs(30),
            battery_floor: 0.2,
        }
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the periodic tick interval.
    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    /// Sets the minimum gap between attempts.
    pub fn with_min_attempt_gap(mut self, gap: Duration) -> Self {
        self.min_attempt_gap = gap;
        self
    }

    /// Sets the battery floor.
    pub fn with_battery_floor(mut self, floor: f32) -> Self {
        self.battery_floor = floor;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new("")
    }
}
