//! Host platform probes: connectivity and battery.
//!
//! The host application wires platform signals (reachability callbacks,
//! battery APIs) behind these traits; the engine and scheduler only ever
//! ask the two questions they need.

use std::sync::atomic::{AtomicBool, Ordering};

/// Reports whether the network is currently reachable.
pub trait ConnectivityProbe: Send + Sync {
    /// Returns true if the device has network access.
    fn has_network(&self) -> bool;
}

/// Reports battery state.
pub trait PowerProbe: Send + Sync {
    /// Battery charge as a fraction in `0.0..=1.0`.
    fn charge_level(&self) -> f32;

    /// Returns true if the device is on external power.
    fn is_charging(&self) -> bool;
}

/// A probe that always reports network access. Suitable for desktop
/// deployments without a reachability signal.
#[derive(Debug, Default, Clone, Copy)]
pub struct OnlineProbe;

impl ConnectivityProbe for OnlineProbe {
    fn has_network(&self) -> bool {
        true
    }
}

/// A probe that reports a full, charging battery. Suitable for hosts
/// without a battery.
#[derive(Debug, Default, Clone, Copy)]
pub struct MainsPower;

impl PowerProbe for MainsPower {
    fn charge_level(&self) -> f32 {
        1.0
    }

    fn is_charging(&self) -> bool {
        true
    }
}

/// A switchable connectivity probe for tests.
#[derive(Debug)]
pub struct MockConnectivity {
    online: AtomicBool,
}

impl MockConnectivity {
    /// Creates a probe in the given state.
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    /// Flips the reported state.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

impl ConnectivityProbe for MockConnectivity {
    fn has_network(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

/// A settable power probe for tests.
#[derive(Debug)]
pub struct MockPower {
    level_percent: std::sync::atomic::AtomicU32,
    charging: AtomicBool,
}

impl MockPower {
    /// Creates a probe with the given charge fraction and charging state.
    pub fn new(level: f32, charging: bool) -> Self {
        Self {
            level_percent: std::sync::atomic::AtomicU32::new((level * 100.0) as u32),
            charging: AtomicBool::new(charging),
        }
    }

    /// Sets the charge fraction.
    pub fn set_level(&self, level: f32) {
        self.level_percent
            .store((level * 100.0) as u32, Ordering::SeqCst);
    }

    /// Sets the charging state.
    pub fn set_charging(&self, charging: bool) {
        self.charging.store(charging, Ordering::SeqCst);
    }
}

impl PowerProbe for MockPower {
    fn charge_level(&self) -> f32 {
        self.level_percent.load(Ordering::SeqCst) as f32 / 100.0
    }

    fn is_charging(&self) -> bool {
        self.charging.load(Ordering::SeqCst)
    }
}
