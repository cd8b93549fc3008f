//! Background scheduler: the single guarded entry point into sync.
//!
//! Every trigger, periodic tick or manual request, funnels through
//! [`SyncScheduler::try_sync`], which applies the guards in a fixed order
//! and either runs one full cycle or reports why it did not.

use crate::applier::SyncStore;
use crate::engine::{SyncEngine, SyncSummary};
use crate::probes::{ConnectivityProbe, PowerProbe};
use crate::transport::SyncTransport;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Instant;

/// What caused a sync attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    /// The periodic background tick.
    Periodic,
    /// An explicit request (user action, push notification).
    Manual,
}

/// Why a sync attempt was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// A cycle is already in flight.
    AlreadyRunning,
    /// The previous attempt was too recent.
    RateLimited,
    /// No network.
    Offline,
    /// Battery below the floor and not charging.
    LowBattery,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            SkipReason::AlreadyRunning => "a sync cycle is already running",
            SkipReason::RateLimited => "last attempt too recent",
            SkipReason::Offline => "no network",
            SkipReason::LowBattery => "battery low and not charging",
        };
        f.write_str(reason)
    }
}

/// Clears the in-flight flag when the cycle ends, on every exit path.
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Guards and drives the engine's full cycles.
pub struct SyncScheduler<T: SyncTransport, S: SyncStore> {
    engine: Arc<SyncEngine<T, S>>,
    connectivity: Arc<dyn ConnectivityProbe>,
    power: Arc<dyn PowerProbe>,
    running: AtomicBool,
    last_attempt: Mutex<Option<Instant>>,
}

impl<T, S> SyncScheduler<T, S>
where
    T: SyncTransport + 'static,
    S: SyncStore + 'static,
{
    /// Creates a scheduler over the given engine and probes.
    pub fn new(
        engine: Arc<SyncEngine<T, S>>,
        connectivity: Arc<dyn ConnectivityProbe>,
        power: Arc<dyn PowerProbe>,
    ) -> Self {
        Self {
            engine,
            connectivity,
            power,
            running: AtomicBool::new(false),
            last_attempt: Mutex::new(None),
        }
    }

    /// Attempts one full sync cycle, applying the guards in order:
    /// reentrancy, rate limit, connectivity, battery.
    ///
    /// An empty mutation queue is not a skip; the cycle still runs to pull
    /// server changes.
    pub fn try_sync(&self, trigger: SyncTrigger) -> Result<SyncSummary, SkipReason> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return self.skip(trigger, SkipReason::AlreadyRunning);
        }
        let _guard = RunGuard(&self.running);

        {
            let mut last = self.last_attempt.lock();
            if let Some(at) = *last {
                if at.elapsed() < self.engine.config().min_attempt_gap {
                    return self.skip(trigger, SkipReason::RateLimited);
                }
            }
            // Recorded at attempt, not at success: a failing server must
            // not defeat the rate limit.
            *last = Some(Instant::now());
        }

        if !self.connectivity.has_network() {
            return self.skip(trigger, SkipReason::Offline);
        }

        if self.power.charge_level() < self.engine.config().battery_floor
            && !self.power.is_charging()
        {
            return self.skip(trigger, SkipReason::LowBattery);
        }

        if self.engine.pending_count() == 0 {
            tracing::debug!(?trigger, "queue empty, running pull-only cycle");
        } else {
            tracing::debug!(
                ?trigger,
                pending = self.engine.pending_count(),
                "starting sync cycle"
            );
        }
        Ok(self.engine.full_sync())
    }

    fn skip(&self, trigger: SyncTrigger, reason: SkipReason) -> Result<SyncSummary, SkipReason> {
        tracing::debug!(?trigger, %reason, "sync skipped");
        Err(reason)
    }

    /// Spawns the background loop: a periodic tick at the configured
    /// interval, plus on-demand wakeups through the returned handle.
    pub fn start(self: Arc<Self>) -> SchedulerHandle {
        let (tx, rx) = mpsc::channel();
        let interval = self.engine.config().sync_interval;

        let thread = thread::spawn(move || loop {
            match rx.recv_timeout(interval) {
                Ok(Command::Sync) => {
                    let _ = self.try_sync(SyncTrigger::Manual);
                }
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    let _ = self.try_sync(SyncTrigger::Periodic);
                }
                Ok(Command::Shutdown) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
        });

        SchedulerHandle {
            tx,
            thread: Some(thread),
        }
    }
}

enum Command {
    Sync,
    Shutdown,
}

/// Controls a running background loop.
pub struct SchedulerHandle {
    tx: mpsc::Sender<Command>,
    thread: Option<thread::JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Wakes the loop for an immediate manual cycle.
    pub fn sync_now(&self) {
        let _ = self.tx.send(Command::Sync);
    }

    /// Stops the loop and waits for it to finish.
    pub fn shutdown(mut self) {
        let _ = self.tx.send(Command::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        let _ = self.tx.send(Command::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncConfig;
    use crate::error::{SyncError, SyncResult};
    use crate::probes::{MainsPower, MockConnectivity, MockPower, OnlineProbe};
    use crate::transport::MockTransport;
    use invsync_protocol::{PullRequest, PullResponse, PushRequest, PushResponse};
    use invsync_store::LocalStore;
    use std::time::Duration;

    fn scheduler_with(
        config: SyncConfig,
        transport: Arc<MockTransport>,
        connectivity: Arc<dyn ConnectivityProbe>,
        power: Arc<dyn PowerProbe>,
    ) -> SyncScheduler<MockTransport, LocalStore> {
        let store = Arc::new(LocalStore::new());
        let engine = Arc::new(SyncEngine::with_connectivity(
            config,
            transport,
            store,
            Arc::new(OnlineProbe),
        ));
        SyncScheduler::new(engine, connectivity, power)
    }

    fn quiet_transport() -> Arc<MockTransport> {
        let transport = Arc::new(MockTransport::new());
        transport.set_push_response(PushResponse::success(0));
        transport.set_pull_responses(vec![PullResponse::empty(1)]);
        transport
    }

    #[test]
    fn empty_queue_still_pulls() {
        let transport = quiet_transport();
        let scheduler = scheduler_with(
            SyncConfig::default().with_min_attempt_gap(Duration::ZERO),
            Arc::clone(&transport),
            Arc::new(OnlineProbe),
            Arc::new(MainsPower),
        );

        let summary = scheduler.try_sync(SyncTrigger::Periodic).unwrap();
        assert!(summary.is_success());
        assert_eq!(transport.pulled_requests().len(), 1);
    }

    #[test]
    fn rapid_retriggers_are_rate_limited() {
        let scheduler = scheduler_with(
            SyncConfig::default().with_min_attempt_gap(Duration::from_secs(60)),
            quiet_transport(),
            Arc::new(OnlineProbe),
            Arc::new(MainsPower),
        );

        assert!(scheduler.try_sync(SyncTrigger::Manual).is_ok());
        assert_eq!(
            scheduler.try_sync(SyncTrigger::Manual).unwrap_err(),
            SkipReason::RateLimited
        );
    }

    #[test]
    fn offline_skip() {
        let transport = quiet_transport();
        let scheduler = scheduler_with(
            SyncConfig::default().with_min_attempt_gap(Duration::ZERO),
            Arc::clone(&transport),
            Arc::new(MockConnectivity::new(false)),
            Arc::new(MainsPower),
        );

        assert_eq!(
            scheduler.try_sync(SyncTrigger::Periodic).unwrap_err(),
            SkipReason::Offline
        );
        assert!(transport.pulled_requests().is_empty());
    }

    #[test]
    fn low_battery_blocks_every_trigger() {
        let scheduler = scheduler_with(
            SyncConfig::default().with_min_attempt_gap(Duration::ZERO),
            quiet_transport(),
            Arc::new(OnlineProbe),
            Arc::new(MockPower::new(0.1, false)),
        );

        assert_eq!(
            scheduler.try_sync(SyncTrigger::Periodic).unwrap_err(),
            SkipReason::LowBattery
        );
        assert_eq!(
            scheduler.try_sync(SyncTrigger::Manual).unwrap_err(),
            SkipReason::LowBattery
        );
    }

    #[test]
    fn charging_overrides_low_battery() {
        let scheduler = scheduler_with(
            SyncConfig::default().with_min_attempt_gap(Duration::ZERO),
            quiet_transport(),
            Arc::new(OnlineProbe),
            Arc::new(MockPower::new(0.1, true)),
        );

        assert!(scheduler.try_sync(SyncTrigger::Periodic).is_ok());
    }

    // A transport that parks until released, to hold a cycle open.
    struct GateTransport {
        entered: mpsc::Sender<()>,
        gate: Mutex<mpsc::Receiver<()>>,
    }

    impl SyncTransport for GateTransport {
        fn push(&self, _request: &PushRequest) -> SyncResult<PushResponse> {
            Ok(PushResponse::success(0))
        }

        fn pull(&self, _request: &PullRequest) -> SyncResult<PullResponse> {
            let _ = self.entered.send(());
            self.gate
                .lock()
                .recv()
                .map_err(|_| SyncError::transport_retryable("gate closed"))?;
            Ok(PullResponse::empty(1))
        }
    }

    #[test]
    fn concurrent_trigger_is_rejected() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release, gate) = mpsc::channel();
        let transport = Arc::new(GateTransport {
            entered: entered_tx,
            gate: Mutex::new(gate),
        });
        let store = Arc::new(LocalStore::new());
        let engine = Arc::new(SyncEngine::new(
            SyncConfig::default().with_min_attempt_gap(Duration::ZERO),
            transport,
            store,
        ));
        let scheduler = Arc::new(SyncScheduler::new(
            engine,
            Arc::new(OnlineProbe),
            Arc::new(MainsPower),
        ));

        let in_flight = Arc::clone(&scheduler);
        let worker = thread::spawn(move || in_flight.try_sync(SyncTrigger::Manual));

        // Wait for the worker to be parked inside the cycle.
        entered_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("worker never entered the cycle");
        assert_eq!(
            scheduler.try_sync(SyncTrigger::Manual).unwrap_err(),
            SkipReason::AlreadyRunning
        );

        release.send(()).unwrap();
        assert!(worker.join().unwrap().is_ok());
    }

    #[test]
    fn background_loop_serves_manual_wakeups() {
        let transport = quiet_transport();
        let scheduler = Arc::new(scheduler_with(
            SyncConfig::default()
                .with_min_attempt_gap(Duration::ZERO)
                .with_sync_interval(Duration::from_secs(3600)),
            Arc::clone(&transport),
            Arc::new(OnlineProbe),
            Arc::new(MainsPower),
        ));

        let handle = Arc::clone(&scheduler).start();
        handle.sync_now();

        let deadline = Instant::now() + Duration::from_secs(5);
        while transport.pulled_requests().is_empty() {
            assert!(Instant::now() < deadline, "manual wakeup never synced");
            thread::sleep(Duration::from_millis(5));
        }

        handle.shutdown();
    }
}
