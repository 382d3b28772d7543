//! Periodic and on-demand reconciliation against the upstream source.

use crate::entities::{EntityStore, ReconcileReport};
use crate::error::{Result, SyncError};
use crate::subscriptions::AlertBroadcaster;
use crate::types::Timestamp;
use crate::upstream::UpstreamSource;
use crossbeam_channel::{select, tick, Sender};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Scheduler configuration.
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    /// Time between scheduled refreshes.
    pub interval: Duration,

    /// Run one refresh as soon as the scheduler starts.
    pub initial_sync: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            initial_sync: true,
        }
    }
}

/// What a single refresh attempt did.
#[derive(Clone, Debug)]
pub enum RefreshOutcome {
    /// Snapshot fetched and reconciled.
    Completed(ReconcileReport),
    /// Another refresh was already in flight.
    Skipped,
}

/// Observable refresh state.
#[derive(Clone, Debug, Default)]
pub struct RefreshStatus {
    pub in_flight: bool,
    /// Completion time of the most recent successful refresh.
    pub last_synced: Option<Timestamp>,
    /// Error of the most recent attempt, cleared on success.
    pub last_error: Option<String>,
    pub completed: u64,
    pub failed: u64,
    pub skipped: u64,
}

impl RefreshStatus {
    /// Attempts that ran to completion, successfully or not.
    pub fn attempts(&self) -> u64 {
        self.completed + self.failed
    }
}

/// Releases the in-flight flag when the attempt ends, even on panic.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Shared refresh logic used by both the worker thread and `refresh_now`.
struct Refresher {
    store: Arc<EntityStore>,
    source: Arc<dyn UpstreamSource>,
    alerts: Option<Arc<AlertBroadcaster>>,
    in_flight: AtomicBool,
    stopped: AtomicBool,
    status: Mutex<RefreshStatus>,
    attempted: Condvar,
}

impl Refresher {
    fn run_once(&self) -> Result<RefreshOutcome> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            self.status.lock().skipped += 1;
            debug!("Refresh already in flight, skipping");
            return Ok(RefreshOutcome::Skipped);
        }
        let _guard = InFlightGuard(&self.in_flight);

        let result = self
            .source
            .fetch_snapshot()
            .and_then(|snapshot| self.store.reconcile(&snapshot));
        let now = Timestamp::now();

        let outcome = match result {
            Ok(report) => {
                {
                    let mut status = self.status.lock();
                    status.last_synced = Some(now);
                    status.last_error = None;
                    status.completed += 1;
                }
                if let Some(alerts) = &self.alerts {
                    alerts.publish_changes(&report.changes);
                    alerts.publish_refreshed(now, report.changes.len());
                }
                debug!(version = report.version, changed = report.changes.len(), "Refresh complete");
                Ok(RefreshOutcome::Completed(report))
            }
            Err(e) => {
                warn!(error = %e, "Refresh failed, keeping last known state");
                {
                    let mut status = self.status.lock();
                    status.last_error = Some(e.to_string());
                    status.failed += 1;
                }
                if let Some(alerts) = &self.alerts {
                    alerts.publish_refresh_failed(&e.to_string());
                }
                Err(e)
            }
        };

        self.attempted.notify_all();
        outcome
    }

    fn status(&self) -> RefreshStatus {
        let mut status = self.status.lock().clone();
        status.in_flight = self.in_flight.load(Ordering::SeqCst);
        status
    }
}

/// Drives periodic reconciliation on a background thread.
///
/// Refreshes never overlap: a tick or `refresh_now` call that arrives while a
/// refresh is in flight is skipped. Shutting down stops future ticks but
/// lets an in-flight fetch finish.
pub struct RefreshScheduler {
    refresher: Arc<Refresher>,
    shutdown: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl RefreshScheduler {
    /// Start the worker thread.
    pub fn start(
        store: Arc<EntityStore>,
        source: Arc<dyn UpstreamSource>,
        alerts: Option<Arc<AlertBroadcaster>>,
        config: SchedulerConfig,
    ) -> Result<Self> {
        if config.interval.is_zero() {
            return Err(SyncError::Validation("refresh interval must be non-zero".into()));
        }

        let refresher = Arc::new(Refresher {
            store,
            source,
            alerts,
            in_flight: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            status: Mutex::new(RefreshStatus::default()),
            attempted: Condvar::new(),
        });

        let interval = config.interval;
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);
        let worker_refresher = Arc::clone(&refresher);

        let worker = thread::Builder::new()
            .name("lotwatch-refresh".into())
            .spawn(move || {
                if config.initial_sync {
                    let _ = worker_refresher.run_once();
                }

                let ticker = tick(interval);
                loop {
                    select! {
                        recv(shutdown_rx) -> _ => break,
                        recv(ticker) -> _ => {
                            let _ = worker_refresher.run_once();
                        }
                    }
                }
                debug!("Refresh worker exiting");
            })?;

        info!(interval_ms = interval.as_millis() as u64, "Refresh scheduler started");

        Ok(Self {
            refresher,
            shutdown: Some(shutdown_tx),
            worker: Some(worker),
        })
    }

    /// Refresh immediately on the calling thread.
    ///
    /// Returns `Skipped` if a refresh is already running. Upstream and
    /// reconcile failures are returned after being recorded in the status.
    pub fn refresh_now(&self) -> Result<RefreshOutcome> {
        if self.refresher.stopped.load(Ordering::SeqCst) {
            return Err(SyncError::SchedulerStopped);
        }
        self.refresher.run_once()
    }

    pub fn is_refreshing(&self) -> bool {
        self.refresher.in_flight.load(Ordering::SeqCst)
    }

    pub fn last_synced(&self) -> Option<Timestamp> {
        self.refresher.status.lock().last_synced
    }

    pub fn status(&self) -> RefreshStatus {
        self.refresher.status()
    }

    pub fn is_running(&self) -> bool {
        !self.refresher.stopped.load(Ordering::SeqCst)
    }

    /// Block until at least `attempts` refreshes have finished or the timeout
    /// elapses. Returns whether the count was reached.
    pub fn wait_for_attempts(&self, attempts: u64, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut status = self.refresher.status.lock();
        while status.attempts() < attempts {
            if self
                .refresher
                .attempted
                .wait_until(&mut status, deadline)
                .timed_out()
            {
                return status.attempts() >= attempts;
            }
        }
        true
    }

    /// Stop scheduling refreshes and wait for the worker to exit.
    pub fn shutdown(&mut self) {
        if self.refresher.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Refresh worker panicked");
            }
        }
        info!("Refresh scheduler stopped");
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
