//! Reconciliation of the local work-timer display with the server-held timer

use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
};

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::{Clock, DisplayState, TimerPhase, TimerSnapshot};
use crate::{
    error::TimerError,
    services::RemoteTimerGateway,
    tasks::{LocalTicker, Scheduler},
};

/// Mutable state shared between the reconciler handle and its ticker.
#[derive(Debug)]
struct Inner {
    task_id: Option<String>,
    phase: TimerPhase,
    display: DisplayState,
    display_tx: watch::Sender<DisplayState>,
    ticker: LocalTicker,
    /// Identifies the tick callback the current phase expects
    tick_token: u64,
    /// Bumped by activation, deactivation and every applied start/stop
    epoch: u64,
    /// A start or stop call is in flight. Survives re-activation and
    /// deactivation; only the call itself clears it.
    pending: bool,
    deactivated: bool,
}

impl Inner {
    fn set_phase(&mut self, phase: TimerPhase, now: chrono::DateTime<chrono::Utc>) {
        self.phase = phase;
        self.publish(DisplayState::derive(&self.phase, now));
    }

    fn publish(&mut self, display: DisplayState) {
        self.display = display;
        self.display_tx.send_replace(display);
    }

    fn on_tick(&mut self, token: u64, now: chrono::DateTime<chrono::Utc>) {
        if self.deactivated || token != self.tick_token || !self.ticker.is_armed() {
            return;
        }
        if let TimerPhase::Running {
            started_at,
            tick_count,
        } = self.phase
        {
            self.set_phase(
                TimerPhase::Running {
                    started_at,
                    tick_count: tick_count.saturating_add(1),
                },
                now,
            );
        }
    }

    fn is_stale(&self, epoch: u64) -> bool {
        self.deactivated || self.epoch != epoch
    }

    fn bump_epoch(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
    }
}

/// Marks a start/stop call as in flight until it finishes or its future is
/// dropped.
struct PendingRequest {
    inner: Arc<Mutex<Inner>>,
    epoch: u64,
    settled: bool,
}

impl PendingRequest {
    /// Clear the pending flag and return the epoch the call was issued in.
    fn finish(mut self, inner: &mut Inner) -> u64 {
        inner.pending = false;
        self.settled = true;
        self.epoch
    }
}

impl Drop for PendingRequest {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.pending = false;
    }
}

/// Keeps a locally ticking display consistent with the backend's timer.
///
/// The backend is the single source of truth for worked time. Locally the
/// reconciler only derives a display value: while running it recomputes the
/// elapsed seconds from the server's start instant on every tick, so a late
/// or skipped tick never accumulates drift.
///
/// Handles are cheap to clone and all refer to the same timer. Exactly one
/// ticker exists per timer, owned by the shared state; it is disarmed on
/// [`deactivate`](Self::deactivate) or when the last handle is dropped.
#[derive(Clone)]
pub struct TimerReconciler {
    inner: Arc<Mutex<Inner>>,
    gateway: Arc<dyn RemoteTimerGateway>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for TimerReconciler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerReconciler")
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl TimerReconciler {
    /// Create an idle reconciler ticking once per second on `scheduler`
    pub fn new(
        gateway: Arc<dyn RemoteTimerGateway>,
        clock: Arc<dyn Clock>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        Self::with_ticker(gateway, clock, LocalTicker::new(scheduler))
    }

    pub fn with_ticker(
        gateway: Arc<dyn RemoteTimerGateway>,
        clock: Arc<dyn Clock>,
        ticker: LocalTicker,
    ) -> Self {
        let (display_tx, _) = watch::channel(DisplayState::default());
        let inner = Inner {
            task_id: None,
            phase: TimerPhase::Idle,
            display: DisplayState::default(),
            display_tx,
            ticker,
            tick_token: 0,
            epoch: 0,
            pending: false,
            deactivated: false,
        };

        Self {
            inner: Arc::new(Mutex::new(inner)),
            gateway,
            clock,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, TimerError> {
        self.inner
            .lock()
            .map_err(|e| TimerError::LockPoisoned(e.to_string()))
    }

    /// Bind the timer to `task_id` and load its state from the backend.
    ///
    /// Never fails: if the status cannot be fetched the timer stays idle and
    /// shows zero. A previous binding is discarded, including its ticker.
    /// A request still in flight keeps further requests blocked until it
    /// returns, but its response is discarded.
    pub async fn activate(&self, task_id: impl Into<String>) -> DisplayState {
        let task_id = task_id.into();

        let epoch = {
            let mut inner = match self.lock() {
                Ok(inner) => inner,
                Err(e) => {
                    error!(%task_id, error = %e, "Cannot activate work timer");
                    return DisplayState::default();
                }
            };
            if inner.deactivated {
                warn!(%task_id, "Ignoring activation of a deactivated work timer");
                return inner.display;
            }

            inner.bump_epoch();
            inner.ticker.disarm();
            inner.task_id = Some(task_id.clone());
            inner.set_phase(TimerPhase::Idle, self.clock.now());
            inner.epoch
        };

        info!(%task_id, "Activating work timer");
        let result = self.gateway.status(&task_id).await;

        let mut inner = match self.lock() {
            Ok(inner) => inner,
            Err(e) => {
                error!(%task_id, error = %e, "Cannot apply timer status");
                return DisplayState::default();
            }
        };
        if inner.is_stale(epoch) {
            debug!(%task_id, "Discarding stale timer status");
            return inner.display;
        }

        match result {
            Ok(snapshot) => self.apply_snapshot(&mut inner, &snapshot),
            Err(e) => {
                warn!(%task_id, error = %e, "Failed to fetch timer status, showing stopped timer");
            }
        }
        inner.display
    }

    /// Re-fetch the backend's snapshot and adopt it.
    ///
    /// Skipped while a start/stop request is pending. On failure the last
    /// known state is kept and the error returned.
    pub async fn resync(&self) -> Result<DisplayState, TimerError> {
        let (task_id, epoch) = {
            let inner = self.lock()?;
            if inner.deactivated {
                return Err(TimerError::Deactivated);
            }
            if inner.pending {
                debug!("Request pending, skipping timer resync");
                return Ok(inner.display);
            }
            let task_id = inner.task_id.clone().ok_or(TimerError::NotActivated)?;
            (task_id, inner.epoch)
        };

        let snapshot = self
            .gateway
            .status(&task_id)
            .await
            .map_err(TimerError::Fetch)?;

        let mut inner = self.lock()?;
        if inner.is_stale(epoch) || inner.pending {
            debug!(%task_id, "Discarding stale timer status");
            return Err(TimerError::StaleResponse);
        }
        self.apply_snapshot(&mut inner, &snapshot);
        Ok(inner.display)
    }

    /// Ask the backend to start the timer.
    ///
    /// Allowed from idle or stopped. On success the ticker is armed on the
    /// server-returned start instant. On failure nothing changes.
    pub async fn request_start(&self) -> Result<DisplayState, TimerError> {
        let (task_id, request) = self.begin_request(|phase| {
            if phase.is_running() {
                Err(TimerError::AlreadyRunning)
            } else {
                Ok(())
            }
        })?;

        let result = self.gateway.start(&task_id).await;

        let mut inner = self.lock()?;
        let epoch = request.finish(&mut inner);
        if inner.is_stale(epoch) {
            debug!(%task_id, "Discarding stale start response");
            return Err(TimerError::StaleResponse);
        }

        match result {
            Ok(receipt) => {
                inner.bump_epoch();
                self.apply_phase(
                    &mut inner,
                    TimerPhase::Running {
                        started_at: receipt.started_at,
                        tick_count: 0,
                    },
                );
                info!(%task_id, started_at = %receipt.started_at, "Work timer started");
                Ok(inner.display)
            }
            Err(e) => {
                warn!(%task_id, error = %e, "Failed to start work timer");
                Err(TimerError::Start(e))
            }
        }
    }

    /// Ask the backend to stop the timer.
    ///
    /// Allowed while running. On success the ticker is disarmed and the
    /// server's total is adopted as is; locally counted ticks are discarded.
    /// On failure the ticker keeps running.
    pub async fn request_stop(&self) -> Result<DisplayState, TimerError> {
        let (task_id, request) = self.begin_request(|phase| {
            if phase.is_running() {
                Ok(())
            } else {
                Err(TimerError::NotRunning)
            }
        })?;

        let result = self.gateway.stop(&task_id).await;

        let mut inner = self.lock()?;
        let epoch = request.finish(&mut inner);
        if inner.is_stale(epoch) {
            debug!(%task_id, "Discarding stale stop response");
            return Err(TimerError::StaleResponse);
        }

        match result {
            Ok(receipt) => {
                inner.bump_epoch();
                self.apply_phase(
                    &mut inner,
                    TimerPhase::Stopped {
                        accumulated_seconds: receipt.accumulated_seconds,
                    },
                );
                info!(
                    %task_id,
                    accumulated_seconds = receipt.accumulated_seconds,
                    "Work timer stopped"
                );
                Ok(inner.display)
            }
            Err(e) => {
                warn!(%task_id, error = %e, "Failed to stop work timer");
                Err(TimerError::Stop(e))
            }
        }
    }

    /// Recompute the display now. Only a running timer changes.
    pub fn tick(&self) -> DisplayState {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let token = inner.tick_token;
        inner.on_tick(token, self.clock.now());
        inner.display
    }

    /// Tear the timer down. The ticker is disarmed before this returns and
    /// responses still in flight will be discarded.
    pub fn deactivate(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.deactivated {
            return;
        }
        inner.deactivated = true;
        inner.bump_epoch();
        inner.ticker.disarm();
        info!(task_id = ?inner.task_id, "Work timer deactivated");
    }

    /// Current display values
    pub fn display(&self) -> DisplayState {
        self.read(|inner| inner.display)
    }

    /// Current state machine phase
    pub fn phase(&self) -> TimerPhase {
        self.read(|inner| inner.phase)
    }

    pub fn task_id(&self) -> Option<String> {
        self.read(|inner| inner.task_id.clone())
    }

    pub fn is_pending(&self) -> bool {
        self.read(|inner| inner.pending)
    }

    pub fn is_ticking(&self) -> bool {
        self.read(|inner| inner.ticker.is_armed())
    }

    pub fn is_deactivated(&self) -> bool {
        self.read(|inner| inner.deactivated)
    }

    /// Watch every display change (ticks and transitions)
    pub fn subscribe(&self) -> watch::Receiver<DisplayState> {
        self.read(|inner| inner.display_tx.subscribe())
    }

    fn read<T>(&self, f: impl FnOnce(&Inner) -> T) -> T {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&*inner)
    }

    /// Check preconditions and mark a start/stop request as in flight.
    fn begin_request(
        &self,
        precondition: impl FnOnce(&TimerPhase) -> Result<(), TimerError>,
    ) -> Result<(String, PendingRequest), TimerError> {
        let mut inner = self.lock()?;
        if inner.deactivated {
            return Err(TimerError::Deactivated);
        }
        if inner.pending {
            return Err(TimerError::RequestPending);
        }
        precondition(&inner.phase)?;
        let task_id = inner.task_id.clone().ok_or(TimerError::NotActivated)?;

        inner.pending = true;
        let request = PendingRequest {
            inner: Arc::clone(&self.inner),
            epoch: inner.epoch,
            settled: false,
        };
        Ok((task_id, request))
    }

    /// Adopt a fetched snapshot. A running snapshot on the anchor already
    /// being ticked keeps the existing ticker.
    fn apply_snapshot(&self, inner: &mut Inner, snapshot: &TimerSnapshot) {
        let target = snapshot.target_phase();

        if target.anchor().is_some()
            && target.anchor() == inner.phase.anchor()
            && inner.ticker.is_armed()
        {
            debug!("Timer already ticking on the reported anchor");
            let phase = inner.phase;
            inner.set_phase(phase, self.clock.now());
            return;
        }

        self.apply_phase(inner, target);
    }

    /// Switch phase and (re)arm or disarm the ticker under the same lock.
    fn apply_phase(&self, inner: &mut Inner, phase: TimerPhase) {
        match phase.anchor() {
            Some(anchor) => self.arm(inner, anchor),
            None => inner.ticker.disarm(),
        }
        inner.set_phase(phase, self.clock.now());
    }

    fn arm(&self, inner: &mut Inner, anchor: chrono::DateTime<chrono::Utc>) {
        inner.tick_token = inner.tick_token.wrapping_add(1);
        let token = inner.tick_token;
        let shared = Arc::downgrade(&self.inner);
        let clock = Arc::clone(&self.clock);

        inner
            .ticker
            .arm(anchor, move || tick_shared(&shared, clock.as_ref(), token));
    }
}

fn tick_shared(shared: &Weak<Mutex<Inner>>, clock: &dyn Clock, token: u64) {
    let Some(inner) = shared.upgrade() else {
        return;
    };
    match inner.lock() {
        Ok(mut inner) => inner.on_tick(token, clock.now()),
        Err(e) => error!("Failed to lock timer state for tick: {}", e),
    };
}
