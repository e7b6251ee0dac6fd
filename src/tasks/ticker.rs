//! Local once-per-second ticker that refreshes a running display

use std::{
    fmt::Debug,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use chrono::{DateTime, Utc};
use tokio::{
    runtime::Handle,
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tracing::{debug, error};

/// Nominal tick period
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Callback invoked on every tick
pub type TickFn = Box<dyn FnMut() + Send + 'static>;

/// Capability to run a callback periodically.
pub trait Scheduler: Send + Sync + Debug {
    /// Invoke `on_tick` every `period`, first after one full period, until
    /// the returned handle is cancelled or dropped. `None` if nothing could
    /// be scheduled.
    fn schedule_every(&self, period: Duration, on_tick: TickFn) -> Option<TickerHandle>;
}

/// Owned handle to one periodic callback. Dropping it cancels the callback.
#[derive(Debug)]
pub struct TickerHandle {
    cancelled: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl TickerHandle {
    pub fn new(cancelled: Arc<AtomicBool>, task: Option<JoinHandle<()>>) -> Self {
        Self { cancelled, task }
    }

    /// Stop the callback. Idempotent.
    pub fn cancel(&mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Drop for TickerHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Scheduler backed by `tokio::time::interval` on the current runtime
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn schedule_every(&self, period: Duration, mut on_tick: TickFn) -> Option<TickerHandle> {
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                error!("Cannot schedule ticker outside a tokio runtime: {}", e);
                return None;
            }
        };

        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let task = runtime.spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            // Late ticks are dropped, not replayed; callers recompute from an anchor.
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                interval.tick().await;
                if flag.load(Ordering::SeqCst) {
                    break;
                }
                on_tick();
            }
        });

        Some(TickerHandle::new(cancelled, Some(task)))
    }
}

/// Single-slot periodic ticker.
///
/// At most one callback is ever live: [`arm`](Self::arm) disarms whatever
/// was armed before scheduling the new one.
#[derive(Debug)]
pub struct LocalTicker {
    scheduler: Arc<dyn Scheduler>,
    period: Duration,
    armed: Option<TickerHandle>,
    generation: u64,
}

impl LocalTicker {
    /// Ticker firing every [`TICK_PERIOD`]
    pub fn new(scheduler: Arc<dyn Scheduler>) -> Self {
        Self::with_period(scheduler, TICK_PERIOD)
    }

    pub fn with_period(scheduler: Arc<dyn Scheduler>, period: Duration) -> Self {
        Self {
            scheduler,
            period: period.max(Duration::from_millis(1)),
            armed: None,
            generation: 0,
        }
    }

    /// Arm a periodic `on_tick` for a running interval that began at
    /// `anchor`. Stays disarmed if the scheduler cannot run it.
    pub fn arm<F>(&mut self, anchor: DateTime<Utc>, on_tick: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.disarm();

        self.generation = self.generation.wrapping_add(1);
        self.armed = self.scheduler.schedule_every(self.period, Box::new(on_tick));

        if self.armed.is_some() {
            debug!(generation = self.generation, %anchor, "Ticker armed");
        }
    }

    /// Stop the active callback, if any. Safe to call when nothing is armed.
    pub fn disarm(&mut self) {
        if let Some(mut handle) = self.armed.take() {
            handle.cancel();
            debug!(generation = self.generation, "Ticker disarmed");
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }
}
