//! Wall-clock capability used to compute elapsed time

use std::fmt::Debug;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

/// Source of the local wall-clock time.
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// The system wall clock. Keeps counting across device sleep, so a running
/// display catches up on the next tick after resume.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Wall clock that advances with tokio's clock.
///
/// Under `tokio::time::pause` it only moves when the runtime's time does,
/// which keeps ticks and elapsed-time arithmetic in lockstep.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    base_wall: DateTime<Utc>,
    base_instant: Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    /// Clock reading `wall` at the current tokio instant
    pub fn starting_at(wall: DateTime<Utc>) -> Self {
        Self {
            base_wall: wall,
            base_instant: Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = self.base_instant.elapsed();
        chrono::Duration::from_std(elapsed)
            .ok()
            .and_then(|delta| self.base_wall.checked_add_signed(delta))
            .unwrap_or(self.base_wall)
    }
}
