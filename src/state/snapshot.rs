//! Server-owned timer state and the receipts returned by start/stop

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// The backend's authoritative timer state for one task.
///
/// `started_at` is present when running; `accumulated_seconds` when stopped
/// (absent counts as zero).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerSnapshot {
    pub is_running: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub accumulated_seconds: Option<f64>,
}

impl TimerSnapshot {
    /// Snapshot of a timer running since `started_at`
    pub fn running(started_at: DateTime<Utc>) -> Self {
        Self {
            is_running: true,
            started_at: Some(started_at),
            accumulated_seconds: None,
        }
    }

    /// Snapshot of a stopped timer with the given total
    pub fn stopped(accumulated_seconds: f64) -> Self {
        Self {
            is_running: false,
            started_at: None,
            accumulated_seconds: Some(accumulated_seconds),
        }
    }

    /// Snapshot of a timer that was never started
    pub fn never_started() -> Self {
        Self {
            is_running: false,
            started_at: None,
            accumulated_seconds: None,
        }
    }

    /// The phase this snapshot puts a reconciler into.
    ///
    /// A running snapshot without a start instant cannot be ticked; it is
    /// shown as stopped with whatever total it carries.
    pub fn target_phase(&self) -> TimerPhase {
        match (self.is_running, self.started_at) {
            (true, Some(started_at)) => TimerPhase::Running {
                started_at,
                tick_count: 0,
            },
            (true, None) => {
                warn!("Running snapshot without a start instant, treating as stopped");
                TimerPhase::Stopped {
                    accumulated_seconds: self.accumulated_seconds.unwrap_or(0.0),
                }
            }
            (false, _) => TimerPhase::Stopped {
                accumulated_seconds: self.accumulated_seconds.unwrap_or(0.0),
            },
        }
    }
}

/// Backend answer to a successful start request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StartReceipt {
    pub started_at: DateTime<Utc>,
}

/// Backend answer to a successful stop request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StopReceipt {
    pub accumulated_seconds: f64,
}

/// Reconciler state machine phases
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum TimerPhase {
    /// No snapshot yet (or the fetch failed)
    #[default]
    Idle,
    Stopped {
        accumulated_seconds: f64,
    },
    /// Running since the server-supplied anchor
    Running {
        started_at: DateTime<Utc>,
        tick_count: u64,
    },
}

impl TimerPhase {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running { .. })
    }

    /// Anchor of the running interval, if any
    pub fn anchor(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Running { started_at, .. } => Some(*started_at),
            _ => None,
        }
    }
}
