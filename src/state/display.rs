//! Display state derived from the reconciler phase

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::TimerPhase;

/// What the widget shows right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DisplayState {
    pub running: bool,
    pub elapsed_seconds: u64,
}

impl DisplayState {
    /// Derive the display for `phase` as seen at `now`.
    ///
    /// Running: whole seconds between the anchor and `now` (an anchor ahead
    /// of the local clock shows zero). Stopped: the accumulated total
    /// rounded to the nearest second. Idle: zero.
    pub fn derive(phase: &TimerPhase, now: DateTime<Utc>) -> Self {
        match phase {
            TimerPhase::Idle => Self::default(),
            TimerPhase::Stopped {
                accumulated_seconds,
            } => Self {
                running: false,
                elapsed_seconds: round_non_negative(*accumulated_seconds),
            },
            TimerPhase::Running { started_at, .. } => Self {
                running: true,
                elapsed_seconds: u64::try_from((now - *started_at).num_seconds()).unwrap_or(0),
            },
        }
    }

    /// Elapsed time as `HH:MM:SS`
    pub fn formatted(&self) -> String {
        format_elapsed(self.elapsed_seconds)
    }

    /// Elapsed time in hours
    pub fn hours_worked(&self) -> f64 {
        self.elapsed_seconds as f64 / 3600.0
    }

    /// Cost of the elapsed time at `hourly_rate`, rounded to a whole unit
    pub fn estimated_cost(&self, hourly_rate: f64) -> u64 {
        round_non_negative(self.hours_worked() * hourly_rate)
    }
}

fn round_non_negative(value: f64) -> u64 {
    if value.is_finite() && value > 0.0 {
        value.round() as u64
    } else {
        0
    }
}

/// Format seconds as zero-padded `HH:MM:SS`. Hours do not wrap at 24.
pub fn format_elapsed(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, secs)
}

/// Presentational payload consumed by the timer view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerView {
    pub task_id: Option<String>,
    pub running: bool,
    pub elapsed_seconds: u64,
    pub formatted_elapsed: String,
    pub hours_worked: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_cost: Option<u64>,
}

impl TimerView {
    pub fn new(task_id: Option<String>, display: DisplayState, hourly_rate: Option<f64>) -> Self {
        Self {
            task_id,
            running: display.running,
            elapsed_seconds: display.elapsed_seconds,
            formatted_elapsed: display.formatted(),
            hours_worked: format!("{:.2}", display.hours_worked()),
            current_cost: hourly_rate.map(|rate| display.estimated_cost(rate)),
        }
    }
}
