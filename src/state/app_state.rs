//! Shared state behind the HTTP API

use std::{
    sync::{Arc, Mutex},
    time::Instant,
};

use chrono::{DateTime, Utc};

use super::{TimerReconciler, TimerView};

/// Application state shared by all handlers
#[derive(Debug)]
pub struct AppState {
    /// The work timer for the configured task
    pub reconciler: TimerReconciler,
    /// Agreed hourly rate, used to show the running cost
    pub hourly_rate: Option<f64>,
    /// Server metadata
    pub start_time: Instant,
    pub port: u16,
    pub host: String,
    /// Last action tracking
    pub last_action: Arc<Mutex<Option<String>>>,
    pub last_action_time: Arc<Mutex<Option<DateTime<Utc>>>>,
}

impl AppState {
    pub fn new(
        reconciler: TimerReconciler,
        port: u16,
        host: String,
        hourly_rate: Option<f64>,
    ) -> Self {
        Self {
            reconciler,
            hourly_rate,
            start_time: Instant::now(),
            port,
            host,
            last_action: Arc::new(Mutex::new(None)),
            last_action_time: Arc::new(Mutex::new(None)),
        }
    }

    /// Current view of the timer
    pub fn timer_view(&self) -> TimerView {
        TimerView::new(
            self.reconciler.task_id(),
            self.reconciler.display(),
            self.hourly_rate,
        )
    }

    /// Remember the last user intent handled
    pub fn record_action(&self, action: &str) {
        if let Ok(mut last_action) = self.last_action.lock() {
            *last_action = Some(action.to_string());
        }
        if let Ok(mut last_time) = self.last_action_time.lock() {
            *last_time = Some(Utc::now());
        }
    }

    /// Calculate server uptime as a formatted string
    pub fn get_uptime(&self) -> String {
        let duration = self.start_time.elapsed();
        let hours = duration.as_secs() / 3600;
        let minutes = (duration.as_secs() % 3600) / 60;
        let seconds = duration.as_secs() % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }

    /// Get last action information
    pub fn get_last_action(&self) -> (Option<String>, Option<DateTime<Utc>>) {
        let last_action = self.last_action.lock().ok().and_then(|a| a.clone());
        let last_action_time = self.last_action_time.lock().ok().and_then(|t| *t);
        (last_action, last_action_time)
    }
}
