//! Periodic status refresh for observers of a timer they do not control

use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::{error::TimerError, state::TimerReconciler};

/// Re-fetch the timer status every `period` until the timer is deactivated.
///
/// Lets a second party (the client watching the tasker's timer) pick up
/// starts and stops made elsewhere.
pub async fn status_poll_task(reconciler: TimerReconciler, period: Duration) {
    info!("Starting timer status poller every {:?}", period);

    let mut ticks = interval(period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; activation already fetched.
    ticks.tick().await;

    loop {
        ticks.tick().await;

        match reconciler.resync().await {
            Ok(view) => {
                let (running, elapsed) = (view.running, view.elapsed_seconds);
                debug!(running, elapsed, "Timer resynced");
            }
            Err(TimerError::Deactivated) => {
                info!("Timer deactivated, stopping status poller");
                break;
            }
            Err(TimerError::StaleResponse) => {
                debug!("Timer changed while polling, status discarded");
            }
            Err(e) => {
                warn!(error = %e, "Timer status poll failed");
            }
        }
    }
}
