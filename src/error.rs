//! Error taxonomy for timer operations

use thiserror::Error;

use crate::services::GatewayError;

/// Errors surfaced by [`TimerReconciler`](crate::state::TimerReconciler) operations.
#[derive(Error, Debug)]
pub enum TimerError {
    /// Status retrieval failed. Recovered locally by `activate`, only
    /// reported by explicit refreshes.
    #[error("failed to fetch timer status: {0}")]
    Fetch(#[source] GatewayError),

    /// The backend rejected or never answered a start request.
    #[error("failed to start timer: {0}")]
    Start(#[source] GatewayError),

    /// The backend rejected or never answered a stop request.
    #[error("failed to stop timer: {0}")]
    Stop(#[source] GatewayError),

    /// A response arrived after deactivation or after a newer activation.
    #[error("response discarded: reconciler moved on")]
    StaleResponse,

    #[error("timer is already running")]
    AlreadyRunning,

    #[error("timer is not running")]
    NotRunning,

    /// A start or stop request is still in flight.
    #[error("another timer request is still pending")]
    RequestPending,

    #[error("no task has been activated")]
    NotActivated,

    #[error("timer has been deactivated")]
    Deactivated,

    #[error("failed to lock timer state: {0}")]
    LockPoisoned(String),
}

impl TimerError {
    /// Whether the view layer should show this error to the user.
    pub const fn is_user_visible(&self) -> bool {
        !matches!(self, Self::StaleResponse)
    }
}
