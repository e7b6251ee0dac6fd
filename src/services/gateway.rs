//! Contract for the backend that owns the authoritative timer state

use async_trait::async_trait;
use thiserror::Error;

use crate::state::{StartReceipt, StopReceipt, TimerSnapshot};

/// Failures reported by a [`RemoteTimerGateway`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    /// The request never produced a response.
    #[error("network error: {reason}")]
    Network { reason: String },

    #[error("not authorized")]
    NotAuthorized,

    /// The backend refused the transition (already running, not running).
    #[error("conflict: {detail}")]
    Conflict { detail: String },

    #[error("task not found")]
    NotFound,

    #[error("unexpected status {status}: {detail}")]
    Unexpected { status: u16, detail: String },

    #[error("invalid response: {reason}")]
    InvalidResponse { reason: String },

    /// The gateway itself is misconfigured.
    #[error("configuration error: {reason}")]
    Config { reason: String },
}

impl GatewayError {
    pub fn network(reason: impl Into<String>) -> Self {
        Self::Network {
            reason: reason.into(),
        }
    }

    pub fn conflict(detail: impl Into<String>) -> Self {
        Self::Conflict {
            detail: detail.into(),
        }
    }

    pub fn invalid_response(reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            reason: reason.into(),
        }
    }

    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }
}

/// Request/response channel to the timer backend.
///
/// Implementations perform exactly one round-trip per call and never retry;
/// the reconciler decides what a failure means.
#[async_trait]
pub trait RemoteTimerGateway: Send + Sync {
    /// Fetch the current snapshot for `task_id`.
    async fn status(&self, task_id: &str) -> Result<TimerSnapshot, GatewayError>;

    /// Ask the backend to start the timer. The receipt carries the server's
    /// start instant.
    async fn start(&self, task_id: &str) -> Result<StartReceipt, GatewayError>;

    /// Ask the backend to stop the timer. The receipt carries the total
    /// worked duration.
    async fn stop(&self, task_id: &str) -> Result<StopReceipt, GatewayError>;
}
