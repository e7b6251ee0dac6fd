//! HTTP endpoint handlers

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
};
use tracing::{debug, error, info, warn};

use crate::{
    error::TimerError,
    state::{AppState, TimerPhase, TimerView},
};
use super::responses::{ApiResponse, HealthResponse, StatusResponse};

/// Result of a start/stop intent
pub type IntentResult = Result<Json<ApiResponse>, (StatusCode, Json<ApiResponse>)>;

/// HTTP status for a failed intent
pub fn status_for(error: &TimerError) -> StatusCode {
    match error {
        TimerError::AlreadyRunning
        | TimerError::NotRunning
        | TimerError::RequestPending
        | TimerError::StaleResponse => StatusCode::CONFLICT,
        TimerError::Fetch(_) | TimerError::Start(_) | TimerError::Stop(_) => {
            StatusCode::BAD_GATEWAY
        }
        TimerError::NotActivated | TimerError::Deactivated => StatusCode::SERVICE_UNAVAILABLE,
        TimerError::LockPoisoned(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn intent_error(
    state: &AppState,
    headline: &str,
    error: TimerError,
) -> (StatusCode, Json<ApiResponse>) {
    let status = status_for(&error);
    if error.is_user_visible() {
        warn!("{}: {}", headline, error);
    } else {
        debug!("{}: {}", headline, error);
    }
    (
        status,
        Json(ApiResponse::error(format!("{}: {}", headline, error), state.timer_view())),
    )
}

/// Handle POST /timer/start - the start button
pub async fn start_handler(State(state): State<Arc<AppState>>) -> IntentResult {
    state.record_action("start");

    match state.reconciler.request_start().await {
        Ok(_) => {
            info!("Start endpoint called - work timer started");
            Ok(Json(ApiResponse::running(
                "Work timer started".to_string(),
                state.timer_view(),
            )))
        }
        Err(e) => Err(intent_error(&state, "Failed to start timer", e)),
    }
}

/// Handle POST /timer/stop - the finish button
pub async fn stop_handler(State(state): State<Arc<AppState>>) -> IntentResult {
    state.record_action("stop");

    match state.reconciler.request_stop().await {
        Ok(stopped) => {
            let hours = match state.reconciler.phase() {
                TimerPhase::Stopped {
                    accumulated_seconds,
                } => accumulated_seconds / 3600.0,
                _ => stopped.hours_worked(),
            };
            info!("Stop endpoint called - work timer stopped after {:.2} hours", hours);
            Ok(Json(ApiResponse::stopped(
                format!("Work completed! Total time: {:.2} hours", hours),
                state.timer_view(),
            )))
        }
        Err(e) => Err(intent_error(&state, "Failed to stop timer", e)),
    }
}

/// Handle GET /timer - the rendered timer
pub async fn timer_handler(State(state): State<Arc<AppState>>) -> Json<TimerView> {
    Json(state.timer_view())
}

/// Handle GET /status - Timer plus server information
pub async fn status_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatusResponse>, StatusCode> {
    if state.reconciler.is_deactivated() {
        error!("Status requested for a deactivated timer");
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    let (last_action, last_action_time) = state.get_last_action();

    Ok(Json(StatusResponse {
        timer: state.timer_view(),
        pending: state.reconciler.is_pending(),
        uptime: state.get_uptime(),
        port: state.port,
        host: state.host.clone(),
        last_action,
        last_action_time,
    }))
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
