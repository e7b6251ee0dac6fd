use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::{DateTime, TimeZone, Utc};
use job_timer::{
    api::responses::{ApiResponse, StatusResponse},
    create_router,
    state::{StartReceipt, StopReceipt, TokioClock},
    tasks::TokioScheduler,
    AppState, GatewayError, RemoteTimerGateway, TimerReconciler, TimerSnapshot, TimerView,
};
use pretty_assertions::assert_eq;
use serde::de::DeserializeOwned;

/// Backend that keeps one timer in memory and starts it at a fixed instant
struct InMemoryBackend {
    running_since: Mutex<Option<DateTime<Utc>>>,
    start_at: DateTime<Utc>,
    total_on_stop: f64,
}

#[async_trait]
impl RemoteTimerGateway for InMemoryBackend {
    async fn status(&self, _task_id: &str) -> Result<TimerSnapshot, GatewayError> {
        Ok(match *self.running_since.lock().unwrap() {
            Some(started_at) => TimerSnapshot::running(started_at),
            None => TimerSnapshot::never_started(),
        })
    }

    async fn start(&self, _task_id: &str) -> Result<StartReceipt, GatewayError> {
        let mut running = self.running_since.lock().unwrap();
        if running.is_some() {
            return Err(GatewayError::conflict("Timer already running"));
        }
        *running = Some(self.start_at);
        Ok(StartReceipt {
            started_at: self.start_at,
        })
    }

    async fn stop(&self, _task_id: &str) -> Result<StopReceipt, GatewayError> {
        let mut running = self.running_since.lock().unwrap();
        if running.take().is_none() {
            return Err(GatewayError::conflict("Timer is not running"));
        }
        Ok(StopReceipt {
            accumulated_seconds: self.total_on_stop,
        })
    }
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
}

async fn app(hourly_rate: Option<f64>) -> (Router, TimerReconciler) {
    let backend = Arc::new(InMemoryBackend {
        running_since: Mutex::new(None),
        start_at: t0(),
        total_on_stop: 5400.0,
    });
    let reconciler = TimerReconciler::new(
        backend,
        Arc::new(TokioClock::starting_at(t0())),
        Arc::new(TokioScheduler),
    );
    reconciler.activate("task-42").await;

    let state = Arc::new(AppState::new(
        reconciler.clone(),
        20554,
        "127.0.0.1".to_string(),
        hourly_rate,
    ));
    (create_router(state), reconciler)
}

async fn call<T: DeserializeOwned>(app: &Router, method: &str, uri: &str) -> (StatusCode, T) {
    use tower::ServiceExt;

    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test(start_paused = true)]
async fn test_timer_view_before_start() {
    let (app, _reconciler) = app(None).await;

    let (status, view): (_, TimerView) = call(&app, "GET", "/timer").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view.task_id.as_deref(), Some("task-42"));
    assert!(!view.running);
    assert_eq!(view.formatted_elapsed, "00:00:00");
}

#[tokio::test(start_paused = true)]
async fn test_start_tick_and_stop_round_trip() {
    let (app, _reconciler) = app(Some(1000.0)).await;

    let (status, started): (_, ApiResponse) = call(&app, "POST", "/timer/start").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(started.status, "running");
    assert_eq!(started.message, "Work timer started");
    assert!(started.timer.running);

    tokio::time::sleep(std::time::Duration::from_millis(3_100)).await;
    let (_, view): (_, TimerView) = call(&app, "GET", "/timer").await;
    assert_eq!(view.formatted_elapsed, "00:00:03");

    let (status, stopped): (_, ApiResponse) = call(&app, "POST", "/timer/stop").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stopped.status, "stopped");
    assert_eq!(stopped.message, "Work completed! Total time: 1.50 hours");
    assert_eq!(stopped.timer.formatted_elapsed, "01:30:00");
    assert_eq!(stopped.timer.current_cost, Some(1500));
}

#[tokio::test(start_paused = true)]
async fn test_double_start_is_a_conflict() {
    let (app, reconciler) = app(None).await;

    let (status, _): (_, ApiResponse) = call(&app, "POST", "/timer/start").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body): (_, ApiResponse) = call(&app, "POST", "/timer/start").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body.status, "error");
    assert!(body.message.starts_with("Failed to start timer"));
    assert!(reconciler.is_ticking());
}

#[tokio::test(start_paused = true)]
async fn test_stop_when_stopped_is_a_conflict() {
    let (app, _reconciler) = app(None).await;

    let (status, body): (_, ApiResponse) = call(&app, "POST", "/timer/stop").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body.message, "Failed to stop timer: timer is not running");
}

#[tokio::test(start_paused = true)]
async fn test_status_reports_last_action() {
    let (app, reconciler) = app(None).await;
    let _: (StatusCode, ApiResponse) = call(&app, "POST", "/timer/start").await;

    let (status, body): (_, StatusResponse) = call(&app, "GET", "/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.last_action.as_deref(), Some("start"));
    assert!(body.timer.running);
    assert!(!body.pending);

    reconciler.deactivate();
    let response = {
        use tower::ServiceExt;
        app.clone()
            .oneshot(Request::builder().uri("/status").body(Body::empty()).unwrap())
            .await
            .unwrap()
    };
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
