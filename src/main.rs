//! Job Timer - a work timer kept in step with a task backend
//!
//! This is the main entry point for the job-timer application.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use job_timer::{
    api::create_router,
    config::Config,
    services::HttpTimerGateway,
    state::{AppState, SystemClock, TimerReconciler},
    tasks::{status_poll_task, TokioScheduler},
    utils::shutdown_signal,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("job_timer={},tower_http=info", config.log_level()))
        .init();

    info!("Starting job-timer v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration: host={}, port={}, backend={}, task={}",
          config.host, config.port, config.backend_url, config.task_id);

    let gateway = HttpTimerGateway::new(
        config.backend_url.clone(),
        config.token.clone(),
        config.request_timeout(),
    )?;

    let reconciler = TimerReconciler::new(
        Arc::new(gateway),
        Arc::new(SystemClock),
        Arc::new(TokioScheduler),
    );

    let loaded = reconciler.activate(config.task_id.clone()).await;
    let formatted = loaded.formatted();
    let phase = if loaded.running { "running" } else { "stopped" };
    info!("Timer loaded: {} ({})", formatted, phase);

    // Observers follow a timer someone else starts and stops
    if let Some(period) = config.poll_period() {
        tokio::spawn(status_poll_task(reconciler.clone(), period));
    }

    let state = Arc::new(AppState::new(
        reconciler.clone(),
        config.port,
        config.host.clone(),
        config.hourly_rate,
    ));

    // Create HTTP router with all endpoints
    let app = create_router(state);

    // Bind to the specified address
    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  GET  /timer       - Current timer view");
    info!("  POST /timer/start - Start the work timer");
    info!("  POST /timer/stop  - Stop the work timer");
    info!("  GET  /status      - Timer and server status");
    info!("  GET  /health      - Health check");

    // Setup graceful shutdown
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    reconciler.deactivate();
    info!("Server shutdown complete");
    Ok(())
}
