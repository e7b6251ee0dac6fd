//! Job Timer - a work timer kept in step with a task backend
//!
//! The backend owns the authoritative timer for each task. This library
//! shows a locally ticking elapsed time that is re-derived from the
//! server's start instant, forwards start/stop intents to the backend and
//! adopts its answers, and serves the resulting view over HTTP.

pub mod api;
pub mod config;
pub mod error;
pub mod services;
pub mod state;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use api::create_router;
pub use config::Config;
pub use error::TimerError;
pub use services::{GatewayError, HttpTimerGateway, RemoteTimerGateway};
pub use state::{AppState, DisplayState, TimerReconciler, TimerSnapshot, TimerView};
pub use utils::signals::shutdown_signal;
