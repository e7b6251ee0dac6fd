//! Background tasks module
//!
//! This module contains the local ticker and the optional status poller
//! that run alongside the HTTP server.

pub mod status_poller;
pub mod ticker;

// Re-export main types
pub use status_poller::status_poll_task;
pub use ticker::{LocalTicker, Scheduler, TickFn, TickerHandle, TokioScheduler, TICK_PERIOD};
