//! Backend access module
//!
//! This module contains the gateway contract to the timer backend and its
//! HTTP implementation.

pub mod gateway;
pub mod http_gateway;

// Re-export main types
pub use gateway::{GatewayError, RemoteTimerGateway};
pub use http_gateway::HttpTimerGateway;
