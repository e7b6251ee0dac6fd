//! Configuration and CLI argument handling

use std::time::Duration;

use clap::Parser;
use reqwest::Url;

/// CLI argument parsing structure
#[derive(Parser, Debug)]
#[command(name = "job-timer")]
#[command(about = "A server-reconciled work timer for a marketplace task")]
#[command(version)]
pub struct Config {
    /// Port to bind the server to
    #[arg(short, long, default_value = "20554")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Base URL of the task backend
    #[arg(short, long)]
    pub backend_url: Url,

    /// Task whose work timer is shown
    #[arg(long)]
    pub task_id: String,

    /// Bearer token sent to the backend
    #[arg(long)]
    pub token: Option<String>,

    /// Agreed hourly rate, enables the running cost
    #[arg(long)]
    pub hourly_rate: Option<f64>,

    /// Re-fetch the timer status every N seconds (0 disables)
    #[arg(long, default_value = "0")]
    pub poll_secs: u64,

    /// Backend request timeout in seconds
    #[arg(long, default_value = "10")]
    pub request_timeout_secs: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }

    /// Status poll period, if polling is enabled
    pub fn poll_period(&self) -> Option<Duration> {
        (self.poll_secs > 0).then(|| Duration::from_secs(self.poll_secs))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::try_parse_from([
            "job-timer",
            "--backend-url",
            "http://localhost:8001",
            "--task-id",
            "task-1",
        ])
        .unwrap();

        assert_eq!(config.address(), "127.0.0.1:20554");
        assert_eq!(config.log_level(), "info");
        assert_eq!(config.poll_period(), None);
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.token, None);
    }

    #[test]
    fn test_observer_options() {
        let config = Config::try_parse_from([
            "job-timer",
            "-b",
            "https://api.example.com",
            "--task-id",
            "task-1",
            "--poll-secs",
            "5",
            "--hourly-rate",
            "2500",
            "-v",
        ])
        .unwrap();

        assert_eq!(config.poll_period(), Some(Duration::from_secs(5)));
        assert_eq!(config.hourly_rate, Some(2500.0));
        assert_eq!(config.log_level(), "debug");
    }

    #[test]
    fn test_rejects_invalid_backend_url() {
        let result = Config::try_parse_from([
            "job-timer",
            "--backend-url",
            "not a url",
            "--task-id",
            "task-1",
        ]);
        assert!(result.is_err());
    }
}
