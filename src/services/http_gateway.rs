//! Timer backend gateway over HTTP

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::{de::DeserializeOwned, Deserialize};
use tracing::debug;

use super::{GatewayError, RemoteTimerGateway};
use crate::state::{StartReceipt, StopReceipt, TimerSnapshot};

/// Body of `GET /api/tasks/{id}/timer-status`
#[derive(Debug, Deserialize)]
struct StatusBody {
    #[serde(default)]
    is_timer_running: bool,
    #[serde(default, deserialize_with = "server_time::deserialize_option")]
    timer_started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    actual_hours_worked: Option<f64>,
    #[serde(default)]
    accumulated_seconds: Option<f64>,
}

/// Body of `POST /api/tasks/{id}/start-timer`
#[derive(Debug, Deserialize)]
struct StartBody {
    #[serde(deserialize_with = "server_time::deserialize")]
    started_at: DateTime<Utc>,
}

/// Body of `POST /api/tasks/{id}/stop-timer`
#[derive(Debug, Deserialize)]
struct StopBody {
    #[serde(default)]
    actual_hours_worked: Option<f64>,
    #[serde(default)]
    accumulated_seconds: Option<f64>,
}

/// Seconds worked, preferring an exact count over the hours figure
fn worked_seconds(accumulated_seconds: Option<f64>, hours: Option<f64>) -> Option<f64> {
    accumulated_seconds.or_else(|| hours.map(|hours| hours * 3600.0))
}

/// Gateway talking to the task backend's timer routes
#[derive(Debug, Clone)]
pub struct HttpTimerGateway {
    base_url: Url,
    token: Option<String>,
    client: Client,
}

impl HttpTimerGateway {
    /// Create a gateway for `base_url`, sending `token` as a bearer token
    /// when given.
    pub fn new(
        base_url: Url,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        if base_url.cannot_be_a_base() {
            return Err(GatewayError::config(format!("not a base URL: {}", base_url)));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::config(e.to_string()))?;

        Ok(Self {
            base_url,
            token,
            client,
        })
    }

    /// URL of `/api/tasks/{task_id}/{action}` below the base URL
    fn endpoint(&self, task_id: &str, action: &str) -> Result<Url, GatewayError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GatewayError::config(format!("not a base URL: {}", self.base_url)))?
            .pop_if_empty()
            .extend(["api", "tasks", task_id, action]);
        Ok(url)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, GatewayError> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::network(e.to_string()))?;

        let status = response.status();
        debug!(%status, url = %response.url(), "Timer backend responded");

        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| GatewayError::invalid_response(e.to_string()));
        }

        let body = response.text().await.unwrap_or_default();
        Err(error_for_status(status, &body))
    }
}

/// Map a non-success response to a gateway error.
fn error_for_status(status: StatusCode, body: &str) -> GatewayError {
    let detail = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| value.get("detail").cloned())
        .map(|detail| match detail {
            serde_json::Value::String(text) => text,
            other => other.to_string(),
        })
        .unwrap_or_else(|| body.trim().to_string());

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GatewayError::NotAuthorized,
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT => GatewayError::conflict(detail),
        StatusCode::NOT_FOUND => GatewayError::NotFound,
        _ => GatewayError::Unexpected {
            status: status.as_u16(),
            detail,
        },
    }
}

#[async_trait]
impl RemoteTimerGateway for HttpTimerGateway {
    async fn status(&self, task_id: &str) -> Result<TimerSnapshot, GatewayError> {
        let url = self.endpoint(task_id, "timer-status")?;
        let body: StatusBody = self.send(self.client.get(url)).await?;

        Ok(TimerSnapshot {
            is_running: body.is_timer_running,
            started_at: body.timer_started_at,
            accumulated_seconds: worked_seconds(body.accumulated_seconds, body.actual_hours_worked),
        })
    }

    async fn start(&self, task_id: &str) -> Result<StartReceipt, GatewayError> {
        let url = self.endpoint(task_id, "start-timer")?;
        let body: StartBody = self.send(self.client.post(url).json(&serde_json::json!({}))).await?;

        Ok(StartReceipt {
            started_at: body.started_at,
        })
    }

    async fn stop(&self, task_id: &str) -> Result<StopReceipt, GatewayError> {
        let url = self.endpoint(task_id, "stop-timer")?;
        let body: StopBody = self.send(self.client.post(url).json(&serde_json::json!({}))).await?;

        let accumulated_seconds = worked_seconds(body.accumulated_seconds, body.actual_hours_worked)
            .ok_or_else(|| GatewayError::invalid_response("stop response carries no worked time"))?;
        Ok(StopReceipt {
            accumulated_seconds,
        })
    }
}

/// Timestamps from the backend: RFC 3339, or naive ISO-8601 in UTC.
mod server_time {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{de, Deserialize, Deserializer};

    const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Some(parsed.with_timezone(&Utc));
        }
        NAIVE_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
            .map(|naive| naive.and_utc())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| de::Error::custom(format!("invalid timestamp: {}", raw)))
    }

    pub fn deserialize_option<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            Some(raw) => parse(&raw)
                .map(Some)
                .ok_or_else(|| de::Error::custom(format!("invalid timestamp: {}", raw))),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_parses_naive_and_offset_timestamps() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
            + chrono::Duration::microseconds(250_000);
        assert_eq!(server_time::parse("2024-05-01T09:00:00.250000"), Some(expected));
        assert_eq!(server_time::parse("2024-05-01T09:00:00.25Z"), Some(expected));
        assert_eq!(server_time::parse("2024-05-01T11:00:00.25+02:00"), Some(expected));
        assert_eq!(server_time::parse("yesterday"), None);
    }

    #[test]
    fn test_status_body_accepts_null_start() {
        let body: StatusBody = serde_json::from_str(
            r#"{"is_timer_running": false, "timer_started_at": null, "actual_hours_worked": 1.5}"#,
        )
        .unwrap();
        assert!(!body.is_timer_running);
        assert_eq!(body.timer_started_at, None);
        assert_eq!(
            worked_seconds(body.accumulated_seconds, body.actual_hours_worked),
            Some(5400.0)
        );
    }

    #[test]
    fn test_exact_seconds_win_over_hours() {
        assert_eq!(worked_seconds(Some(5.3), Some(0.0)), Some(5.3));
        assert_eq!(worked_seconds(None, None), None);
    }

    #[test]
    fn test_error_mapping() {
        assert_eq!(
            error_for_status(StatusCode::FORBIDDEN, r#"{"detail":"Task not assigned to you"}"#),
            GatewayError::NotAuthorized
        );
        assert_eq!(
            error_for_status(StatusCode::BAD_REQUEST, r#"{"detail":"Timer is not running"}"#),
            GatewayError::conflict("Timer is not running")
        );
        assert_eq!(
            error_for_status(StatusCode::NOT_FOUND, r#"{"detail":"Task not found"}"#),
            GatewayError::NotFound
        );
        assert_eq!(
            error_for_status(StatusCode::BAD_GATEWAY, "upstream down\n"),
            GatewayError::Unexpected {
                status: 502,
                detail: "upstream down".to_string()
            }
        );
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let gateway = HttpTimerGateway::new(
            Url::parse("http://backend.local/v2/").unwrap(),
            None,
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(
            gateway.endpoint("task 7", "timer-status").unwrap().as_str(),
            "http://backend.local/v2/api/tasks/task%207/timer-status"
        );
    }
}
