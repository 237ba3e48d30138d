//! One-shot backend liveness probe.
//!
//! Peripheral to the upload pipeline: polls `GET /api/health/` exactly
//! once and reports the result. No retry, no dependency on the controller
//! or renderer — any failure is surfaced as an `Error: <message>` line.

use crate::config::ViewerConfig;
use crate::error::ViewerError;
use crate::state::UiState;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct HealthBody {
    status: String,
}

/// Polls the liveness endpoint once and renders the outcome.
pub struct StatusProbe {
    client: reqwest::Client,
    health_url: String,
}

impl StatusProbe {
    pub fn new(config: &ViewerConfig) -> Result<Self, ViewerError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ViewerError::Internal(format!("http client: {e}")))?;
        Ok(Self {
            client,
            health_url: config.health_url(),
        })
    }

    /// Perform the single probe. Never returns `Loading` — that is the
    /// caller's state while this future is in flight.
    pub async fn check(&self) -> UiState<String> {
        match self.fetch_status().await {
            Ok(status) => UiState::Success(status),
            Err(e) => UiState::Error(e.to_string()),
        }
    }

    async fn fetch_status(&self) -> Result<String, ViewerError> {
        let response = self
            .client
            .get(&self.health_url)
            .send()
            .await
            .map_err(|e| ViewerError::HealthCheckFailed {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ViewerError::HealthCheckFailed {
                reason: format!("HTTP {status}"),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| ViewerError::HealthCheckFailed {
                reason: e.to_string(),
            })?;
        let parsed = parse_health(&body)?;
        debug!("health probe: {parsed}");
        Ok(parsed)
    }
}

/// Parse the liveness body `{ "status": string }`.
fn parse_health(body: &str) -> Result<String, ViewerError> {
    let parsed: HealthBody =
        serde_json::from_str(body).map_err(|e| ViewerError::HealthCheckFailed {
            reason: format!("unreadable body: {e}"),
        })?;
    Ok(parsed.status)
}

/// Render a probe state the way the status widget displays it.
pub fn status_line(state: &UiState<String>) -> String {
    match state {
        UiState::Idle | UiState::Loading => "Loading...".to_string(),
        UiState::Success(status) => format!("Status: {status}"),
        UiState::Error(msg) => format!("Error: {msg}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_reference_backend_body() {
        assert_eq!(parse_health(r#"{"status": "healthy"}"#).unwrap(), "healthy");
    }

    #[test]
    fn unreadable_body_is_an_error() {
        let err = parse_health("not json").unwrap_err();
        assert!(matches!(err, ViewerError::HealthCheckFailed { .. }));
    }

    #[test]
    fn status_lines_match_widget_copy() {
        assert_eq!(status_line(&UiState::Loading), "Loading...");
        assert_eq!(
            status_line(&UiState::Success("ok".to_string())),
            "Status: ok"
        );
        assert_eq!(
            status_line(&UiState::Error("Network error".to_string())),
            "Error: Network error"
        );
    }

    #[tokio::test]
    async fn unreachable_backend_reports_error_state() {
        let config = ViewerConfig::builder()
            .api_base("http://127.0.0.1:1")
            .build()
            .unwrap();
        let probe = StatusProbe::new(&config).unwrap();
        let state = probe.check().await;
        assert!(state.is_error());
        assert!(status_line(&state).starts_with("Error: "));
    }
}
