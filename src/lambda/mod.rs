// src/lambda/mod.rs

//! AWS Lambda handler for the monitor.
//!
//! A scheduled rule invokes the function; each invocation performs one
//! monitoring run with configuration taken from the environment and
//! returns the run summary.

use lambda_runtime::{Error as LambdaError, LambdaEvent};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::error::Result;
use crate::models::Config;
use crate::pipeline::{RunSummary, run_monitor};

/// Lambda invocation payload.
///
/// Scheduled events carry unrelated fields; they are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct MonitorRequest {
    /// Sitemap to read instead of `SITEMAP_URL`
    #[serde(default)]
    pub sitemap_url: Option<String>,
}

/// Lambda response payload.
#[derive(Debug, Default, Serialize)]
pub struct MonitorResponse {
    /// Whether the run started and completed
    pub success: bool,

    /// Run counters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<RunSummary>,

    /// Error message if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Execution time in milliseconds
    pub execution_time_ms: u64,
}

/// Main Lambda handler function.
#[instrument(skip(event))]
pub async fn handler(
    event: LambdaEvent<MonitorRequest>,
) -> std::result::Result<MonitorResponse, LambdaError> {
    let start = std::time::Instant::now();
    let (request, _context) = event.into_parts();

    info!("Starting monitoring run: sitemap_url={:?}", request.sitemap_url);

    match run(&request).await {
        Ok(summary) => {
            let execution_time_ms = start.elapsed().as_millis() as u64;
            info!(
                "Run completed: {} products, {} created, {} updated, {} skipped, {} failed in {}ms",
                summary.total,
                summary.created,
                summary.updated,
                summary.skipped,
                summary.failed,
                execution_time_ms
            );
            Ok(MonitorResponse {
                success: true,
                summary: Some(summary),
                error: None,
                execution_time_ms,
            })
        }
        Err(e) => {
            error!("Run failed: {}", e);
            Ok(MonitorResponse {
                success: false,
                error: Some(e.to_string()),
                execution_time_ms: start.elapsed().as_millis() as u64,
                ..Default::default()
            })
        }
    }
}

async fn run(request: &MonitorRequest) -> Result<RunSummary> {
    let config = lambda_config(request);
    run_monitor(&config).await
}

/// Environment config with the request override applied.
fn lambda_config(request: &MonitorRequest) -> Config {
    let mut config = Config::from_env();
    if let Some(url) = request.sitemap_url.as_deref().filter(|u| !u.trim().is_empty()) {
        config.feed.sitemap_url = Some(url.to_string());
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduled_event_payload() {
        let payload = serde_json::json!({
            "version": "0",
            "source": "aws.events",
            "detail-type": "Scheduled Event",
            "detail": {}
        });
        let request: MonitorRequest = serde_json::from_value(payload).unwrap();
        assert!(request.sitemap_url.is_none());
    }

    #[test]
    fn test_request_override() {
        let request = MonitorRequest {
            sitemap_url: Some("https://shop.test/sitemap.xml".into()),
        };
        assert_eq!(
            lambda_config(&request).feed.sitemap_url.as_deref(),
            Some("https://shop.test/sitemap.xml")
        );
    }

    #[test]
    fn test_blank_override_is_ignored() {
        let request = MonitorRequest {
            sitemap_url: Some("  ".into()),
        };
        let expected = Config::from_env().feed.sitemap_url;
        assert_eq!(lambda_config(&request).feed.sitemap_url, expected);
    }

    #[test]
    fn test_failure_response_omits_summary() {
        let response = MonitorResponse {
            error: Some("Configuration error: SITEMAP_URL is not set".into()),
            ..Default::default()
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["success"], false);
        assert!(json.get("summary").is_none());
    }
}
