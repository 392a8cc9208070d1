// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use crate::error::Result;
use crate::models::HttpConfig;

/// Create the shared asynchronous HTTP client.
///
/// The client-wide timeout is the product page timeout; callers that need a
/// different bound override it per request.
pub fn create_async_client(config: &HttpConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// Fetch a URL as text, treating non-2xx statuses as errors.
pub async fn fetch_text(client: &reqwest::Client, url: &str) -> Result<String> {
    let text = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    Ok(text)
}

/// Fetch a URL as text with a custom timeout.
pub async fn fetch_text_with_timeout(
    client: &reqwest::Client,
    url: &str,
    timeout_secs: u64,
) -> Result<String> {
    let text = client
        .get(url)
        .timeout(Duration::from_secs(timeout_secs))
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    Ok(text)
}
