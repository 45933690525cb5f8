//! Instance metadata client
//!
//! Reads custom instance attributes from the metadata server. A missing
//! attribute (HTTP 404) is reported as `None`; transport errors and server
//! errors are retried with exponential backoff.

use std::time::Duration;

use backoff::ExponentialBackoff;

use crate::config::defaults;
use crate::error::ParamError;

/// Metadata server client
#[derive(Debug, Clone)]
pub struct MetadataClient {
    /// HTTP client
    client: reqwest::Client,
    /// Attribute endpoint base URL
    base_url: String,
    /// Total time spent retrying one lookup
    retry_window: Duration,
}

impl MetadataClient {
    /// Create a client for the default metadata endpoint
    pub fn new() -> Self {
        Self::with_url(defaults::METADATA_URL)
    }

    /// Create a client for a custom attribute endpoint
    pub fn with_url(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            base_url: base_url.trim_end_matches('/').to_string(),
            retry_window: Duration::from_secs(defaults::METADATA_MAX_ELAPSED_SECS),
        }
    }

    /// Limit how long a single lookup keeps retrying
    #[must_use]
    pub fn with_retry_window(mut self, window: Duration) -> Self {
        self.retry_window = window;
        self
    }

    /// Get the attribute endpoint base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch one attribute value
    pub async fn attribute(&self, key: &str) -> Result<Option<String>, ParamError> {
        let url = format!("{}/{}", self.base_url, key);
        let policy = ExponentialBackoff {
            initial_interval: Duration::from_millis(100),
            max_elapsed_time: Some(self.retry_window),
            ..ExponentialBackoff::default()
        };

        let client = &self.client;
        let url = url.as_str();

        let result = backoff::future::retry(policy, || async move {
            let response = client
                .get(url)
                .header("Metadata-Flavor", "Google")
                .send()
                .await
                .map_err(|e| backoff::Error::transient(e.to_string()))?;

            let status = response.status();
            if status == reqwest::StatusCode::NOT_FOUND {
                return Ok(None);
            }
            if status.is_server_error() {
                return Err(backoff::Error::transient(format!("HTTP {status}")));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(format!("HTTP {status}")));
            }

            let body = response
                .text()
                .await
                .map_err(|e| backoff::Error::transient(e.to_string()))?;
            Ok(Some(body))
        })
        .await;

        result.map_err(|error| ParamError::Metadata {
            key: key.to_string(),
            error,
        })
    }
}

impl Default for MetadataClient {
    fn default() -> Self {
        Self::new()
    }
}
