//! reqwest-backed [`HttpFetch`]

use async_trait::async_trait;
use std::time::Duration;

use super::{HttpFetch, HttpResponse};
use crate::error::{PairingError, Result};

/// Production transport over a shared `reqwest::Client`
#[derive(Debug, Clone, Default)]
pub struct ReqwestFetch {
    http_client: reqwest::Client,
}

impl ReqwestFetch {
    /// Create a transport whose requests time out after `timeout`
    ///
    /// # Errors
    /// Returns `PairingError::InvalidConfig` if the TLS backend cannot be initialized
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PairingError::invalid_config(format!("HTTP client: {e}")))?;
        Ok(Self { http_client })
    }

    /// Wrap an existing client
    #[must_use]
    pub fn from_client(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }
}

#[async_trait]
impl HttpFetch for ReqwestFetch {
    async fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<HttpResponse> {
        let response = self
            .http_client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| PairingError::network(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| PairingError::network(e.to_string()))?;

        tracing::debug!(status, url, "Backend responded");
        Ok(HttpResponse { status, body })
    }
}
