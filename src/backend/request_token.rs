//! Temporary credential request

use serde::Deserialize;
use std::sync::Arc;

use super::REQUEST_TOKEN_PATH;
use crate::error::{PairingError, Result};
use crate::transport::HttpFetch;
use crate::types::{ApiKey, PairingSession, PairingOptions};
use crate::utils::redact;

/// Temporary credential pair returned by the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestToken {
    /// Request token, embedded in the consent URL
    pub token: String,
    /// Secret matching `token`, needed for the exchange
    pub token_secret: String,
}

impl RequestToken {
    /// Turn the pair into a session stamped with the current time
    #[must_use]
    pub fn into_session(self) -> PairingSession {
        PairingSession::new(self.token, self.token_secret)
    }
}

/// Wire shape of `GET request-token`
#[derive(Debug, Deserialize)]
struct RequestTokenResponse {
    oauth_token: String,
    oauth_token_secret: String,
}

/// Fetches a temporary credential pair from the backend
#[derive(Clone)]
pub struct RequestTokenClient {
    fetch: Arc<dyn HttpFetch>,
    url: String,
}

impl RequestTokenClient {
    /// Create a client for `{backend_url}/request-token`
    pub fn new(fetch: Arc<dyn HttpFetch>, options: &PairingOptions) -> Self {
        Self {
            fetch,
            url: options.endpoint(REQUEST_TOKEN_PATH),
        }
    }

    /// Request a temporary credential for the signed-in account
    ///
    /// # Errors
    ///
    /// - `PairingError::RequestToken` on any non-200 status
    /// - `PairingError::InvalidResponse` if a 200 body lacks either field
    /// - `PairingError::Network` if the backend is unreachable
    pub async fn request(&self, api_key: &ApiKey) -> Result<RequestToken> {
        tracing::debug!("Requesting temporary credential");
        let response = self
            .fetch
            .get(&self.url, &[("apiKey", api_key.as_str())])
            .await?;

        if !response.is_ok() {
            tracing::warn!(
                status = response.status,
                body = %response.body_excerpt(),
                "Request token failed"
            );
            return Err(PairingError::request_token(response.status));
        }

        let parsed: RequestTokenResponse = response.json()?;
        if parsed.oauth_token.is_empty() || parsed.oauth_token_secret.is_empty() {
            return Err(PairingError::invalid_response(
                "request-token returned an empty token or secret",
            ));
        }

        tracing::debug!(token = %redact(&parsed.oauth_token), "Temporary credential issued");
        Ok(RequestToken {
            token: parsed.oauth_token,
            token_secret: parsed.oauth_token_secret,
        })
    }
}
