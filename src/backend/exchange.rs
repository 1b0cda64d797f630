//! Verifier exchange for the permanent credential

use std::sync::Arc;

use super::ACCESS_TOKEN_PATH;
use crate::error::{PairingError, Result};
use crate::transport::HttpFetch;
use crate::types::{ApiKey, PairingOptions, PairingSession, Verifier};

/// Exchanges the verifier and temporary credential for a permanent connection
///
/// Every non-200 status, 5xx included, fails the attempt. There is no retry
/// here; a new attempt always starts from a fresh request token.
#[derive(Clone)]
pub struct AccessTokenExchanger {
    fetch: Arc<dyn HttpFetch>,
    url: String,
}

impl AccessTokenExchanger {
    /// Create an exchanger for `{backend_url}/access-token`
    pub fn new(fetch: Arc<dyn HttpFetch>, options: &PairingOptions) -> Self {
        Self {
            fetch,
            url: options.endpoint(ACCESS_TOKEN_PATH),
        }
    }

    /// Complete the handshake on the backend
    ///
    /// # Errors
    ///
    /// Returns `PairingError::Exchange` with the status on any non-200 response,
    /// or `PairingError::Network` if the backend is unreachable.
    pub async fn exchange(
        &self,
        session: &PairingSession,
        verifier: &Verifier,
        api_key: &ApiKey,
    ) -> Result<()> {
        tracing::debug!("Exchanging verifier for access token");
        let response = self
            .fetch
            .get(
                &self.url,
                &[
                    ("apiKey", api_key.as_str()),
                    ("oauth_token", session.token.as_str()),
                    ("token_secret", session.token_secret.as_str()),
                    ("oauth_verifier", verifier.as_str()),
                ],
            )
            .await?;

        if response.is_ok() {
            return Ok(());
        }

        tracing::warn!(
            status = response.status,
            body = %response.body_excerpt(),
            "Access token exchange rejected"
        );
        Err(PairingError::exchange(
            response.status,
            response.body_excerpt(),
        ))
    }
}
