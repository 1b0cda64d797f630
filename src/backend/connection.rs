//! Server-side connection status

use serde::Deserialize;
use std::sync::Arc;

use super::VALIDATE_CONNECTION_PATH;
use crate::error::{PairingError, Result};
use crate::storage::SessionVault;
use crate::transport::HttpFetch;
use crate::types::{ApiKey, PairingOptions};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValidateConnectionResponse {
    is_connected: bool,
}

/// Re-derives the `paired` flag from the backend
#[derive(Clone)]
pub struct ConnectionValidator {
    fetch: Arc<dyn HttpFetch>,
    url: String,
}

impl ConnectionValidator {
    /// Create a validator for `{backend_url}/validate-connection`
    pub fn new(fetch: Arc<dyn HttpFetch>, options: &PairingOptions) -> Self {
        Self {
            fetch,
            url: options.endpoint(VALIDATE_CONNECTION_PATH),
        }
    }

    /// Ask the backend whether the account is linked to the provider
    ///
    /// # Errors
    ///
    /// Returns `PairingError::InvalidResponse` on a non-200 status or a body
    /// without `isConnected`, `PairingError::Network` if unreachable.
    pub async fn validate(&self, api_key: &ApiKey) -> Result<bool> {
        let response = self
            .fetch
            .get(&self.url, &[("apiKey", api_key.as_str())])
            .await?;

        if !response.is_ok() {
            return Err(PairingError::invalid_response(format!(
                "validate-connection returned {}",
                response.status
            )));
        }

        Ok(response.json::<ValidateConnectionResponse>()?.is_connected)
    }

    /// Overwrite the local flag with the server's answer and return it
    ///
    /// # Errors
    ///
    /// Returns `PairingError::NotSignedIn` without an api key, or any error
    /// from [`validate`](Self::validate) or the store.
    pub async fn sync_paired_flag(&self, vault: &SessionVault) -> Result<bool> {
        let api_key = vault.api_key().await?.ok_or(PairingError::NotSignedIn)?;
        let connected = self.validate(&api_key).await?;

        let local = vault.is_paired().await?;
        if local != connected {
            tracing::info!(local, server = connected, "Correcting paired flag from server");
            vault.set_paired(connected).await?;
        }
        Ok(connected)
    }
}
