//! Persisted key-value storage for pairing credentials
//!
//! The coordinator checkpoints the temporary credential pair here before
//! control leaves the process, and clears it on every terminal transition.
//! The terminal `paired` flag lives here too and is read by the host to
//! gate its UI.
//!
//! Hosts with their own persistence (keychain, shared preferences, ...)
//! implement [`CredentialStore`]. The SDK ships a JSON file store for
//! desktop use and an in-memory store for tests and ephemeral hosts.

mod file;
mod memory;

pub use file::FileCredentialStore;
pub use memory::MemoryCredentialStore;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::types::{ApiKey, PairingSession};

/// Keys written by the SDK
pub mod keys {
    /// Account session credential (written by the host at sign-in)
    pub const API_KEY: &str = "api_key";
    /// Temporary request token
    pub const OAUTH_TOKEN: &str = "oauth_token";
    /// Temporary request token secret
    pub const OAUTH_TOKEN_SECRET: &str = "oauth_token_secret";
    /// Creation time of the temporary credential (Unix seconds)
    pub const OAUTH_TOKEN_CREATED_AT: &str = "oauth_token_created_at";
    /// Terminal connection flag
    pub const PAIRED: &str = "paired";
}

/// Errors that can occur during store operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error during storage operations
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Failure reported by a host-provided store
    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Persisted key-value contract
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Write `value` under `key`, replacing any previous value
    ///
    /// # Errors
    /// Returns error if the value cannot be persisted
    async fn save(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Read the value under `key`
    ///
    /// # Errors
    /// Returns error if the store cannot be read; a missing key is `Ok(None)`
    async fn read(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Remove `key`; removing a missing key is not an error
    ///
    /// # Errors
    /// Returns error if the store cannot be written
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

#[async_trait]
impl<T: CredentialStore + ?Sized> CredentialStore for Arc<T> {
    async fn save(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).save(key, value).await
    }

    async fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).read(key).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        (**self).delete(key).await
    }
}

/// Typed view over a [`CredentialStore`]
#[derive(Clone)]
pub struct SessionVault {
    store: Arc<dyn CredentialStore>,
}

impl std::fmt::Debug for SessionVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionVault").finish_non_exhaustive()
    }
}

impl SessionVault {
    /// Wrap a store
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Underlying store
    #[must_use]
    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// Account session credential, if the user is signed in
    ///
    /// # Errors
    /// Returns error if the store cannot be read
    pub async fn api_key(&self) -> Result<Option<ApiKey>, StoreError> {
        Ok(self
            .store
            .read(keys::API_KEY)
            .await?
            .map(ApiKey::from)
            .filter(|key| !key.is_empty()))
    }

    /// Persist the account session credential
    ///
    /// # Errors
    /// Returns error if the store cannot be written
    pub async fn set_api_key(&self, key: &ApiKey) -> Result<(), StoreError> {
        self.store.save(keys::API_KEY, key.as_str()).await
    }

    /// Checkpoint the temporary credential pair
    ///
    /// # Errors
    /// Returns error if the store cannot be written
    pub async fn save_session(&self, session: &PairingSession) -> Result<(), StoreError> {
        self.store.save(keys::OAUTH_TOKEN, &session.token).await?;
        self.store
            .save(keys::OAUTH_TOKEN_SECRET, &session.token_secret)
            .await?;
        self.store
            .save(keys::OAUTH_TOKEN_CREATED_AT, &session.created_at.to_string())
            .await
    }

    /// Read back a checkpointed session; incomplete sessions read as `None`
    ///
    /// # Errors
    /// Returns error if the store cannot be read
    pub async fn load_session(&self) -> Result<Option<PairingSession>, StoreError> {
        let token = self.store.read(keys::OAUTH_TOKEN).await?;
        let token_secret = self.store.read(keys::OAUTH_TOKEN_SECRET).await?;
        let (Some(token), Some(token_secret)) = (token, token_secret) else {
            return Ok(None);
        };

        let created_at = self
            .store
            .read(keys::OAUTH_TOKEN_CREATED_AT)
            .await?
            .and_then(|v| v.parse().ok())
            .unwrap_or_default();

        let session = PairingSession {
            token,
            token_secret,
            created_at,
        };
        Ok(session.is_valid().then_some(session))
    }

    /// Remove every key of the temporary credential
    ///
    /// All three deletes are attempted even if one fails.
    ///
    /// # Errors
    /// Returns the first error if the store cannot be written
    pub async fn clear_session(&self) -> Result<(), StoreError> {
        let mut first_error = None;
        for key in [
            keys::OAUTH_TOKEN,
            keys::OAUTH_TOKEN_SECRET,
            keys::OAUTH_TOKEN_CREATED_AT,
        ] {
            if let Err(e) = self.store.delete(key).await {
                tracing::warn!(key, "Could not delete session key: {e}");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Write the terminal connection flag
    ///
    /// # Errors
    /// Returns error if the store cannot be written
    pub async fn set_paired(&self, paired: bool) -> Result<(), StoreError> {
        self.store
            .save(keys::PAIRED, if paired { "true" } else { "false" })
            .await
    }

    /// Read the connection flag; missing reads as `false`
    ///
    /// # Errors
    /// Returns error if the store cannot be read
    pub async fn is_paired(&self) -> Result<bool, StoreError> {
        Ok(self
            .store
            .read(keys::PAIRED)
            .await?
            .is_some_and(|v| v == "true"))
    }
}
