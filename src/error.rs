//! Error types for the pairing SDK

use thiserror::Error;

use crate::storage::StoreError;
use crate::types::FailureKind;

/// Main error type for the pairing SDK
#[derive(Error, Debug)]
pub enum PairingError {
    /// The backend refused to issue a temporary credential
    #[error("Request token failed with HTTP status {status}")]
    RequestToken {
        /// HTTP status returned by the backend
        status: u16,
    },

    /// No authorization surface can be shown on this host
    #[error("No authorization launcher available: {0}")]
    LauncherUnavailable(String),

    /// The user closed the authorization surface
    #[error("Authorization cancelled by user")]
    UserCancelled,

    /// The callback URL did not carry a verifier
    #[error("No verifier found in callback URL: {url}")]
    VerifierMissing {
        /// The URL the provider returned
        url: String,
    },

    /// The temporary credential is gone from memory and from the store
    #[error("Pairing session expired. Start pairing again.")]
    SessionExpired,

    /// The backend rejected the verifier exchange
    #[error("Access token exchange failed with HTTP status {status}")]
    Exchange {
        /// HTTP status returned by the backend
        status: u16,
        /// Response body, truncated for diagnostics
        body: String,
    },

    /// No account session credential is stored
    #[error("Not signed in: no api key stored")]
    NotSignedIn,

    /// A pairing flow is already running
    #[error("A pairing flow is already in progress")]
    AlreadyInProgress,

    /// Network error during a backend request
    #[error("Network error: {0}")]
    Network(String),

    /// Backend answered 200 with a body we cannot use
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Credential store failure
    #[error("Credential store error: {0}")]
    Storage(#[from] StoreError),

    /// URL could not be built or parsed
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

/// Result type alias for pairing operations
pub type Result<T> = std::result::Result<T, PairingError>;

impl PairingError {
    /// Create a request token error
    #[must_use]
    pub fn request_token(status: u16) -> Self {
        Self::RequestToken { status }
    }

    /// Create a launcher unavailable error
    pub fn launcher_unavailable(msg: impl Into<String>) -> Self {
        Self::LauncherUnavailable(msg.into())
    }

    /// Create a verifier missing error
    pub fn verifier_missing(url: impl Into<String>) -> Self {
        Self::VerifierMissing { url: url.into() }
    }

    /// Create an exchange error
    pub fn exchange(status: u16, body: impl Into<String>) -> Self {
        Self::Exchange {
            status,
            body: body.into(),
        }
    }

    /// Create a network error
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Create an invalid response error
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Create an invalid configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Whether the host should skip the failure alert and only reset its UI
    #[must_use]
    pub fn is_silent(&self) -> bool {
        matches!(self, Self::UserCancelled)
    }

    /// Coarse failure category recorded in [`PairingState::Failed`](crate::PairingState)
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::RequestToken { .. } | Self::NotSignedIn => FailureKind::RequestToken,
            Self::LauncherUnavailable(_) => FailureKind::LauncherUnavailable,
            Self::UserCancelled => FailureKind::Cancelled,
            Self::VerifierMissing { .. } => FailureKind::VerifierMissing,
            Self::SessionExpired => FailureKind::SessionExpired,
            Self::Exchange { .. } => FailureKind::Exchange,
            _ => FailureKind::Internal,
        }
    }

    /// Single human-readable message for the host's notification surface
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::RequestToken { status } => format!(
                "Could not start pairing (server returned {status}). Please try again."
            ),
            Self::LauncherUnavailable(_) => "This build cannot open the provider's sign-in page. \
                 Install a build that includes the web browser capability."
                .to_string(),
            Self::UserCancelled => "Pairing cancelled.".to_string(),
            Self::VerifierMissing { .. } => {
                "The provider did not confirm the authorization. Please try again.".to_string()
            }
            Self::SessionExpired => {
                "Your pairing session expired. Please start pairing again.".to_string()
            }
            Self::Exchange { status, .. } => {
                format!("Could not complete pairing (server returned {status}).")
            }
            Self::NotSignedIn => "Please sign in before pairing a device.".to_string(),
            Self::AlreadyInProgress => "Pairing is already in progress.".to_string(),
            Self::Network(_) => {
                "Network error while pairing. Check your connection and try again.".to_string()
            }
            other => format!("Pairing failed: {other}"),
        }
    }
}
