//! Pairing session, callback events and coordinator state

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::identifiers::Verifier;
use crate::utils::redact;

// ============================================================================
// Pairing Session
// ============================================================================

/// Temporary credential pair for one pairing attempt
///
/// Persisted before the authorization surface opens so that a restarted
/// process can still complete the exchange.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingSession {
    /// Request token issued by the provider
    pub token: String,
    /// Secret matching `token`
    pub token_secret: String,
    /// Unix timestamp when the session was created
    pub created_at: u64,
}

impl PairingSession {
    /// Create a session stamped with the current time
    pub fn new(token: impl Into<String>, token_secret: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            token_secret: token_secret.into(),
            created_at: now_secs(),
        }
    }

    /// A session is usable only while both halves are present
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.token.is_empty() && !self.token_secret.is_empty()
    }

    /// Time elapsed since the session was created
    #[must_use]
    pub fn age(&self) -> Duration {
        Duration::from_secs(now_secs().saturating_sub(self.created_at))
    }
}

impl std::fmt::Debug for PairingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PairingSession")
            .field("token", &redact(&self.token))
            .field("token_secret", &"<redacted>")
            .field("created_at", &self.created_at)
            .finish()
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs()
}

// ============================================================================
// Callback Events
// ============================================================================

/// Which completion path produced a callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackSource {
    /// Result object returned by the authorization launcher
    Launcher,
    /// Out-of-band app invocation through the custom URL scheme
    DeepLink,
}

impl std::fmt::Display for CallbackSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Launcher => write!(f, "launcher"),
            Self::DeepLink => write!(f, "deep_link"),
        }
    }
}

/// A returned URL and whatever could be extracted from it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackEvent {
    /// URL the provider redirected to
    pub source_url: String,
    /// Extracted verifier, if any layer found one
    pub verifier: Option<Verifier>,
    /// `oauth_token` echoed back by the provider, if present
    pub echoed_token: Option<String>,
    /// Completion path that delivered this event
    pub source: CallbackSource,
}

impl CallbackEvent {
    /// Build an event from a raw callback URL
    pub fn from_url(url: impl Into<String>, source: CallbackSource) -> Self {
        let source_url = url.into();
        let verifier = crate::callback::extract(&source_url).map(Verifier::from);
        let echoed_token = crate::callback::extract_token(&source_url);
        Self {
            source_url,
            verifier,
            echoed_token,
            source,
        }
    }

    /// Whether this callback was issued for a different request token
    #[must_use]
    pub fn is_for_other_session(&self, session: &PairingSession) -> bool {
        self.echoed_token
            .as_deref()
            .is_some_and(|token| token != session.token)
    }
}

// ============================================================================
// Coordinator State
// ============================================================================

/// Why a flow ended in [`PairingState::Failed`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Temporary credential could not be obtained
    RequestToken,
    /// No authorization surface on this host
    LauncherUnavailable,
    /// User closed the surface (normally reset to idle instead)
    Cancelled,
    /// No verifier in the callback
    VerifierMissing,
    /// Session credential lost
    SessionExpired,
    /// Backend rejected the verifier exchange
    Exchange,
    /// Storage, configuration or decoding failure
    Internal,
}

/// Pairing state machine
///
/// Only `Idle`, `Connected` and `Failed` are stable. Transitions happen
/// exclusively inside the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PairingState {
    /// No flow running
    #[default]
    Idle,
    /// Waiting for the backend to issue a temporary credential
    RequestingToken,
    /// External surface is open
    AwaitingAuthorization,
    /// A completion signal was accepted
    ExtractingVerifier,
    /// Verifier exchange in flight
    Exchanging,
    /// Account linked
    Connected,
    /// Flow ended with an error
    Failed(FailureKind),
}

impl PairingState {
    /// Stable states accept a new `pair()` call
    #[must_use]
    pub fn is_stable(&self) -> bool {
        matches!(self, Self::Idle | Self::Connected | Self::Failed(_))
    }

    /// Whether moving to `next` is a legal transition
    #[must_use]
    pub fn can_transition_to(&self, next: PairingState) -> bool {
        use PairingState::{
            AwaitingAuthorization, Connected, Exchanging, ExtractingVerifier, Failed, Idle,
            RequestingToken,
        };
        match (self, next) {
            (Idle | Connected | Failed(_), RequestingToken) => true,
            (RequestingToken, AwaitingAuthorization) => true,
            // Idle accepts a completion when resuming after a restart
            (AwaitingAuthorization | Idle, ExtractingVerifier) => true,
            (ExtractingVerifier, Exchanging) => true,
            (Exchanging, Connected) => true,
            (RequestingToken | AwaitingAuthorization | ExtractingVerifier | Exchanging, Idle) => {
                true
            }
            (RequestingToken | AwaitingAuthorization | ExtractingVerifier | Exchanging, Failed(_)) => {
                true
            }
            // A resumed completion may fail before any transient state is entered
            (Idle, Failed(_)) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for PairingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::RequestingToken => write!(f, "requesting_token"),
            Self::AwaitingAuthorization => write!(f, "awaiting_authorization"),
            Self::ExtractingVerifier => write!(f, "extracting_verifier"),
            Self::Exchanging => write!(f, "exchanging"),
            Self::Connected => write!(f, "connected"),
            Self::Failed(kind) => write!(f, "failed({kind:?})"),
        }
    }
}
