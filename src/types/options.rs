//! Pairing configuration options

use std::time::Duration;
use typed_builder::TypedBuilder;

use crate::error::{PairingError, Result};

/// Default backend base URL (request-token, access-token, validate-connection)
pub const DEFAULT_BACKEND_URL: &str = "https://api.fitlink.app/v1/garmin";
/// Default provider consent page
pub const DEFAULT_CONSENT_URL: &str = "https://connect.garmin.com/oauthConfirm";
/// Default HTTPS callback page registered with the provider
pub const DEFAULT_CALLBACK_URL: &str = "https://fitlink.app/oauth/callback";
/// Default custom URL scheme for deep links
pub const DEFAULT_DEEP_LINK_SCHEME: &str = "fitlink";

const DEFAULT_DEEP_LINK_GRACE: Duration = Duration::from_secs(30);
const DEFAULT_AUTHORIZATION_TIMEOUT: Duration = Duration::from_secs(300);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// Platform
// ============================================================================

/// Host platform the SDK is embedded in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    /// iOS: the system overlay returns a reliable result object
    Ios,
    /// Android: the overlay may report `dismiss` without a URL on success
    Android,
    /// Desktop: consent page opens in the default browser
    Desktop,
}

impl Platform {
    /// Platform of the current compilation target
    #[must_use]
    pub fn current() -> Self {
        if cfg!(target_os = "ios") {
            Self::Ios
        } else if cfg!(target_os = "android") {
            Self::Android
        } else {
            Self::Desktop
        }
    }

    /// Whether an in-process web surface may stand in for the overlay
    #[must_use]
    pub fn supports_embedded_surface(&self) -> bool {
        matches!(self, Self::Android)
    }

    /// Whether the trusted overlay's result object can be relied on
    #[must_use]
    pub fn overlay_result_is_reliable(&self) -> bool {
        matches!(self, Self::Ios)
    }

    /// Parse a platform name (`ios`, `android`, anything else is desktop)
    #[must_use]
    pub fn from_name(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "ios" => Self::Ios,
            "android" => Self::Android,
            _ => Self::Desktop,
        }
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::current()
    }
}

// ============================================================================
// Pairing Options
// ============================================================================

/// Main options for the pairing flow
#[derive(Debug, Clone, TypedBuilder)]
#[builder(
    builder_method(doc = "Create a new builder for PairingOptions"),
    builder_type(doc = "Builder for PairingOptions", vis = "pub"),
    build_method(doc = "Build the PairingOptions")
)]
pub struct PairingOptions {
    /// Base URL of the backend pairing endpoints
    #[builder(default = DEFAULT_BACKEND_URL.to_string(), setter(into))]
    pub backend_url: String,

    /// Provider consent page (`oauthConfirm`)
    #[builder(default = DEFAULT_CONSENT_URL.to_string(), setter(into))]
    pub consent_url: String,

    /// HTTPS callback page passed as `oauth_callback`
    #[builder(default = DEFAULT_CALLBACK_URL.to_string(), setter(into))]
    pub callback_url: String,

    /// Custom scheme deep links arrive on (without `://`)
    #[builder(default = DEFAULT_DEEP_LINK_SCHEME.to_string(), setter(into))]
    pub deep_link_scheme: String,

    /// Host platform, drives launcher selection
    #[builder(default)]
    pub platform: Platform,

    /// Force deep-link delivery on or off; `None` follows the launcher
    #[builder(default, setter(strip_option))]
    pub deep_links: Option<bool>,

    /// How long to wait for a deep link after the overlay reports `dismiss`
    #[builder(default = DEFAULT_DEEP_LINK_GRACE)]
    pub deep_link_grace: Duration,

    /// Upper bound on how long the embedded surface waits for the callback
    #[builder(default = DEFAULT_AUTHORIZATION_TIMEOUT)]
    pub authorization_timeout: Duration,

    /// Timeout applied to each backend request
    #[builder(default = DEFAULT_REQUEST_TIMEOUT)]
    pub request_timeout: Duration,
}

impl Default for PairingOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl PairingOptions {
    /// Build options from `FITLINK_*` environment variables, falling back to defaults
    #[must_use]
    pub fn from_env() -> Self {
        let var = |name: &str, default: &str| {
            std::env::var(name)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let platform = std::env::var("FITLINK_PLATFORM")
            .map(|s| Platform::from_name(&s))
            .unwrap_or_default();

        Self::builder()
            .backend_url(var("FITLINK_BACKEND_URL", DEFAULT_BACKEND_URL))
            .consent_url(var("FITLINK_CONSENT_URL", DEFAULT_CONSENT_URL))
            .callback_url(var("FITLINK_CALLBACK_URL", DEFAULT_CALLBACK_URL))
            .deep_link_scheme(var("FITLINK_DEEP_LINK_SCHEME", DEFAULT_DEEP_LINK_SCHEME))
            .platform(platform)
            .build()
    }

    /// Check that every URL parses and the scheme is usable
    ///
    /// # Errors
    ///
    /// Returns `PairingError::InvalidConfig` naming the offending field.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("backend_url", &self.backend_url),
            ("consent_url", &self.consent_url),
            ("callback_url", &self.callback_url),
        ] {
            url::Url::parse(value).map_err(|e| {
                PairingError::invalid_config(format!("{name} '{value}' is not a valid URL: {e}"))
            })?;
        }

        let scheme = self.deep_link_scheme.trim();
        if scheme.is_empty()
            || !scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        {
            return Err(PairingError::invalid_config(format!(
                "deep_link_scheme '{}' is not a valid URL scheme",
                self.deep_link_scheme
            )));
        }

        Ok(())
    }

    /// Endpoint URL under `backend_url`
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.backend_url.trim_end_matches('/'))
    }
}
