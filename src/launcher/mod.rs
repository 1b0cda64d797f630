//! Authorization launchers
//!
//! A launcher presents the provider's consent page on a surface the provider
//! will not block and reports how the flow ended. Three strategies exist:
//!
//! - [`TrustedOverlayLauncher`]: system authorization overlay (mobile)
//! - [`EmbeddedSurfaceLauncher`]: in-process web surface, the Android fallback
//!   when the overlay capability is missing from the build
//! - [`SystemBrowserLauncher`]: default browser (desktop), result arrives only
//!   through the deep link
//!
//! [`LauncherSelector`] picks one at call time using a [`CapabilityProbe`].

pub mod browser;
pub mod embedded;
pub mod overlay;

pub use browser::SystemBrowserLauncher;
pub use embedded::{EmbeddedSurfaceLauncher, REDIRECT_WATCH_SCRIPT, SurfaceEvent, WebSurface};
pub use overlay::{AuthOverlay, TrustedOverlayLauncher};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{PairingError, Result};
use crate::types::Platform;

// ============================================================================
// Launch Results
// ============================================================================

/// How an authorization surface was closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthSessionResultType {
    /// The surface reached the callback URL
    Success,
    /// The user cancelled
    Cancel,
    /// The surface went away without a definite answer
    Dismiss,
}

/// Result object reported by a launcher, `{ type, url? }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSessionResult {
    /// How the surface closed
    #[serde(rename = "type")]
    pub result_type: AuthSessionResultType,
    /// Callback URL, when the surface saw one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl AuthSessionResult {
    /// Surface reached `url`
    pub fn success(url: impl Into<String>) -> Self {
        Self {
            result_type: AuthSessionResultType::Success,
            url: Some(url.into()),
        }
    }

    /// User cancelled
    #[must_use]
    pub fn cancel() -> Self {
        Self {
            result_type: AuthSessionResultType::Cancel,
            url: None,
        }
    }

    /// Surface dismissed without a URL
    #[must_use]
    pub fn dismiss() -> Self {
        Self {
            result_type: AuthSessionResultType::Dismiss,
            url: None,
        }
    }

    /// URL worth handing to the extractor
    ///
    /// Some overlays report `dismiss` even though they carry the callback URL,
    /// so only `cancel` discards it.
    #[must_use]
    pub fn usable_url(&self) -> Option<&str> {
        match self.result_type {
            AuthSessionResultType::Cancel => None,
            _ => self.url.as_deref().filter(|u| !u.trim().is_empty()),
        }
    }
}

// ============================================================================
// Launcher Trait
// ============================================================================

/// Strategy identifier, mostly for logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LauncherKind {
    /// System authorization overlay
    TrustedOverlay,
    /// In-process web surface
    EmbeddedSurface,
    /// Default system browser
    SystemBrowser,
}

/// Presents the consent page and reports the outcome
#[async_trait]
pub trait AuthorizationLauncher: Send + Sync {
    /// Which strategy this is
    fn kind(&self) -> LauncherKind;

    /// Whether `launch` reliably returns the callback URL on success
    ///
    /// When false the coordinator also listens for the deep link.
    fn delivers_result(&self) -> bool;

    /// Show `consent_url` and wait until the surface closes
    ///
    /// # Errors
    /// Returns `PairingError::LauncherUnavailable` if the surface cannot be shown
    async fn launch(&self, consent_url: &str, callback_url: &str) -> Result<AuthSessionResult>;
}

/// Shared launcher handle
pub type SharedLauncher = Arc<dyn AuthorizationLauncher>;

// ============================================================================
// Capability Probe
// ============================================================================

/// Reports whether the trusted overlay capability is compiled into the host
pub trait CapabilityProbe: Send + Sync {
    /// `Ok(true)` if the overlay can be shown
    ///
    /// # Errors
    /// Returns error when the probe itself is missing; callers treat that as "no"
    fn trusted_overlay_available(&self) -> Result<bool>;
}

impl<F> CapabilityProbe for F
where
    F: Fn() -> Result<bool> + Send + Sync,
{
    fn trusted_overlay_available(&self) -> Result<bool> {
        self()
    }
}

/// Probe with a fixed answer
#[derive(Debug, Clone, Copy)]
pub struct StaticProbe(pub bool);

impl CapabilityProbe for StaticProbe {
    fn trusted_overlay_available(&self) -> Result<bool> {
        Ok(self.0)
    }
}

// ============================================================================
// Selection
// ============================================================================

/// Chooses a launcher at call time
#[derive(Clone)]
pub struct LauncherSelector {
    platform: Platform,
    probe: Arc<dyn CapabilityProbe>,
    overlay: Option<SharedLauncher>,
    embedded: Option<SharedLauncher>,
    browser: Option<SharedLauncher>,
}

impl LauncherSelector {
    /// Create a selector with no strategies registered
    pub fn new(platform: Platform, probe: Arc<dyn CapabilityProbe>) -> Self {
        Self {
            platform,
            probe,
            overlay: None,
            embedded: None,
            browser: None,
        }
    }

    /// Register the trusted overlay strategy
    #[must_use]
    pub fn with_overlay(mut self, launcher: SharedLauncher) -> Self {
        self.overlay = Some(launcher);
        self
    }

    /// Register the embedded surface fallback
    #[must_use]
    pub fn with_embedded(mut self, launcher: SharedLauncher) -> Self {
        self.embedded = Some(launcher);
        self
    }

    /// Register the desktop browser strategy
    #[must_use]
    pub fn with_system_browser(mut self, launcher: SharedLauncher) -> Self {
        self.browser = Some(launcher);
        self
    }

    /// Host platform this selector decides for
    #[must_use]
    pub fn platform(&self) -> Platform {
        self.platform
    }

    fn overlay_available(&self) -> bool {
        match self.probe.trusted_overlay_available() {
            Ok(available) => available,
            Err(e) => {
                tracing::warn!("Capability probe unavailable, assuming no overlay: {e}");
                false
            }
        }
    }

    /// Pick the strategy for this attempt
    ///
    /// # Errors
    ///
    /// Returns `PairingError::LauncherUnavailable` when the overlay is missing
    /// and the platform has no usable fallback.
    pub fn select(&self) -> Result<SharedLauncher> {
        if self.platform == Platform::Desktop {
            if let Some(browser) = &self.browser {
                return Ok(browser.clone());
            }
        }

        if self.overlay_available() {
            if let Some(overlay) = &self.overlay {
                return Ok(overlay.clone());
            }
        }

        if self.platform.supports_embedded_surface() {
            if let Some(embedded) = &self.embedded {
                tracing::debug!("Falling back to embedded surface");
                return Ok(embedded.clone());
            }
        }

        Err(PairingError::launcher_unavailable(format!(
            "trusted overlay missing and no fallback on {:?}",
            self.platform
        )))
    }
}

/// Build the provider consent URL for a request token
///
/// # Errors
/// Returns `PairingError::Url` if `consent_url` does not parse
pub fn build_consent_url(consent_url: &str, token: &str, callback_url: &str) -> Result<String> {
    let mut url = url::Url::parse(consent_url)?;
    url.query_pairs_mut()
        .append_pair("oauth_token", token)
        .append_pair("oauth_callback", callback_url);
    Ok(url.to_string())
}
