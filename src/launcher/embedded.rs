//! Embedded web surface strategy
//!
//! Used where the trusted overlay capability is missing from the build. The
//! consent page is rendered in-process; every navigation is checked against
//! the callback pattern. The provider's page sometimes finishes with a
//! script-driven redirect instead of a navigation, so a watcher script is
//! injected that posts the redirect target back over the message channel.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use super::{AuthSessionResult, AuthorizationLauncher, LauncherKind};
use crate::callback;
use crate::error::Result;
use crate::utils::redact_url;

/// Script injected into the consent page
///
/// Posts `{"type":"oauth_redirect","url":...}` whenever the page tries to
/// leave for a URL carrying `oauth_verifier`.
pub const REDIRECT_WATCH_SCRIPT: &str = r#"(function () {
  var post = function (url) {
    var msg = JSON.stringify({ type: 'oauth_redirect', url: String(url) });
    if (window.ReactNativeWebView) { window.ReactNativeWebView.postMessage(msg); }
    else if (window.webkit && window.webkit.messageHandlers && window.webkit.messageHandlers.fitlink) {
      window.webkit.messageHandlers.fitlink.postMessage(msg);
    }
  };
  var watch = function (url) {
    if (url && String(url).indexOf('oauth_verifier') !== -1) { post(url); return true; }
    return false;
  };
  var assign = window.location.assign.bind(window.location);
  window.location.assign = function (url) { if (!watch(url)) { assign(url); } };
  var replace = window.location.replace.bind(window.location);
  window.location.replace = function (url) { if (!watch(url)) { replace(url); } };
  document.addEventListener('click', function (e) {
    var a = e.target && e.target.closest ? e.target.closest('a') : null;
    if (a && watch(a.href)) { e.preventDefault(); }
  }, true);
  setInterval(function () { watch(window.location.href); }, 500);
  true;
})();"#;

/// Event emitted by the host's web surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceEvent {
    /// The surface is about to load `url`
    Navigation(String),
    /// The injected script posted a message
    Message(String),
    /// The user closed the surface
    Closed,
}

/// Host binding to an in-process web view
#[async_trait]
pub trait WebSurface: Send + Sync {
    /// Load `url`, inject `script`, and stream events until closed
    ///
    /// # Errors
    /// Returns error if the surface cannot be shown
    async fn open(&self, url: &str, script: &str)
    -> Result<mpsc::UnboundedReceiver<SurfaceEvent>>;

    /// Tear the surface down
    async fn close(&self);
}

#[derive(Debug, Deserialize)]
struct RedirectMessage {
    #[serde(rename = "type")]
    message_type: String,
    url: String,
}

/// Renders the consent page in an embedded web surface
pub struct EmbeddedSurfaceLauncher {
    surface: Arc<dyn WebSurface>,
    deep_link_scheme: String,
    timeout: Duration,
}

impl EmbeddedSurfaceLauncher {
    /// Create a launcher over a host surface
    pub fn new(
        surface: Arc<dyn WebSurface>,
        deep_link_scheme: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            surface,
            deep_link_scheme: deep_link_scheme.into(),
            timeout,
        }
    }

    fn is_callback(&self, url: &str, callback_url: &str) -> bool {
        callback::matches_callback(url, callback_url, &self.deep_link_scheme)
            || url.contains(callback::VERIFIER_PARAM)
    }

    fn redirect_from_message(payload: &str) -> Option<String> {
        match serde_json::from_str::<RedirectMessage>(payload) {
            Ok(msg) if msg.message_type == "oauth_redirect" => Some(msg.url),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!("Ignoring surface message: {e}");
                None
            }
        }
    }

    async fn watch(
        &self,
        events: &mut mpsc::UnboundedReceiver<SurfaceEvent>,
        callback_url: &str,
    ) -> AuthSessionResult {
        while let Some(event) = events.recv().await {
            match event {
                SurfaceEvent::Navigation(url) => {
                    if self.is_callback(&url, callback_url) {
                        return AuthSessionResult::success(url);
                    }
                    tracing::trace!(url = %redact_url(&url), "Surface navigation");
                }
                SurfaceEvent::Message(payload) => {
                    if let Some(url) = Self::redirect_from_message(&payload) {
                        if self.is_callback(&url, callback_url) {
                            tracing::debug!("Callback delivered by injected script");
                            return AuthSessionResult::success(url);
                        }
                    }
                }
                SurfaceEvent::Closed => return AuthSessionResult::cancel(),
            }
        }
        AuthSessionResult::dismiss()
    }
}

#[async_trait]
impl AuthorizationLauncher for EmbeddedSurfaceLauncher {
    fn kind(&self) -> LauncherKind {
        LauncherKind::EmbeddedSurface
    }

    fn delivers_result(&self) -> bool {
        true
    }

    async fn launch(&self, consent_url: &str, callback_url: &str) -> Result<AuthSessionResult> {
        let mut events = self.surface.open(consent_url, REDIRECT_WATCH_SCRIPT).await?;

        let result = tokio::time::timeout(self.timeout, self.watch(&mut events, callback_url))
            .await
            .unwrap_or_else(|_| {
                tracing::warn!(timeout = ?self.timeout, "Embedded surface timed out");
                AuthSessionResult::dismiss()
            });

        self.surface.close().await;
        Ok(result)
    }
}
