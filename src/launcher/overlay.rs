//! Trusted overlay strategy

use async_trait::async_trait;
use std::sync::Arc;

use super::{AuthSessionResult, AuthorizationLauncher, LauncherKind};
use crate::error::Result;
use crate::types::Platform;

/// Host binding to the system authorization overlay
#[async_trait]
pub trait AuthOverlay: Send + Sync {
    /// Open `url` and resolve once the overlay closes or reaches `redirect_url`
    ///
    /// # Errors
    /// Returns error if the overlay cannot be presented
    async fn open_auth_session(&self, url: &str, redirect_url: &str) -> Result<AuthSessionResult>;

    /// Close the overlay if it is still on screen
    async fn close(&self);
}

/// Opens the consent page in the system overlay and awaits its result object
pub struct TrustedOverlayLauncher {
    overlay: Arc<dyn AuthOverlay>,
    reliable: bool,
}

impl TrustedOverlayLauncher {
    /// Wrap an overlay; reliability of its result follows the platform
    pub fn new(overlay: Arc<dyn AuthOverlay>, platform: Platform) -> Self {
        Self {
            overlay,
            reliable: platform.overlay_result_is_reliable(),
        }
    }
}

#[async_trait]
impl AuthorizationLauncher for TrustedOverlayLauncher {
    fn kind(&self) -> LauncherKind {
        LauncherKind::TrustedOverlay
    }

    fn delivers_result(&self) -> bool {
        self.reliable
    }

    async fn launch(&self, consent_url: &str, callback_url: &str) -> Result<AuthSessionResult> {
        let result = self
            .overlay
            .open_auth_session(consent_url, callback_url)
            .await?;
        tracing::debug!(result = ?result.result_type, "Overlay returned");

        // The exchange must not run while the overlay is still visible
        if result.usable_url().is_some() {
            self.overlay.close().await;
        }
        Ok(result)
    }
}
