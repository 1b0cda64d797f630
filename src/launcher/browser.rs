//! Default system browser strategy (desktop)

use async_trait::async_trait;
use std::process::Command;
use std::sync::Arc;

use super::{AuthSessionResult, AuthorizationLauncher, LauncherKind};
use crate::error::{PairingError, Result};

/// Callback receiving the consent URL, e.g. to print it for the user
pub type UrlCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Opens the consent page in the default browser
///
/// The browser cannot report back, so `launch` returns `dismiss` as soon as
/// the page is handed off and the verifier arrives via the deep link.
#[derive(Clone)]
pub struct SystemBrowserLauncher {
    auto_open_browser: bool,
    on_url: Option<UrlCallback>,
}

impl Default for SystemBrowserLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemBrowserLauncher {
    /// Create a launcher that opens the browser automatically
    #[must_use]
    pub fn new() -> Self {
        Self {
            auto_open_browser: true,
            on_url: None,
        }
    }

    /// Set whether to automatically open browser (default: true)
    #[must_use]
    pub fn auto_open_browser(mut self, auto_open: bool) -> Self {
        self.auto_open_browser = auto_open;
        self
    }

    /// Receive the consent URL before the browser is opened
    #[must_use]
    pub fn on_url(mut self, callback: UrlCallback) -> Self {
        self.on_url = Some(callback);
        self
    }

    /// Open URL in default browser
    fn open_browser(url: &str) -> Result<()> {
        Self::opener(url)?.spawn().map_err(|e| {
            PairingError::launcher_unavailable(format!("could not open browser: {e}"))
        })?;
        Ok(())
    }

    #[cfg(target_os = "macos")]
    fn opener(url: &str) -> Result<Command> {
        let mut command = Command::new("open");
        command.arg(url);
        Ok(command)
    }

    #[cfg(target_os = "linux")]
    fn opener(url: &str) -> Result<Command> {
        let mut command = Command::new("xdg-open");
        command.arg(url);
        Ok(command)
    }

    #[cfg(target_os = "windows")]
    fn opener(url: &str) -> Result<Command> {
        let mut command = Command::new("cmd");
        command.args(["/C", "start", "", url]);
        Ok(command)
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    fn opener(_url: &str) -> Result<Command> {
        Err(PairingError::launcher_unavailable(
            "no system browser opener on this target",
        ))
    }
}

#[async_trait]
impl AuthorizationLauncher for SystemBrowserLauncher {
    fn kind(&self) -> LauncherKind {
        LauncherKind::SystemBrowser
    }

    fn delivers_result(&self) -> bool {
        false
    }

    async fn launch(&self, consent_url: &str, _callback_url: &str) -> Result<AuthSessionResult> {
        if let Some(callback) = &self.on_url {
            callback(consent_url.to_string());
        }

        if self.auto_open_browser {
            Self::open_browser(consent_url)?;
            tracing::debug!("Opened consent page in system browser");
        }

        Ok(AuthSessionResult::dismiss())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[tokio::test]
    async fn test_manual_mode_reports_url_and_dismiss() {
        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();
        let launcher = SystemBrowserLauncher::new()
            .auto_open_browser(false)
            .on_url(Arc::new(move |url| *sink.lock().unwrap() = Some(url)));

        let result = launcher
            .launch("https://consent?oauth_token=T1", "fitlink://oauth")
            .await
            .unwrap();

        assert_eq!(result, AuthSessionResult::dismiss());
        assert_eq!(
            seen.lock().unwrap().as_deref(),
            Some("https://consent?oauth_token=T1")
        );
        assert!(!launcher.delivers_result());
    }
}
