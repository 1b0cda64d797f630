//! # Fitlink Pairing SDK for Rust
//!
//! Links a user's account to an external fitness-data provider through the
//! three-step OAuth 1.0a handshake brokered by the Fitlink backend.
//! Async/await, strong typing, tokio-based.
//!
//! ## Quick Start
//!
//! ```no_run
//! use fitlink_pairing_sdk::{
//!     FileCredentialStore, LauncherSelector, PairingComponents, PairingCoordinator,
//!     PairingOptions, Platform, StaticProbe, SystemBrowserLauncher,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let selector = LauncherSelector::new(Platform::Desktop, Arc::new(StaticProbe(false)))
//!         .with_system_browser(Arc::new(SystemBrowserLauncher::new()));
//!
//!     let components = PairingComponents::builder()
//!         .store(Arc::new(FileCredentialStore::new()))
//!         .selector(selector)
//!         .build();
//!
//!     let coordinator = PairingCoordinator::new(PairingOptions::from_env(), components)?;
//!     coordinator.pair().await?;
//!     println!("paired: {}", coordinator.is_paired().await?);
//!     Ok(())
//! }
//! ```
//!
//! ## Core Features
//!
//! ### 1. Two completion paths, one exchange
//!
//! The consent page reports back either through the launcher's result
//! object or through a deep link on the app's custom scheme. Both feed one
//! queue; the first signal engages the [`ProcessingGuard`] and every later
//! one is ignored, so the verifier is exchanged exactly once.
//!
//! ### 2. Survives process death
//!
//! The temporary credential is checkpointed in the [`CredentialStore`]
//! before the surface opens. A deep link delivered to a fresh process is
//! completed against the persisted session.
//!
//! ### 3. Launcher strategies
//!
//! [`LauncherSelector`] picks the trusted overlay when the host build has
//! it, the embedded web surface on Android otherwise, and the system
//! browser on desktop.
//!
//! ### 4. Layered verifier extraction
//!
//! [`callback::extract`] reads `oauth_verifier` from the query, then the
//! fragment, then falls back to pattern matching on the raw string.
//!
//! ## Observing outcomes
//!
//! ```no_run
//! use fitlink_pairing_sdk::callbacks::{FnPairingObserver, PairingEvent};
//! use std::sync::Arc;
//!
//! let observer = Arc::new(FnPairingObserver::new(|event| {
//!     Box::pin(async move {
//!         if let PairingEvent::Failed { message, .. } = event {
//!             eprintln!("{message}");
//!         }
//!     })
//! }));
//! # let _ = observer;
//! ```
//!
//! ## Version History
//!
//! - **0.1.0** - Initial release
//!   - `PairingCoordinator` with launcher and deep-link completion
//!   - Overlay, embedded surface and system browser launchers
//!   - File and in-memory credential stores
//!   - Connection validation

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod callback;
pub mod callbacks;
pub mod coordinator;
pub mod deep_link;
pub mod error;
pub mod launcher;
pub mod storage;
pub mod transport;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use backend::{AccessTokenExchanger, ConnectionValidator, RequestToken, RequestTokenClient};
pub use callbacks::{
    FnPairingObserver, PairingEvent, PairingObserver, SharedObserver, TracingObserver,
};
pub use coordinator::{
    CompletionSignal, PairingComponents, PairingCoordinator, ProcessingGuard, SignalSender,
};
pub use deep_link::{CallbackFilter, ChannelDeepLinkSource, DeepLinkListener, DeepLinkSource};
pub use error::{PairingError, Result};
pub use launcher::{
    AuthOverlay, AuthSessionResult, AuthSessionResultType, AuthorizationLauncher,
    CapabilityProbe, EmbeddedSurfaceLauncher, LauncherKind, LauncherSelector, SharedLauncher,
    StaticProbe, SystemBrowserLauncher, TrustedOverlayLauncher, WebSurface,
};
pub use storage::{
    CredentialStore, FileCredentialStore, MemoryCredentialStore, SessionVault, StoreError,
};
pub use transport::{HttpFetch, HttpResponse, ReqwestFetch};
pub use types::{
    ApiKey, CallbackEvent, CallbackSource, FailureKind, PairingOptions, PairingOptionsBuilder,
    PairingSession, PairingState, Platform, Verifier,
};

/// Version of the SDK
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
