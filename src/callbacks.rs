//! Trait-based observer for pairing outcomes.
//!
//! The host implements [`PairingObserver`] to react to terminal transitions:
//! navigate to the device screen on success, alert the user on failure, and
//! reset its controls after a cancel. Closures work too through
//! [`FnPairingObserver`].
//!
//! # Example: Implementing `PairingObserver`
//!
//! ```no_run
//! use fitlink_pairing_sdk::callbacks::{PairingEvent, PairingObserver};
//! use async_trait::async_trait;
//!
//! struct Navigator;
//!
//! #[async_trait]
//! impl PairingObserver for Navigator {
//!     async fn notify(&self, event: PairingEvent) {
//!         match event {
//!             PairingEvent::Connected => println!("Go to devices screen"),
//!             PairingEvent::Failed { message, .. } => eprintln!("Alert: {message}"),
//!             PairingEvent::Reset => {}
//!         }
//!     }
//! }
//! ```

use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::types::FailureKind;

// ============================================================================
// Events
// ============================================================================

/// Terminal notification delivered to the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingEvent {
    /// The account is linked; the host should navigate to its device screen
    Connected,
    /// The flow failed; `message` is meant for the user as-is
    Failed {
        /// Human-readable message
        message: String,
        /// Failure category
        kind: FailureKind,
    },
    /// The flow was abandoned silently (user cancel); re-enable the controls
    Reset,
}

// ============================================================================
// Observer Trait
// ============================================================================

/// Receives exactly one event per finished pairing flow
#[async_trait]
pub trait PairingObserver: Send + Sync {
    /// Called after the coordinator has settled its state and storage
    async fn notify(&self, event: PairingEvent);
}

// Blanket implementation for boxed trait objects
#[async_trait]
impl PairingObserver for Box<dyn PairingObserver> {
    async fn notify(&self, event: PairingEvent) {
        (**self).notify(event).await;
    }
}

#[async_trait]
impl<T: PairingObserver + ?Sized> PairingObserver for Arc<T> {
    async fn notify(&self, event: PairingEvent) {
        (**self).notify(event).await;
    }
}

/// Type alias for a shared observer.
pub type SharedObserver = Arc<dyn PairingObserver>;

// ============================================================================
// Built-in observers
// ============================================================================

/// Observer that only logs; used when the host registers none
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

#[async_trait]
impl PairingObserver for TracingObserver {
    async fn notify(&self, event: PairingEvent) {
        match event {
            PairingEvent::Connected => tracing::info!("Pairing completed"),
            PairingEvent::Failed { message, kind } => {
                tracing::warn!(?kind, "Pairing failed: {message}");
            }
            PairingEvent::Reset => tracing::debug!("Pairing reset"),
        }
    }
}

/// Boxed future returned by closure observers
pub type ObserverFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Wrapper to convert a closure into a `PairingObserver`.
///
/// # Example
///
/// ```no_run
/// use fitlink_pairing_sdk::callbacks::{FnPairingObserver, PairingObserver};
/// use std::sync::Arc;
///
/// let observer = FnPairingObserver::new(|event| {
///     Box::pin(async move {
///         println!("Pairing event: {event:?}");
///     })
/// });
///
/// let shared: Arc<dyn PairingObserver> = Arc::new(observer);
/// ```
pub struct FnPairingObserver<F>
where
    F: Fn(PairingEvent) -> ObserverFuture + Send + Sync,
{
    func: F,
}

impl<F> FnPairingObserver<F>
where
    F: Fn(PairingEvent) -> ObserverFuture + Send + Sync,
{
    /// Create a new function-based observer.
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

#[async_trait]
impl<F> PairingObserver for FnPairingObserver<F>
where
    F: Fn(PairingEvent) -> ObserverFuture + Send + Sync,
{
    async fn notify(&self, event: PairingEvent) {
        (self.func)(event).await;
    }
}
