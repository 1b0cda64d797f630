//! Completion signals feeding the coordinator's queue

use std::time::Duration;
use tokio::sync::mpsc;

use crate::launcher::AuthSessionResult;
use crate::types::CallbackEvent;

/// Message drained by the coordinator's single consumer task
///
/// Launcher-side signals carry the attempt number they belong to, so a
/// signal queued by an earlier attempt is dropped instead of completing the
/// current one.
#[derive(Debug, Clone)]
pub enum CompletionSignal {
    /// The authorization surface closed
    Launcher {
        /// Attempt that launched the surface
        attempt: u64,
        /// Result object reported by the launcher
        result: AuthSessionResult,
        /// How long to wait for a deep link after a URL-less dismiss;
        /// `None` when deep links are not active for this attempt
        grace: Option<Duration>,
    },
    /// A callback URL arrived through the custom scheme
    DeepLink(CallbackEvent),
    /// The deep-link grace period of `attempt` ran out
    GraceExpired {
        /// Attempt whose grace period ended
        attempt: u64,
    },
    /// The host abandoned `attempt`
    Cancel {
        /// Attempt to abandon
        attempt: u64,
    },
}

/// Producer handle on the coordinator's queue
#[derive(Debug, Clone)]
pub struct SignalSender {
    tx: mpsc::UnboundedSender<CompletionSignal>,
}

impl SignalSender {
    pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<CompletionSignal>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Enqueue a signal; `false` once the coordinator has shut down
    pub fn send(&self, signal: CompletionSignal) -> bool {
        self.tx.send(signal).is_ok()
    }

    /// Enqueue a deep-link callback
    pub fn deep_link(&self, event: CallbackEvent) -> bool {
        self.send(CompletionSignal::DeepLink(event))
    }

    /// Whether the consumer side is gone
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
