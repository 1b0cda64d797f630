//! Processing guard

use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;

/// At-most-one flag for the verifier exchange
///
/// The atomic is the source of truth and is checked synchronously when a
/// completion signal arrives. The watch channel mirrors it for UI observers
/// and settles asynchronously.
#[derive(Debug)]
pub struct ProcessingGuard {
    engaged: AtomicBool,
    mirror: watch::Sender<bool>,
}

impl Default for ProcessingGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessingGuard {
    /// Create a released guard
    #[must_use]
    pub fn new() -> Self {
        let (mirror, _) = watch::channel(false);
        Self {
            engaged: AtomicBool::new(false),
            mirror,
        }
    }

    /// Engage the guard; `false` means somebody else already holds it
    pub fn try_engage(&self) -> bool {
        let won = self
            .engaged
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if won {
            self.mirror.send_replace(true);
        }
        won
    }

    /// Release the guard
    pub fn release(&self) {
        self.engaged.store(false, Ordering::Release);
        self.mirror.send_replace(false);
    }

    /// Current value of the atomic flag
    #[must_use]
    pub fn is_engaged(&self) -> bool {
        self.engaged.load(Ordering::Acquire)
    }

    /// Observe the mirrored flag
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.mirror.subscribe()
    }
}
