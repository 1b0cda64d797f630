//! Type definitions for the pairing SDK
//!
//! Identifiers for credentials, the pairing session and callback events,
//! the coordinator state machine, and configuration options.

// Module declarations
pub mod identifiers;
pub mod options;
pub mod session;

pub use identifiers::{ApiKey, Verifier};
pub use options::{PairingOptions, PairingOptionsBuilder, Platform};
pub use session::{CallbackEvent, CallbackSource, FailureKind, PairingSession, PairingState};
