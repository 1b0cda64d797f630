//! Clients for the backend pairing endpoints
//!
//! The backend holds the provider's consumer secret and performs the OAuth 1.0a
//! signing itself. The device only ever sees the temporary credential pair
//! and the verifier:
//!
//! 1. [`RequestTokenClient`] - `GET request-token` issues a temporary credential
//! 2. the user approves access on the provider's consent page
//! 3. [`AccessTokenExchanger`] - `GET access-token` trades the verifier for a
//!    permanent credential stored server-side
//!
//! [`ConnectionValidator`] asks the backend whether the account is currently
//! linked, so the local `paired` flag can be corrected when it drifts.

mod connection;
mod exchange;
mod request_token;

pub use connection::ConnectionValidator;
pub use exchange::AccessTokenExchanger;
pub use request_token::{RequestToken, RequestTokenClient};

/// Path of the temporary-credential endpoint
pub const REQUEST_TOKEN_PATH: &str = "request-token";
/// Path of the permanent-credential endpoint
pub const ACCESS_TOKEN_PATH: &str = "access-token";
/// Path of the connection status endpoint
pub const VALIDATE_CONNECTION_PATH: &str = "validate-connection";
