//! Newtype wrappers for credentials passed through the flow

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;

use crate::utils::redact;

// ============================================================================
// Newtype Wrappers for Type Safety
// ============================================================================

/// Account session credential issued by the backend at sign-in
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
    /// Create a new api key
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Get the api key as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// An empty key is treated as "not signed in"
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ApiKey").field(&redact(&self.0)).finish()
    }
}

impl From<String> for ApiKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ApiKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for ApiKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// One-time verifier returned by the provider after the user approves access
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Verifier(String);

impl Verifier {
    /// Create a new verifier
    pub fn new(verifier: impl Into<String>) -> Self {
        Self(verifier.into())
    }

    /// Get the verifier as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Verifier {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Verifier {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for Verifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::ops::Deref for Verifier {
    type Target = str;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Borrow<str> for Verifier {
    fn borrow(&self) -> &str {
        &self.0
    }
}
