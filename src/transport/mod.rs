//! HTTP layer for talking to the pairing backend
//!
//! The flow only needs a fetch-like call that returns a status code and a
//! body. [`HttpFetch`] is that seam; [`ReqwestFetch`] is the production
//! implementation and tests substitute their own.

pub mod http;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::error::{PairingError, Result};
use crate::utils::{MAX_BODY_BYTES, truncate_for_display};

/// Status code and body of a backend response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Raw response body
    pub body: String,
}

impl HttpResponse {
    /// Create a response
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// The backend signals success with exactly 200
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    /// Decode the body as JSON
    ///
    /// # Errors
    /// Returns `PairingError::InvalidResponse` if the body does not match `T`
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.body).map_err(|e| {
            PairingError::invalid_response(format!(
                "{e} - Response: {}",
                truncate_for_display(&self.body, MAX_BODY_BYTES)
            ))
        })
    }

    /// Body shortened for error values and logs
    #[must_use]
    pub fn body_excerpt(&self) -> String {
        truncate_for_display(&self.body, MAX_BODY_BYTES)
    }
}

/// Fetch-like transport to the backend
#[async_trait]
pub trait HttpFetch: Send + Sync {
    /// Issue a GET request with the given query parameters
    ///
    /// Non-2xx statuses are returned as responses, not errors.
    ///
    /// # Errors
    /// Returns `PairingError::Network` if no response was received
    async fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<HttpResponse>;
}

#[async_trait]
impl<T: HttpFetch + ?Sized> HttpFetch for std::sync::Arc<T> {
    async fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<HttpResponse> {
        (**self).get(url, query).await
    }
}

pub use http::ReqwestFetch;
