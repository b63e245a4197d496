//! HTTP transport seam.
//!
//! Authenticators and facades describe requests with [`ApiRequest`] and hand
//! them to an [`ApiClient`]. Implementations surface every non-2xx answer as
//! an error built with [`BdkError::from_status`], so the status code survives
//! into the retry engine's classification.

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::BdkError;

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// A request relative to the client's base URL.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: HttpMethod,
    /// Path appended to the base URL, starting with `/`.
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: Vec::new(),
            query: Vec::new(),
            body: None,
        }
    }

    /// Add a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Add a query parameter.
    #[must_use]
    pub fn query(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((name.into(), value.to_string()));
        self
    }

    /// Set a JSON body.
    ///
    /// # Errors
    /// Returns error if `body` cannot be serialized.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, BdkError> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    /// Look up a header value by name (case-insensitive).
    #[must_use]
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A successful (2xx) response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    /// Decode the body as JSON.
    ///
    /// # Errors
    /// Returns error if the body does not match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, BdkError> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Trait for HTTP transports.
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// Send a request.
    ///
    /// # Errors
    /// Returns `Unauthorized` on 401, `Api` on any other non-2xx status,
    /// `Transport`/`Timeout` on connection-level failures.
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, BdkError>;
}

/// Send a request and decode its JSON answer.
///
/// # Errors
/// Propagates transport failures and decoding failures.
pub async fn invoke<T: DeserializeOwned>(
    client: &dyn ApiClient,
    request: ApiRequest,
) -> Result<T, BdkError> {
    client.send(request).await?.json()
}
