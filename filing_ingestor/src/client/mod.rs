//! Rate-limited, retrying HTTP request execution.
//!
//! Every external call in this crate goes through [`RateLimitedClient`], which
//! enforces a minimum interval between requests (one shared limiter per
//! external API) and retries throttled or transient failures with bounded
//! backoff. The [`Transport`] trait is the seam between the retry logic and
//! the actual socket work, so the whole stack is testable against a scripted
//! transport without a network.
//!
//! The client has no knowledge of payload semantics: a 404 is returned to the
//! caller as a normal response because absence is domain-meaningful, not
//! exceptional.

mod http;
mod rate_limit;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use thiserror::Error;

pub use http::HttpTransport;
pub use rate_limit::{RateLimitedClient, RetryPolicy};

/// An error raised below the retry layer, while performing one HTTP exchange.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The underlying HTTP request failed (connect, timeout, body read).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// A default header value could not be constructed at client build time.
    #[error("invalid header value: {0}")]
    Header(#[from] reqwest::header::InvalidHeaderValue),
}

/// An error surfaced to callers after the retry budget is spent.
#[derive(Debug, Error)]
pub enum ClientError {
    /// All retries were exhausted; carries the last HTTP status seen.
    #[error("request failed with status {status} after {attempts} attempts")]
    RequestFailed {
        /// Last HTTP status code observed before giving up.
        status: u16,
        /// Total number of attempts made, including the first.
        attempts: u32,
    },

    /// All retries were exhausted without ever seeing an HTTP status.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The response body could not be decoded into the expected shape.
    #[error("failed to decode response body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// HTTP method of a [`Request`]. Only the verbs this pipeline uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// HTTP GET.
    Get,
    /// HTTP POST with an optional JSON body.
    Post,
}

/// A vendor-agnostic HTTP request.
#[derive(Debug, Clone)]
pub struct Request {
    /// HTTP method.
    pub method: Method,
    /// Absolute URL without query parameters.
    pub url: String,
    /// Query parameters, appended in order.
    pub query: Vec<(String, String)>,
    /// Optional JSON body (POST only).
    pub body: Option<serde_json::Value>,
}

impl Request {
    /// Builds a GET request for `url`.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            query: Vec::new(),
            body: None,
        }
    }

    /// Builds a POST request for `url` carrying a JSON body.
    pub fn post_json(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            query: Vec::new(),
            body: Some(body),
        }
    }

    /// Appends one query parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }
}

/// A raw HTTP response: status plus the full body as text.
#[derive(Debug, Clone)]
pub struct Response {
    /// HTTP status code.
    pub status: u16,
    /// Response body decoded as UTF-8 text.
    pub body: String,
}

impl Response {
    /// True for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// True for 404. Returned to callers as a normal result, never retried.
    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    /// Deserializes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

/// One HTTP exchange, without rate limiting or retries.
///
/// Production code uses [`HttpTransport`]; tests substitute a scripted
/// implementation to exercise the retry and pagination logic offline.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Performs the exchange, returning whatever the server said.
    ///
    /// Implementations must not interpret the status code; classification
    /// (throttle vs. transient vs. success) belongs to [`RateLimitedClient`].
    async fn execute(&self, request: &Request) -> Result<Response, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    async fn execute(&self, request: &Request) -> Result<Response, TransportError> {
        (**self).execute(request).await
    }
}
