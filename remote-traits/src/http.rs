//! HTTP Client Abstraction
//!
//! Provides async HTTP operations with bearer auth, retry policy, and
//! streaming downloads. The sync engine never talks to a socket directly;
//! it goes through [`HttpClient`] so tests can substitute scripted responses.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::error::{RemoteError, Result};

/// HTTP method types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// HTTP request builder
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<Bytes>,
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HashMap::new(),
            body: None,
            timeout: None,
        }
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn bearer_token(self, token: impl Into<String>) -> Self {
        self.header("Authorization", format!("Bearer {}", token.into()))
    }

    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self> {
        let json = serde_json::to_vec(body)
            .map_err(|e| RemoteError::Transient(format!("JSON serialization failed: {}", e)))?;
        self.body = Some(Bytes::from(json));
        self.headers
            .insert("Content-Type".to_string(), "application/json".to_string());
        Ok(self)
    }

    pub fn body(mut self, body: Bytes) -> Self {
        self.body = Some(body);
        self
    }

    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }
}

/// HTTP response
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl HttpResponse {
    /// Parse response body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| RemoteError::Api {
            status: self.status,
            message: format!("JSON deserialization failed: {}", e),
        })
    }

    /// Get response body as UTF-8 string, lossily
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Check if response status is successful (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Check if response status indicates a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }
}

/// Retry policy configuration
///
/// Delays grow exponentially from `base_delay` up to `max_delay`, with a
/// bounded random jitter applied on top so concurrent workers do not retry
/// in lockstep against the same throttled endpoint.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Base delay between retries
    pub base_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Jitter fraction in `[0.0, 1.0]`; 0.25 means up to +25% of the delay
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            jitter: 0.25,
        }
    }
}

impl RetryPolicy {
    /// Deterministic backoff for the given zero-based attempt number,
    /// before jitter. Exposed separately so it can be asserted in tests.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.min(16);
        let raw = self.base_delay.saturating_mul(2u32.saturating_pow(exp));
        raw.min(self.max_delay)
    }

    /// Backoff with jitter applied, used for actual sleeps.
    pub fn jittered_delay(&self, attempt: u32) -> Duration {
        let base = self.delay_for(attempt);
        if self.jitter <= 0.0 {
            return base;
        }
        let spread = self.jitter.min(1.0) * rand::random::<f64>();
        base.mul_f64(1.0 + spread)
    }
}

/// Async HTTP client trait
///
/// Implementations perform a single network exchange per call; retry loops
/// belong to the callers, which own the [`RetryPolicy`] for their endpoint.
///
/// # Errors
///
/// Transport-level failures (connect errors, timeouts, broken streams) map
/// to [`RemoteError::Transient`]. Status-code interpretation is left to the
/// provider connector, which knows the API's conventions.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Execute an HTTP request, buffering the full response body.
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;

    /// Execute a request whose response body is streamed instead of
    /// buffered. Non-2xx statuses are returned as errors since the body is
    /// not available for inspection.
    async fn download_stream(
        &self,
        request: HttpRequest,
    ) -> Result<Box<dyn tokio::io::AsyncRead + Send + Unpin>>;
}
