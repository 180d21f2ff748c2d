//! Error types for the Dropbox Business provider

use remote_traits::RemoteError;
use std::time::Duration;
use thiserror::Error;

/// Dropbox provider errors
///
/// Internal taxonomy for the connector. Everything crossing the
/// `TeamProvider` boundary is folded into [`RemoteError`].
#[derive(Error, Debug)]
pub enum DropboxError {
    /// Team token rejected (HTTP 401) or lacks the team scope
    #[error("Dropbox authentication failed: {0}")]
    Auth(String),

    /// The server invalidated a list_folder cursor (`reset` conflict)
    #[error("Dropbox cursor reset: {0}")]
    CursorReset(String),

    /// HTTP 429; retry after the server-suggested delay if present
    #[error("Dropbox rate limit hit")]
    RateLimited { retry_after: Option<Duration> },

    /// The referenced path no longer exists (`path/not_found` conflict)
    #[error("Dropbox path not found: {0}")]
    PathNotFound(String),

    /// Any other API-level rejection
    #[error("Dropbox API error (status {status}): {summary}")]
    Api { status: u16, summary: String },

    /// Response body did not match the expected shape
    #[error("Failed to parse Dropbox response: {0}")]
    Parse(String),

    /// Server error (5xx) or connection-level failure
    #[error("Dropbox network error: {0}")]
    Network(String),

    /// Error surfaced by the underlying HTTP client
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// Result type for Dropbox operations
pub type Result<T> = std::result::Result<T, DropboxError>;

impl DropboxError {
    /// Whether retrying the same request can reasonably succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            DropboxError::RateLimited { .. } | DropboxError::Network(_) => true,
            DropboxError::Remote(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Server-suggested backoff, when the response carried one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            DropboxError::RateLimited { retry_after } => *retry_after,
            DropboxError::Remote(RemoteError::RateLimited { retry_after }) => *retry_after,
            _ => None,
        }
    }
}

impl From<DropboxError> for RemoteError {
    fn from(error: DropboxError) -> Self {
        match error {
            DropboxError::Auth(msg) => RemoteError::DirectoryUnavailable(msg),
            DropboxError::CursorReset(msg) => RemoteError::InvalidCursor(msg),
            DropboxError::RateLimited { retry_after } => RemoteError::RateLimited { retry_after },
            DropboxError::PathNotFound(path) => RemoteError::NotFound(path),
            DropboxError::Api { status, summary } => RemoteError::Api {
                status,
                message: summary,
            },
            DropboxError::Parse(msg) => RemoteError::Api {
                status: 200,
                message: msg,
            },
            DropboxError::Network(msg) => RemoteError::Transient(msg),
            DropboxError::Remote(e) => e,
        }
    }
}
