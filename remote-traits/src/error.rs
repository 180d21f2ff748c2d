use std::time::Duration;
use thiserror::Error;

/// Failure classes surfaced by remote providers.
///
/// Every provider call is mapped into one of these variants so that the
/// sync engine can decide, without provider-specific knowledge, whether to
/// retry, resynchronize, skip, or abort.
#[derive(Error, Debug)]
pub enum RemoteError {
    /// Credential rejected or the member directory cannot be read at all.
    /// Nothing useful can happen this run.
    #[error("member directory unavailable: {0}")]
    DirectoryUnavailable(String),

    /// The server no longer recognizes a previously issued change cursor.
    /// The caller must discard it and restart that member from scratch.
    #[error("change cursor rejected by server: {0}")]
    InvalidCursor(String),

    /// Server-side throttling. Retry the same request after backing off.
    #[error("rate limited by server")]
    RateLimited {
        /// Server-suggested wait, when the response carried one.
        retry_after: Option<Duration>,
    },

    /// Network or server hiccup that is expected to clear on retry.
    #[error("transient remote failure: {0}")]
    Transient(String),

    /// The referenced file vanished between being listed and being fetched.
    #[error("remote object not found: {0}")]
    NotFound(String),

    /// Any other API-level rejection, preserved for diagnostics.
    #[error("remote API error (status {status}): {message}")]
    Api { status: u16, message: String },
}

impl RemoteError {
    /// Whether retrying the same request can reasonably succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RemoteError::RateLimited { .. } | RemoteError::Transient(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, RemoteError>;
