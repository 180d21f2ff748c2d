use remote_traits::RemoteError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("Destination out of space: {0}")]
    QuotaExceeded(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid pipeline transition from {from} to {to}")]
    InvalidStateTransition {
        from: &'static str,
        to: &'static str,
    },

    #[error("Sync cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(String),
}

impl SyncError {
    /// Whether this error must abort the whole run rather than a single
    /// member or entry.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SyncError::QuotaExceeded(_) | SyncError::Remote(RemoteError::DirectoryUnavailable(_))
        )
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
