//! # Backup Configuration Module
//!
//! Provides configuration management for a backup run.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a
//! `BackupConfig` instance holding everything a run needs: the team
//! credential, the destination mirror root, filter settings, and the retry
//! and concurrency knobs. Validation is fail-fast: a run never starts with
//! a config that cannot finish.
//!
//! ## Usage
//!
//! ```no_run
//! use core_runtime::config::BackupConfig;
//!
//! let config = BackupConfig::builder()
//!     .token("team-token")
//!     .out_root("/backups/2026-08-25 backup")
//!     .max_file_size_bytes(100 * 1024 * 1024)
//!     .workers(4)
//!     .build()
//!     .expect("Failed to build config");
//! ```

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use remote_traits::RetryPolicy;
use std::path::PathBuf;

/// Upper bound on concurrent member workers; beyond this the provider's
/// rate limiter dominates and extra tasks only burn memory.
pub const MAX_WORKERS: usize = 32;

/// Default per-member concurrency
pub const DEFAULT_WORKERS: usize = 4;

/// Default size cap for downloaded files (100 MB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Default per-entry download attempt budget
pub const DEFAULT_ENTRY_ATTEMPTS: u32 = 3;

/// Configuration for one backup run.
///
/// Use [`BackupConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct BackupConfig {
    /// Dropbox Business team token
    pub token: String,

    /// Only mirror files modified at or after this instant
    pub since: Option<DateTime<Utc>>,

    /// Skip files larger than this many bytes
    pub max_file_size_bytes: u64,

    /// Root directory of the local mirror
    pub out_root: PathBuf,

    /// Path of the SQLite state database
    pub state_db_path: PathBuf,

    /// Number of members synced concurrently
    pub workers: usize,

    /// Retry policy for change-page fetches
    pub page_retry: RetryPolicy,

    /// Retry policy for content downloads
    pub download_retry: RetryPolicy,

    /// Attempts per individual entry before it is recorded as failed
    pub entry_attempts: u32,

    /// Event bus buffer size
    pub event_buffer: usize,
}

impl std::fmt::Debug for BackupConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackupConfig")
            .field("token", &"[REDACTED]")
            .field("since", &self.since)
            .field("max_file_size_bytes", &self.max_file_size_bytes)
            .field("out_root", &self.out_root)
            .field("state_db_path", &self.state_db_path)
            .field("workers", &self.workers)
            .field("entry_attempts", &self.entry_attempts)
            .finish()
    }
}

impl BackupConfig {
    /// Creates a new builder for constructing a `BackupConfig`.
    pub fn builder() -> BackupConfigBuilder {
        BackupConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Token is not empty
    /// - Output root is not empty
    /// - Size cap and worker count are in sane ranges
    /// - Retry policies allow at least one attempt
    /// - The since date, when given, is not in the future
    pub fn validate(&self) -> Result<()> {
        if self.token.trim().is_empty() {
            return Err(Error::Config("Team token cannot be empty".to_string()));
        }

        if self.out_root.as_os_str().is_empty() {
            return Err(Error::Config(
                "Output directory cannot be empty".to_string(),
            ));
        }

        if self.max_file_size_bytes == 0 {
            return Err(Error::Config(
                "Maximum file size must be greater than 0 bytes".to_string(),
            ));
        }

        if self.workers == 0 {
            return Err(Error::Config(
                "Worker count must be greater than 0".to_string(),
            ));
        }

        if self.workers > MAX_WORKERS {
            return Err(Error::Config(format!(
                "Worker count exceeds maximum of {}",
                MAX_WORKERS
            )));
        }

        if self.page_retry.max_attempts == 0 || self.download_retry.max_attempts == 0 {
            return Err(Error::Config(
                "Retry policies must allow at least one attempt".to_string(),
            ));
        }

        if self.entry_attempts == 0 {
            return Err(Error::Config(
                "Entry attempt budget must be greater than 0".to_string(),
            ));
        }

        // A since date in the future would silently skip every file.
        if let Some(since) = self.since {
            if since > Utc::now() {
                return Err(Error::Config(format!(
                    "Since date {} is in the future",
                    since.format("%Y-%m-%d")
                )));
            }
        }

        Ok(())
    }
}

/// Builder for constructing [`BackupConfig`] instances.
#[derive(Default)]
pub struct BackupConfigBuilder {
    token: Option<String>,
    since: Option<DateTime<Utc>>,
    max_file_size_bytes: Option<u64>,
    out_root: Option<PathBuf>,
    state_db_path: Option<PathBuf>,
    workers: Option<usize>,
    page_retry: Option<RetryPolicy>,
    download_retry: Option<RetryPolicy>,
    entry_attempts: Option<u32>,
    event_buffer: Option<usize>,
}

impl BackupConfigBuilder {
    /// Sets the Dropbox Business team token (required).
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Only mirror files modified at or after this instant.
    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    /// Skip files larger than this many bytes.
    ///
    /// Default: 100 MB.
    pub fn max_file_size_bytes(mut self, bytes: u64) -> Self {
        self.max_file_size_bytes = Some(bytes);
        self
    }

    /// Sets the mirror root directory (required).
    pub fn out_root<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.out_root = Some(path.into());
        self
    }

    /// Sets the state database path.
    ///
    /// Default: `state.db` inside the mirror root.
    pub fn state_db_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.state_db_path = Some(path.into());
        self
    }

    /// Sets the number of members synced concurrently.
    ///
    /// Default: 4.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    /// Sets the retry policy for change-page fetches.
    pub fn page_retry(mut self, policy: RetryPolicy) -> Self {
        self.page_retry = Some(policy);
        self
    }

    /// Sets the retry policy for content downloads.
    pub fn download_retry(mut self, policy: RetryPolicy) -> Self {
        self.download_retry = Some(policy);
        self
    }

    /// Sets the per-entry attempt budget.
    ///
    /// Default: 3.
    pub fn entry_attempts(mut self, attempts: u32) -> Self {
        self.entry_attempts = Some(attempts);
        self
    }

    /// Sets the event bus buffer size.
    pub fn event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = Some(capacity);
        self
    }

    /// Builds the final `BackupConfig` instance.
    ///
    /// # Errors
    ///
    /// Returns an error if required fields are missing or any value fails
    /// validation.
    pub fn build(self) -> Result<BackupConfig> {
        let token = self.token.ok_or_else(|| {
            Error::Config("Team token is required. Use .token() to set it.".to_string())
        })?;

        let out_root = self.out_root.ok_or_else(|| {
            Error::Config("Output directory is required. Use .out_root() to set it.".to_string())
        })?;

        let state_db_path = self
            .state_db_path
            .unwrap_or_else(|| out_root.join("state.db"));

        let config = BackupConfig {
            token,
            since: self.since,
            max_file_size_bytes: self.max_file_size_bytes.unwrap_or(DEFAULT_MAX_FILE_SIZE),
            out_root,
            state_db_path,
            workers: self.workers.unwrap_or(DEFAULT_WORKERS),
            page_retry: self.page_retry.unwrap_or_default(),
            download_retry: self.download_retry.unwrap_or_default(),
            entry_attempts: self.entry_attempts.unwrap_or(DEFAULT_ENTRY_ATTEMPTS),
            event_buffer: self.event_buffer.unwrap_or(256),
        };

        config.validate()?;

        Ok(config)
    }
}
