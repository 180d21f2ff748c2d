//! # Logging & Tracing Infrastructure
//!
//! Configures the `tracing-subscriber` stack for the backup tool:
//! - a compact console layer for operator-facing progress, and
//! - an optional daily-rolling file layer capturing per-file detail.
//!
//! ## Overview
//!
//! The console stays quiet (info by default) so a run's output is readable;
//! the file sink records everything at debug so a failed run can be
//! reconstructed afterwards. Both layers share one registry and are
//! filtered independently.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::logging::{LoggingConfig, init_logging};
//!
//! let config = LoggingConfig::default().with_log_dir("/backups/out/logs");
//! let _guard = init_logging(config)?;
//!
//! tracing::info!("Backup started");
//! ```

use crate::error::{Error, Result};
use std::io;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt, Layer,
};

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Console verbosity (tracing level string, e.g. "info", "debug")
    pub console_level: String,
    /// Custom console filter; overrides `console_level` when set
    pub console_filter: Option<String>,
    /// Directory for the rolling detail log; disabled when `None`
    pub log_dir: Option<PathBuf>,
    /// File name prefix for the rolling log
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            console_level: "info".to_string(),
            console_filter: None,
            log_dir: None,
            file_prefix: "teambackup".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Set console verbosity level
    pub fn with_console_level(mut self, level: impl Into<String>) -> Self {
        self.console_level = level.into();
        self
    }

    /// Set a custom console filter string (e.g. "core_sync=trace")
    pub fn with_console_filter(mut self, filter: impl Into<String>) -> Self {
        self.console_filter = Some(filter.into());
        self
    }

    /// Enable the rolling detail log in the given directory
    pub fn with_log_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    /// Set the rolling log file prefix
    pub fn with_file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.file_prefix = prefix.into();
        self
    }
}

/// Build the console filter: our crates at the chosen level, chatty
/// dependencies capped at warn.
fn build_console_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    let filter_string = if let Some(custom) = &config.console_filter {
        custom.clone()
    } else {
        let level = &config.console_level;
        format!(
            "teambackup={},core_runtime={},core_sync={},\
             provider_dropbox={},remote_traits={},\
             h2=warn,hyper=warn,reqwest=warn,sqlx=warn",
            level, level, level, level, level
        )
    };

    EnvFilter::try_new(filter_string)
        .map_err(|e| Error::Config(format!("Invalid log filter: {}", e)))
}

/// Initialize the logging system.
///
/// Should be called once during startup. Returns the non-blocking writer
/// guard for the file sink when one is configured; the caller must hold it
/// for the lifetime of the process or buffered lines are lost on exit.
///
/// # Errors
///
/// Returns an error if logging is already initialized or the filter string
/// is invalid.
pub fn init_logging(config: LoggingConfig) -> Result<Option<WorkerGuard>> {
    let console_filter = build_console_filter(&config)?;

    let console_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_target(false)
        .with_writer(io::stdout)
        .with_filter(console_filter);

    let registry = tracing_subscriber::registry().with(console_layer);

    match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, &config.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);

            let file_filter = EnvFilter::try_new("debug,h2=warn,hyper=warn,reqwest=info")
                .map_err(|e| Error::Config(format!("Invalid log filter: {}", e)))?;

            let file_layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(writer)
                .with_filter(file_filter);

            registry
                .with(file_layer)
                .try_init()
                .map_err(|e| Error::Logging(format!("Failed to initialize logging: {}", e)))?;

            Ok(Some(guard))
        }
        None => {
            registry
                .try_init()
                .map_err(|e| Error::Logging(format!("Failed to initialize logging: {}", e)))?;

            Ok(None)
        }
    }
}

/// Helper to redact sensitive field values before they reach a log line.
///
/// ```ignore
/// use core_runtime::logging::redact_if_sensitive;
///
/// tracing::info!(token = %redact_if_sensitive("token", token), "Using credential");
/// ```
pub fn redact_if_sensitive(field_name: &str, value: &str) -> String {
    const SENSITIVE_FIELDS: &[&str] = &["token", "password", "secret", "authorization", "bearer"];

    let field_lower = field_name.to_lowercase();
    if SENSITIVE_FIELDS.iter().any(|&f| field_lower.contains(f)) {
        "[REDACTED]".to_string()
    } else {
        value.to_string()
    }
}
