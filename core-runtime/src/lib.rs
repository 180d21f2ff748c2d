//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the backup engine:
//! - Logging and tracing (compact console + rolling detail file)
//! - Configuration management with fail-fast validation
//! - Event bus for run progress
//!
//! ## Overview
//!
//! This crate contains the runtime utilities the other crates depend on.
//! It establishes the logging conventions and event broadcasting mechanism
//! used throughout the tool.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::BackupConfig;
pub use error::{Error, Result};
pub use events::{EventBus, SkipReason, SyncEvent};
