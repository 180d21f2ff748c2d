//! # Event Bus System
//!
//! Provides an event-driven progress feed for the backup engine using
//! `tokio::sync::broadcast`. The reconciler and orchestrator publish typed
//! events; the CLI and tests subscribe without the engine knowing about
//! either.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{EventBus, SyncEvent};
//!
//! let event_bus = EventBus::new(100);
//! let mut subscriber = event_bus.subscribe();
//!
//! event_bus
//!     .emit(SyncEvent::RunStarted { member_count: 12 })
//!     .ok();
//! ```
//!
//! ## Error Handling
//!
//! The bus uses `tokio::sync::broadcast`, which can produce two errors on
//! the receive side:
//!
//! - **`RecvError::Lagged(n)`**: the subscriber was too slow and missed `n`
//!   events. Non-fatal; the subscriber keeps receiving new events.
//! - **`RecvError::Closed`**: all senders dropped, signalling shutdown.
//!
//! Emitting with no subscribers is an error from `broadcast` but harmless
//! here; call sites use `.ok()`.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 256;

// ============================================================================
// Event Types
// ============================================================================

/// Why an entry was skipped rather than mirrored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// File exceeds the configured size cap
    TooLarge,
    /// File was last modified before the `--since` threshold
    OlderThanSince,
    /// File vanished remotely between listing and download
    Vanished,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::TooLarge => "too_large",
            SkipReason::OlderThanSince => "older_than_since",
            SkipReason::Vanished => "vanished",
        }
    }
}

/// Progress events published during a backup run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SyncEvent {
    /// Run initiated; the roster has been reconciled.
    RunStarted {
        /// Number of active members that will be synced.
        member_count: usize,
    },
    /// A member's sync pipeline started.
    MemberStarted {
        member_id: String,
        display_name: String,
    },
    /// A change page was fully applied and its cursor persisted.
    PageCommitted {
        member_id: String,
        /// Entries contained in the page.
        entries: usize,
    },
    /// An entry was deliberately not mirrored.
    EntrySkipped {
        member_id: String,
        path: String,
        reason: SkipReason,
    },
    /// An entry exhausted its attempt budget; the member continues.
    EntryFailed {
        member_id: String,
        path: String,
        message: String,
    },
    /// A member drained its feed completely and was marked synced.
    MemberCommitted {
        member_id: String,
        files_written: u64,
        bytes_written: u64,
    },
    /// A member's pipeline stopped before reaching the committed state.
    MemberFailed {
        member_id: String,
        message: String,
    },
    /// Run finished, successfully or not.
    RunCompleted {
        members_committed: usize,
        members_failed: usize,
        duration_secs: u64,
    },
}

impl SyncEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            SyncEvent::RunStarted { .. } => "Backup run started",
            SyncEvent::MemberStarted { .. } => "Member sync started",
            SyncEvent::PageCommitted { .. } => "Change page committed",
            SyncEvent::EntrySkipped { .. } => "Entry skipped",
            SyncEvent::EntryFailed { .. } => "Entry failed",
            SyncEvent::MemberCommitted { .. } => "Member fully synced",
            SyncEvent::MemberFailed { .. } => "Member sync failed",
            SyncEvent::RunCompleted { .. } => "Backup run completed",
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            SyncEvent::MemberFailed { .. } => EventSeverity::Error,
            SyncEvent::EntryFailed { .. } => EventSeverity::Warning,
            SyncEvent::RunStarted { .. }
            | SyncEvent::MemberCommitted { .. }
            | SyncEvent::RunCompleted { .. } => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to run progress.
///
/// Uses `tokio::sync::broadcast` internally, which provides:
/// - Multiple producers (clone the `EventBus`)
/// - Multiple consumers (each `subscribe()` creates a new receiver)
/// - Non-blocking sends (events are cloned for each subscriber)
/// - Lagging detection (slow subscribers get `RecvError::Lagged`)
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SyncEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Creates a new event bus with the default buffer size.
    #[allow(clippy::should_implement_trait)]
    pub fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error if there are no active subscribers.
    pub fn emit(&self, event: SyncEvent) -> Result<usize, SendError<SyncEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber to receive events.
    ///
    /// Each call creates an independent receiver that will receive all
    /// future events. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<SyncEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
