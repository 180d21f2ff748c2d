//! # Core Sync Engine
//!
//! Incremental, resumable backup engine for a team of cloud storage
//! members.
//!
//! ## Overview
//!
//! The engine reconciles the team roster against its SQLite state, then
//! runs one pipeline per active member: page through the member's change
//! feed, apply each entry to the local mirror, and persist the cursor
//! after every fully drained page so an interrupted run resumes without
//! re-downloading or missing changes.
//!
//! The crate is written against the seams in `remote-traits`
//! ([`TeamProvider`](remote_traits::TeamProvider)) plus its own
//! [`CursorStore`] and [`Mirror`] traits, so the whole engine runs in
//! tests with scripted fakes.

pub mod directory;
pub mod error;
pub mod mirror;
pub mod orchestrator;
pub mod reconciler;
pub mod report;
pub mod state;
pub mod store;

pub use directory::{diff_roster, reconcile_roster, RosterDiff};
pub use error::{Result, SyncError};
pub use mirror::{LocalMirror, Mirror};
pub use orchestrator::Orchestrator;
pub use reconciler::{Reconciler, ReconcilerConfig};
pub use report::{MemberOutcome, MemberReport, RunReport};
pub use state::{MemberSyncState, PipelinePhase};
pub use store::{CursorStore, SqliteCursorStore};
