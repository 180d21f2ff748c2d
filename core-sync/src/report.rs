//! # Run Reporting
//!
//! Aggregated outcome of a backup run: one record per member attempted,
//! plus run-level counters and the fatal error, if the run aborted.

use remote_traits::MemberId;
use std::time::Duration;

/// Terminal outcome of one member's pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberOutcome {
    /// Feed drained to the end; `last_synced_at` recorded.
    Committed,
    /// Stopped early (cancellation or fatal abort) after committing zero or
    /// more whole pages. Resumable from the persisted cursor.
    Partial,
    /// Member-level failure; other members are unaffected.
    Failed,
}

impl MemberOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberOutcome::Committed => "committed",
            MemberOutcome::Partial => "partial",
            MemberOutcome::Failed => "failed",
        }
    }
}

/// Per-member counters for one run.
#[derive(Debug, Clone)]
pub struct MemberReport {
    pub member_id: MemberId,
    pub outcome: MemberOutcome,
    pub pages_committed: u32,
    pub files_written: u64,
    pub bytes_written: u64,
    pub files_removed: u64,
    pub entries_skipped: u64,
    /// Entries that exhausted their attempt budget.
    pub entry_errors: u64,
    /// Failure or cancellation detail when the outcome is not `Committed`.
    pub message: Option<String>,
}

impl MemberReport {
    pub fn new(member_id: MemberId) -> Self {
        Self {
            member_id,
            outcome: MemberOutcome::Partial,
            pages_committed: 0,
            files_written: 0,
            bytes_written: 0,
            files_removed: 0,
            entries_skipped: 0,
            entry_errors: 0,
            message: None,
        }
    }
}

/// Outcome of a whole backup run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Members whose pipeline actually started.
    pub members: Vec<MemberReport>,
    /// Set when the run aborted on a fatal error. Per-member and per-entry
    /// failures do not set this.
    pub fatal_error: Option<String>,
    pub duration: Duration,
}

impl RunReport {
    pub fn new() -> Self {
        Self {
            members: Vec::new(),
            fatal_error: None,
            duration: Duration::ZERO,
        }
    }

    pub fn members_attempted(&self) -> usize {
        self.members.len()
    }

    pub fn members_committed(&self) -> usize {
        self.members
            .iter()
            .filter(|m| m.outcome == MemberOutcome::Committed)
            .count()
    }

    pub fn members_failed(&self) -> usize {
        self.members
            .iter()
            .filter(|m| m.outcome == MemberOutcome::Failed)
            .count()
    }

    pub fn files_written(&self) -> u64 {
        self.members.iter().map(|m| m.files_written).sum()
    }

    pub fn bytes_written(&self) -> u64 {
        self.members.iter().map(|m| m.bytes_written).sum()
    }

    pub fn files_removed(&self) -> u64 {
        self.members.iter().map(|m| m.files_removed).sum()
    }

    pub fn entries_skipped(&self) -> u64 {
        self.members.iter().map(|m| m.entries_skipped).sum()
    }

    pub fn entry_errors(&self) -> u64 {
        self.members.iter().map(|m| m.entry_errors).sum()
    }

    pub fn is_fatal(&self) -> bool {
        self.fatal_error.is_some()
    }
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}
