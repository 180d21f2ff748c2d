//! # Member Sync State
//!
//! Domain types for the per-member sync record and the pipeline phase
//! machine.
//!
//! ## Overview
//!
//! Each team member owns exactly one state row: the change cursor marking
//! how far their feed has been applied, when they last drained it
//! completely, and the last error seen. The pipeline that advances that row
//! moves through a small phase machine; transitions outside it are
//! programming errors and are rejected rather than silently accepted.

use crate::{Result, SyncError};
use chrono::{DateTime, Utc};
use remote_traits::{MemberId, MemberStatus};

// ============================================================================
// Pipeline phases
// ============================================================================

/// Phase of a member's sync pipeline.
///
/// Legal transitions:
///
/// ```text
/// Idle -> Paging -> Draining -> Paging    (next page)
///                            -> Committed (feed drained)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelinePhase {
    /// Nothing in flight for this member.
    Idle,
    /// Fetching a change page against the current cursor.
    Paging,
    /// Applying the entries of a fetched page to the mirror.
    Draining,
    /// The feed reported no more pages and the last cursor is persisted.
    Committed,
}

impl PipelinePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelinePhase::Idle => "idle",
            PipelinePhase::Paging => "paging",
            PipelinePhase::Draining => "draining",
            PipelinePhase::Committed => "committed",
        }
    }

    /// Move to `next`, rejecting transitions the pipeline never makes.
    pub fn transition(self, next: PipelinePhase) -> Result<PipelinePhase> {
        let legal = matches!(
            (self, next),
            (PipelinePhase::Idle, PipelinePhase::Paging)
                | (PipelinePhase::Paging, PipelinePhase::Draining)
                | (PipelinePhase::Draining, PipelinePhase::Paging)
                | (PipelinePhase::Draining, PipelinePhase::Committed)
        );

        if legal {
            Ok(next)
        } else {
            Err(SyncError::InvalidStateTransition {
                from: self.as_str(),
                to: next.as_str(),
            })
        }
    }
}

// ============================================================================
// Persisted member state
// ============================================================================

/// One member's persisted sync record.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberSyncState {
    pub member_id: MemberId,
    pub display_name: String,
    pub email: String,
    pub status: MemberStatus,
    /// Resume point into the member's change feed. `None` means the next
    /// run lists their tree from scratch.
    pub cursor: Option<String>,
    /// When the member's feed was last drained to the end.
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Last member-level failure, cleared on a successful drain.
    pub last_error: Option<String>,
}

impl MemberSyncState {
    /// Whether the member has never completed an initial listing.
    pub fn needs_full_sync(&self) -> bool {
        self.cursor.is_none()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legal_transitions() {
        let phase = PipelinePhase::Idle
            .transition(PipelinePhase::Paging)
            .unwrap()
            .transition(PipelinePhase::Draining)
            .unwrap()
            .transition(PipelinePhase::Paging)
            .unwrap()
            .transition(PipelinePhase::Draining)
            .unwrap()
            .transition(PipelinePhase::Committed)
            .unwrap();
        assert_eq!(phase, PipelinePhase::Committed);
    }

    #[test]
    fn test_illegal_transitions_rejected() {
        let cases = [
            (PipelinePhase::Idle, PipelinePhase::Draining),
            (PipelinePhase::Idle, PipelinePhase::Committed),
            (PipelinePhase::Paging, PipelinePhase::Committed),
            (PipelinePhase::Committed, PipelinePhase::Paging),
            (PipelinePhase::Paging, PipelinePhase::Idle),
        ];

        for (from, to) in cases {
            let err = from.transition(to).unwrap_err();
            assert!(matches!(err, SyncError::InvalidStateTransition { .. }));
        }
    }

    #[test]
    fn test_needs_full_sync() {
        let mut state = MemberSyncState {
            member_id: MemberId::new("dbmid:1"),
            display_name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            status: MemberStatus::Active,
            cursor: None,
            last_synced_at: None,
            last_error: None,
        };
        assert!(state.needs_full_sync());

        state.cursor = Some("cur-1".to_string());
        assert!(!state.needs_full_sync());
    }
}
