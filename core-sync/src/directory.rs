//! # Member Directory Reconciliation
//!
//! Diffs the live team roster against the persisted state rows at the
//! start of a run.
//!
//! ## Overview
//!
//! New members get a state row with no cursor, so their first pipeline run
//! is a full listing. Members missing from the roster are marked removed;
//! their state row and mirrored files are retained. A roster that cannot
//! be fetched at all aborts the run before any member work starts.

use crate::{CursorStore, MemberSyncState, Result};
use remote_traits::{Member, MemberId, MemberStatus, TeamProvider};
use std::collections::HashSet;
use tracing::{info, warn};

/// Outcome of diffing the live roster against the persisted rows.
#[derive(Debug, Default, PartialEq)]
pub struct RosterDiff {
    /// Members seen for the first time.
    pub added: Vec<Member>,
    /// Previously active members absent from the live roster.
    pub removed: Vec<MemberId>,
}

/// Pure roster diff; the async half in [`reconcile_roster`] applies it.
pub fn diff_roster(live: &[Member], known: &[MemberSyncState]) -> RosterDiff {
    let known_ids: HashSet<&str> = known.iter().map(|s| s.member_id.as_str()).collect();
    let live_ids: HashSet<&str> = live.iter().map(|m| m.id.as_str()).collect();

    let added = live
        .iter()
        .filter(|m| !known_ids.contains(m.id.as_str()))
        .cloned()
        .collect();

    let removed = known
        .iter()
        .filter(|s| s.status == MemberStatus::Active && !live_ids.contains(s.member_id.as_str()))
        .map(|s| s.member_id.clone())
        .collect();

    RosterDiff { added, removed }
}

/// Fetch the live roster, persist the diff, and return the members to sync.
///
/// Every live member is upserted (new rows for joiners, refreshed identity
/// fields for the rest); members who left are marked removed. Only members
/// the provider reports as active are returned.
///
/// # Errors
///
/// Propagates `DirectoryUnavailable` from the provider, which is fatal for
/// the run, and store failures.
pub async fn reconcile_roster(
    provider: &dyn TeamProvider,
    store: &dyn CursorStore,
) -> Result<Vec<Member>> {
    let live = provider.list_members().await?;
    let known = store.known_members().await?;

    let diff = diff_roster(&live, &known);

    for member in &diff.added {
        info!(member_id = %member.id, name = %member.display_name, "New team member");
    }
    for id in &diff.removed {
        warn!(member_id = %id, "Member left the team; mirror retained");
        store.mark_removed(id).await?;
    }

    for member in &live {
        store.upsert_member(member).await?;
    }

    let active: Vec<Member> = live
        .into_iter()
        .filter(|m| m.status == MemberStatus::Active)
        .collect();

    info!(
        active = active.len(),
        joined = diff.added.len(),
        left = diff.removed.len(),
        "Roster reconciled"
    );

    Ok(active)
}

// ============================================================================
// Tests
// ============================================================================
