//! Team Storage Provider Abstraction
//!
//! The contract a cloud storage backend must satisfy for the backup engine:
//! enumerate the team roster, page through per-member change feeds via
//! opaque cursors, and stream file content.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

use crate::error::Result;

// ============================================================================
// Members
// ============================================================================

/// Opaque provider-assigned member identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemberId(String);

impl MemberId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MemberId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Roster status of a team member as last observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberStatus {
    Active,
    /// No longer present in the team roster. Local data is retained.
    Removed,
}

impl MemberStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberStatus::Active => "active",
            MemberStatus::Removed => "removed",
        }
    }
}

impl FromStr for MemberStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "active" => Ok(MemberStatus::Active),
            "removed" => Ok(MemberStatus::Removed),
            other => Err(format!("unknown member status: {}", other)),
        }
    }
}

/// A member of the team as reported by the provider directory.
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub id: MemberId,
    pub display_name: String,
    pub email: String,
    pub status: MemberStatus,
}

// ============================================================================
// Change feed
// ============================================================================

/// What happened to the path carried by a [`ChangeEntry`].
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeKind {
    /// A file was added or its content changed.
    File {
        size: u64,
        modified: DateTime<Utc>,
        revision: String,
    },
    /// A folder appeared. Folders carry no content.
    Folder,
    /// The path was deleted remotely.
    Deleted,
    /// The path arrived by rename; `from` is the previous location.
    Moved { from: String },
}

/// One entry in a change page.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEntry {
    /// Display-cased path as the user sees it, e.g. `/Projects/Q3.xlsx`.
    pub path_display: String,
    /// Canonical lowercased path, stable across case-only renames.
    pub path_key: String,
    pub kind: ChangeKind,
}

/// One page of a member's change feed.
///
/// `cursor` is the resume point for the position *after* this page. It must
/// only be persisted once every entry in `entries` has been applied.
#[derive(Debug, Clone)]
pub struct ChangePage {
    pub entries: Vec<ChangeEntry>,
    pub cursor: String,
    pub has_more: bool,
}

// ============================================================================
// Provider trait
// ============================================================================

/// A cloud storage backend holding per-member file trees.
///
/// Implementations map backend-specific wire formats and status codes into
/// the neutral model above and the [`RemoteError`](crate::RemoteError)
/// taxonomy. They own request-level retry for throttling and transient
/// failures; callers see either a result or a classified terminal error.
#[async_trait]
pub trait TeamProvider: Send + Sync {
    /// Fetch the complete current team roster.
    ///
    /// # Errors
    ///
    /// [`RemoteError::DirectoryUnavailable`](crate::RemoteError::DirectoryUnavailable)
    /// when the credential is rejected or the directory cannot be listed.
    async fn list_members(&self) -> Result<Vec<Member>>;

    /// Fetch one page of changes for a member.
    ///
    /// `cursor == None` requests the full current state from the beginning;
    /// otherwise only changes after the cursor position are returned.
    async fn fetch_changes(
        &self,
        member: &MemberId,
        cursor: Option<&str>,
    ) -> Result<ChangePage>;

    /// Open a streaming download of one file revision.
    async fn download(
        &self,
        member: &MemberId,
        path: &str,
        revision: &str,
    ) -> Result<Box<dyn tokio::io::AsyncRead + Send + Unpin>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_status_round_trip() {
        assert_eq!(MemberStatus::Active.as_str(), "active");
        assert_eq!(
            "removed".parse::<MemberStatus>().unwrap(),
            MemberStatus::Removed
        );
        assert!("suspended".parse::<MemberStatus>().is_err());
    }
}
