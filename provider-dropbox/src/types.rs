//! Dropbox API response types
//!
//! Data structures for deserializing Dropbox API v2 responses.

use chrono::{DateTime, Utc};
use serde::Deserialize;

// ============================================================================
// team/members
// ============================================================================

/// Dropbox API `team/members/list_v2` response
///
/// See: https://www.dropbox.com/developers/documentation/http/teams#team-members-list
#[derive(Debug, Deserialize)]
pub struct MembersListResponse {
    /// List of team members
    pub members: Vec<TeamMemberInfo>,

    /// Cursor for `team/members/list/continue_v2`
    pub cursor: String,

    /// Whether more members remain
    pub has_more: bool,
}

/// One member entry in a `team/members/list_v2` response
#[derive(Debug, Deserialize)]
pub struct TeamMemberInfo {
    pub profile: MemberProfile,
}

/// Member profile fields
#[derive(Debug, Deserialize)]
pub struct MemberProfile {
    /// Team-scoped member id, e.g. `dbmid:AAH4f99T0taONIb-OurWxbNQ6ywGRopQngc`
    pub team_member_id: String,

    pub email: String,

    pub name: MemberName,

    /// Union like `{".tag": "active"}`
    pub status: TagUnion,
}

/// Member display name fields
#[derive(Debug, Deserialize)]
pub struct MemberName {
    pub display_name: String,
}

/// A bare Dropbox tagged union, keeping only the tag
#[derive(Debug, Deserialize)]
pub struct TagUnion {
    #[serde(rename = ".tag")]
    pub tag: String,
}

// ============================================================================
// files/list_folder
// ============================================================================

/// Dropbox API `files/list_folder` / `list_folder/continue` response
///
/// See: https://www.dropbox.com/developers/documentation/http/documentation#files-list_folder
#[derive(Debug, Deserialize)]
pub struct ListFolderResponse {
    pub entries: Vec<EntryMetadata>,

    /// Cursor for the position after this page
    pub cursor: String,

    pub has_more: bool,
}

/// Metadata union returned in `list_folder` entries
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = ".tag", rename_all = "snake_case")]
pub enum EntryMetadata {
    File(FileMetadata),
    Folder(FolderMetadata),
    Deleted(DeletedMetadata),
    /// Forward compatibility with tags this client does not know
    #[serde(other)]
    Unknown,
}

/// File metadata
#[derive(Debug, Clone, Deserialize)]
pub struct FileMetadata {
    pub name: String,

    /// Lowercased canonical path; absent for some unmounted entries
    pub path_lower: Option<String>,

    /// Display-cased path
    pub path_display: Option<String>,

    /// Last time content changed on the server (RFC 3339)
    pub server_modified: DateTime<Utc>,

    /// Revision identifier, unique per content version
    pub rev: String,

    /// Size in bytes
    pub size: u64,
}

/// Folder metadata
#[derive(Debug, Clone, Deserialize)]
pub struct FolderMetadata {
    pub name: String,
    pub path_lower: Option<String>,
    pub path_display: Option<String>,
}

/// Deleted-entry metadata
#[derive(Debug, Clone, Deserialize)]
pub struct DeletedMetadata {
    pub name: String,
    pub path_lower: Option<String>,
    pub path_display: Option<String>,
}

// ============================================================================
// Errors
// ============================================================================

/// Body of a non-2xx Dropbox API response
///
/// The machine-readable union under `error` varies per endpoint; the
/// `error_summary` string is a stable dotted path into it and is what the
/// connector branches on.
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub error_summary: String,
}
