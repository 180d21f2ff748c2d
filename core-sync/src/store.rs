//! # Cursor Store
//!
//! Provides database persistence for per-member sync state.
//!
//! ## Overview
//!
//! One row per team member: roster identity, the change cursor marking how
//! far their feed has been applied, the last full-drain timestamp, and the
//! last error. This store is the only component that reads or writes
//! cursors; nothing above it caches them.
//!
//! Rows are never deleted. A member who leaves the team is marked
//! `removed` and their mirrored files stay on disk.

use crate::{MemberSyncState, Result, SyncError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use remote_traits::{Member, MemberId, MemberStatus};
use sqlx::{FromRow, SqlitePool};

// ============================================================================
// Store Trait
// ============================================================================

/// Repository trait for member sync state persistence.
#[async_trait]
pub trait CursorStore: Send + Sync {
    /// Insert a member or refresh an existing row's identity fields.
    ///
    /// The cursor and sync timestamps of an existing row are preserved; a
    /// previously removed member who rejoined becomes active again and
    /// resumes from their stored cursor.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    async fn upsert_member(&self, member: &Member) -> Result<()>;

    /// Mark a member as no longer present in the roster.
    ///
    /// # Errors
    ///
    /// Returns an error if the member is unknown or the database operation
    /// fails
    async fn mark_removed(&self, id: &MemberId) -> Result<()>;

    /// Load one member's state row.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    async fn member_state(&self, id: &MemberId) -> Result<Option<MemberSyncState>>;

    /// Load every known member, including removed ones.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    async fn known_members(&self) -> Result<Vec<MemberSyncState>>;

    /// Persist the cursor for a fully applied change page.
    ///
    /// # Errors
    ///
    /// Returns an error if the member is unknown or the database operation
    /// fails
    async fn commit_cursor(&self, id: &MemberId, cursor: &str) -> Result<()>;

    /// Discard a member's cursor so the next run lists from scratch.
    ///
    /// # Errors
    ///
    /// Returns an error if the member is unknown or the database operation
    /// fails
    async fn reset_cursor(&self, id: &MemberId) -> Result<()>;

    /// Record that the member's feed was drained to the end just now.
    /// Clears any stored error.
    ///
    /// # Errors
    ///
    /// Returns an error if the member is unknown or the database operation
    /// fails
    async fn mark_synced(&self, id: &MemberId) -> Result<()>;

    /// Record a member-level failure message.
    ///
    /// # Errors
    ///
    /// Returns an error if the member is unknown or the database operation
    /// fails
    async fn record_error(&self, id: &MemberId, message: &str) -> Result<()>;
}

// ============================================================================
// SQLite Implementation
// ============================================================================

/// SQLite implementation of [`CursorStore`].
pub struct SqliteCursorStore {
    pool: SqlitePool,
}

impl SqliteCursorStore {
    /// Create a new SQLite cursor store.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the state table if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS member_sync_state (
                member_id TEXT PRIMARY KEY NOT NULL,
                display_name TEXT NOT NULL,
                email TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'active',
                cursor TEXT,
                last_synced_at INTEGER,
                last_error TEXT,
                created_at INTEGER NOT NULL,
                CONSTRAINT member_sync_state_status_check CHECK (
                    status IN ('active', 'removed')
                )
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| SyncError::Database(e.to_string()))?;

        Ok(())
    }

    /// Run `query`, erroring when no row matched `id`.
    async fn execute_for_member<'a>(
        &self,
        query: sqlx::query::Query<'a, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'a>>,
        id: &MemberId,
    ) -> Result<()> {
        let result = query
            .execute(&self.pool)
            .await
            .map_err(|e| SyncError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(SyncError::Database(format!(
                "No state row for member {}",
                id
            )));
        }

        Ok(())
    }
}

/// Database row representation of a member's sync state.
#[derive(Debug, FromRow)]
struct MemberStateRow {
    member_id: String,
    display_name: String,
    email: String,
    status: String,
    cursor: Option<String>,
    last_synced_at: Option<i64>,
    last_error: Option<String>,
}

impl TryFrom<MemberStateRow> for MemberSyncState {
    type Error = SyncError;

    fn try_from(row: MemberStateRow) -> Result<Self> {
        let status: MemberStatus = row
            .status
            .parse()
            .map_err(|e: String| SyncError::Database(e))?;

        let last_synced_at = row
            .last_synced_at
            .map(|secs| {
                DateTime::<Utc>::from_timestamp(secs, 0).ok_or_else(|| {
                    SyncError::Database(format!("Invalid last_synced_at: {}", secs))
                })
            })
            .transpose()?;

        Ok(MemberSyncState {
            member_id: MemberId::new(row.member_id),
            display_name: row.display_name,
            email: row.email,
            status,
            cursor: row.cursor,
            last_synced_at,
            last_error: row.last_error,
        })
    }
}

const SELECT_COLUMNS: &str =
    "member_id, display_name, email, status, cursor, last_synced_at, last_error";

#[async_trait]
impl CursorStore for SqliteCursorStore {
    async fn upsert_member(&self, member: &Member) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO member_sync_state (
                member_id, display_name, email, status, created_at
            ) VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(member_id) DO UPDATE SET
                display_name = excluded.display_name,
                email = excluded.email,
                status = excluded.status
            "#,
        )
        .bind(member.id.as_str())
        .bind(&member.display_name)
        .bind(&member.email)
        .bind(member.status.as_str())
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| SyncError::Database(e.to_string()))?;

        Ok(())
    }

    async fn mark_removed(&self, id: &MemberId) -> Result<()> {
        let query = sqlx::query("UPDATE member_sync_state SET status = 'removed' WHERE member_id = ?")
            .bind(id.as_str());
        self.execute_for_member(query, id).await
    }

    async fn member_state(&self, id: &MemberId) -> Result<Option<MemberSyncState>> {
        let row = sqlx::query_as::<_, MemberStateRow>(&format!(
            "SELECT {} FROM member_sync_state WHERE member_id = ?",
            SELECT_COLUMNS
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| SyncError::Database(e.to_string()))?;

        row.map(MemberSyncState::try_from).transpose()
    }

    async fn known_members(&self) -> Result<Vec<MemberSyncState>> {
        let rows = sqlx::query_as::<_, MemberStateRow>(&format!(
            "SELECT {} FROM member_sync_state ORDER BY member_id",
            SELECT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| SyncError::Database(e.to_string()))?;

        rows.into_iter()
            .map(MemberSyncState::try_from)
            .collect::<Result<Vec<_>>>()
    }

    async fn commit_cursor(&self, id: &MemberId, cursor: &str) -> Result<()> {
        let query = sqlx::query("UPDATE member_sync_state SET cursor = ? WHERE member_id = ?")
            .bind(cursor)
            .bind(id.as_str());
        self.execute_for_member(query, id).await
    }

    async fn reset_cursor(&self, id: &MemberId) -> Result<()> {
        let query = sqlx::query("UPDATE member_sync_state SET cursor = NULL WHERE member_id = ?")
            .bind(id.as_str());
        self.execute_for_member(query, id).await
    }

    async fn mark_synced(&self, id: &MemberId) -> Result<()> {
        let query = sqlx::query(
            "UPDATE member_sync_state SET last_synced_at = ?, last_error = NULL WHERE member_id = ?",
        )
        .bind(Utc::now().timestamp())
        .bind(id.as_str());
        self.execute_for_member(query, id).await
    }

    async fn record_error(&self, id: &MemberId, message: &str) -> Result<()> {
        let query = sqlx::query("UPDATE member_sync_state SET last_error = ? WHERE member_id = ?")
            .bind(message)
            .bind(id.as_str());
        self.execute_for_member(query, id).await
    }
}

// ============================================================================
// Tests
// ============================================================================
