//! # Member Reconciler
//!
//! Per-member sync pipeline: page through the change feed, apply each
//! entry to the mirror, and persist the cursor after every fully drained
//! page.
//!
//! ## Workflow
//!
//! 1. Load the stored cursor (`None` means full initial listing)
//! 2. Fetch a change page, retrying throttles against the same cursor
//! 3. Apply every entry: remove deletions, filter by date and size,
//!    download the rest with a bounded per-entry attempt budget
//! 4. Commit the page's cursor, then loop while `has_more`
//! 5. Record `last_synced_at` once the feed is drained
//!
//! Entry failures are fail-soft: an entry that exhausts its budget is
//! recorded and the page continues. A member-level failure stops only that
//! member. Only `QuotaExceeded` aborts the run, and it aborts before the
//! current page's cursor is committed, so the page is replayed next run.
//!
//! A stored cursor the server no longer recognizes is discarded and the
//! member restarts from a full listing, at most once per run. The restart
//! never blanket-deletes mirrored files; it only re-downloads.

use crate::{
    CursorStore, MemberOutcome, MemberReport, MemberSyncState, Mirror, PipelinePhase, Result,
    SyncError,
};
use chrono::{DateTime, Utc};
use core_runtime::config::{BackupConfig, DEFAULT_ENTRY_ATTEMPTS, DEFAULT_MAX_FILE_SIZE};
use core_runtime::events::{EventBus, SkipReason, SyncEvent};
use remote_traits::{
    ChangeEntry, ChangeKind, Member, MemberId, RemoteError, RetryPolicy, TeamProvider,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Filter and retry knobs for the per-member pipeline.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Only mirror files modified at or after this instant.
    pub since: Option<DateTime<Utc>>,
    /// Skip files larger than this many bytes.
    pub max_file_size_bytes: u64,
    /// Retry policy for change-page fetches.
    pub page_retry: RetryPolicy,
    /// Retry policy between download attempts.
    pub download_retry: RetryPolicy,
    /// Attempts per entry before it is recorded as failed.
    pub entry_attempts: u32,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            since: None,
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE,
            page_retry: RetryPolicy::default(),
            download_retry: RetryPolicy::default(),
            entry_attempts: DEFAULT_ENTRY_ATTEMPTS,
        }
    }
}

impl From<&BackupConfig> for ReconcilerConfig {
    fn from(config: &BackupConfig) -> Self {
        Self {
            since: config.since,
            max_file_size_bytes: config.max_file_size_bytes,
            page_retry: config.page_retry.clone(),
            download_retry: config.download_retry.clone(),
            entry_attempts: config.entry_attempts,
        }
    }
}

/// Drives one member's change feed into the mirror.
pub struct Reconciler {
    provider: Arc<dyn TeamProvider>,
    store: Arc<dyn CursorStore>,
    mirror: Arc<dyn Mirror>,
    events: EventBus,
    config: ReconcilerConfig,
}

impl Reconciler {
    pub fn new(
        provider: Arc<dyn TeamProvider>,
        store: Arc<dyn CursorStore>,
        mirror: Arc<dyn Mirror>,
        events: EventBus,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            provider,
            store,
            mirror,
            events,
            config,
        }
    }

    /// Sync one member to the current state of their feed.
    ///
    /// Member-level failures are absorbed into the returned report
    /// (`MemberOutcome::Failed`) so other members keep running.
    /// Cancellation yields `MemberOutcome::Partial` with all fully drained
    /// pages already committed.
    ///
    /// # Errors
    ///
    /// Only fatal errors propagate, currently `QuotaExceeded`.
    #[instrument(skip(self, member, cancel), fields(member_id = %member.id))]
    pub async fn sync_member(
        &self,
        member: &Member,
        cancel: &CancellationToken,
    ) -> Result<MemberReport> {
        let mut report = MemberReport::new(member.id.clone());

        self.events
            .emit(SyncEvent::MemberStarted {
                member_id: member.id.to_string(),
                display_name: member.display_name.clone(),
            })
            .ok();

        match self.run_pipeline(member, cancel, &mut report).await {
            Ok(()) => Ok(report),
            Err(SyncError::Cancelled) => {
                info!(
                    pages = report.pages_committed,
                    "Member sync cancelled; committed pages are durable"
                );
                report.outcome = MemberOutcome::Partial;
                report.message = Some("cancelled".to_string());
                Ok(report)
            }
            Err(e) if e.is_fatal() => {
                if let Err(db) = self.store.record_error(&member.id, &e.to_string()).await {
                    warn!(error = %db, "Could not record fatal error for member");
                }
                Err(e)
            }
            Err(e) => {
                let message = e.to_string();
                warn!(error = %message, "Member sync failed; continuing with other members");

                if let Err(db) = self.store.record_error(&member.id, &message).await {
                    warn!(error = %db, "Could not record member error");
                }
                self.events
                    .emit(SyncEvent::MemberFailed {
                        member_id: member.id.to_string(),
                        message: message.clone(),
                    })
                    .ok();

                report.outcome = MemberOutcome::Failed;
                report.message = Some(message);
                Ok(report)
            }
        }
    }

    async fn run_pipeline(
        &self,
        member: &Member,
        cancel: &CancellationToken,
        report: &mut MemberReport,
    ) -> Result<()> {
        let state = self.store.member_state(&member.id).await?;
        if state.as_ref().map_or(true, MemberSyncState::needs_full_sync) {
            info!("No stored cursor; performing full listing");
        }
        let mut cursor: Option<String> = state.and_then(|s| s.cursor);
        let mut cursor_reset_used = false;
        let mut phase = PipelinePhase::Idle;

        loop {
            if cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }
            phase = phase.transition(PipelinePhase::Paging)?;

            let page = match self.fetch_page(&member.id, cursor.as_deref(), cancel).await {
                Ok(page) => page,
                Err(SyncError::Remote(RemoteError::InvalidCursor(reason)))
                    if cursor.is_some() && !cursor_reset_used =>
                {
                    warn!(
                        %reason,
                        "Stored cursor rejected by server; restarting member from a full listing"
                    );
                    self.store.reset_cursor(&member.id).await?;
                    cursor = None;
                    cursor_reset_used = true;
                    // The pipeline restarts from scratch for this member.
                    phase = PipelinePhase::Idle;
                    continue;
                }
                Err(e) => return Err(e),
            };

            phase = phase.transition(PipelinePhase::Draining)?;
            for entry in &page.entries {
                self.apply_entry(member, entry, report, cancel).await?;
            }

            // Every entry of the page is settled; the cursor may now move.
            self.store.commit_cursor(&member.id, &page.cursor).await?;
            report.pages_committed += 1;
            self.events
                .emit(SyncEvent::PageCommitted {
                    member_id: member.id.to_string(),
                    entries: page.entries.len(),
                })
                .ok();
            debug!(entries = page.entries.len(), "Change page committed");

            if page.has_more {
                cursor = Some(page.cursor);
                continue;
            }

            phase.transition(PipelinePhase::Committed)?;
            self.store.mark_synced(&member.id).await?;
            report.outcome = MemberOutcome::Committed;
            self.events
                .emit(SyncEvent::MemberCommitted {
                    member_id: member.id.to_string(),
                    files_written: report.files_written,
                    bytes_written: report.bytes_written,
                })
                .ok();
            info!(
                files = report.files_written,
                bytes = report.bytes_written,
                removed = report.files_removed,
                "Member fully synced"
            );
            return Ok(());
        }
    }

    /// Fetch one change page, retrying throttles and transient failures
    /// against the same cursor.
    async fn fetch_page(
        &self,
        member: &MemberId,
        cursor: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<remote_traits::ChangePage> {
        let policy = &self.config.page_retry;
        let mut attempt: u32 = 0;

        loop {
            match self.provider.fetch_changes(member, cursor).await {
                Ok(page) => return Ok(page),
                Err(e) if e.is_retryable() && attempt + 1 < policy.max_attempts => {
                    let delay = match &e {
                        RemoteError::RateLimited {
                            retry_after: Some(wait),
                        } => *wait,
                        _ => policy.jittered_delay(attempt),
                    };
                    debug!(attempt, ?delay, error = %e, "Retrying change page fetch");

                    tokio::select! {
                        _ = cancel.cancelled() => return Err(SyncError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Settle one entry: removed, skipped, downloaded, or recorded as a
    /// permanent per-entry error. Only fatal errors propagate.
    async fn apply_entry(
        &self,
        member: &Member,
        entry: &ChangeEntry,
        report: &mut MemberReport,
        cancel: &CancellationToken,
    ) -> Result<()> {
        match &entry.kind {
            ChangeKind::Deleted => self.remove_entry(member, &entry.path_display, report).await,
            ChangeKind::Folder => {
                debug!(path = %entry.path_display, "Folder entry; nothing to mirror");
                Ok(())
            }
            ChangeKind::Moved { from } => {
                // The old location goes away and the current content
                // reappears at the new path, unfiltered: a move is not a
                // content change.
                self.remove_entry(member, from, report).await?;
                self.download_entry(member, &entry.path_display, "", report, cancel)
                    .await
            }
            ChangeKind::File {
                size,
                modified,
                revision,
            } => {
                if let Some(since) = self.config.since {
                    if *modified < since {
                        self.skip(member, &entry.path_display, SkipReason::OlderThanSince, report);
                        return Ok(());
                    }
                }

                if *size > self.config.max_file_size_bytes {
                    info!(
                        path = %entry.path_display,
                        size,
                        cap = self.config.max_file_size_bytes,
                        "Skipping oversized file"
                    );
                    self.skip(member, &entry.path_display, SkipReason::TooLarge, report);
                    return Ok(());
                }

                self.download_entry(member, &entry.path_display, revision, report, cancel)
                    .await
            }
        }
    }

    async fn remove_entry(
        &self,
        member: &Member,
        path: &str,
        report: &mut MemberReport,
    ) -> Result<()> {
        match self.mirror.remove(&member.id, path).await {
            Ok(removed) => {
                if removed {
                    report.files_removed += 1;
                }
                Ok(())
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                self.entry_failed(member, path, &e.to_string(), report);
                Ok(())
            }
        }
    }

    /// Download one file revision into the mirror with a bounded attempt
    /// budget. Exhausting the budget records a per-entry error; the page
    /// continues.
    async fn download_entry(
        &self,
        member: &Member,
        path: &str,
        revision: &str,
        report: &mut MemberReport,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut last_error = String::new();

        for attempt in 0..self.config.entry_attempts {
            if attempt > 0 {
                let delay = self.config.download_retry.jittered_delay(attempt - 1);
                tokio::select! {
                    _ = cancel.cancelled() => return Err(SyncError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            match self.provider.download(&member.id, path, revision).await {
                Ok(mut stream) => {
                    match self.mirror.write_file(&member.id, path, &mut *stream).await {
                        Ok(bytes) => {
                            report.files_written += 1;
                            report.bytes_written += bytes;
                            debug!(path, bytes, "File mirrored");
                            return Ok(());
                        }
                        Err(e) if e.is_fatal() => return Err(e),
                        Err(e) => {
                            last_error = e.to_string();
                            warn!(path, attempt, error = %last_error, "Mirror write failed");
                        }
                    }
                }
                Err(RemoteError::NotFound(_)) => {
                    // Listed, then vanished before we fetched it. Not a
                    // failure; the next change page will say what happened.
                    self.skip(member, path, SkipReason::Vanished, report);
                    return Ok(());
                }
                Err(e) if e.is_retryable() => {
                    last_error = e.to_string();
                    debug!(path, attempt, error = %last_error, "Download attempt failed");
                }
                Err(e) => {
                    last_error = e.to_string();
                    break;
                }
            }
        }

        self.entry_failed(member, path, &last_error, report);
        Ok(())
    }

    fn skip(&self, member: &Member, path: &str, reason: SkipReason, report: &mut MemberReport) {
        debug!(path, reason = reason.as_str(), "Entry skipped");
        report.entries_skipped += 1;
        self.events
            .emit(SyncEvent::EntrySkipped {
                member_id: member.id.to_string(),
                path: path.to_string(),
                reason,
            })
            .ok();
    }

    fn entry_failed(&self, member: &Member, path: &str, message: &str, report: &mut MemberReport) {
        warn!(path, error = message, "Entry failed permanently; member continues");
        report.entry_errors += 1;
        self.events
            .emit(SyncEvent::EntryFailed {
                member_id: member.id.to_string(),
                path: path.to_string(),
                message: message.to_string(),
            })
            .ok();
    }
}
