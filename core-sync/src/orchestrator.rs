//! # Run Orchestrator
//!
//! Drives a whole backup run: reconcile the roster, then dispatch one
//! pipeline per active member with bounded concurrency.
//!
//! ## Overview
//!
//! Each member is synced by exactly one task; cross-member concurrency is
//! capped by a semaphore sized from the config. Member failures are
//! isolated. A fatal error (out of disk space) or external cancellation
//! flips the shared token: members not yet started are never dispatched,
//! and in-flight pipelines stop at their next page boundary without
//! committing a partial page.
//!
//! The run itself never returns an error; fatal aborts are recorded in the
//! [`RunReport`] so the caller can both inspect partial progress and map
//! the abort to an exit code.

use crate::{
    reconcile_roster, CursorStore, MemberReport, Mirror, Reconciler, ReconcilerConfig, Result,
    RunReport,
};
use core_runtime::config::BackupConfig;
use core_runtime::events::{EventBus, SyncEvent};
use remote_traits::TeamProvider;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

/// Orchestrates one backup run end to end.
pub struct Orchestrator {
    provider: Arc<dyn TeamProvider>,
    store: Arc<dyn CursorStore>,
    mirror: Arc<dyn Mirror>,
    events: EventBus,
    config: BackupConfig,
    cancel: CancellationToken,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn TeamProvider>,
        store: Arc<dyn CursorStore>,
        mirror: Arc<dyn Mirror>,
        events: EventBus,
        config: BackupConfig,
    ) -> Self {
        Self {
            provider,
            store,
            mirror,
            events,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Token observed by every pipeline; cancel it to wind the run down at
    /// the next page boundary.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Execute the run and report what happened.
    ///
    /// Startup failures (unreachable directory, broken state database) and
    /// fatal mid-run errors land in [`RunReport::fatal_error`]; per-member
    /// and per-entry failures only show up in the member records.
    #[instrument(skip(self))]
    pub async fn run(&self) -> RunReport {
        let started = Instant::now();
        let mut report = RunReport::new();

        let members =
            match reconcile_roster(self.provider.as_ref(), self.store.as_ref()).await {
                Ok(members) => members,
                Err(e) => {
                    error!(error = %e, "Run aborted before member dispatch");
                    report.fatal_error = Some(e.to_string());
                    report.duration = started.elapsed();
                    return report;
                }
            };

        self.events
            .emit(SyncEvent::RunStarted {
                member_count: members.len(),
            })
            .ok();
        info!(
            members = members.len(),
            workers = self.config.workers,
            "Dispatching member pipelines"
        );

        let reconciler = Arc::new(Reconciler::new(
            self.provider.clone(),
            self.store.clone(),
            self.mirror.clone(),
            self.events.clone(),
            ReconcilerConfig::from(&self.config),
        ));

        let semaphore = Arc::new(Semaphore::new(self.config.workers));
        let mut tasks: JoinSet<Option<Result<MemberReport>>> = JoinSet::new();

        for member in members {
            let reconciler = reconciler.clone();
            let semaphore = semaphore.clone();
            let cancel = self.cancel.clone();

            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return None;
                };
                // A fatal abort or Ctrl-C between spawn and permit means
                // this member is never dispatched at all.
                if cancel.is_cancelled() {
                    return None;
                }
                let result = reconciler.sync_member(&member, &cancel).await;
                // Flip the token before this permit is released, so queued
                // members cannot slip through between a fatal failure and
                // the join loop observing it.
                if matches!(&result, Err(e) if e.is_fatal()) {
                    cancel.cancel();
                }
                Some(result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some(Ok(member_report))) => report.members.push(member_report),
                Ok(Some(Err(e))) => {
                    error!(error = %e, "Fatal error; aborting run");
                    report.fatal_error.get_or_insert_with(|| e.to_string());
                    self.cancel.cancel();
                }
                Ok(None) => {}
                Err(join_error) => {
                    error!(error = %join_error, "Member task aborted unexpectedly");
                    report
                        .fatal_error
                        .get_or_insert_with(|| join_error.to_string());
                    self.cancel.cancel();
                }
            }
        }

        report.duration = started.elapsed();
        self.events
            .emit(SyncEvent::RunCompleted {
                members_committed: report.members_committed(),
                members_failed: report.members_failed(),
                duration_secs: report.duration.as_secs(),
            })
            .ok();
        info!(
            attempted = report.members_attempted(),
            committed = report.members_committed(),
            failed = report.members_failed(),
            files = report.files_written(),
            "Backup run completed"
        );

        report
    }
}
