//! Integration tests for the backup engine
//!
//! These tests drive the reconciler and orchestrator end to end with
//! scripted providers and mirrors, covering:
//! - Idempotent re-runs against a committed cursor
//! - Cursor durability at page granularity
//! - Deletion, date and size filtering
//! - Throttled page fetches retried against the same cursor
//! - Stored-cursor invalidation and single restart
//! - Fatal out-of-space aborts mid-run

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use core_runtime::config::BackupConfig;
use core_runtime::events::{EventBus, SkipReason, SyncEvent};
use core_sync::{
    CursorStore, MemberOutcome, Mirror, Orchestrator, Reconciler, ReconcilerConfig, Result,
    SqliteCursorStore, SyncError,
};
use remote_traits::{
    ChangeEntry, ChangeKind, Member, MemberId, MemberStatus, RemoteError, RetryPolicy,
    TeamProvider,
};
use sqlx::sqlite::SqlitePoolOptions;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;

const PAYLOAD: &[u8] = b"0123456789";

// ============================================================================
// Mock Implementations
// ============================================================================

/// Provider replaying scripted change pages and download outcomes.
struct ScriptedProvider {
    members: Vec<Member>,
    roster_error: Mutex<Option<RemoteError>>,
    pages: Mutex<HashMap<String, VecDeque<remote_traits::Result<remote_traits::ChangePage>>>>,
    fetch_calls: Mutex<Vec<(String, Option<String>)>>,
    download_calls: Mutex<Vec<(String, String)>>,
    download_errors: Mutex<HashMap<String, VecDeque<RemoteError>>>,
}

impl ScriptedProvider {
    fn new(members: Vec<Member>) -> Self {
        Self {
            members,
            roster_error: Mutex::new(None),
            pages: Mutex::new(HashMap::new()),
            fetch_calls: Mutex::new(Vec::new()),
            download_calls: Mutex::new(Vec::new()),
            download_errors: Mutex::new(HashMap::new()),
        }
    }

    fn fail_roster(&self, error: RemoteError) {
        *self.roster_error.lock().unwrap() = Some(error);
    }

    fn queue_page(
        &self,
        member: &str,
        result: remote_traits::Result<remote_traits::ChangePage>,
    ) {
        self.pages
            .lock()
            .unwrap()
            .entry(member.to_string())
            .or_default()
            .push_back(result);
    }

    fn fail_download(&self, path: &str, error: RemoteError) {
        self.download_errors
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push_back(error);
    }

    fn fetch_calls(&self) -> Vec<(String, Option<String>)> {
        self.fetch_calls.lock().unwrap().clone()
    }

    fn download_calls(&self) -> Vec<(String, String)> {
        self.download_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TeamProvider for ScriptedProvider {
    async fn list_members(&self) -> remote_traits::Result<Vec<Member>> {
        if let Some(error) = self.roster_error.lock().unwrap().take() {
            return Err(error);
        }
        Ok(self.members.clone())
    }

    async fn fetch_changes(
        &self,
        member: &MemberId,
        cursor: Option<&str>,
    ) -> remote_traits::Result<remote_traits::ChangePage> {
        self.fetch_calls
            .lock()
            .unwrap()
            .push((member.to_string(), cursor.map(str::to_string)));

        self.pages
            .lock()
            .unwrap()
            .get_mut(member.as_str())
            .and_then(|queue| queue.pop_front())
            .unwrap_or_else(|| {
                Ok(remote_traits::ChangePage {
                    entries: vec![],
                    cursor: format!("auto-{}", member),
                    has_more: false,
                })
            })
    }

    async fn download(
        &self,
        member: &MemberId,
        path: &str,
        _revision: &str,
    ) -> remote_traits::Result<Box<dyn tokio::io::AsyncRead + Send + Unpin>> {
        if let Some(error) = self
            .download_errors
            .lock()
            .unwrap()
            .get_mut(path)
            .and_then(|queue| queue.pop_front())
        {
            return Err(error);
        }

        self.download_calls
            .lock()
            .unwrap()
            .push((member.to_string(), path.to_string()));
        Ok(Box::new(std::io::Cursor::new(PAYLOAD.to_vec())))
    }
}

/// Mirror recording writes and removes, with an optional write budget
/// after which it reports the destination as full.
#[derive(Default)]
struct RecordingMirror {
    present: Mutex<HashSet<String>>,
    writes: Mutex<Vec<(String, String, u64)>>,
    removes: Mutex<Vec<(String, String)>>,
    write_budget: Mutex<Option<u32>>,
}

impl RecordingMirror {
    fn key(member: &MemberId, path: &str) -> String {
        format!("{}|{}", member, path)
    }

    fn seed(&self, member: &str, path: &str) {
        self.present
            .lock()
            .unwrap()
            .insert(format!("{}|{}", member, path));
    }

    fn quota_after(&self, writes: u32) {
        *self.write_budget.lock().unwrap() = Some(writes);
    }

    fn writes(&self) -> Vec<(String, String, u64)> {
        self.writes.lock().unwrap().clone()
    }

    fn removes(&self) -> Vec<(String, String)> {
        self.removes.lock().unwrap().clone()
    }

    fn contains(&self, member: &str, path: &str) -> bool {
        self.present
            .lock()
            .unwrap()
            .contains(&format!("{}|{}", member, path))
    }
}

#[async_trait]
impl Mirror for RecordingMirror {
    async fn write_file(
        &self,
        member: &MemberId,
        path: &str,
        content: &mut (dyn tokio::io::AsyncRead + Send + Unpin),
    ) -> Result<u64> {
        let mut body = Vec::new();
        content
            .read_to_end(&mut body)
            .await
            .map_err(|e| SyncError::Io(e.to_string()))?;

        {
            let mut budget = self.write_budget.lock().unwrap();
            if let Some(remaining) = budget.as_mut() {
                if *remaining == 0 {
                    return Err(SyncError::QuotaExceeded(path.to_string()));
                }
                *remaining -= 1;
            }
        }

        self.present.lock().unwrap().insert(Self::key(member, path));
        self.writes
            .lock()
            .unwrap()
            .push((member.to_string(), path.to_string(), body.len() as u64));
        Ok(body.len() as u64)
    }

    async fn remove(&self, member: &MemberId, path: &str) -> Result<bool> {
        let removed = self.present.lock().unwrap().remove(&Self::key(member, path));
        self.removes
            .lock()
            .unwrap()
            .push((member.to_string(), path.to_string()));
        Ok(removed)
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn member(id: &str, name: &str) -> Member {
    Member {
        id: MemberId::new(id),
        display_name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase()),
        status: MemberStatus::Active,
    }
}

fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap()
}

fn file(path: &str, size: u64, modified: DateTime<Utc>) -> ChangeEntry {
    ChangeEntry {
        path_display: path.to_string(),
        path_key: path.to_lowercase(),
        kind: ChangeKind::File {
            size,
            modified,
            revision: format!("rev-{}", path.len()),
        },
    }
}

fn deleted(path: &str) -> ChangeEntry {
    ChangeEntry {
        path_display: path.to_string(),
        path_key: path.to_lowercase(),
        kind: ChangeKind::Deleted,
    }
}

fn page(
    entries: Vec<ChangeEntry>,
    cursor: &str,
    has_more: bool,
) -> remote_traits::Result<remote_traits::ChangePage> {
    Ok(remote_traits::ChangePage {
        entries,
        cursor: cursor.to_string(),
        has_more,
    })
}

async fn new_store() -> Arc<SqliteCursorStore> {
    // One connection so every task sees the same in-memory database.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(":memory:")
        .await
        .unwrap();
    let store = SqliteCursorStore::new(pool);
    store.init_schema().await.unwrap();
    Arc::new(store)
}

fn fast_retries() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 5,
        base_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(100),
        jitter: 0.0,
    }
}

struct Harness {
    provider: Arc<ScriptedProvider>,
    store: Arc<SqliteCursorStore>,
    mirror: Arc<RecordingMirror>,
    events: EventBus,
    reconciler: Reconciler,
}

async fn harness(members: Vec<Member>, config: ReconcilerConfig) -> Harness {
    let provider = Arc::new(ScriptedProvider::new(members.clone()));
    let store = new_store().await;
    let mirror = Arc::new(RecordingMirror::default());
    let events = EventBus::new(128);

    for m in &members {
        store.upsert_member(m).await.unwrap();
    }

    let reconciler = Reconciler::new(
        provider.clone(),
        store.clone(),
        mirror.clone(),
        events.clone(),
        config,
    );

    Harness {
        provider,
        store,
        mirror,
        events,
        reconciler,
    }
}

fn test_config() -> ReconcilerConfig {
    ReconcilerConfig {
        page_retry: fast_retries(),
        download_retry: fast_retries(),
        ..ReconcilerConfig::default()
    }
}

// ============================================================================
// Reconciler scenarios
// ============================================================================

#[tokio::test]
async fn test_rerun_with_empty_page_downloads_nothing() {
    let ada = member("dbmid:ada", "Ada");
    let h = harness(vec![ada.clone()], test_config()).await;

    h.store.commit_cursor(&ada.id, "cur-1").await.unwrap();
    h.provider.queue_page("dbmid:ada", page(vec![], "cur-1", false));

    let report = h
        .reconciler
        .sync_member(&ada, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.outcome, MemberOutcome::Committed);
    assert!(h.provider.download_calls().is_empty());
    assert_eq!(
        h.provider.fetch_calls(),
        vec![("dbmid:ada".to_string(), Some("cur-1".to_string()))]
    );

    let state = h.store.member_state(&ada.id).await.unwrap().unwrap();
    assert_eq!(state.cursor.as_deref(), Some("cur-1"));
    assert!(state.last_synced_at.is_some());
}

#[tokio::test]
async fn test_cursor_advances_only_past_settled_pages() {
    let ada = member("dbmid:ada", "Ada");
    let mut config = test_config();
    config.entry_attempts = 2;
    let h = harness(vec![ada.clone()], config).await;

    h.provider.queue_page(
        "dbmid:ada",
        page(vec![file("/a.txt", 10, at(2026, 8, 1))], "cur-1", true),
    );
    h.provider.queue_page(
        "dbmid:ada",
        page(vec![file("/b.txt", 10, at(2026, 8, 1))], "cur-2", false),
    );
    // /b.txt is rejected outright, so its entry settles as a permanent
    // per-entry error rather than something pending retry.
    h.provider.fail_download(
        "/b.txt",
        RemoteError::Api {
            status: 403,
            message: "no access".to_string(),
        },
    );

    let report = h
        .reconciler
        .sync_member(&ada, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.outcome, MemberOutcome::Committed);
    assert_eq!(report.pages_committed, 2);
    assert_eq!(report.files_written, 1);
    assert_eq!(report.entry_errors, 1);

    let state = h.store.member_state(&ada.id).await.unwrap().unwrap();
    assert_eq!(state.cursor.as_deref(), Some("cur-2"));
}

#[tokio::test]
async fn test_deletions_bypass_date_and_size_filters() {
    let ada = member("dbmid:ada", "Ada");
    let mut config = test_config();
    config.since = Some(at(2026, 1, 1));
    config.max_file_size_bytes = 1024;
    let h = harness(vec![ada.clone()], config).await;

    h.mirror.seed("dbmid:ada", "/Old/gone.txt");
    h.provider.queue_page(
        "dbmid:ada",
        page(
            vec![
                deleted("/Old/gone.txt"),
                file("/huge.iso", 10 * 1024, at(2026, 8, 1)),
                file("/ancient.txt", 10, at(2020, 1, 1)),
            ],
            "cur-1",
            false,
        ),
    );

    let report = h
        .reconciler
        .sync_member(&ada, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.outcome, MemberOutcome::Committed);
    assert_eq!(report.files_removed, 1);
    assert_eq!(report.entries_skipped, 2);
    assert_eq!(report.entry_errors, 0);
    assert!(h.mirror.writes().is_empty());
    assert!(!h.mirror.contains("dbmid:ada", "/Old/gone.txt"));
}

#[tokio::test]
async fn test_policy_skips_emit_events_without_errors() {
    let ada = member("dbmid:ada", "Ada");
    let mut config = test_config();
    config.since = Some(at(2026, 1, 1));
    config.max_file_size_bytes = 100;
    let h = harness(vec![ada.clone()], config).await;
    let mut events = h.events.subscribe();

    h.provider.queue_page(
        "dbmid:ada",
        page(
            vec![
                file("/old.txt", 10, at(2025, 6, 1)),
                file("/big.bin", 500, at(2026, 8, 1)),
            ],
            "cur-1",
            false,
        ),
    );

    let report = h
        .reconciler
        .sync_member(&ada, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.outcome, MemberOutcome::Committed);
    assert_eq!(report.entries_skipped, 2);
    assert_eq!(report.entry_errors, 0);
    assert!(h.mirror.writes().is_empty());

    let mut reasons = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let SyncEvent::EntrySkipped { reason, .. } = event {
            reasons.push(reason);
        }
    }
    assert_eq!(reasons, vec![SkipReason::OlderThanSince, SkipReason::TooLarge]);
}

#[tokio::test]
async fn test_fresh_member_initial_listing() {
    let ada = member("dbmid:ada", "Ada");
    let h = harness(vec![ada.clone()], test_config()).await;

    h.provider.queue_page(
        "dbmid:ada",
        page(
            vec![
                file("/Docs/plan.md", 10, at(2026, 8, 1)),
                file("/Docs/budget.xlsx", 20, at(2026, 8, 2)),
                deleted("/never-mirrored.txt"),
            ],
            "cur-initial",
            false,
        ),
    );

    let report = h
        .reconciler
        .sync_member(&ada, &CancellationToken::new())
        .await
        .unwrap();

    // First fetch must start from scratch.
    assert_eq!(h.provider.fetch_calls()[0].1, None);
    assert_eq!(report.files_written, 2);
    assert_eq!(report.files_removed, 0);
    assert_eq!(report.bytes_written, 2 * PAYLOAD.len() as u64);

    let state = h.store.member_state(&ada.id).await.unwrap().unwrap();
    assert_eq!(state.cursor.as_deref(), Some("cur-initial"));
}

// These timing-sensitive scenarios run on the real clock; a paused clock
// auto-advances past the sqlite pool's acquire timeout while the
// connection opens, so the harness would never come up. The retry
// policies are fast enough for real sleeps.
#[tokio::test]
async fn test_throttled_page_fetch_retries_same_cursor() {
    let ada = member("dbmid:ada", "Ada");
    let h = harness(vec![ada.clone()], test_config()).await;

    h.provider.queue_page(
        "dbmid:ada",
        Err(RemoteError::RateLimited {
            retry_after: Some(Duration::from_millis(20)),
        }),
    );
    h.provider
        .queue_page("dbmid:ada", Err(RemoteError::RateLimited { retry_after: None }));
    h.provider.queue_page(
        "dbmid:ada",
        page(vec![file("/a.txt", 10, at(2026, 8, 1))], "cur-1", false),
    );

    let report = h
        .reconciler
        .sync_member(&ada, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.outcome, MemberOutcome::Committed);

    // Three fetches, all against the same (absent) cursor.
    let calls = h.provider.fetch_calls();
    assert_eq!(calls.len(), 3);
    assert!(calls.iter().all(|(_, cursor)| cursor.is_none()));

    // The page's entries were applied exactly once.
    assert_eq!(h.provider.download_calls().len(), 1);
    assert_eq!(report.files_written, 1);
}

#[tokio::test]
async fn test_invalid_cursor_restarts_member_once() {
    let ada = member("dbmid:ada", "Ada");
    let h = harness(vec![ada.clone()], test_config()).await;

    h.store.commit_cursor(&ada.id, "stale").await.unwrap();
    h.mirror.seed("dbmid:ada", "/untouched.txt");
    h.mirror.seed("dbmid:bob", "/other-member.txt");

    h.provider
        .queue_page("dbmid:ada", Err(RemoteError::InvalidCursor("expired".to_string())));
    h.provider.queue_page(
        "dbmid:ada",
        page(vec![file("/a.txt", 10, at(2026, 8, 1))], "cur-new", false),
    );

    let report = h
        .reconciler
        .sync_member(&ada, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.outcome, MemberOutcome::Committed);
    assert_eq!(
        h.provider.fetch_calls(),
        vec![
            ("dbmid:ada".to_string(), Some("stale".to_string())),
            ("dbmid:ada".to_string(), None),
        ]
    );

    // The restarted full listing re-downloads; it never blanket-deletes.
    assert!(h.mirror.removes().is_empty());
    assert!(h.mirror.contains("dbmid:ada", "/untouched.txt"));
    assert!(h.mirror.contains("dbmid:bob", "/other-member.txt"));

    let state = h.store.member_state(&ada.id).await.unwrap().unwrap();
    assert_eq!(state.cursor.as_deref(), Some("cur-new"));
}

#[tokio::test]
async fn test_repeated_invalid_cursor_fails_member() {
    let ada = member("dbmid:ada", "Ada");
    let h = harness(vec![ada.clone()], test_config()).await;

    h.store.commit_cursor(&ada.id, "stale").await.unwrap();
    h.provider
        .queue_page("dbmid:ada", Err(RemoteError::InvalidCursor("expired".to_string())));
    h.provider
        .queue_page("dbmid:ada", Err(RemoteError::InvalidCursor("still bad".to_string())));

    let report = h
        .reconciler
        .sync_member(&ada, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.outcome, MemberOutcome::Failed);
    assert_eq!(h.provider.fetch_calls().len(), 2);

    let state = h.store.member_state(&ada.id).await.unwrap().unwrap();
    assert!(state.last_error.is_some());
}

#[tokio::test]
async fn test_vanished_file_skipped_not_failed() {
    let ada = member("dbmid:ada", "Ada");
    let h = harness(vec![ada.clone()], test_config()).await;

    h.provider.queue_page(
        "dbmid:ada",
        page(vec![file("/ghost.txt", 10, at(2026, 8, 1))], "cur-1", false),
    );
    h.provider
        .fail_download("/ghost.txt", RemoteError::NotFound("/ghost.txt".to_string()));

    let report = h
        .reconciler
        .sync_member(&ada, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.outcome, MemberOutcome::Committed);
    assert_eq!(report.entries_skipped, 1);
    assert_eq!(report.entry_errors, 0);
    assert!(h.mirror.writes().is_empty());
}

#[tokio::test]
async fn test_transient_download_retried_within_budget() {
    let ada = member("dbmid:ada", "Ada");
    let h = harness(vec![ada.clone()], test_config()).await;

    h.provider.queue_page(
        "dbmid:ada",
        page(vec![file("/flaky.txt", 10, at(2026, 8, 1))], "cur-1", false),
    );
    h.provider
        .fail_download("/flaky.txt", RemoteError::Transient("reset".to_string()));
    h.provider
        .fail_download("/flaky.txt", RemoteError::Transient("reset again".to_string()));

    let report = h
        .reconciler
        .sync_member(&ada, &CancellationToken::new())
        .await
        .unwrap();

    // Third attempt succeeds within the default budget of 3.
    assert_eq!(report.outcome, MemberOutcome::Committed);
    assert_eq!(report.files_written, 1);
    assert_eq!(report.entry_errors, 0);
}

// ============================================================================
// Orchestrator scenarios
// ============================================================================

fn run_config(workers: usize) -> BackupConfig {
    BackupConfig::builder()
        .token("test-token")
        .out_root("/unused/mock-mirror")
        .workers(workers)
        .page_retry(fast_retries())
        .download_retry(fast_retries())
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_quota_abort_stops_dispatching_members() {
    let members: Vec<Member> = (1..=8)
        .map(|i| member(&format!("dbmid:m{}", i), &format!("M{}", i)))
        .collect();

    let provider = Arc::new(ScriptedProvider::new(members.clone()));
    let store = new_store().await;
    let mirror = Arc::new(RecordingMirror::default());

    for m in &members {
        provider.queue_page(
            m.id.as_str(),
            page(
                vec![file(&format!("/{}.txt", m.id), 10, at(2026, 8, 1))],
                &format!("cur-{}", m.id),
                false,
            ),
        );
    }
    // The fifth write hits a full disk.
    mirror.quota_after(4);

    let orchestrator = Orchestrator::new(
        provider.clone(),
        store.clone(),
        mirror.clone(),
        EventBus::new(128),
        run_config(1),
    );
    let report = orchestrator.run().await;

    assert!(report.is_fatal());
    assert!(report.fatal_error.as_deref().unwrap().contains("out of space"));

    // Members 1 through 4 committed before the abort.
    assert_eq!(report.members_attempted(), 4);
    assert_eq!(report.members_committed(), 4);

    // Member 5's page was fetched but its cursor never committed.
    let m5 = MemberId::new("dbmid:m5");
    let state = store.member_state(&m5).await.unwrap().unwrap();
    assert!(state.cursor.is_none());

    // Members 6 through 8 were never dispatched.
    let fetched: HashSet<String> = provider
        .fetch_calls()
        .into_iter()
        .map(|(member, _)| member)
        .collect();
    assert_eq!(fetched.len(), 5);
    assert!(!fetched.contains("dbmid:m6"));
    assert!(!fetched.contains("dbmid:m7"));
    assert!(!fetched.contains("dbmid:m8"));
}

#[tokio::test]
async fn test_unreachable_directory_is_fatal() {
    let provider = Arc::new(ScriptedProvider::new(vec![]));
    provider.fail_roster(RemoteError::DirectoryUnavailable("401 invalid token".to_string()));

    let orchestrator = Orchestrator::new(
        provider,
        new_store().await,
        Arc::new(RecordingMirror::default()),
        EventBus::new(128),
        run_config(4),
    );
    let report = orchestrator.run().await;

    assert!(report.is_fatal());
    assert_eq!(report.members_attempted(), 0);
}

#[tokio::test]
async fn test_member_failure_does_not_stop_others() {
    let ada = member("dbmid:ada", "Ada");
    let bob = member("dbmid:bob", "Bob");

    let provider = Arc::new(ScriptedProvider::new(vec![ada.clone(), bob.clone()]));
    let store = new_store().await;
    let mirror = Arc::new(RecordingMirror::default());

    // Ada's feed is rejected outright; Bob syncs normally.
    provider.queue_page(
        "dbmid:ada",
        Err(RemoteError::Api {
            status: 400,
            message: "malformed".to_string(),
        }),
    );
    provider.queue_page(
        "dbmid:bob",
        page(vec![file("/b.txt", 10, at(2026, 8, 1))], "cur-b", false),
    );

    let orchestrator = Orchestrator::new(
        provider,
        store.clone(),
        mirror,
        EventBus::new(128),
        run_config(1),
    );
    let report = orchestrator.run().await;

    assert!(!report.is_fatal());
    assert_eq!(report.members_attempted(), 2);
    assert_eq!(report.members_committed(), 1);
    assert_eq!(report.members_failed(), 1);

    let bob_state = store.member_state(&bob.id).await.unwrap().unwrap();
    assert_eq!(bob_state.cursor.as_deref(), Some("cur-b"));
}

#[tokio::test]
async fn test_cancellation_before_dispatch_skips_members() {
    let members: Vec<Member> = (1..=3)
        .map(|i| member(&format!("dbmid:m{}", i), &format!("M{}", i)))
        .collect();
    let provider = Arc::new(ScriptedProvider::new(members));

    let orchestrator = Orchestrator::new(
        provider.clone(),
        new_store().await,
        Arc::new(RecordingMirror::default()),
        EventBus::new(128),
        run_config(2),
    );
    orchestrator.cancellation_token().cancel();

    let report = orchestrator.run().await;

    assert!(!report.is_fatal());
    assert_eq!(report.members_attempted(), 0);
    assert!(provider.fetch_calls().is_empty());
}
