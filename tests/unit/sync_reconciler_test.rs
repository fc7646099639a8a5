//! Unit tests for the sync reconciler: remote classification, startup states,
//! debounced autosave, conflict resolution and manual operations.

#[path = "../common/mocks.rs"]
mod mocks;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use rstest::rstest;

use mocks::{auth_manager, MockEndpoint, MockStore};
use promptbook::database::KeyValueStore;
use promptbook::services::remote_backup::{parse_backup, RemoteBackupClient};
use promptbook::services::sync_reconciler::{classify_remote, SyncReconciler, LAST_LOCAL_SYNC_KEY};
use promptbook::types::errors::SyncError;
use promptbook::types::library::{BackupData, Library};
use promptbook::types::prompt::Prompt;
use promptbook::types::settings::{SyncSettings, DEFAULT_BACKUP_FILENAME};
use promptbook::types::sync::{ConflictChoice, DisabledReason, RemoteStatus, SyncState};

struct Harness {
    store: Arc<MockStore>,
    ledger: KeyValueStore,
    sync: SyncReconciler,
}

fn harness_with(signed_in: bool, configured: bool) -> Harness {
    let store = Arc::new(MockStore::new());
    let (db, auth) = auth_manager(Arc::new(MockEndpoint::new()), signed_in);
    let client = Arc::new(RemoteBackupClient::new(store.clone(), auth, DEFAULT_BACKUP_FILENAME));
    let ledger = KeyValueStore::new(db);
    let sync = SyncReconciler::new(client, ledger.clone(), &SyncSettings::default(), configured);
    Harness { store, ledger, sync }
}

fn harness() -> Harness {
    harness_with(true, true)
}

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

fn snapshot(titles: &[&str]) -> BackupData {
    let mut library = Library::seeded();
    for (i, title) in titles.iter().enumerate() {
        library.prompts.push(Prompt::new(format!("p{}", i), *title));
    }
    library.to_backup(Utc::now())
}

fn seed_remote(h: &Harness, data: &BackupData, modified: DateTime<Utc>) {
    h.store.put("remote-1", DEFAULT_BACKUP_FILENAME, &data.to_json_pretty().unwrap(), Some(modified));
}

fn record_sync(h: &Harness, when: DateTime<Utc>) {
    h.ledger.set(LAST_LOCAL_SYNC_KEY, &when.to_rfc3339()).unwrap();
}

// ─── Classification ───

#[rstest]
#[case::absent(None, Some(0), RemoteStatus::Absent)]
#[case::absent_never_synced(None, None, RemoteStatus::Absent)]
#[case::never_synced(Some(0), None, RemoteStatus::Newer)]
#[case::equal(Some(0), Some(0), RemoteStatus::NotNewer)]
#[case::older(Some(-60_000), Some(0), RemoteStatus::NotNewer)]
#[case::within_tolerance(Some(1_000), Some(0), RemoteStatus::NotNewer)]
#[case::at_tolerance(Some(2_000), Some(0), RemoteStatus::NotNewer)]
#[case::beyond_tolerance(Some(2_001), Some(0), RemoteStatus::Newer)]
#[case::clearly_newer(Some(5_000), Some(0), RemoteStatus::Newer)]
fn test_classify_remote(
    #[case] remote_offset_ms: Option<i64>,
    #[case] local_offset_ms: Option<i64>,
    #[case] expected: RemoteStatus,
) {
    let base = at(0);
    let remote = remote_offset_ms.map(|ms| base + ChronoDuration::milliseconds(ms));
    let local = local_offset_ms.map(|ms| base + ChronoDuration::milliseconds(ms));
    assert_eq!(classify_remote(remote, local, 2_000), expected);
}

// ─── Startup ───

#[tokio::test]
async fn test_start_unconfigured_is_disconnected() {
    let h = harness_with(true, false);
    assert_eq!(h.sync.start().await, SyncState::Disconnected);
    assert!(!h.sync.status().configured);
    assert_eq!(h.store.lists.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_start_signed_out_is_disconnected() {
    let h = harness_with(false, true);
    assert_eq!(h.sync.start().await, SyncState::Disconnected);
    assert!(!h.sync.status().signed_in);
}

#[tokio::test]
async fn test_start_without_remote_enables_sync() {
    let h = harness();
    assert_eq!(h.sync.start().await, SyncState::SyncEnabled);
    assert_eq!(h.sync.state(), SyncState::SyncEnabled);
}

#[tokio::test]
async fn test_start_never_synced_with_remote_suspends_autosave() {
    let h = harness();
    seed_remote(&h, &snapshot(&["remote"]), at(0));
    assert_eq!(
        h.sync.start().await,
        SyncState::SyncDisabled(DisabledReason::RemoteNewer { remote_modified: at(0) })
    );
}

#[tokio::test]
async fn test_start_remote_within_skew_enables_sync() {
    let h = harness();
    record_sync(&h, at(0));
    seed_remote(&h, &snapshot(&["remote"]), at(0) + ChronoDuration::milliseconds(1_000));
    assert_eq!(h.sync.start().await, SyncState::SyncEnabled);
}

#[tokio::test]
async fn test_start_remote_newer_suspends_autosave() {
    let h = harness();
    record_sync(&h, at(0));
    let remote_modified = at(0) + ChronoDuration::milliseconds(5_000);
    seed_remote(&h, &snapshot(&["remote"]), remote_modified);
    assert_eq!(
        h.sync.start().await,
        SyncState::SyncDisabled(DisabledReason::RemoteNewer { remote_modified })
    );
}

#[tokio::test]
async fn test_start_check_failure_suspends_autosave() {
    let h = harness();
    h.store.fail(SyncError::RemoteUnavailable("HTTP 503".to_string()));
    let state = h.sync.start().await;
    assert!(matches!(state, SyncState::SyncDisabled(DisabledReason::CheckFailed { .. })));
    assert!(h.sync.status().last_error.is_some());
}

#[tokio::test]
async fn test_start_rejected_session_disconnects() {
    let h = harness();
    h.store.fail(SyncError::AuthRequired);
    assert_eq!(h.sync.start().await, SyncState::Disconnected);
}

// ─── Debounced autosave ───

#[tokio::test(start_paused = true)]
async fn test_burst_of_changes_uploads_last_snapshot_once() {
    let h = harness();
    h.sync.start().await;

    h.sync.notify_changed(snapshot(&["a"]));
    h.sync.notify_changed(snapshot(&["a", "b"]));
    h.sync.notify_changed(snapshot(&["a", "b", "c"]));
    assert!(h.sync.status().unsynced_changes);

    tokio::time::sleep(Duration::from_millis(2_500)).await;

    assert_eq!(h.store.writes(), 1);
    let uploaded = parse_backup(&h.store.content_of(DEFAULT_BACKUP_FILENAME).unwrap()).unwrap();
    assert_eq!(uploaded.prompts.len(), 3);
    assert!(!h.sync.status().unsynced_changes);
    assert!(h.sync.last_local_sync().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_each_change_restarts_the_window() {
    let h = harness();
    h.sync.start().await;

    h.sync.notify_changed(snapshot(&["a"]));
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    h.sync.notify_changed(snapshot(&["a", "b"]));
    tokio::time::sleep(Duration::from_millis(1_000)).await;
    assert_eq!(h.store.writes(), 0);

    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert_eq!(h.store.writes(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_separate_bursts_upload_separately() {
    let h = harness();
    h.sync.start().await;

    h.sync.notify_changed(snapshot(&["a"]));
    tokio::time::sleep(Duration::from_secs(3)).await;
    h.sync.notify_changed(snapshot(&["a", "b"]));
    tokio::time::sleep(Duration::from_secs(3)).await;

    assert_eq!(h.store.creates.load(Ordering::SeqCst), 1);
    assert_eq!(h.store.updates.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_changes_while_disabled_do_not_upload() {
    let h = harness();
    seed_remote(&h, &snapshot(&["remote"]), at(0));
    h.sync.start().await;

    h.sync.notify_changed(snapshot(&["local"]));
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(h.store.writes(), 0);
    assert!(h.sync.status().unsynced_changes);
}

#[tokio::test(start_paused = true)]
async fn test_changes_while_disconnected_do_not_upload() {
    let h = harness_with(false, true);
    h.sync.start().await;

    h.sync.notify_changed(snapshot(&["local"]));
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(h.store.writes(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_autosave_rejected_session_disconnects() {
    let h = harness();
    h.sync.start().await;
    h.store.fail(SyncError::AuthRequired);

    h.sync.notify_changed(snapshot(&["a"]));
    tokio::time::sleep(Duration::from_secs(3)).await;

    assert_eq!(h.sync.state(), SyncState::Disconnected);
    assert!(h.sync.status().last_error.is_some());
    assert!(h.sync.status().unsynced_changes);
}

#[tokio::test(start_paused = true)]
async fn test_autosave_transient_failure_stays_enabled() {
    let h = harness();
    h.sync.start().await;
    h.store.fail(SyncError::RemoteUnavailable("offline".to_string()));

    h.sync.notify_changed(snapshot(&["a"]));
    tokio::time::sleep(Duration::from_secs(3)).await;

    assert_eq!(h.sync.state(), SyncState::SyncEnabled);
    assert!(h.sync.status().unsynced_changes);
}

#[tokio::test(start_paused = true)]
async fn test_sign_out_cancels_pending_autosave() {
    let h = harness();
    h.sync.start().await;

    h.sync.notify_changed(snapshot(&["a"]));
    h.sync.sign_out().await.unwrap();
    tokio::time::sleep(Duration::from_secs(3)).await;

    assert_eq!(h.store.writes(), 0);
    assert_eq!(h.sync.state(), SyncState::Disconnected);
    assert!(!h.sync.status().signed_in);
}

// ─── Conflict resolution ───

#[tokio::test(start_paused = true)]
async fn test_keep_local_enables_autosave_over_remote() {
    let h = harness();
    seed_remote(&h, &snapshot(&["remote"]), at(0));
    h.sync.start().await;

    assert_eq!(h.sync.resolve(ConflictChoice::KeepLocal).await.unwrap(), None);
    assert_eq!(h.sync.state(), SyncState::SyncEnabled);

    h.sync.notify_changed(snapshot(&["local", "more"]));
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(h.store.updates.load(Ordering::SeqCst), 1);
    let uploaded = parse_backup(&h.store.content_of(DEFAULT_BACKUP_FILENAME).unwrap()).unwrap();
    assert_eq!(uploaded.prompts[0].title, "local");
}

#[tokio::test]
async fn test_load_remote_returns_data_and_records_sync_time() {
    let h = harness();
    let remote = snapshot(&["r1", "r2"]);
    seed_remote(&h, &remote, at(0));
    h.sync.start().await;

    let loaded = h.sync.resolve(ConflictChoice::LoadRemote).await.unwrap().unwrap();
    assert_eq!(loaded, remote);
    assert_eq!(h.sync.state(), SyncState::SyncEnabled);
    assert_eq!(h.sync.last_local_sync(), Some(at(0)));

    // Next startup finds nothing newer.
    assert_eq!(h.sync.start().await, SyncState::SyncEnabled);
}

#[tokio::test]
async fn test_load_remote_failure_keeps_state() {
    let h = harness();
    seed_remote(&h, &snapshot(&["r"]), at(0));
    h.sync.start().await;
    h.store.fail(SyncError::RemoteUnavailable("offline".to_string()));

    assert!(h.sync.resolve(ConflictChoice::LoadRemote).await.is_err());
    assert!(matches!(h.sync.state(), SyncState::SyncDisabled(_)));
    assert_eq!(h.sync.last_local_sync(), None);
}

// ─── Manual operations ───

#[tokio::test]
async fn test_upload_now_settles_conflict_and_records_time() {
    let h = harness();
    seed_remote(&h, &snapshot(&["remote"]), at(0));
    h.sync.start().await;
    *h.store.clock.lock().unwrap() = at(100);

    let modified = h.sync.upload_now(&snapshot(&["local"])).await.unwrap();

    assert_eq!(modified, at(100));
    assert_eq!(h.sync.state(), SyncState::SyncEnabled);
    assert_eq!(h.sync.last_local_sync(), Some(at(100)));
}

#[tokio::test]
async fn test_uploaded_backup_is_not_newer_on_next_start() {
    let h = harness();
    h.sync.start().await;
    h.sync.upload_now(&snapshot(&["a"])).await.unwrap();

    assert_eq!(h.sync.start().await, SyncState::SyncEnabled);

    // Another device writes later.
    let later = h.sync.last_local_sync().unwrap() + ChronoDuration::hours(1);
    *h.store.clock.lock().unwrap() = later;
    h.store.objects.lock().unwrap()[0].meta.modified_time = Some(later);
    assert!(matches!(h.sync.start().await, SyncState::SyncDisabled(_)));
}

#[tokio::test]
async fn test_download_now_changes_nothing_until_confirmed() {
    let h = harness();
    let remote = snapshot(&["r"]);
    seed_remote(&h, &remote, at(0));
    h.sync.start().await;

    let downloaded = h.sync.download_now().await.unwrap();
    assert_eq!(downloaded.data, remote);
    assert_eq!(h.sync.last_local_sync(), None);
    assert!(matches!(h.sync.state(), SyncState::SyncDisabled(_)));

    h.sync.confirm_restore(&downloaded);
    assert_eq!(h.sync.last_local_sync(), Some(at(0)));
    assert_eq!(h.sync.state(), SyncState::SyncEnabled);
}

#[tokio::test(start_paused = true)]
async fn test_confirmed_restore_drops_pending_autosave() {
    let h = harness();
    h.sync.start().await;
    h.sync.notify_changed(snapshot(&["stale-local"]));

    seed_remote(&h, &snapshot(&["r1", "r2"]), at(0));
    let downloaded = h.sync.download_now().await.unwrap();
    h.sync.confirm_restore(&downloaded);
    tokio::time::sleep(Duration::from_millis(2500)).await;

    assert_eq!(h.store.writes(), 0);
    let remote = parse_backup(&h.store.content_of(DEFAULT_BACKUP_FILENAME).unwrap()).unwrap();
    assert_eq!(remote.prompts.len(), 2);
    assert_eq!(h.sync.state(), SyncState::SyncEnabled);
    assert!(!h.sync.status().unsynced_changes);
}

#[tokio::test(start_paused = true)]
async fn test_load_remote_drops_autosave_scheduled_before_conflict() {
    let h = harness();
    h.sync.start().await;
    h.sync.notify_changed(snapshot(&["stale-local"]));

    seed_remote(&h, &snapshot(&["r1", "r2"]), at(0));
    h.sync.resolve(ConflictChoice::LoadRemote).await.unwrap();
    tokio::time::sleep(Duration::from_millis(2500)).await;

    assert_eq!(h.store.writes(), 0);
}

#[tokio::test]
async fn test_download_now_without_backup() {
    let h = harness();
    h.sync.start().await;
    assert_eq!(h.sync.download_now().await.unwrap_err(), SyncError::BackupNotFound);
}

#[tokio::test]
async fn test_upload_now_signed_out_requires_auth() {
    let h = harness_with(false, true);
    assert_eq!(
        h.sync.upload_now(&snapshot(&["a"])).await.unwrap_err(),
        SyncError::AuthRequired
    );
    assert_eq!(h.sync.state(), SyncState::Disconnected);
}

#[tokio::test]
async fn test_connect_runs_startup_check() {
    let h = harness_with(false, true);
    assert_eq!(h.sync.connect("code-1").await.unwrap(), SyncState::SyncEnabled);
    assert!(h.sync.status().signed_in);
}

#[tokio::test]
async fn test_connect_unconfigured_is_rejected() {
    let h = harness_with(false, false);
    assert_eq!(h.sync.connect("code-1").await.unwrap_err(), SyncError::AuthRequired);
}
