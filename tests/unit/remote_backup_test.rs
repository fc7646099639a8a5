//! Unit tests for the remote backup client against in-memory storage.

#[path = "../common/mocks.rs"]
mod mocks;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};

use mocks::{auth_manager, MockEndpoint, MockStore};
use promptbook::services::remote_backup::{parse_backup, RemoteBackupClient};
use promptbook::types::errors::SyncError;
use promptbook::types::library::{BackupData, Library};
use promptbook::types::settings::DEFAULT_BACKUP_FILENAME;
use promptbook::types::prompt::Prompt;

fn client(store: Arc<MockStore>, signed_in: bool) -> RemoteBackupClient {
    let (_db, auth) = auth_manager(Arc::new(MockEndpoint::new()), signed_in);
    RemoteBackupClient::new(store, auth, DEFAULT_BACKUP_FILENAME)
}

fn snapshot(titles: &[&str]) -> BackupData {
    let mut library = Library::seeded();
    for (i, title) in titles.iter().enumerate() {
        library.prompts.push(Prompt::new(format!("p{}", i), *title));
    }
    library.to_backup(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap())
}

#[tokio::test]
async fn test_first_upload_creates_then_overwrites_in_place() {
    let store = Arc::new(MockStore::new());
    let client = client(store.clone(), true);

    client.upload(&snapshot(&["one"])).await.unwrap();
    client.upload(&snapshot(&["one", "two"])).await.unwrap();

    assert_eq!(store.creates.load(Ordering::SeqCst), 1);
    assert_eq!(store.updates.load(Ordering::SeqCst), 1);
    assert_eq!(store.objects.lock().unwrap().len(), 1);

    let content = store.content_of(DEFAULT_BACKUP_FILENAME).unwrap();
    assert_eq!(parse_backup(&content).unwrap().prompts.len(), 2);
}

#[tokio::test]
async fn test_upload_returns_server_modified_time() {
    let store = Arc::new(MockStore::new());
    let stamp = Utc.with_ymd_and_hms(2024, 5, 5, 5, 5, 5).unwrap();
    *store.clock.lock().unwrap() = stamp;
    let client = client(store, true);

    assert_eq!(client.upload(&snapshot(&["a"])).await.unwrap(), stamp);
}

#[tokio::test]
async fn test_upload_writes_pretty_json_document() {
    let store = Arc::new(MockStore::new());
    let client = client(store.clone(), true);
    client.upload(&snapshot(&["a"])).await.unwrap();

    let text = String::from_utf8(store.content_of(DEFAULT_BACKUP_FILENAME).unwrap()).unwrap();
    assert!(text.contains("\n  \"prompts\""));
    assert!(text.contains("\"lastUpdated\""));
}

#[tokio::test]
async fn test_download_round_trips_data_and_modified_time() {
    let store = Arc::new(MockStore::new());
    let client = client(store.clone(), true);
    let data = snapshot(&["a", "b"]);
    let modified = client.upload(&data).await.unwrap();

    let remote = client.download().await.unwrap();
    assert_eq!(remote.data, data);
    assert_eq!(remote.modified_time, modified);
}

#[tokio::test]
async fn test_download_without_backup_is_not_found() {
    let client = client(Arc::new(MockStore::new()), true);
    assert_eq!(client.download().await.unwrap_err(), SyncError::BackupNotFound);
}

#[tokio::test]
async fn test_download_of_garbage_is_corrupt() {
    let store = Arc::new(MockStore::new());
    store.put("f1", DEFAULT_BACKUP_FILENAME, b"<html>not json</html>", Some(Utc::now()));
    let client = client(store, true);

    assert!(matches!(client.download().await.unwrap_err(), SyncError::BackupCorrupt(_)));
}

#[tokio::test]
async fn test_download_falls_back_to_document_timestamp() {
    let store = Arc::new(MockStore::new());
    let data = snapshot(&["a"]);
    store.put("f1", DEFAULT_BACKUP_FILENAME, &data.to_json_pretty().unwrap(), None);
    let client = client(store, true);

    assert_eq!(client.download().await.unwrap().modified_time, data.last_updated);
}

#[tokio::test]
async fn test_other_files_are_ignored() {
    let store = Arc::new(MockStore::new());
    store.put("f1", "notes.json", b"{}", Some(Utc::now()));
    let client = client(store, true);

    assert_eq!(client.get_last_modified().await.unwrap(), None);
    assert_eq!(client.find_backup().await.unwrap(), None);
}

#[tokio::test]
async fn test_duplicates_use_first_match() {
    let store = Arc::new(MockStore::new());
    let first = Utc::now() - Duration::days(2);
    let second = Utc::now() - Duration::days(1);
    store.put("f1", DEFAULT_BACKUP_FILENAME, b"{\"prompts\":[]}", Some(first));
    store.put("f2", DEFAULT_BACKUP_FILENAME, b"{\"prompts\":[]}", Some(second));
    let client = client(store.clone(), true);

    assert_eq!(client.get_last_modified().await.unwrap(), Some(first));
    client.upload(&snapshot(&["x"])).await.unwrap();
    assert_eq!(store.creates.load(Ordering::SeqCst), 0);
    let objects = store.objects.lock().unwrap();
    assert_eq!(objects.iter().find(|o| o.meta.id == "f2").unwrap().content, b"{\"prompts\":[]}");
}

#[tokio::test]
async fn test_signed_out_requires_auth_without_remote_calls() {
    let store = Arc::new(MockStore::new());
    let client = client(store.clone(), false);

    assert_eq!(client.upload(&snapshot(&["a"])).await.unwrap_err(), SyncError::AuthRequired);
    assert_eq!(store.lists.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_remote_failure_is_propagated() {
    let store = Arc::new(MockStore::new());
    store.fail(SyncError::RemoteUnavailable("HTTP 503".to_string()));
    let client = client(store, true);

    assert!(matches!(
        client.get_last_modified().await.unwrap_err(),
        SyncError::RemoteUnavailable(_)
    ));
}

#[test]
fn test_parse_backup_accepts_minimal_document() {
    let data = parse_backup(br#"{"prompts":[{"id":"1","title":"T"}]}"#).unwrap();
    assert_eq!(data.prompts.len(), 1);
    assert!(data.structures.is_empty());
}
