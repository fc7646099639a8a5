use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::library::BackupData;

/// Metadata of an object in remote storage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFile {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub modified_time: Option<DateTime<Utc>>,
}

/// Result of comparing the remote backup against the last local sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteStatus {
    /// No backup exists yet.
    Absent,
    /// Backup exists and is not newer than the local state.
    NotNewer,
    /// Backup is newer than the local state; the user must decide.
    Newer,
}

/// Why automatic sync is currently suspended.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DisabledReason {
    RemoteNewer { remote_modified: DateTime<Utc> },
    CheckFailed { message: String },
}

/// Per-session synchronization state.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SyncState {
    Disconnected,
    Checking,
    SyncDisabled(DisabledReason),
    SyncEnabled,
}

/// The user's answer when a newer remote backup was found.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConflictChoice {
    LoadRemote,
    KeepLocal,
}

/// A downloaded backup together with the remote modification time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSnapshot {
    pub data: BackupData,
    pub modified_time: DateTime<Utc>,
}

/// Read-only view of the reconciler for display.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SyncStatus {
    pub state: SyncState,
    pub configured: bool,
    pub signed_in: bool,
    pub last_local_sync: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub unsynced_changes: bool,
}
