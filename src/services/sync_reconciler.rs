//! Sync Reconciler for Promptbook.
//!
//! Decides at startup and on every library change whether and what to
//! synchronize, without ever silently discarding user data.
//!
//! ```text
//! Disconnected --auth--> Checking --remote absent / not newer--> SyncEnabled
//!                           |--remote newer / check failed--> SyncDisabled
//! SyncDisabled --load remote | keep local--> SyncEnabled
//! any --sign out--> Disconnected
//! ```
//!
//! Autosave only runs in `SyncEnabled`. Each change restarts a debounce
//! window; only the last change of a burst uploads.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::database::KeyValueStore;
use crate::services::remote_backup::RemoteBackupClient;
use crate::types::errors::SyncError;
use crate::types::library::BackupData;
use crate::types::settings::SyncSettings;
use crate::types::sync::{
    ConflictChoice, DisabledReason, RemoteSnapshot, RemoteStatus, SyncState, SyncStatus,
};

pub const LAST_LOCAL_SYNC_KEY: &str = "promptbook.last_local_sync";

/// Classifies the remote backup against the last local sync time.
///
/// Remote counts as newer only when it is more than `tolerance_ms` ahead, to
/// absorb clock drift. A device that never synced treats any existing backup
/// as newer.
pub fn classify_remote(
    remote_modified: Option<DateTime<Utc>>,
    last_local_sync: Option<DateTime<Utc>>,
    tolerance_ms: i64,
) -> RemoteStatus {
    match (remote_modified, last_local_sync) {
        (None, _) => RemoteStatus::Absent,
        (Some(_), None) => RemoteStatus::Newer,
        (Some(remote), Some(local)) => {
            if remote.timestamp_millis() > local.timestamp_millis() + tolerance_ms {
                RemoteStatus::Newer
            } else {
                RemoteStatus::NotNewer
            }
        }
    }
}

/// State shared with debounced autosave tasks.
struct Shared {
    state: Mutex<SyncState>,
    last_error: Mutex<Option<String>>,
    // Bumped on every change signal and on sign-out; a pending autosave only
    // runs if the generation it was scheduled under is still current.
    generation: AtomicU64,
    unsynced: AtomicBool,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, SyncState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn set_state(&self, next: SyncState) {
        let mut state = self.state();
        if *state != next {
            debug!(from = ?*state, to = ?next, "sync state transition");
            *state = next;
        }
    }

    fn set_error(&self, error: Option<String>) {
        *self.last_error.lock().unwrap_or_else(|p| p.into_inner()) = error;
    }
}

/// Drives the sync state machine for one session.
pub struct SyncReconciler {
    client: Arc<RemoteBackupClient>,
    ledger: KeyValueStore,
    shared: Arc<Shared>,
    debounce: Duration,
    tolerance_ms: i64,
    autosave_enabled: bool,
    configured: bool,
}

impl SyncReconciler {
    pub fn new(
        client: Arc<RemoteBackupClient>,
        ledger: KeyValueStore,
        settings: &SyncSettings,
        configured: bool,
    ) -> Self {
        Self {
            client,
            ledger,
            shared: Arc::new(Shared {
                state: Mutex::new(SyncState::Disconnected),
                last_error: Mutex::new(None),
                generation: AtomicU64::new(0),
                unsynced: AtomicBool::new(false),
            }),
            debounce: Duration::from_millis(settings.debounce_ms),
            tolerance_ms: settings.clock_skew_tolerance_ms,
            autosave_enabled: settings.autosave_enabled,
            configured,
        }
    }

    pub fn state(&self) -> SyncState {
        self.shared.state().clone()
    }

    pub fn status(&self) -> SyncStatus {
        SyncStatus {
            state: self.state(),
            configured: self.configured,
            signed_in: self.configured && self.client.auth().is_signed_in(),
            last_local_sync: self.last_local_sync(),
            last_error: self
                .shared
                .last_error
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .clone(),
            unsynced_changes: self.shared.unsynced.load(Ordering::SeqCst),
        }
    }

    pub fn last_local_sync(&self) -> Option<DateTime<Utc>> {
        read_last_sync(&self.ledger)
    }

    /// Startup reconciliation: Disconnected, or Checking followed by the
    /// remote comparison. A failed check leaves sync disabled.
    pub async fn start(&self) -> SyncState {
        if !self.configured || !self.client.auth().is_signed_in() {
            self.shared.set_state(SyncState::Disconnected);
            return SyncState::Disconnected;
        }

        self.shared.set_state(SyncState::Checking);
        let next = match self.client.get_last_modified().await {
            Ok(remote) => match classify_remote(remote, self.last_local_sync(), self.tolerance_ms) {
                RemoteStatus::Absent | RemoteStatus::NotNewer => {
                    info!("remote backup not newer, autosave enabled");
                    SyncState::SyncEnabled
                }
                RemoteStatus::Newer => {
                    let remote_modified = remote.unwrap_or_else(Utc::now);
                    info!(%remote_modified, "remote backup is newer, autosave suspended");
                    SyncState::SyncDisabled(DisabledReason::RemoteNewer { remote_modified })
                }
            },
            Err(e) if e.ends_session() => {
                warn!(error = %e, "startup check lost the session");
                self.shared.set_error(Some(e.to_string()));
                SyncState::Disconnected
            }
            Err(e) => {
                warn!(error = %e, "startup check failed, autosave suspended");
                self.shared.set_error(Some(e.to_string()));
                SyncState::SyncDisabled(DisabledReason::CheckFailed {
                    message: e.to_string(),
                })
            }
        };
        self.shared.set_state(next.clone());
        next
    }

    /// Completes consent with an authorization code, then runs the startup check.
    pub async fn connect(&self, code: &str) -> Result<SyncState, SyncError> {
        if !self.configured {
            return Err(SyncError::AuthRequired);
        }
        self.client.auth().authorize_with_code(code).await?;
        self.shared.set_error(None);
        Ok(self.start().await)
    }

    /// Signals a library change. In `SyncEnabled` this schedules a debounced
    /// upload of `snapshot`; any previously scheduled upload is superseded.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn notify_changed(&self, snapshot: BackupData) {
        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.unsynced.store(true, Ordering::SeqCst);

        if !self.autosave_enabled || *self.shared.state() != SyncState::SyncEnabled {
            debug!("change recorded, autosave not active");
            return;
        }

        let shared = Arc::clone(&self.shared);
        let client = Arc::clone(&self.client);
        let ledger = self.ledger.clone();
        let debounce = self.debounce;

        tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            if shared.generation.load(Ordering::SeqCst) != generation {
                return;
            }
            if *shared.state() != SyncState::SyncEnabled {
                return;
            }
            match client.upload(&snapshot).await {
                Ok(modified) => {
                    record_last_sync(&ledger, modified);
                    if shared.generation.load(Ordering::SeqCst) == generation {
                        shared.unsynced.store(false, Ordering::SeqCst);
                    }
                    shared.set_error(None);
                    debug!(%modified, "autosave uploaded");
                }
                Err(e) => {
                    warn!(error = %e, "autosave failed");
                    shared.set_error(Some(e.to_string()));
                    if e.ends_session() {
                        shared.set_state(SyncState::Disconnected);
                    }
                }
            }
        });
    }

    /// Resolves a newer-remote conflict.
    ///
    /// `LoadRemote` returns the downloaded snapshot for the caller to swap in;
    /// `KeepLocal` returns `None` and local will overwrite remote on the next
    /// autosave.
    pub async fn resolve(&self, choice: ConflictChoice) -> Result<Option<BackupData>, SyncError> {
        match choice {
            ConflictChoice::LoadRemote => {
                let snapshot = self.client.download().await.map_err(|e| self.note_failure(e))?;
                self.accept_remote(&snapshot);
                Ok(Some(snapshot.data))
            }
            ConflictChoice::KeepLocal => {
                if matches!(self.state(), SyncState::SyncDisabled(_)) {
                    info!("keeping local library, autosave enabled");
                    self.shared.set_state(SyncState::SyncEnabled);
                }
                Ok(None)
            }
        }
    }

    /// Manual upload; runs regardless of the automatic state and settles a
    /// pending conflict in favour of local.
    pub async fn upload_now(&self, snapshot: &BackupData) -> Result<DateTime<Utc>, SyncError> {
        let modified = self.client.upload(snapshot).await.map_err(|e| self.note_failure(e))?;
        record_last_sync(&self.ledger, modified);
        self.shared.unsynced.store(false, Ordering::SeqCst);
        self.shared.set_error(None);
        if matches!(self.state(), SyncState::SyncDisabled(_) | SyncState::Checking) {
            self.shared.set_state(SyncState::SyncEnabled);
        }
        info!(%modified, "manual upload complete");
        Ok(modified)
    }

    /// Manual download for the confirmation gate. Changes nothing locally.
    pub async fn download_now(&self) -> Result<RemoteSnapshot, SyncError> {
        self.client.download().await.map_err(|e| self.note_failure(e))
    }

    /// Called after the user confirmed and the caller applied a downloaded snapshot.
    pub fn confirm_restore(&self, snapshot: &RemoteSnapshot) {
        self.accept_remote(snapshot);
    }

    /// Clears credentials, cancels pending autosave and returns to Disconnected.
    pub async fn sign_out(&self) -> Result<(), SyncError> {
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        self.shared.set_state(SyncState::Disconnected);
        self.shared.set_error(None);
        self.client.auth().sign_out().await
    }

    /// Local now equals `snapshot`; autosaves scheduled before the swap are dropped.
    fn accept_remote(&self, snapshot: &RemoteSnapshot) {
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        record_last_sync(&self.ledger, snapshot.modified_time);
        self.shared.unsynced.store(false, Ordering::SeqCst);
        self.shared.set_error(None);
        if self.client.auth().is_signed_in() {
            self.shared.set_state(SyncState::SyncEnabled);
        }
    }

    fn note_failure(&self, e: SyncError) -> SyncError {
        self.shared.set_error(Some(e.to_string()));
        if e.ends_session() {
            self.shared.set_state(SyncState::Disconnected);
        }
        e
    }
}

fn read_last_sync(ledger: &KeyValueStore) -> Option<DateTime<Utc>> {
    match ledger.get(LAST_LOCAL_SYNC_KEY) {
        Ok(Some(raw)) => DateTime::parse_from_rfc3339(&raw)
            .map(|t| t.with_timezone(&Utc))
            .ok(),
        Ok(None) => None,
        Err(e) => {
            warn!(error = %e, "failed to read last sync time");
            None
        }
    }
}

fn record_last_sync(ledger: &KeyValueStore, at: DateTime<Utc>) {
    if let Err(e) = ledger.set(LAST_LOCAL_SYNC_KEY, &at.to_rfc3339()) {
        warn!(error = %e, "failed to record last sync time");
    }
}
