//! App Core for Promptbook.
//!
//! Wires storage, settings, the library and the sync stack together and owns
//! the glue between library mutations and autosave.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use crate::database::{Database, KeyValueStore};
use crate::managers::library_manager::{LibraryManager, LibraryManagerTrait};
use crate::services::auth_manager::AuthManager;
use crate::services::drive_store::{DriveStore, RemoteStore};
use crate::services::import_merge;
use crate::services::oauth_client::{GoogleOAuthClient, TokenEndpoint};
use crate::services::remote_backup::RemoteBackupClient;
use crate::services::settings_engine::{SettingsEngine, SettingsEngineTrait};
use crate::services::sync_reconciler::SyncReconciler;
use crate::services::token_store::TokenStore;
use crate::types::errors::StorageError;
use crate::types::library::BackupData;
use crate::types::sync::{RemoteSnapshot, SyncState};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Central application struct.
///
/// Std mutexes guard in-memory state and are never held across an `.await`.
pub struct App {
    pub db: Arc<Database>,
    pub settings_engine: Mutex<SettingsEngine>,
    pub library: Mutex<LibraryManager>,
    pub auth: Arc<AuthManager>,
    pub sync: SyncReconciler,
    pending_restore: Mutex<Option<RemoteSnapshot>>,
}

impl App {
    /// Opens the database at `db_path` and wires the Google Drive backends.
    ///
    /// `settings_path` overrides the platform settings location.
    pub fn new(db_path: &str, settings_path: Option<String>) -> Result<Self, Box<dyn std::error::Error>> {
        let db = Arc::new(Database::open(db_path)?);

        let mut settings_engine = SettingsEngine::new(settings_path);
        if let Err(e) = settings_engine.load() {
            warn!(error = %e, "settings unreadable, using defaults");
        }
        let drive = settings_engine.get_settings().drive.clone();

        let http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        let store: Arc<dyn RemoteStore> = Arc::new(DriveStore::new(http.clone(), &drive));
        let endpoint: Arc<dyn TokenEndpoint> = Arc::new(GoogleOAuthClient::new(http, &drive));

        Self::with_backends(db, settings_engine, store, endpoint)
    }

    /// Builds the app over explicit remote backends.
    pub fn with_backends(
        db: Arc<Database>,
        settings_engine: SettingsEngine,
        store: Arc<dyn RemoteStore>,
        endpoint: Arc<dyn TokenEndpoint>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let settings = settings_engine.get_settings().clone();

        let token_store = Arc::new(TokenStore::new(
            db.clone(),
            Duration::from_secs(settings.sync.token_refresh_buffer_secs),
        )?);
        let auth = Arc::new(AuthManager::new(token_store, endpoint));
        let client = Arc::new(RemoteBackupClient::new(
            store,
            auth.clone(),
            settings.drive.backup_filename.clone(),
        ));
        let sync = SyncReconciler::new(
            client,
            KeyValueStore::new(db.clone()),
            &settings.sync,
            settings.drive.is_configured(),
        );
        let library = LibraryManager::open(KeyValueStore::new(db.clone()))?;

        Ok(Self {
            db,
            settings_engine: Mutex::new(settings_engine),
            library: Mutex::new(library),
            auth,
            sync,
            pending_restore: Mutex::new(None),
        })
    }

    /// Startup reconciliation against the remote backup.
    pub async fn startup(&self) -> SyncState {
        let state = self.sync.start().await;
        info!(?state, "startup sync check complete");
        state
    }

    pub fn library(&self) -> MutexGuard<'_, LibraryManager> {
        self.library.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn settings(&self) -> MutexGuard<'_, SettingsEngine> {
        self.settings_engine.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Persists the library after a user mutation and signals autosave.
    pub fn record_change(&self, manager: &LibraryManager) -> Result<(), StorageError> {
        manager.persist()?;
        self.sync.notify_changed(manager.snapshot(Utc::now()));
        Ok(())
    }

    pub fn snapshot(&self) -> BackupData {
        self.library().snapshot(Utc::now())
    }

    /// Swaps a remote snapshot in as the local library. No autosave is
    /// triggered since local now equals remote.
    pub fn apply_remote(&self, data: &BackupData) -> Result<(), StorageError> {
        let mut manager = self.library();
        let next = import_merge::replace(data, manager.library());
        manager.replace_library(next);
        manager.persist()
    }

    /// Holds a downloaded snapshot until the user confirms the restore.
    pub fn stage_restore(&self, snapshot: RemoteSnapshot) {
        *self.pending_restore.lock().unwrap_or_else(|p| p.into_inner()) = Some(snapshot);
    }

    pub fn take_staged_restore(&self) -> Option<RemoteSnapshot> {
        self.pending_restore
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take()
    }
}
