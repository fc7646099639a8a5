//! Remote Backup Client for Promptbook.
//!
//! Find, upload and download of the single named backup object. The object is
//! addressed by name because it has no stable identifier across creations;
//! uploads are an upsert-by-name and never create duplicates.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::services::auth_manager::AuthManager;
use crate::services::drive_store::RemoteStore;
use crate::types::errors::SyncError;
use crate::types::library::BackupData;
use crate::types::sync::{RemoteFile, RemoteSnapshot};

/// Client for the one backup object in the user's drive.
pub struct RemoteBackupClient {
    store: Arc<dyn RemoteStore>,
    auth: Arc<AuthManager>,
    filename: String,
}

impl RemoteBackupClient {
    pub fn new(store: Arc<dyn RemoteStore>, auth: Arc<AuthManager>, filename: impl Into<String>) -> Self {
        Self {
            store,
            auth,
            filename: filename.into(),
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn auth(&self) -> &Arc<AuthManager> {
        &self.auth
    }

    /// Locates the backup object. `Ok(None)` means no backup exists.
    pub async fn find_backup(&self) -> Result<Option<RemoteFile>, SyncError> {
        let token = self.auth.ensure_fresh_token().await?;
        self.find_with_token(&token).await
    }

    async fn find_with_token(&self, token: &str) -> Result<Option<RemoteFile>, SyncError> {
        let mut files = self.store.list_by_name(token, &self.filename).await?;
        if files.len() > 1 {
            warn!(
                count = files.len(),
                name = %self.filename,
                "multiple backup objects found, using the first"
            );
        }
        Ok(if files.is_empty() { None } else { Some(files.swap_remove(0)) })
    }

    /// Uploads the snapshot, creating the object if absent or overwriting it in place.
    ///
    /// Returns the server-reported modification time, or the local time if the
    /// server did not report one.
    pub async fn upload(&self, snapshot: &BackupData) -> Result<DateTime<Utc>, SyncError> {
        let content = snapshot
            .to_json_pretty()
            .map_err(|e| SyncError::BackupCorrupt(e.to_string()))?;
        let token = self.auth.ensure_fresh_token().await?;

        let written = match self.find_with_token(&token).await? {
            Some(existing) => {
                debug!(id = %existing.id, "overwriting backup");
                self.store.update(&token, &existing.id, content).await?
            }
            None => {
                debug!(name = %self.filename, "creating backup");
                self.store.create(&token, &self.filename, content).await?
            }
        };
        Ok(written.modified_time.unwrap_or_else(Utc::now))
    }

    /// Downloads and parses the backup.
    pub async fn download(&self) -> Result<RemoteSnapshot, SyncError> {
        let token = self.auth.ensure_fresh_token().await?;
        let file = self
            .find_with_token(&token)
            .await?
            .ok_or(SyncError::BackupNotFound)?;
        let bytes = self.store.get_content(&token, &file.id).await?;
        let data = parse_backup(&bytes)?;
        let modified_time = file.modified_time.unwrap_or(data.last_updated);
        Ok(RemoteSnapshot { data, modified_time })
    }

    /// Metadata-only check: modification time of the backup, `None` if absent.
    pub async fn get_last_modified(&self) -> Result<Option<DateTime<Utc>>, SyncError> {
        let file = self.find_backup().await?;
        Ok(file.map(|f| f.modified_time.unwrap_or_else(Utc::now)))
    }
}

/// Parses remote content as the canonical backup document.
pub fn parse_backup(bytes: &[u8]) -> Result<BackupData, SyncError> {
    serde_json::from_slice::<BackupData>(bytes).map_err(|e| SyncError::BackupCorrupt(e.to_string()))
}
