use serde::{Deserialize, Serialize};

/// Default name of the backup object in remote storage.
pub const DEFAULT_BACKUP_FILENAME: &str = "prompt_book_backup.json";

/// Top-level application settings container.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct AppSettings {
    #[serde(default)]
    pub drive: DriveSettings,
    #[serde(default)]
    pub sync: SyncSettings,
}

/// Remote drive and OAuth client configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DriveSettings {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub api_key: Option<String>,
    /// `postmessage` is the sentinel used with popup-based consent.
    pub redirect_uri: String,
    pub token_endpoint: String,
    pub revoke_endpoint: String,
    pub api_base: String,
    pub backup_filename: String,
}

impl Default for DriveSettings {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: None,
            api_key: None,
            redirect_uri: "postmessage".to_string(),
            token_endpoint: "https://oauth2.googleapis.com/token".to_string(),
            revoke_endpoint: "https://oauth2.googleapis.com/revoke".to_string(),
            api_base: "https://www.googleapis.com".to_string(),
            backup_filename: DEFAULT_BACKUP_FILENAME.to_string(),
        }
    }
}

impl DriveSettings {
    pub fn is_configured(&self) -> bool {
        !self.client_id.trim().is_empty()
    }
}

/// Timing knobs for the sync reconciler.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SyncSettings {
    pub debounce_ms: u64,
    pub clock_skew_tolerance_ms: i64,
    pub token_refresh_buffer_secs: u64,
    pub autosave_enabled: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            debounce_ms: 2000,
            clock_skew_tolerance_ms: 2000,
            token_refresh_buffer_secs: 300,
            autosave_enabled: true,
        }
    }
}
