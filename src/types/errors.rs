use std::fmt;

// === SyncError ===

/// Errors raised by cloud sync, auth and import operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// No valid credential and no way to refresh one.
    AuthRequired,
    /// Transport failure talking to remote storage or the token endpoint.
    RemoteUnavailable(String),
    /// No backup object exists remotely.
    BackupNotFound,
    /// Remote content does not parse as a backup document.
    BackupCorrupt(String),
    /// Imported source is unusable (no prompts or unparseable).
    ImportInvalid(String),
    /// The token endpoint rejected the refresh token.
    RefreshInvalid(String),
}

impl SyncError {
    /// Errors after which the stored session can no longer be used.
    pub fn ends_session(&self) -> bool {
        matches!(self, SyncError::AuthRequired | SyncError::RefreshInvalid(_))
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::AuthRequired => write!(f, "Not connected to cloud storage, please reconnect"),
            SyncError::RemoteUnavailable(msg) => write!(f, "Remote storage unavailable: {}", msg),
            SyncError::BackupNotFound => write!(f, "Backup not found in cloud storage"),
            SyncError::BackupCorrupt(msg) => write!(f, "Backup is corrupt: {}", msg),
            SyncError::ImportInvalid(msg) => write!(f, "Import invalid: {}", msg),
            SyncError::RefreshInvalid(msg) => write!(f, "Session expired, please reconnect: {}", msg),
        }
    }
}

impl std::error::Error for SyncError {}

// === StorageError ===

/// Errors from the durable local key-value storage.
#[derive(Debug)]
pub enum StorageError {
    /// Database operation failed.
    DatabaseError(String),
    /// A stored value could not be decoded.
    InvalidValue(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::DatabaseError(msg) => write!(f, "Storage database error: {}", msg),
            StorageError::InvalidValue(msg) => write!(f, "Invalid stored value: {}", msg),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<rusqlite::Error> for StorageError {
    fn from(e: rusqlite::Error) -> Self {
        StorageError::DatabaseError(e.to_string())
    }
}

// === CryptoError ===

/// Errors from sealing and opening stored credentials.
#[derive(Debug)]
pub enum CryptoError {
    /// Failed to derive the sealing key.
    KeyDerivation(String),
    /// Sealing failed.
    Encryption(String),
    /// Opening failed (tampered, truncated or foreign data).
    Decryption(String),
    /// Failed to generate a nonce.
    RandomGeneration(String),
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CryptoError::KeyDerivation(msg) => write!(f, "Key derivation failed: {}", msg),
            CryptoError::Encryption(msg) => write!(f, "Encryption failed: {}", msg),
            CryptoError::Decryption(msg) => write!(f, "Decryption failed: {}", msg),
            CryptoError::RandomGeneration(msg) => {
                write!(f, "Random generation failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for CryptoError {}

// === LibraryError ===

/// Errors from in-memory library operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibraryError {
    /// Prompt with the given ID was not found.
    PromptNotFound(String),
    /// Structure with the given ID was not found.
    StructureNotFound(String),
    /// The category cannot be removed.
    ProtectedCategory(String),
    /// A name or title was empty after trimming.
    EmptyName,
    /// A list index was out of bounds.
    InvalidIndex(usize),
}

impl fmt::Display for LibraryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LibraryError::PromptNotFound(id) => write!(f, "Prompt not found: {}", id),
            LibraryError::StructureNotFound(id) => write!(f, "Structure not found: {}", id),
            LibraryError::ProtectedCategory(name) => {
                write!(f, "Category cannot be removed: {}", name)
            }
            LibraryError::EmptyName => write!(f, "Name cannot be empty"),
            LibraryError::InvalidIndex(index) => write!(f, "Invalid index: {}", index),
        }
    }
}

impl std::error::Error for LibraryError {}

// === SettingsError ===

/// Errors related to settings management.
#[derive(Debug)]
pub enum SettingsError {
    /// An I/O error occurred while reading or writing settings.
    IoError(String),
    /// Failed to serialize or deserialize settings.
    SerializationError(String),
    /// The provided settings key is invalid.
    InvalidKey(String),
    /// The provided settings value is invalid.
    InvalidValue(String),
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::IoError(msg) => write!(f, "Settings I/O error: {}", msg),
            SettingsError::SerializationError(msg) => {
                write!(f, "Settings serialization error: {}", msg)
            }
            SettingsError::InvalidKey(key) => write!(f, "Invalid settings key: {}", key),
            SettingsError::InvalidValue(msg) => {
                write!(f, "Invalid settings value: {}", msg)
            }
        }
    }
}

impl std::error::Error for SettingsError {}
