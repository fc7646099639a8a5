//! Token Store for Promptbook.
//!
//! Persists the access credential, its expiry and the optional refresh
//! credential in durable key-value storage, and answers freshness questions.
//! Absence of a token is a normal state: reads never fail, they return
//! `None`/`false` and log storage trouble.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::database::{Database, KeyValueStore};
use crate::services::credential_cipher::{CredentialCipher, CredentialCipherTrait};
use crate::types::auth::AuthToken;
use crate::types::errors::{CryptoError, StorageError};

pub const ACCESS_TOKEN_KEY: &str = "promptbook.access_token";
pub const TOKEN_EXPIRY_KEY: &str = "promptbook.token_expiry";
pub const REFRESH_TOKEN_KEY: &str = "promptbook.refresh_token";
pub const CONNECTED_KEY: &str = "promptbook.remote_connected";

/// Default margin before expiry at which a token stops counting as fresh.
pub const DEFAULT_REFRESH_BUFFER: Duration = Duration::from_secs(300);

/// Trait defining token storage operations.
pub trait TokenStoreTrait {
    fn save(&self, access_token: &str, expires_in_secs: u64, refresh_token: Option<&str>) -> Result<(), StorageError>;
    fn load(&self) -> Option<AuthToken>;
    fn is_fresh(&self) -> bool;
    fn has_refresh_capability(&self) -> bool;
    fn is_connected(&self) -> bool;
    fn clear(&self) -> Result<(), StorageError>;
}

/// Token store backed by the SQLite key-value table, with tokens sealed at rest.
pub struct TokenStore {
    kv: KeyValueStore,
    cipher: CredentialCipher,
    buffer_ms: i64,
}

impl TokenStore {
    pub fn new(db: Arc<Database>, buffer: Duration) -> Result<Self, CryptoError> {
        Ok(Self {
            kv: KeyValueStore::new(db),
            cipher: CredentialCipher::new()?,
            buffer_ms: buffer.as_millis() as i64,
        })
    }

    /// Current time in milliseconds since the UNIX epoch.
    pub fn now_ms() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    /// Stores a token as if the current time were `now_ms`.
    pub fn save_at(
        &self,
        now_ms: i64,
        access_token: &str,
        expires_in_secs: u64,
        refresh_token: Option<&str>,
    ) -> Result<(), StorageError> {
        let expires_at = now_ms.saturating_add((expires_in_secs as i64).saturating_mul(1000));
        let sealed_access = self.seal(access_token)?;
        self.kv.set(ACCESS_TOKEN_KEY, &sealed_access)?;
        self.kv.set(TOKEN_EXPIRY_KEY, &expires_at.to_string())?;
        if let Some(refresh) = refresh_token {
            let sealed_refresh = self.seal(refresh)?;
            self.kv.set(REFRESH_TOKEN_KEY, &sealed_refresh)?;
        }
        self.kv.set(CONNECTED_KEY, "true")?;
        Ok(())
    }

    /// Freshness as of `now_ms`: a token exists and `now < expires_at - buffer`.
    pub fn is_fresh_at(&self, now_ms: i64) -> bool {
        match self.load() {
            Some(token) => now_ms < token.expires_at.saturating_sub(self.buffer_ms),
            None => false,
        }
    }

    fn seal(&self, value: &str) -> Result<String, StorageError> {
        self.cipher
            .seal(value)
            .map_err(|e| StorageError::InvalidValue(e.to_string()))
    }

    /// Reads and opens a sealed value; unreadable values count as absent.
    fn read_sealed(&self, key: &str) -> Option<String> {
        let sealed = match self.kv.get(key) {
            Ok(v) => v?,
            Err(e) => {
                warn!(key, error = %e, "failed to read credential");
                return None;
            }
        };
        match self.cipher.open(&sealed) {
            Ok(plain) => Some(plain),
            Err(e) => {
                warn!(key, error = %e, "stored credential could not be opened");
                None
            }
        }
    }
}

impl TokenStoreTrait for TokenStore {
    /// Stores the access token with `expires_at = now + expires_in_secs * 1000`.
    ///
    /// The refresh token is only written when provided, so a refresh response
    /// that does not rotate it keeps the old one.
    fn save(&self, access_token: &str, expires_in_secs: u64, refresh_token: Option<&str>) -> Result<(), StorageError> {
        self.save_at(Self::now_ms(), access_token, expires_in_secs, refresh_token)
    }

    fn load(&self) -> Option<AuthToken> {
        let access_token = self.read_sealed(ACCESS_TOKEN_KEY)?;
        let expires_at = match self.kv.get(TOKEN_EXPIRY_KEY) {
            Ok(Some(raw)) => raw.parse::<i64>().ok()?,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "failed to read token expiry");
                return None;
            }
        };
        Some(AuthToken {
            access_token,
            expires_at,
            refresh_token: self.read_sealed(REFRESH_TOKEN_KEY),
        })
    }

    fn is_fresh(&self) -> bool {
        self.is_fresh_at(Self::now_ms())
    }

    fn has_refresh_capability(&self) -> bool {
        self.read_sealed(REFRESH_TOKEN_KEY).is_some()
    }

    fn is_connected(&self) -> bool {
        matches!(self.kv.get(CONNECTED_KEY), Ok(Some(ref v)) if v == "true")
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.kv.remove_all(&[
            ACCESS_TOKEN_KEY,
            TOKEN_EXPIRY_KEY,
            REFRESH_TOKEN_KEY,
            CONNECTED_KEY,
        ])
    }
}
