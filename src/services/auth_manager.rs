//! Auth Manager for Promptbook.
//!
//! Owns the token lifecycle: code exchange after consent, single-flight
//! refresh before every remote call, and sign-out.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::services::oauth_client::TokenEndpoint;
use crate::services::token_store::{TokenStore, TokenStoreTrait};
use crate::types::errors::SyncError;

/// Lifetime assumed when the token endpoint omits `expires_in`.
pub const DEFAULT_EXPIRES_IN_SECS: u64 = 3599;

/// Coordinates the token store with the token endpoint.
pub struct AuthManager {
    store: Arc<TokenStore>,
    endpoint: Arc<dyn TokenEndpoint>,
    // Held for the duration of a refresh exchange; later callers wait on it
    // and then find the token fresh.
    refresh_guard: Mutex<()>,
}

impl AuthManager {
    pub fn new(store: Arc<TokenStore>, endpoint: Arc<dyn TokenEndpoint>) -> Self {
        Self {
            store,
            endpoint,
            refresh_guard: Mutex::new(()),
        }
    }

    pub fn token_store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    /// Completes consent: exchanges the authorization code and stores the result.
    pub async fn authorize_with_code(&self, code: &str) -> Result<(), SyncError> {
        let response = self.endpoint.exchange_code(code).await?;
        self.store
            .save(
                &response.access_token,
                response.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS),
                response.refresh_token.as_deref(),
            )
            .map_err(|e| SyncError::RemoteUnavailable(e.to_string()))?;
        info!(
            refreshable = response.refresh_token.is_some(),
            "cloud storage authorized"
        );
        Ok(())
    }

    /// True when a session exists that can produce a usable token.
    pub fn is_signed_in(&self) -> bool {
        self.store.is_connected() && (self.store.is_fresh() || self.store.has_refresh_capability())
    }

    /// Returns a fresh access token, refreshing it first if needed.
    ///
    /// Concurrent callers share one refresh exchange. A rejected refresh token
    /// clears all stored credentials.
    pub async fn ensure_fresh_token(&self) -> Result<String, SyncError> {
        if let Some(token) = self.fresh_access_token() {
            return Ok(token);
        }

        let _guard = self.refresh_guard.lock().await;

        // Another caller may have refreshed while we waited.
        if let Some(token) = self.fresh_access_token() {
            debug!("token refreshed by concurrent caller");
            return Ok(token);
        }

        let refresh_token = self
            .store
            .load()
            .and_then(|t| t.refresh_token)
            .ok_or(SyncError::AuthRequired)?;

        match self.endpoint.refresh(&refresh_token).await {
            Ok(response) => {
                self.store
                    .save(
                        &response.access_token,
                        response.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS),
                        response.refresh_token.as_deref(),
                    )
                    .map_err(|e| SyncError::RemoteUnavailable(e.to_string()))?;
                debug!(rotated = response.refresh_token.is_some(), "access token refreshed");
                Ok(response.access_token)
            }
            Err(SyncError::RefreshInvalid(msg)) => {
                warn!(reason = %msg, "refresh token rejected, clearing credentials");
                if let Err(e) = self.store.clear() {
                    warn!(error = %e, "failed to clear credentials");
                }
                Err(SyncError::RefreshInvalid(msg))
            }
            Err(e) => Err(e),
        }
    }

    /// Revokes the session (best effort) and clears all stored credentials.
    pub async fn sign_out(&self) -> Result<(), SyncError> {
        if let Some(token) = self.store.load() {
            let revocable = token.refresh_token.unwrap_or(token.access_token);
            if let Err(e) = self.endpoint.revoke(&revocable).await {
                warn!(error = %e, "token revoke failed");
            }
        }
        self.store
            .clear()
            .map_err(|e| SyncError::RemoteUnavailable(e.to_string()))?;
        info!("signed out of cloud storage");
        Ok(())
    }

    fn fresh_access_token(&self) -> Option<String> {
        if self.store.is_fresh() {
            self.store.load().map(|t| t.access_token)
        } else {
            None
        }
    }
}
