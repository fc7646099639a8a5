//! OAuth2 token endpoint client.
//!
//! Performs authorization-code and refresh-token exchanges and best-effort
//! token revocation against a standard OAuth2 token endpoint.

use async_trait::async_trait;
use reqwest::Client;

use crate::types::auth::{OAuthErrorResponse, TokenResponse};
use crate::types::errors::SyncError;
use crate::types::settings::DriveSettings;

const CODE_GRANT: &str = "authorization_code";
const REFRESH_GRANT: &str = "refresh_token";

/// Trait defining the token endpoint calls consumed by the auth manager.
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// Exchanges an authorization code for an access (and usually refresh) token.
    async fn exchange_code(&self, code: &str) -> Result<TokenResponse, SyncError>;
    /// Exchanges a refresh token for a new access token.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, SyncError>;
    /// Revokes a token. Callers treat failure as non-fatal.
    async fn revoke(&self, token: &str) -> Result<(), SyncError>;
}

/// Token endpoint client for Google-style OAuth2 servers.
pub struct GoogleOAuthClient {
    http: Client,
    client_id: String,
    client_secret: Option<String>,
    redirect_uri: String,
    token_endpoint: String,
    revoke_endpoint: String,
}

impl GoogleOAuthClient {
    pub fn new(http: Client, settings: &DriveSettings) -> Self {
        Self {
            http,
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
            redirect_uri: settings.redirect_uri.clone(),
            token_endpoint: settings.token_endpoint.clone(),
            revoke_endpoint: settings.revoke_endpoint.clone(),
        }
    }

    /// `invalid_grant` means a dead refresh token only on the refresh grant;
    /// a rejected authorization code just needs a new consent.
    async fn post_token_form(
        &self,
        grant_type: &'static str,
        mut form: Vec<(&str, String)>,
    ) -> Result<TokenResponse, SyncError> {
        form.push(("grant_type", grant_type.to_string()));
        form.push(("client_id", self.client_id.clone()));
        if let Some(secret) = &self.client_secret {
            form.push(("client_secret", secret.clone()));
        }

        let res = self
            .http
            .post(&self.token_endpoint)
            .form(&form)
            .send()
            .await
            .map_err(|e| SyncError::RemoteUnavailable(e.to_string()))?;

        let status = res.status();
        if status.is_success() {
            return res
                .json::<TokenResponse>()
                .await
                .map_err(|e| SyncError::RemoteUnavailable(format!("invalid token response: {}", e)));
        }

        let body = res.text().await.unwrap_or_default();
        match serde_json::from_str::<OAuthErrorResponse>(&body) {
            Ok(err) if err.is_invalid_grant() && grant_type == REFRESH_GRANT => {
                Err(SyncError::RefreshInvalid(err.error_description.unwrap_or(err.error)))
            }
            Ok(err) if status.is_client_error() => {
                tracing::warn!(error = %err.error, "token endpoint rejected request");
                Err(SyncError::AuthRequired)
            }
            _ => Err(SyncError::RemoteUnavailable(format!(
                "token endpoint returned HTTP {}",
                status
            ))),
        }
    }
}

#[async_trait]
impl TokenEndpoint for GoogleOAuthClient {
    async fn exchange_code(&self, code: &str) -> Result<TokenResponse, SyncError> {
        self.post_token_form(CODE_GRANT, vec![
            ("code", code.to_string()),
            ("redirect_uri", self.redirect_uri.clone()),
        ])
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, SyncError> {
        self.post_token_form(REFRESH_GRANT, vec![
            ("refresh_token", refresh_token.to_string()),
        ])
        .await
    }

    async fn revoke(&self, token: &str) -> Result<(), SyncError> {
        let res = self
            .http
            .post(&self.revoke_endpoint)
            .form(&[("token", token)])
            .send()
            .await
            .map_err(|e| SyncError::RemoteUnavailable(e.to_string()))?;
        if !res.status().is_success() {
            return Err(SyncError::RemoteUnavailable(format!(
                "revoke returned HTTP {}",
                res.status()
            )));
        }
        Ok(())
    }
}
