use serde::{Deserialize, Serialize};

/// Stored access credential with its expiry (milliseconds since the UNIX epoch).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthToken {
    pub access_token: String,
    pub expires_at: i64,
    pub refresh_token: Option<String>,
}

/// Successful response from an OAuth2 token endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Error body returned by an OAuth2 token endpoint (RFC 6749 §5.2).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OAuthErrorResponse {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

impl OAuthErrorResponse {
    /// The refresh token was revoked, expired or otherwise rejected.
    pub fn is_invalid_grant(&self) -> bool {
        self.error == "invalid_grant"
    }
}
