//! Google Drive v3 REST implementation of [`RemoteStore`].

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use uuid::Uuid;

use crate::types::errors::SyncError;
use crate::types::settings::DriveSettings;
use crate::types::sync::RemoteFile;

const FILE_FIELDS: &str = "id,name,modifiedTime";
const BACKUP_MIME: &str = "application/json";

/// Object-storage operations consumed by the remote backup client.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Lists live (non-trashed) objects with exactly this name.
    async fn list_by_name(&self, access_token: &str, name: &str) -> Result<Vec<RemoteFile>, SyncError>;
    /// Creates a new object.
    async fn create(&self, access_token: &str, name: &str, content: Vec<u8>) -> Result<RemoteFile, SyncError>;
    /// Overwrites the content of an existing object in place.
    async fn update(&self, access_token: &str, id: &str, content: Vec<u8>) -> Result<RemoteFile, SyncError>;
    /// Fetches the raw content of an object.
    async fn get_content(&self, access_token: &str, id: &str) -> Result<Vec<u8>, SyncError>;
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<RemoteFile>,
}

/// Drive REST client.
pub struct DriveStore {
    http: Client,
    api_base: String,
    api_key: Option<String>,
}

impl DriveStore {
    pub fn new(http: Client, settings: &DriveSettings) -> Self {
        Self {
            http,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone().filter(|k| !k.is_empty()),
        }
    }

    /// Builds the Drive search expression for an exact, non-trashed name.
    pub fn name_query(name: &str) -> String {
        let escaped = name.replace('\\', "\\\\").replace('\'', "\\'");
        format!("name = '{}' and trashed = false", escaped)
    }

    fn authorized(&self, req: RequestBuilder, access_token: &str) -> RequestBuilder {
        let req = req.bearer_auth(access_token);
        match &self.api_key {
            Some(key) => req.query(&[("key", key.as_str())]),
            None => req,
        }
    }

    /// Builds a `multipart/related` body: JSON metadata part, then content part.
    fn multipart_body(metadata: &serde_json::Value, content: &[u8]) -> (String, Vec<u8>) {
        let boundary = format!("promptbook-{}", Uuid::new_v4().simple());
        let mut body = Vec::with_capacity(content.len() + 256);
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
        body.extend_from_slice(metadata.to_string().as_bytes());
        body.extend_from_slice(format!("\r\n--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", BACKUP_MIME).as_bytes());
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
        (format!("multipart/related; boundary={}", boundary), body)
    }

    async fn send(req: RequestBuilder) -> Result<Response, SyncError> {
        let res = req
            .send()
            .await
            .map_err(|e| SyncError::RemoteUnavailable(e.to_string()))?;
        match res.status() {
            s if s.is_success() => Ok(res),
            StatusCode::UNAUTHORIZED => Err(SyncError::AuthRequired),
            s => Err(SyncError::RemoteUnavailable(format!("drive returned HTTP {}", s))),
        }
    }

    async fn parse_file(res: Response) -> Result<RemoteFile, SyncError> {
        res.json::<RemoteFile>()
            .await
            .map_err(|e| SyncError::RemoteUnavailable(format!("invalid file metadata: {}", e)))
    }
}

#[async_trait]
impl RemoteStore for DriveStore {
    async fn list_by_name(&self, access_token: &str, name: &str) -> Result<Vec<RemoteFile>, SyncError> {
        let url = format!("{}/drive/v3/files", self.api_base);
        let query = Self::name_query(name);
        let fields = format!("files({})", FILE_FIELDS);
        let req = self.http.get(url).query(&[
            ("q", query.as_str()),
            ("fields", fields.as_str()),
            ("spaces", "drive"),
        ]);
        let res = Self::send(self.authorized(req, access_token)).await?;
        let list = res
            .json::<FileList>()
            .await
            .map_err(|e| SyncError::RemoteUnavailable(format!("invalid file list: {}", e)))?;
        Ok(list.files)
    }

    async fn create(&self, access_token: &str, name: &str, content: Vec<u8>) -> Result<RemoteFile, SyncError> {
        let url = format!("{}/upload/drive/v3/files", self.api_base);
        let metadata = serde_json::json!({ "name": name, "mimeType": BACKUP_MIME });
        let (content_type, body) = Self::multipart_body(&metadata, &content);
        let req = self
            .http
            .post(url)
            .query(&[("uploadType", "multipart"), ("fields", FILE_FIELDS)])
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body);
        let res = Self::send(self.authorized(req, access_token)).await?;
        Self::parse_file(res).await
    }

    async fn update(&self, access_token: &str, id: &str, content: Vec<u8>) -> Result<RemoteFile, SyncError> {
        let url = format!("{}/upload/drive/v3/files/{}", self.api_base, id);
        let metadata = serde_json::json!({ "mimeType": BACKUP_MIME });
        let (content_type, body) = Self::multipart_body(&metadata, &content);
        let req = self
            .http
            .patch(url)
            .query(&[("uploadType", "multipart"), ("fields", FILE_FIELDS)])
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body);
        let res = Self::send(self.authorized(req, access_token)).await?;
        Self::parse_file(res).await
    }

    async fn get_content(&self, access_token: &str, id: &str) -> Result<Vec<u8>, SyncError> {
        let url = format!("{}/drive/v3/files/{}", self.api_base, id);
        let req = self.http.get(url).query(&[("alt", "media")]);
        let res = Self::send(self.authorized(req, access_token)).await?;
        let bytes = res
            .bytes()
            .await
            .map_err(|e| SyncError::RemoteUnavailable(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}
