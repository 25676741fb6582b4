//! Remote backend client.
//!
//! The rest of the crate talks to the backend-as-a-service platform only
//! through the [`Backend`] trait. [`LocalBackend`] is the self-hosted
//! implementation used by the command-line client and the tests.

pub mod local;
pub mod query;

use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

pub use local::{LocalBackend, LocalStore};
pub use query::Query;

/// Session id accepted by [`Backend::delete_session`] for the caller's own session.
pub const CURRENT_SESSION: &str = "current";

/// Error returned by the backend, shaped like the platform's exceptions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct BackendError {
    pub code: u16,
    pub kind: String,
    pub message: String,
}

impl BackendError {
    pub fn new(code: u16, kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub fn bad_request(kind: &str, message: impl Into<String>) -> Self {
        Self::new(400, kind, message)
    }

    pub fn unauthorized(kind: &str, message: impl Into<String>) -> Self {
        Self::new(401, kind, message)
    }

    pub fn not_found(kind: &str, message: impl Into<String>) -> Self {
        Self::new(404, kind, message)
    }

    pub fn conflict(kind: &str, message: impl Into<String>) -> Self {
        Self::new(409, kind, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(500, "general_server_error", message)
    }

    pub fn is_unauthorized(&self) -> bool {
        self.code == 401
    }

    pub fn is_not_found(&self) -> bool {
        self.code == 404
    }
}

impl From<rusqlite::Error> for BackendError {
    fn from(e: rusqlite::Error) -> Self {
        Self::internal(format!("Database error: {}", e))
    }
}

impl From<r2d2::Error> for BackendError {
    fn from(e: r2d2::Error) -> Self {
        Self::internal(format!("Pool error: {}", e))
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(e: serde_json::Error) -> Self {
        Self::internal(format!("JSON error: {}", e))
    }
}

impl From<std::io::Error> for BackendError {
    fn from(e: std::io::Error) -> Self {
        Self::internal(format!("IO error: {}", e))
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Identity record of the auth subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    #[serde(rename = "$id")]
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(rename = "$createdAt")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(rename = "$id")]
    pub id: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    pub expire: DateTime<Utc>,
    pub current: bool,
}

/// A document of a collection: system attributes plus the attribute map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "$id")]
    pub id: String,
    #[serde(rename = "$collectionId")]
    pub collection: String,
    #[serde(rename = "$createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "$updatedAt")]
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl Document {
    /// Attribute lookup that also understands the system attributes.
    pub fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "$id" => Some(Value::String(self.id.clone())),
            "$createdAt" => Some(Value::String(crate::db::format_time(&self.created_at))),
            "$updatedAt" => Some(Value::String(crate::db::format_time(&self.updated_at))),
            _ => self.data.get(name).cloned(),
        }
    }

    pub fn into_model<T: DeserializeOwned>(self) -> BackendResult<T> {
        let value = serde_json::to_value(self)?;
        Ok(serde_json::from_value(value)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentList {
    /// Number of documents matching the filters, before cursor and limit.
    pub total: usize,
    pub documents: Vec<Document>,
}

impl DocumentList {
    pub fn into_models<T: DeserializeOwned>(self) -> BackendResult<Vec<T>> {
        self.documents.into_iter().map(Document::into_model).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFile {
    #[serde(rename = "$id")]
    pub id: String,
    #[serde(rename = "bucketId")]
    pub bucket_id: String,
    pub name: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    #[serde(rename = "sizeOriginal")]
    pub size: u64,
    #[serde(rename = "$createdAt")]
    pub created_at: DateTime<Utc>,
}

/// File contents handed to [`Backend::create_file`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub name: String,
    pub mime_type: String,
    pub contents: Bytes,
}

impl FileUpload {
    pub fn new(name: impl Into<String>, contents: impl Into<Bytes>) -> Self {
        let name = name.into();
        let mime_type = mime_guess::from_path(&name)
            .first_or_octet_stream()
            .to_string();
        Self {
            name,
            mime_type,
            contents: contents.into(),
        }
    }

    pub async fn read(path: &Path) -> std::io::Result<Self> {
        let contents = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Ok(Self::new(name, contents))
    }
}

/// Operations the client needs from the backend-as-a-service platform.
///
/// One value represents one client: it holds at most one session, the way a
/// browser tab holds one session cookie.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn create_account(
        &self,
        account_id: &str,
        email: &str,
        password: &str,
        name: &str,
    ) -> BackendResult<Account>;

    async fn create_email_password_session(
        &self,
        email: &str,
        password: &str,
    ) -> BackendResult<Session>;

    /// Account of the current session. Fails with 401 without a valid session.
    async fn get_account(&self) -> BackendResult<Account>;

    /// Delete a session; pass [`CURRENT_SESSION`] for the caller's own.
    async fn delete_session(&self, session_id: &str) -> BackendResult<()>;

    async fn list_documents(&self, collection: &str, queries: &[Query])
        -> BackendResult<DocumentList>;

    async fn get_document(&self, collection: &str, document_id: &str) -> BackendResult<Document>;

    async fn create_document(
        &self,
        collection: &str,
        document_id: &str,
        data: Map<String, Value>,
    ) -> BackendResult<Document>;

    /// Merge `data` into the document's attributes.
    async fn update_document(
        &self,
        collection: &str,
        document_id: &str,
        data: Map<String, Value>,
    ) -> BackendResult<Document>;

    async fn delete_document(&self, collection: &str, document_id: &str) -> BackendResult<()>;

    async fn create_file(
        &self,
        bucket: &str,
        file_id: &str,
        upload: FileUpload,
    ) -> BackendResult<StoredFile>;

    /// Public view URL of a stored file. Builds the URL without a lookup.
    fn file_view_url(&self, bucket: &str, file_id: &str) -> BackendResult<Url>;

    async fn delete_file(&self, bucket: &str, file_id: &str) -> BackendResult<()>;

    /// Initials avatar URL for a display name.
    fn avatar_initials(&self, name: &str) -> BackendResult<Url>;
}

/// Fresh unique id for documents, accounts and files.
pub fn unique_id() -> String {
    uuid::Uuid::now_v7().simple().to_string()
}
