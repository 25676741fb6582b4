//! Self-hosted backend: accounts, sessions and documents in SQLite, files on disk.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use url::Url;

use super::query::{self, Query};
use super::{
    Account, Backend, BackendError, BackendResult, Document, DocumentList, FileUpload, Session,
    StoredFile, CURRENT_SESSION,
};
use crate::auth::validation::is_valid_email;
use crate::config::Config;
use crate::db::models::{AccountRow, DocumentRow, FileRow, SessionRow};
use crate::db::{self, format_time, parse_time};
use crate::state::DbPool;

const DUPLICATE_ACCOUNT: &str = "A user with the same id, email, or phone already exists in this project.";
const SESSION_ALREADY_ACTIVE: &str = "Creation of a session is prohibited when a session is active.";
const GUEST_MISSING_SCOPE: &str = "User (role: guests) missing scope (account)";
const GUEST_WRITE: &str = "The current user is not authorized to perform the requested action.";
const INVALID_CREDENTIALS: &str = "Invalid credentials. Please check the email and password.";
const DOCUMENT_NOT_FOUND: &str = "Document with the requested ID could not be found.";
const FILE_NOT_FOUND: &str = "The requested file could not be found.";

/// Shared server-side state. Cheap to clone; every [`LocalBackend`] client
/// connected to the same store sees the same accounts, documents and files.
#[derive(Clone)]
pub struct LocalStore {
    pool: DbPool,
    uploads: PathBuf,
    endpoint: Url,
    project: String,
    session_hours: u64,
    password_cost: u32,
    /// Collections that accept documents from clients without a session.
    guest_create: Vec<String>,
}

impl LocalStore {
    pub fn open(config: &Config) -> anyhow::Result<Self> {
        let pool = db::create_pool(&config.db_path())?;
        db::run_migrations(&pool)?;

        let uploads = config.uploads_path();
        std::fs::create_dir_all(&uploads)?;

        Ok(Self {
            pool,
            uploads,
            endpoint: Url::parse(&config.backend.endpoint)?,
            project: config.backend.project.clone(),
            session_hours: config.auth.session_hours,
            password_cost: config.auth.password_cost,
            // Profiles are written during sign-up, before the first session.
            guest_create: vec![config.collections.users.clone()],
        })
    }

    /// A new client with no session.
    pub fn connect(&self) -> LocalBackend {
        LocalBackend {
            store: self.clone(),
            session: Mutex::new(None),
        }
    }

    /// A client that resumes a previously issued session secret.
    pub fn connect_with_session(&self, secret: impl Into<String>) -> LocalBackend {
        LocalBackend {
            store: self.clone(),
            session: Mutex::new(Some(secret.into())),
        }
    }

    /// Delete every session of the account with this email, as an operator would.
    pub fn revoke_sessions(&self, email: &str) -> BackendResult<usize> {
        let conn = self.pool.get()?;
        let Some(account) = db::accounts::find_by_email(&conn, email)? else {
            return Ok(0);
        };
        drop(conn);
        let revoked = db::sessions::revoke_all(&self.pool, &account.id)?;
        tracing::info!("Revoked {} session(s) for {}", revoked, email);
        Ok(revoked)
    }

    /// Raw contents of a stored file.
    pub async fn read_file(&self, bucket: &str, file_id: &str) -> BackendResult<bytes::Bytes> {
        let row = db::files::get(&self.pool, bucket, file_id)?
            .ok_or_else(|| BackendError::not_found("storage_file_not_found", FILE_NOT_FOUND))?;
        Ok(tokio::fs::read(&row.path).await?.into())
    }

    fn url(&self, segments: &[&str]) -> BackendResult<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| BackendError::internal("Endpoint cannot be used as a base URL"))?
            .pop_if_empty()
            .extend(segments);
        url.query_pairs_mut().append_pair("project", &self.project);
        Ok(url)
    }
}

/// One client of a [`LocalStore`], holding at most one session secret.
pub struct LocalBackend {
    store: LocalStore,
    session: Mutex<Option<String>>,
}

impl LocalBackend {
    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    /// Secret of the session this client holds, valid or not.
    pub async fn session_secret(&self) -> Option<String> {
        self.session.lock().await.clone()
    }

    async fn active_session(&self) -> BackendResult<Option<(SessionRow, AccountRow)>> {
        let secret = self.session.lock().await.clone();
        match secret {
            Some(secret) => db::sessions::find_active(&self.store.pool, &secret),
            None => Ok(None),
        }
    }

    async fn require_session(&self) -> BackendResult<(SessionRow, AccountRow)> {
        self.active_session().await?.ok_or_else(|| {
            BackendError::unauthorized("general_unauthorized_scope", GUEST_MISSING_SCOPE)
        })
    }

    /// Every write needs a live session; a revoked or expired one counts as none.
    async fn require_writer(&self) -> BackendResult<()> {
        match self.active_session().await? {
            Some(_) => Ok(()),
            None => Err(BackendError::unauthorized("user_unauthorized", GUEST_WRITE)),
        }
    }

    fn load_document(&self, collection: &str, id: &str) -> BackendResult<DocumentRow> {
        db::documents::get(&self.store.pool, collection, id)?
            .ok_or_else(|| BackendError::not_found("document_not_found", DOCUMENT_NOT_FOUND))
    }
}

fn account_from(row: &AccountRow) -> BackendResult<Account> {
    Ok(Account {
        id: row.id.clone(),
        email: row.email.clone(),
        name: row.name.clone(),
        created_at: parse_time(&row.created_at)?,
    })
}

fn document_from(row: DocumentRow) -> BackendResult<Document> {
    let data: Map<String, Value> = serde_json::from_str(&row.data)?;
    Ok(Document {
        id: row.id,
        collection: row.collection,
        created_at: parse_time(&row.created_at)?,
        updated_at: parse_time(&row.updated_at)?,
        data,
    })
}

fn check_attributes(data: &Map<String, Value>) -> BackendResult<()> {
    if let Some(key) = data.keys().find(|k| k.starts_with('$')) {
        return Err(BackendError::bad_request(
            "document_invalid_structure",
            format!("Invalid document structure: Unknown attribute: \"{}\"", key),
        ));
    }
    Ok(())
}

#[async_trait]
impl Backend for LocalBackend {
    async fn create_account(
        &self,
        account_id: &str,
        email: &str,
        password: &str,
        name: &str,
    ) -> BackendResult<Account> {
        if !is_valid_email(email) {
            return Err(BackendError::bad_request(
                "general_argument_invalid",
                "Invalid `email` param: Value must be a valid email address",
            ));
        }
        if password.chars().count() < 8 {
            return Err(BackendError::bad_request(
                "general_argument_invalid",
                "Invalid `password` param: Password must be at least 8 characters",
            ));
        }

        let conn = self.store.pool.get()?;
        if db::accounts::find_by_email(&conn, email)?.is_some() {
            return Err(BackendError::conflict("user_already_exists", DUPLICATE_ACCOUNT));
        }

        let password_hash = bcrypt::hash(password, self.store.password_cost)
            .map_err(|e| BackendError::internal(format!("Password hashing failed: {}", e)))?;
        let row = AccountRow {
            id: account_id.to_string(),
            email: email.to_string(),
            name: name.to_string(),
            password_hash,
            created_at: format_time(&Utc::now()),
        };
        db::accounts::insert_account(&conn, &row).map_err(|e| match e {
            rusqlite::Error::SqliteFailure(err, _)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                BackendError::conflict("user_already_exists", DUPLICATE_ACCOUNT)
            }
            other => other.into(),
        })?;

        tracing::info!("Created account {}", row.id);
        account_from(&row)
    }

    async fn create_email_password_session(
        &self,
        email: &str,
        password: &str,
    ) -> BackendResult<Session> {
        if self.active_session().await?.is_some() {
            return Err(BackendError::unauthorized(
                "user_session_already_exists",
                SESSION_ALREADY_ACTIVE,
            ));
        }

        let account = {
            let conn = self.store.pool.get()?;
            db::accounts::find_by_email(&conn, email)?
        };
        let account = account
            .filter(|a| bcrypt::verify(password, &a.password_hash).unwrap_or(false))
            .ok_or_else(|| {
                BackendError::unauthorized("user_invalid_credentials", INVALID_CREDENTIALS)
            })?;

        let row = db::sessions::create_session(&self.store.pool, &account.id, self.store.session_hours)?;
        *self.session.lock().await = Some(row.secret.clone());

        tracing::info!("Created session {} for account {}", row.id, account.id);
        Ok(Session {
            id: row.id,
            user_id: account.id,
            expire: parse_time(&row.expires_at)?,
            current: true,
        })
    }

    async fn get_account(&self) -> BackendResult<Account> {
        let (_, account) = self.require_session().await?;
        account_from(&account)
    }

    async fn delete_session(&self, session_id: &str) -> BackendResult<()> {
        let (session, account) = self.require_session().await?;
        let target = if session_id == CURRENT_SESSION {
            session.id.as_str()
        } else {
            session_id
        };

        if !db::sessions::delete_session(&self.store.pool, &account.id, target)? {
            return Err(BackendError::not_found(
                "user_session_not_found",
                "The current user session could not be found.",
            ));
        }
        if target == session.id {
            *self.session.lock().await = None;
        }
        Ok(())
    }

    async fn list_documents(
        &self,
        collection: &str,
        queries: &[Query],
    ) -> BackendResult<DocumentList> {
        let documents = db::documents::list(&self.store.pool, collection)?
            .into_iter()
            .map(document_from)
            .collect::<BackendResult<Vec<_>>>()?;
        let (total, documents) = query::evaluate(queries, documents)?;
        tracing::debug!(
            "Listed {} of {} document(s) from {}",
            documents.len(),
            total,
            collection
        );
        Ok(DocumentList { total, documents })
    }

    async fn get_document(&self, collection: &str, document_id: &str) -> BackendResult<Document> {
        document_from(self.load_document(collection, document_id)?)
    }

    async fn create_document(
        &self,
        collection: &str,
        document_id: &str,
        data: Map<String, Value>,
    ) -> BackendResult<Document> {
        if !self.store.guest_create.iter().any(|c| c == collection) {
            self.require_writer().await?;
        }
        check_attributes(&data)?;
        let now = format_time(&Utc::now());
        let json = serde_json::to_string(&data)?;
        if !db::documents::insert(&self.store.pool, collection, document_id, &json, &now)? {
            return Err(BackendError::conflict(
                "document_already_exists",
                "Document with the requested ID already exists.",
            ));
        }
        self.get_document(collection, document_id).await
    }

    async fn update_document(
        &self,
        collection: &str,
        document_id: &str,
        data: Map<String, Value>,
    ) -> BackendResult<Document> {
        self.require_writer().await?;
        check_attributes(&data)?;
        let existing = document_from(self.load_document(collection, document_id)?)?;

        let mut merged = existing.data;
        merged.extend(data);
        let json = serde_json::to_string(&merged)?;
        let now = format_time(&Utc::now());
        if !db::documents::update(&self.store.pool, collection, document_id, &json, &now)? {
            return Err(BackendError::not_found("document_not_found", DOCUMENT_NOT_FOUND));
        }
        self.get_document(collection, document_id).await
    }

    async fn delete_document(&self, collection: &str, document_id: &str) -> BackendResult<()> {
        self.require_writer().await?;
        if !db::documents::delete(&self.store.pool, collection, document_id)? {
            return Err(BackendError::not_found("document_not_found", DOCUMENT_NOT_FOUND));
        }
        Ok(())
    }

    async fn create_file(
        &self,
        bucket: &str,
        file_id: &str,
        upload: FileUpload,
    ) -> BackendResult<StoredFile> {
        self.require_writer().await?;
        if upload.contents.is_empty() {
            return Err(BackendError::bad_request(
                "storage_file_empty",
                "Empty file passed to the endpoint.",
            ));
        }

        let dir = self.store.uploads.join(bucket);
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(file_id);

        let row = FileRow {
            bucket: bucket.to_string(),
            id: file_id.to_string(),
            name: upload.name,
            mime_type: upload.mime_type,
            size: upload.contents.len() as i64,
            path: path.to_string_lossy().into_owned(),
            created_at: format_time(&Utc::now()),
        };
        if !db::files::insert(&self.store.pool, &row)? {
            return Err(BackendError::conflict(
                "storage_file_already_exists",
                "A storage file with the requested ID already exists.",
            ));
        }
        if let Err(e) = tokio::fs::write(&path, &upload.contents).await {
            db::files::delete(&self.store.pool, bucket, file_id)?;
            return Err(e.into());
        }

        Ok(StoredFile {
            id: row.id,
            bucket_id: row.bucket,
            name: row.name,
            mime_type: row.mime_type,
            size: row.size as u64,
            created_at: parse_time(&row.created_at)?,
        })
    }

    fn file_view_url(&self, bucket: &str, file_id: &str) -> BackendResult<Url> {
        self.store
            .url(&["storage", "buckets", bucket, "files", file_id, "view"])
    }

    async fn delete_file(&self, bucket: &str, file_id: &str) -> BackendResult<()> {
        self.require_writer().await?;
        let row = db::files::get(&self.store.pool, bucket, file_id)?
            .ok_or_else(|| BackendError::not_found("storage_file_not_found", FILE_NOT_FOUND))?;
        db::files::delete(&self.store.pool, bucket, file_id)?;
        if let Err(e) = tokio::fs::remove_file(&row.path).await {
            tracing::warn!("Failed to remove {}: {}", row.path, e);
        }
        Ok(())
    }

    fn avatar_initials(&self, name: &str) -> BackendResult<Url> {
        let mut url = self.store.url(&["avatars", "initials"])?;
        url.query_pairs_mut().append_pair("name", name);
        Ok(url)
    }
}
