#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tempfile::TempDir;
use tokio::sync::watch;
use url::Url;

use napbook::auth::validation::SignupForm;
use napbook::backend::{
    Account, Backend, BackendError, BackendResult, Document, DocumentList, FileUpload, LocalBackend,
    LocalStore, Query, Session, StoredFile,
};
use napbook::config::Config;
use napbook::models::{NewPost, Post};
use napbook::state::AppState;

pub struct TestEnv {
    pub dir: TempDir,
    pub config: Config,
    pub store: LocalStore,
}

impl TestEnv {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let mut config = Config::with_data_dir(dir.path());
        config.auth.password_cost = 4;
        let store = LocalStore::open(&config).expect("Failed to open test store");
        Self { dir, config, store }
    }

    /// A signed-out client of the shared store.
    pub fn client(&self) -> (AppState, Arc<LocalBackend>) {
        let backend = Arc::new(self.store.connect());
        let app = AppState::new(self.config.clone(), backend.clone());
        (app, backend)
    }

    /// A client whose backend calls can be made to fail.
    pub fn flaky_client(&self) -> (AppState, Arc<FlakyBackend>) {
        let backend = Arc::new(FlakyBackend::new(self.store.connect()));
        let app = AppState::new(self.config.clone(), backend.clone());
        (app, backend)
    }

    pub fn uploads(&self) -> &Path {
        self.config.backend.uploads.as_deref().unwrap()
    }

    /// Number of files stored in the media bucket on disk.
    pub fn stored_files(&self) -> usize {
        let bucket = self.uploads().join(&self.config.collections.bucket);
        std::fs::read_dir(bucket).map(|d| d.count()).unwrap_or(0)
    }
}

pub fn signup_form(name: &str, email: &str) -> SignupForm {
    SignupForm {
        name: name.to_string(),
        username: name.to_lowercase().replace(' ', ""),
        email: email.to_string(),
        password: "password123".to_string(),
    }
}

/// Sign up a fresh user and return their profile id.
pub async fn signed_in_user(app: &AppState, name: &str, email: &str) -> String {
    let signed_in = app
        .auth()
        .sign_up(&signup_form(name, email))
        .await
        .expect("sign-up should succeed");
    signed_in.user.id
}

pub async fn create_post(app: &AppState, creator: &str, caption: &str) -> Post {
    app.create_post(&NewPost {
        creator: creator.to_string(),
        caption: caption.to_string(),
        file: FileUpload::new("photo.png", vec![0x89, b'P', b'N', b'G']),
        location: "Bergen".to_string(),
        tags: "coast, rain".to_string(),
    })
    .await
    .expect("post creation should succeed")
}

/// Delegates to a [`LocalBackend`], failing document writes or session
/// creation on demand. Account lookups can be held back until released.
pub struct FlakyBackend {
    inner: LocalBackend,
    fail_updates: AtomicBool,
    fail_creates: AtomicBool,
    fail_sessions: AtomicBool,
    lookups_open: watch::Sender<bool>,
}

impl FlakyBackend {
    pub fn new(inner: LocalBackend) -> Self {
        let (lookups_open, _) = watch::channel(true);
        Self {
            inner,
            fail_updates: AtomicBool::new(false),
            fail_creates: AtomicBool::new(false),
            fail_sessions: AtomicBool::new(false),
            lookups_open,
        }
    }

    pub fn inner(&self) -> &LocalBackend {
        &self.inner
    }

    pub fn fail_sessions(&self, fail: bool) {
        self.fail_sessions.store(fail, Ordering::SeqCst);
    }

    /// Make `get_account` wait until [`FlakyBackend::release_account_lookups`].
    pub fn hold_account_lookups(&self) {
        self.lookups_open.send_replace(false);
    }

    pub fn release_account_lookups(&self) {
        self.lookups_open.send_replace(true);
    }

    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    pub fn fail_creates(&self, fail: bool) {
        self.fail_creates.store(fail, Ordering::SeqCst);
    }

    fn outage() -> BackendError {
        BackendError::internal("Server Error")
    }
}

#[async_trait]
impl Backend for FlakyBackend {
    async fn create_account(
        &self,
        account_id: &str,
        email: &str,
        password: &str,
        name: &str,
    ) -> BackendResult<Account> {
        self.inner
            .create_account(account_id, email, password, name)
            .await
    }

    async fn create_email_password_session(
        &self,
        email: &str,
        password: &str,
    ) -> BackendResult<Session> {
        if self.fail_sessions.load(Ordering::SeqCst) {
            return Err(Self::outage());
        }
        self.inner
            .create_email_password_session(email, password)
            .await
    }

    async fn get_account(&self) -> BackendResult<Account> {
        let mut open = self.lookups_open.subscribe();
        let _ = open.wait_for(|open| *open).await;
        self.inner.get_account().await
    }

    async fn delete_session(&self, session_id: &str) -> BackendResult<()> {
        self.inner.delete_session(session_id).await
    }

    async fn list_documents(
        &self,
        collection: &str,
        queries: &[Query],
    ) -> BackendResult<DocumentList> {
        self.inner.list_documents(collection, queries).await
    }

    async fn get_document(&self, collection: &str, document_id: &str) -> BackendResult<Document> {
        self.inner.get_document(collection, document_id).await
    }

    async fn create_document(
        &self,
        collection: &str,
        document_id: &str,
        data: Map<String, Value>,
    ) -> BackendResult<Document> {
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(Self::outage());
        }
        self.inner
            .create_document(collection, document_id, data)
            .await
    }

    async fn update_document(
        &self,
        collection: &str,
        document_id: &str,
        data: Map<String, Value>,
    ) -> BackendResult<Document> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(Self::outage());
        }
        self.inner
            .update_document(collection, document_id, data)
            .await
    }

    async fn delete_document(&self, collection: &str, document_id: &str) -> BackendResult<()> {
        self.inner.delete_document(collection, document_id).await
    }

    async fn create_file(
        &self,
        bucket: &str,
        file_id: &str,
        upload: FileUpload,
    ) -> BackendResult<StoredFile> {
        self.inner.create_file(bucket, file_id, upload).await
    }

    fn file_view_url(&self, bucket: &str, file_id: &str) -> BackendResult<Url> {
        self.inner.file_view_url(bucket, file_id)
    }

    async fn delete_file(&self, bucket: &str, file_id: &str) -> BackendResult<()> {
        self.inner.delete_file(bucket, file_id).await
    }

    fn avatar_initials(&self, name: &str) -> BackendResult<Url> {
        self.inner.avatar_initials(name)
    }
}
