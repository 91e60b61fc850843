use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use uuid::Uuid;

use crate::auth::AuthState;
use crate::config::AppConfig;
use crate::error::{PortalError, Result};

/// Hard ceiling for image uploads. Resumes and portfolios carry no client-side limit.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

// 1. ObjectStore Contract
/// ObjectStore
///
/// Defines the abstract contract for all interactions with the object storage layer.
/// This trait allows us to swap the concrete implementation, from the real HTTP
/// client (HttpObjectStore) in production to the in-memory mock (MockObjectStore)
/// during testing, without affecting the Uploader built on top.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores one object under `bucket/key` and returns its public URL.
    ///
    /// # Arguments
    /// * `key`: The final object key (path + filename) inside the bucket.
    /// * `content_type`: The MIME type sent with the object.
    async fn upload(
        &self,
        token: Option<&str>,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String>;
}

// 2. The Real Implementation (Hosted Storage)
/// HttpObjectStore
///
/// The concrete implementation speaking the hosted storage endpoint's HTTP surface:
/// `POST /storage/v1/object/{bucket}/{key}` with the raw body, public URLs under
/// `/storage/v1/object/public/{bucket}/{key}`.
#[derive(Clone)]
pub struct HttpObjectStore {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
}

impl HttpObjectStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.backend_url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
        }
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn upload(
        &self,
        token: Option<&str>,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String> {
        let key = sanitize_key(key);
        let url = format!("{}/storage/v1/object/{}/{}", self.base_url, bucket, key);
        let response = self
            .http
            .post(&url)
            .header("apikey", &self.anon_key)
            .bearer_auth(token.unwrap_or(&self.anon_key))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(PortalError::Upload(format!(
                "storage answered {status}: {message}"
            )));
        }
        Ok(format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, bucket, key
        ))
    }
}

/// sanitize_key
///
/// Utility function to prevent path traversal attacks by removing directory
/// navigation components (e.g., `..`, `.`) from a user-provided key segment.
fn sanitize_key(key: &str) -> String {
    key.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

// 3. The Mock Implementation (For Unit Tests)
/// MockObjectStore
///
/// A mock implementation of `ObjectStore` used exclusively for unit and integration
/// testing. It records every accepted upload, so tests can assert not only what was
/// stored but also that rejected files never reached the storage layer at all.
#[derive(Clone)]
pub struct MockObjectStore {
    /// When true, all operations return a simulated failure.
    pub should_fail: bool,
    uploads: Arc<Mutex<Vec<String>>>,
}

impl MockObjectStore {
    pub fn new() -> Self {
        Self {
            should_fail: false,
            uploads: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            uploads: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// `bucket/key` of every accepted upload, in call order.
    pub fn recorded(&self) -> Vec<String> {
        self.uploads
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl ObjectStore for MockObjectStore {
    async fn upload(
        &self,
        _token: Option<&str>,
        bucket: &str,
        key: &str,
        _bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String> {
        if self.should_fail {
            return Err(PortalError::Upload(
                "simulated storage failure".to_string(),
            ));
        }

        let sanitized_key = sanitize_key(key);
        self.uploads
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(format!("{bucket}/{sanitized_key}"));

        // Returns a deterministic, local-style URL for mock assertions.
        Ok(format!(
            "http://localhost:54321/storage/v1/object/public/{}/{}",
            bucket, sanitized_key
        ))
    }
}

/// StorageState
///
/// The concrete type used to share the storage service across the portal context.
pub type StorageState = Arc<dyn ObjectStore>;

/// UploadKind
///
/// The three file slots the portal accepts, each with its own bucket and MIME
/// allow-list. Images additionally carry a size ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Image,
    Resume,
    Portfolio,
}

impl UploadKind {
    pub fn bucket(self) -> &'static str {
        match self {
            UploadKind::Image => "images",
            UploadKind::Resume => "resumes",
            UploadKind::Portfolio => "portfolios",
        }
    }

    fn label(self) -> &'static str {
        match self {
            UploadKind::Image => "image",
            UploadKind::Resume => "resume",
            UploadKind::Portfolio => "portfolio",
        }
    }

    fn allowed_types(self) -> &'static [&'static str] {
        match self {
            UploadKind::Image => &["image/jpeg", "image/jpg", "image/png"],
            UploadKind::Resume => &[
                "application/pdf",
                "application/msword",
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            ],
            UploadKind::Portfolio => &[
                "application/pdf",
                "application/zip",
                "application/x-rar-compressed",
                "application/vnd.rar",
            ],
        }
    }

    fn allows(self, content_type: &str) -> bool {
        self.allowed_types()
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(content_type))
    }

    fn max_bytes(self) -> Option<usize> {
        match self {
            UploadKind::Image => Some(MAX_IMAGE_BYTES),
            UploadKind::Resume | UploadKind::Portfolio => None,
        }
    }
}

/// Uploader
///
/// The validating front of the storage layer. MIME type and size are checked before
/// any network call is attempted; a disallowed file is rejected without ever reaching
/// the `ObjectStore`. Object keys are generated server-side-unique (`{uuid}.{ext}`)
/// so a hostile filename can at most influence the extension, which is itself
/// restricted to alphanumeric characters.
#[derive(Clone)]
pub struct Uploader {
    store: StorageState,
    session: AuthState,
}

impl Uploader {
    pub fn new(store: StorageState, session: AuthState) -> Self {
        Self { store, session }
    }

    /// upload
    ///
    /// Validates and stores one file, returning its public URL. Fails with
    /// `Unauthorized` for anonymous callers and `Upload` for files outside the
    /// allow-list or over the size ceiling.
    pub async fn upload(
        &self,
        kind: UploadKind,
        filename: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String> {
        let user = self.session.require_user()?;
        if !kind.allows(content_type) {
            return Err(PortalError::Upload(format!(
                "unsupported type `{}` for a {}",
                content_type,
                kind.label()
            )));
        }
        if let Some(ceiling) = kind.max_bytes() {
            if bytes.len() > ceiling {
                return Err(PortalError::Upload(format!(
                    "{} exceeds the {} MiB ceiling",
                    kind.label(),
                    ceiling / (1024 * 1024)
                )));
            }
        }
        let key = object_key(kind, user.id, filename, content_type);
        let token = self.session.access_token();
        self.store
            .upload(token.as_deref(), kind.bucket(), &key, bytes, content_type)
            .await
    }
}

/// Community images live under a shared prefix; resumes and portfolios are grouped
/// per owner.
fn object_key(kind: UploadKind, user_id: Uuid, filename: &str, content_type: &str) -> String {
    let ext = extension_of(filename)
        .unwrap_or_else(|| default_extension(content_type).to_string());
    match kind {
        UploadKind::Image => format!("community/{}.{}", Uuid::new_v4(), ext),
        UploadKind::Resume | UploadKind::Portfolio => {
            format!("{}/{}.{}", user_id, Uuid::new_v4(), ext)
        }
    }
}

fn extension_of(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

fn default_extension(content_type: &str) -> &'static str {
    match content_type {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "application/pdf" => "pdf",
        "application/msword" => "doc",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => "docx",
        "application/zip" => "zip",
        "application/x-rar-compressed" | "application/vnd.rar" => "rar",
        _ => "bin",
    }
}
