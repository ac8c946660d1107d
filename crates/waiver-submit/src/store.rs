//! Blob storage for rendered waivers
//!
//! A waiver is written first and only then asked for its download reference;
//! [`StoredDocument`] can only be produced by [`persist`], so holding one
//! proves the bytes were acknowledged by the store.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, instrument};
use waiver_core::RenderedDocument;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid blob path: {0}")]
    InvalidPath(String),

    #[error("Blob store rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Blob store returned no download token for {0}")]
    MissingDownloadToken(String),

    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("Blob store request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Blob store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Slash-separated object name inside the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlobPath(String);

impl BlobPath {
    /// `consents/{uid}/consent_{unix-millis}.{ext}`
    pub fn consent(uid: &str, at: DateTime<Utc>, ext: &str) -> Result<Self, StoreError> {
        if uid.is_empty() || uid.contains('/') || uid.contains('\\') || uid.contains("..") {
            return Err(StoreError::InvalidPath(format!("unusable user id {:?}", uid)));
        }
        Ok(Self(format!(
            "consents/{}/consent_{}.{}",
            uid,
            at.timestamp_millis(),
            ext
        )))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BlobPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A waiver that is durably stored, with the reference to fetch it again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDocument {
    path: BlobPath,
    download_url: String,
}

impl StoredDocument {
    pub fn path(&self) -> &BlobPath {
        &self.path
    }

    pub fn download_url(&self) -> &str {
        &self.download_url
    }

    #[cfg(test)]
    pub(crate) fn for_tests(path: &str, download_url: &str) -> Self {
        Self {
            path: BlobPath(path.to_string()),
            download_url: download_url.to_string(),
        }
    }
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, path: &BlobPath, bytes: Vec<u8>, content_type: &str)
        -> Result<(), StoreError>;

    async fn download_url(&self, path: &BlobPath) -> Result<String, StoreError>;
}

/// Write `document` under `path`, then resolve its download reference.
#[instrument(skip(store, document), fields(path = %path, bytes = document.bytes.len()))]
pub async fn persist(
    store: &dyn BlobStore,
    path: BlobPath,
    document: &RenderedDocument,
) -> Result<StoredDocument, StoreError> {
    store
        .put(&path, document.bytes.clone(), document.content_type())
        .await?;
    let download_url = store.download_url(&path).await?;
    info!("stored waiver document");
    Ok(StoredDocument { path, download_url })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectMetadata {
    #[serde(default)]
    download_tokens: Option<String>,
}

/// Object-store REST API addressed by object name, with token-protected
/// download links.
pub struct HttpBlobStore {
    client: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
}

impl HttpBlobStore {
    /// `base_url` is the bucket root, e.g. `https://storage.example.com/v0/b/my-bucket`
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, auth_token: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth_token,
        }
    }

    fn object_url(&self, path: &BlobPath) -> String {
        format!("{}/o/{}", self.base_url, urlencoding::encode(path.as_str()))
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }
}

async fn rejected(resp: reqwest::Response) -> StoreError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    StoreError::Rejected { status, body }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn put(
        &self,
        path: &BlobPath,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StoreError> {
        let url = format!("{}/o", self.base_url);
        let req = self
            .client
            .post(url)
            .query(&[("name", path.as_str())])
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes);

        let resp = self.authorize(req).send().await?;
        if !resp.status().is_success() {
            return Err(rejected(resp).await);
        }
        Ok(())
    }

    async fn download_url(&self, path: &BlobPath) -> Result<String, StoreError> {
        let object_url = self.object_url(path);
        let resp = self.authorize(self.client.get(&object_url)).send().await?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(path.to_string()));
        }
        if !resp.status().is_success() {
            return Err(rejected(resp).await);
        }

        let metadata: ObjectMetadata = resp.json().await?;
        let token = metadata
            .download_tokens
            .as_deref()
            .and_then(|tokens| tokens.split(',').map(str::trim).find(|t| !t.is_empty()))
            .ok_or_else(|| StoreError::MissingDownloadToken(path.to_string()))?;

        Ok(format!(
            "{}?alt=media&token={}",
            object_url,
            urlencoding::encode(token)
        ))
    }
}

/// Stores blobs as files under a local directory.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &BlobPath) -> Result<PathBuf, StoreError> {
        let relative = Path::new(path.as_str());
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(StoreError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(
        &self,
        path: &BlobPath,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<(), StoreError> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, bytes).await?;
        Ok(())
    }

    async fn download_url(&self, path: &BlobPath) -> Result<String, StoreError> {
        let target = self.resolve(path)?;
        if !tokio::fs::try_exists(&target).await? {
            return Err(StoreError::NotFound(path.to_string()));
        }
        let absolute = tokio::fs::canonicalize(&target).await?;
        Ok(format!("file://{}", absolute.display()))
    }
}
