//! Blob storage for uploaded artifacts

use crate::error::StoreError;
use async_trait::async_trait;
use dashmap::DashMap;
use std::path::{Component, Path, PathBuf};

/// Content type of rendered ICF documents
pub const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Content type of JSON bundles
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// An uploaded object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Byte storage with public URLs
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Upload bytes, returning the public URL
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, StoreError>;

    /// Public URL of an uploaded object
    async fn public_url(&self, path: &str) -> Result<String, StoreError>;
}

fn check_blob_path(path: &str) -> Result<(), StoreError> {
    let invalid = |reason| StoreError::InvalidPath {
        path: path.to_string(),
        reason,
    };
    if path.is_empty() || path.starts_with('/') {
        return Err(invalid("blob path must be relative and non-empty"));
    }
    if Path::new(path)
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return Err(invalid("blob path may not contain '.' or '..'"));
    }
    Ok(())
}

/// In-memory [`BlobStore`]
#[derive(Debug)]
pub struct MemoryBlobStore {
    base_url: String,
    blobs: DashMap<String, StoredBlob>,
}

impl MemoryBlobStore {
    /// Create store whose URLs start with `base_url`
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            blobs: DashMap::new(),
        }
    }

    /// Read back an object
    #[must_use]
    pub fn get(&self, path: &str) -> Option<StoredBlob> {
        self.blobs.get(path).map(|b| b.value().clone())
    }

    /// Number of stored objects
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    /// True when nothing is stored
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new("memory://blobs")
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, StoreError> {
        check_blob_path(path)?;
        tracing::debug!("Storing blob {} ({} bytes, {})", path, bytes.len(), content_type);
        self.blobs.insert(
            path.to_string(),
            StoredBlob {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        self.public_url(path).await
    }

    async fn public_url(&self, path: &str) -> Result<String, StoreError> {
        if !self.blobs.contains_key(path) {
            return Err(StoreError::NotFound(path.to_string()));
        }
        Ok(format!("{}/{}", self.base_url, path))
    }
}

/// Filesystem-backed [`BlobStore`] rooted at a directory
///
/// URLs are `file://` URLs of the written files. Content types are not
/// persisted.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Create store under `root`
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StoreError> {
        check_blob_path(path)?;
        Ok(self.root.join(path))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, StoreError> {
        let target = self.resolve(path)?;
        if let Some(dir) = target.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        tracing::debug!("Writing blob {} ({} bytes, {})", target.display(), bytes.len(), content_type);
        tokio::fs::write(&target, bytes).await?;
        self.public_url(path).await
    }

    async fn public_url(&self, path: &str) -> Result<String, StoreError> {
        let target = self.resolve(path)?;
        if !tokio::fs::try_exists(&target).await? {
            return Err(StoreError::NotFound(path.to_string()));
        }
        Ok(format!("file://{}", target.display()))
    }
}
