//! Binary object storage for audio payloads, addressed by key.
//!
//! Keys look like `audio/1699999999999.m4a`: a prefix directory plus a
//! time-derived file name that preserves the clip's original extension.

use std::future::Future;
use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use tokio::fs;
use tracing::{debug, info};

use crate::error::{Result, StoreError};

/// Object storage for opaque binary payloads.
pub trait BlobStore: Send + Sync + 'static {
    /// Store `data` under `key`, replacing any previous payload.
    fn put(&self, key: &str, data: Bytes) -> impl Future<Output = Result<()>> + Send;

    /// Resolve a durable download URL for a previously stored key.
    fn download_url(&self, key: &str) -> impl Future<Output = Result<String>> + Send;
}

/// Filesystem-backed blob store rooted at a base directory.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    base_path: PathBuf,
    max_size: usize,
}

impl FsBlobStore {
    pub async fn new(base_path: PathBuf, max_size: usize) -> Result<Self> {
        fs::create_dir_all(&base_path).await?;
        info!(path = %base_path.display(), "Blob store initialized");
        Ok(Self {
            base_path,
            max_size,
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Resolve a key to a path under the base directory, rejecting
    /// anything that could escape it.
    fn safe_path(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.contains('\\') || key.starts_with('/') {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        let mut resolved = self.base_path.clone();
        for component in Path::new(key).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                _ => return Err(StoreError::InvalidKey(key.to_string())),
            }
        }
        Ok(resolved)
    }
}

impl BlobStore for FsBlobStore {
    async fn put(&self, key: &str, data: Bytes) -> Result<()> {
        if data.is_empty() {
            return Err(StoreError::EmptyBlob);
        }
        if data.len() > self.max_size {
            return Err(StoreError::BlobTooLarge {
                size: data.len(),
                max: self.max_size,
            });
        }

        let path = self.safe_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, &data).await?;

        debug!(key = %key, size = data.len(), "Stored blob");
        Ok(())
    }

    async fn download_url(&self, key: &str) -> Result<String> {
        let path = self.safe_path(key)?;
        if !path.exists() {
            return Err(StoreError::BlobNotFound(key.to_string()));
        }
        let absolute = path.canonicalize()?;
        Ok(format!("file://{}", absolute.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn test_store() -> (FsBlobStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = FsBlobStore::new(dir.path().to_path_buf(), 1024 * 1024)
            .await
            .unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn test_put_and_resolve_url() {
        let (store, _dir) = test_store().await;

        store
            .put("audio/1000.m4a", Bytes::from_static(b"clip-bytes"))
            .await
            .unwrap();

        let url = store.download_url("audio/1000.m4a").await.unwrap();
        assert!(url.starts_with("file://"));
        assert!(url.ends_with("1000.m4a"));

        let stored = tokio::fs::read(url.trim_start_matches("file://"))
            .await
            .unwrap();
        assert_eq!(stored, b"clip-bytes");
    }

    #[tokio::test]
    async fn test_put_overwrites_same_key() {
        let (store, _dir) = test_store().await;

        store
            .put("audio/1.m4a", Bytes::from_static(b"first"))
            .await
            .unwrap();
        store
            .put("audio/1.m4a", Bytes::from_static(b"second"))
            .await
            .unwrap();

        let url = store.download_url("audio/1.m4a").await.unwrap();
        let stored = tokio::fs::read(url.trim_start_matches("file://"))
            .await
            .unwrap();
        assert_eq!(stored, b"second");
    }

    #[tokio::test]
    async fn test_empty_blob_rejected() {
        let (store, _dir) = test_store().await;
        assert!(matches!(
            store.put("audio/1.m4a", Bytes::new()).await,
            Err(StoreError::EmptyBlob)
        ));
    }

    #[tokio::test]
    async fn test_oversized_blob_rejected() {
        let dir = TempDir::new().unwrap();
        let store = FsBlobStore::new(dir.path().to_path_buf(), 8).await.unwrap();

        let result = store
            .put("audio/1.m4a", Bytes::from_static(b"way too big"))
            .await;
        assert!(matches!(result, Err(StoreError::BlobTooLarge { .. })));
    }

    #[tokio::test]
    async fn test_traversal_keys_rejected() {
        let (store, _dir) = test_store().await;
        let data = Bytes::from_static(b"x");

        assert!(store.put("../escape.m4a", data.clone()).await.is_err());
        assert!(store.put("/abs.m4a", data.clone()).await.is_err());
        assert!(store.put("audio/../../up.m4a", data.clone()).await.is_err());
        assert!(store.put("", data).await.is_err());
    }

    #[tokio::test]
    async fn test_missing_key_has_no_url() {
        let (store, _dir) = test_store().await;
        assert!(matches!(
            store.download_url("audio/missing.m4a").await,
            Err(StoreError::BlobNotFound(_))
        ));
    }
}
