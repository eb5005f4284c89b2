//! Storage abstraction trait
//!
//! This module defines the Storage trait that all object storage backends must implement.

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Namespace unavailable: {0}")]
    NamespaceUnavailable(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl StorageError {
    /// Whether repeating the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StorageError::UploadFailed(_)
                | StorageError::DownloadFailed(_)
                | StorageError::BackendError(_)
                | StorageError::IoError(_)
        )
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage abstraction trait
///
/// Objects are addressed by a namespace (a bucket-level prefix or a directory,
/// depending on the backend) and a relative path inside it. Paths must not
/// contain `..` or start with `/`.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Make sure `namespace` exists so objects can be written to it.
    ///
    /// Idempotent: a namespace that already exists, including one created
    /// concurrently by another caller, is success.
    async fn ensure_namespace(&self, namespace: &str) -> StorageResult<()>;

    /// Store `payload` at `path` inside `namespace` and return its object locator.
    async fn put_object(
        &self,
        namespace: &str,
        path: &str,
        content_type: &str,
        payload: Bytes,
    ) -> StorageResult<String>;

    /// Locator under which the object at `path` is retrievable.
    ///
    /// Identical to what `put_object` returned for the same object.
    fn public_locator(&self, namespace: &str, path: &str) -> StorageResult<String>;

    /// Read an object back.
    async fn get_object(&self, namespace: &str, path: &str) -> StorageResult<Bytes>;

    /// Check if an object exists
    async fn exists(&self, namespace: &str, path: &str) -> StorageResult<bool>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
