use crate::keys::{object_key, validate_namespace};
use crate::traits::{Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Local filesystem storage implementation
///
/// Each namespace is a directory directly below `base_path`.
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for object storage (e.g., "/var/lib/exhibit/objects")
    /// * `base_url` - Base URL objects are served from (e.g., "http://localhost:3000/objects")
    pub async fn new(base_path: impl Into<PathBuf>, base_url: String) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage {
            base_path,
            base_url,
        })
    }

    /// Convert namespace and path to a filesystem path.
    ///
    /// Key validation rejects traversal sequences, so the result always stays
    /// below `base_path`.
    fn key_to_path(&self, namespace: &str, path: &str) -> StorageResult<PathBuf> {
        let key = object_key(namespace, path)?;
        Ok(self.base_path.join(key))
    }

    fn namespace_dir(&self, namespace: &str) -> StorageResult<PathBuf> {
        validate_namespace(namespace)?;
        Ok(self.base_path.join(namespace))
    }

    /// Generate public URL for an object
    fn generate_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }

    /// Ensure parent directory exists
    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn ensure_namespace(&self, namespace: &str) -> StorageResult<()> {
        let dir = self.namespace_dir(namespace)?;

        if fs::try_exists(&dir).await.unwrap_or(false) {
            tracing::debug!(namespace = %namespace, "Local namespace already present");
            return Ok(());
        }

        match fs::create_dir(&dir).await {
            Ok(()) => {
                tracing::info!(
                    namespace = %namespace,
                    path = %dir.display(),
                    "Local namespace created"
                );
                Ok(())
            }
            // Lost a race with another provisioning caller.
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(()),
            Err(e) => Err(StorageError::NamespaceUnavailable(format!(
                "Failed to create namespace directory {}: {}",
                dir.display(),
                e
            ))),
        }
    }

    async fn put_object(
        &self,
        namespace: &str,
        path: &str,
        _content_type: &str,
        payload: Bytes,
    ) -> StorageResult<String> {
        let file_path = self.key_to_path(namespace, path)?;
        let namespace_dir = self.namespace_dir(namespace)?;
        let size = payload.len();

        if !fs::try_exists(&namespace_dir).await.unwrap_or(false) {
            return Err(StorageError::NamespaceUnavailable(namespace.to_string()));
        }

        self.ensure_parent_dir(&file_path).await?;

        let start = std::time::Instant::now();

        let mut file = fs::File::create(&file_path).await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to create file {}: {}",
                file_path.display(),
                e
            ))
        })?;

        file.write_all(&payload).await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to write file {}: {}",
                file_path.display(),
                e
            ))
        })?;

        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to sync file {}: {}",
                file_path.display(),
                e
            ))
        })?;

        let url = self.public_locator(namespace, path)?;

        tracing::info!(
            path = %file_path.display(),
            namespace = %namespace,
            key = %path,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage upload successful"
        );

        Ok(url)
    }

    fn public_locator(&self, namespace: &str, path: &str) -> StorageResult<String> {
        let key = object_key(namespace, path)?;
        Ok(self.generate_url(&key))
    }

    async fn get_object(&self, namespace: &str, path: &str) -> StorageResult<Bytes> {
        let file_path = self.key_to_path(namespace, path)?;

        if !fs::try_exists(&file_path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(format!("{}/{}", namespace, path)));
        }

        let data = fs::read(&file_path).await.map_err(|e| {
            StorageError::DownloadFailed(format!(
                "Failed to read file {}: {}",
                file_path.display(),
                e
            ))
        })?;

        Ok(Bytes::from(data))
    }

    async fn exists(&self, namespace: &str, path: &str) -> StorageResult<bool> {
        let file_path = self.key_to_path(namespace, path)?;
        Ok(fs::try_exists(&file_path).await.unwrap_or(false))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
