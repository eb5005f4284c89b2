//! Object store backed storage (S3 and in-memory) built on the `object_store` crate.
//!
//! A namespace is a top-level key prefix inside the configured bucket. Provisioning
//! writes a marker object under the prefix so the namespace is visible to listings.

use crate::keys::{object_key, validate_namespace};
use crate::traits::{Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use exhibit_core::constants::NAMESPACE_MARKER;
use object_store::path::Path;
use object_store::Error as ObjectStoreError;
use object_store::{ObjectStore, ObjectStoreExt, PutMode, PutPayload, Result as ObjectResult};
use std::sync::Arc;

#[derive(Clone)]
enum LocatorStyle {
    /// `https://{bucket}.s3.{region}.amazonaws.com/{key}` or `{endpoint}/{bucket}/{key}`
    S3 {
        bucket: String,
        region: String,
        endpoint_url: Option<String>,
    },
    Memory,
}

/// Storage implementation over any `object_store` backend
#[derive(Clone)]
pub struct ObjectStoreStorage {
    store: Arc<dyn object_store::ObjectStore>,
    locator: LocatorStyle,
    backend: StorageBackend,
}

impl ObjectStoreStorage {
    /// Create an S3-backed instance
    ///
    /// # Arguments
    /// * `bucket` - S3 bucket name
    /// * `region` - AWS region (or region identifier for S3-compatible providers)
    /// * `endpoint_url` - Optional custom endpoint URL for S3-compatible providers
    ///   (e.g., "http://localhost:9000" for MinIO)
    #[cfg(feature = "storage-s3")]
    pub fn s3(bucket: String, region: String, endpoint_url: Option<String>) -> StorageResult<Self> {
        use object_store::aws::AmazonS3Builder;

        let mut builder = AmazonS3Builder::from_env()
            .with_region(region.clone())
            .with_bucket_name(bucket.clone());

        if let Some(ref endpoint) = endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(Self {
            store: Arc::new(store),
            locator: LocatorStyle::S3 {
                bucket,
                region,
                endpoint_url,
            },
            backend: StorageBackend::S3,
        })
    }

    /// Create an instance holding objects in process memory.
    #[cfg(feature = "storage-memory")]
    pub fn in_memory() -> Self {
        Self {
            store: Arc::new(object_store::memory::InMemory::new()),
            locator: LocatorStyle::Memory,
            backend: StorageBackend::Memory,
        }
    }

    /// Write the namespace marker unless it exists. Returns `false` when another
    /// writer got there first.
    async fn create_marker(&self, marker: &Path) -> ObjectResult<bool> {
        let result = self
            .store
            .put_opts(marker, PutPayload::from(Bytes::new()), PutMode::Create.into())
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(ObjectStoreError::AlreadyExists { .. } | ObjectStoreError::Precondition { .. }) => {
                Ok(false)
            }
            // Some S3-compatible providers lack conditional writes; the marker is empty,
            // so overwriting it is harmless.
            Err(ObjectStoreError::NotImplemented { .. }) => {
                self.store.put(marker, PutPayload::from(Bytes::new())).await?;
                Ok(true)
            }
            Err(e) => Err(e),
        }
    }

    fn generate_url(&self, key: &str) -> String {
        match &self.locator {
            // Path-style for S3-compatible providers: {endpoint}/{bucket}/{key}
            LocatorStyle::S3 {
                bucket,
                endpoint_url: Some(endpoint),
                ..
            } => format!("{}/{}/{}", endpoint.trim_end_matches('/'), bucket, key),
            LocatorStyle::S3 {
                bucket,
                region,
                endpoint_url: None,
            } => format!("https://{}.s3.{}.amazonaws.com/{}", bucket, region, key),
            LocatorStyle::Memory => format!("memory://{}", key),
        }
    }
}

#[async_trait]
impl Storage for ObjectStoreStorage {
    async fn ensure_namespace(&self, namespace: &str) -> StorageResult<()> {
        validate_namespace(namespace)?;
        let marker = Path::from(format!("{}/{}", namespace, NAMESPACE_MARKER));

        match self.store.head(&marker).await {
            Ok(_) => {
                tracing::debug!(namespace = %namespace, "Namespace already present");
                return Ok(());
            }
            Err(ObjectStoreError::NotFound { .. }) => {}
            Err(e) => {
                return Err(StorageError::NamespaceUnavailable(format!(
                    "Failed to probe namespace {}: {}",
                    namespace, e
                )))
            }
        }

        match self.create_marker(&marker).await {
            Ok(true) => {
                tracing::info!(namespace = %namespace, backend = %self.backend, "Namespace created");
                Ok(())
            }
            Ok(false) => {
                tracing::debug!(namespace = %namespace, "Namespace created concurrently");
                Ok(())
            }
            Err(e) => Err(StorageError::NamespaceUnavailable(format!(
                "Failed to create namespace {}: {}",
                namespace, e
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
        let key = object_key(namespace, path)?;
        let size = payload.len() as u64;
        let location = Path::from(key.clone());

        let start = std::time::Instant::now();

        let result: ObjectResult<_> = self.store.put(&location, PutPayload::from(payload)).await;

        result.map_err(|e| {
            tracing::error!(
                error = %e,
                backend = %self.backend,
                key = %key,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Object upload failed"
            );
            StorageError::UploadFailed(e.to_string())
        })?;

        let url = self.generate_url(&key);

        tracing::info!(
            backend = %self.backend,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object upload successful"
        );

        Ok(url)
    }

    fn public_locator(&self, namespace: &str, path: &str) -> StorageResult<String> {
        let key = object_key(namespace, path)?;
        Ok(self.generate_url(&key))
    }

    async fn get_object(&self, namespace: &str, path: &str) -> StorageResult<Bytes> {
        let key = object_key(namespace, path)?;
        let location = Path::from(key.clone());

        let result = self.store.get(&location).await.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(key.clone()),
            other => StorageError::DownloadFailed(other.to_string()),
        })?;

        result
            .bytes()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))
    }

    async fn exists(&self, namespace: &str, path: &str) -> StorageResult<bool> {
        let key = object_key(namespace, path)?;
        let location = Path::from(key);

        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(ObjectStoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    fn backend_type(&self) -> StorageBackend {
        self.backend
    }
}
