//! Configuration module
//!
//! Configuration is read from the environment (after loading `.env` when present)
//! and split into storage, metadata store and ingestion settings.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::DEFAULT_NAMESPACE;
use crate::models::MediaCategory;
use crate::storage_types::StorageBackend;

// Common constants
const MAX_CONNECTIONS: u32 = 10;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const MAX_FILE_SIZE_MB: u64 = 500;
const MAX_STAGED_FILES: usize = 100;
const MAX_CONCURRENT_TRANSFERS: usize = 4;
const TRANSFER_MAX_RETRIES: u32 = 2;
const TRANSFER_RETRY_BASE_MS: u64 = 200;
const PROGRESS_CHUNK_BYTES: usize = 64 * 1024;
const PREVIEW_MAX_DIMENSION: u32 = 160;
const PREVIEW_MAX_SOURCE_MB: u64 = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(anyhow::anyhow!("Invalid log format: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataBackend {
    Postgres,
    Memory,
}

impl FromStr for MetadataBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(MetadataBackend::Postgres),
            "memory" => Ok(MetadataBackend::Memory),
            _ => Err(anyhow::anyhow!("Invalid metadata backend: {}", s)),
        }
    }
}

/// Object storage settings
#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Namespace (bucket-level prefix or directory) evidence objects go to.
    pub namespace: String,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO, etc.)
    pub local_storage_path: Option<PathBuf>,
    pub local_storage_base_url: Option<String>,
}

impl StorageConfig {
    pub fn memory() -> Self {
        Self {
            backend: StorageBackend::Memory,
            namespace: DEFAULT_NAMESPACE.to_string(),
            s3_bucket: None,
            s3_region: None,
            s3_endpoint: None,
            local_storage_path: None,
            local_storage_base_url: None,
        }
    }
}

/// Metadata store settings
#[derive(Clone, Debug)]
pub struct MetadataConfig {
    pub backend: MetadataBackend,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
}

/// Tunables of the ingestion pipeline.
#[derive(Clone, Debug)]
pub struct IngestConfig {
    pub namespace: String,
    pub max_file_size_bytes: u64,
    /// Upper bound on entries held in the staging store at once.
    pub max_staged_files: usize,
    pub allowed_categories: Vec<MediaCategory>,
    /// Size of the worker pool used for object transfers.
    pub max_concurrent_transfers: usize,
    /// Extra attempts for a transfer failing with a retryable storage error.
    pub transfer_max_retries: u32,
    pub transfer_retry_base: Duration,
    pub progress_chunk_bytes: usize,
    pub preview_max_dimension: u32,
    /// Files larger than this are not decoded for a preview.
    pub preview_max_source_bytes: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            max_file_size_bytes: MAX_FILE_SIZE_MB * 1024 * 1024,
            max_staged_files: MAX_STAGED_FILES,
            allowed_categories: MediaCategory::ALL.to_vec(),
            max_concurrent_transfers: MAX_CONCURRENT_TRANSFERS,
            transfer_max_retries: TRANSFER_MAX_RETRIES,
            transfer_retry_base: Duration::from_millis(TRANSFER_RETRY_BASE_MS),
            progress_chunk_bytes: PROGRESS_CHUNK_BYTES,
            preview_max_dimension: PREVIEW_MAX_DIMENSION,
            preview_max_source_bytes: PREVIEW_MAX_SOURCE_MB * 1024 * 1024,
        }
    }
}

impl IngestConfig {
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.namespace.trim().is_empty()
            || self.namespace.contains('/')
            || self.namespace.contains("..")
        {
            return Err(anyhow::anyhow!(
                "STORAGE_NAMESPACE must be a single non-empty path segment"
            ));
        }
        if self.max_file_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_FILE_SIZE_MB must be greater than 0"));
        }
        if self.max_staged_files == 0 {
            return Err(anyhow::anyhow!("MAX_STAGED_FILES must be greater than 0"));
        }
        if self.allowed_categories.is_empty() {
            return Err(anyhow::anyhow!(
                "ALLOWED_MEDIA_CATEGORIES must name at least one category"
            ));
        }
        if self.max_concurrent_transfers == 0 {
            return Err(anyhow::anyhow!(
                "MAX_CONCURRENT_TRANSFERS must be greater than 0"
            ));
        }
        if self.progress_chunk_bytes == 0 {
            return Err(anyhow::anyhow!("PROGRESS_CHUNK_BYTES must be greater than 0"));
        }
        if self.preview_max_dimension == 0 {
            return Err(anyhow::anyhow!(
                "PREVIEW_MAX_DIMENSION must be greater than 0"
            ));
        }
        Ok(())
    }
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub environment: String,
    pub log_format: LogFormat,
    pub storage: StorageConfig,
    pub metadata: MetadataConfig,
    pub ingest: IngestConfig,
}

impl Config {
    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let log_format = env::var("LOG_FORMAT")
            .ok()
            .map(|s| s.parse())
            .transpose()?
            .unwrap_or(LogFormat::Pretty);

        let namespace =
            env::var("STORAGE_NAMESPACE").unwrap_or_else(|_| DEFAULT_NAMESPACE.to_string());

        let storage = StorageConfig {
            backend: env::var("STORAGE_BACKEND")
                .ok()
                .map(|s| s.parse())
                .transpose()?
                .unwrap_or(StorageBackend::Local),
            namespace: namespace.clone(),
            s3_bucket: env::var("S3_BUCKET").ok(),
            s3_region: env::var("S3_REGION")
                .or_else(|_| env::var("AWS_REGION"))
                .ok(),
            s3_endpoint: env::var("S3_ENDPOINT").ok(),
            local_storage_path: env::var("LOCAL_STORAGE_PATH").ok().map(PathBuf::from),
            local_storage_base_url: env::var("LOCAL_STORAGE_BASE_URL").ok(),
        };

        let metadata = MetadataConfig {
            backend: env::var("METADATA_BACKEND")
                .ok()
                .map(|s| s.parse())
                .transpose()?
                .unwrap_or(MetadataBackend::Postgres),
            database_url: env::var("DATABASE_URL").ok(),
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| MAX_CONNECTIONS.to_string())
                .parse()
                .unwrap_or(MAX_CONNECTIONS),
            db_timeout_seconds: env::var("DB_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| CONNECTION_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
        };

        let allowed_categories = match env::var("ALLOWED_MEDIA_CATEGORIES") {
            Ok(raw) => raw
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(MediaCategory::from_str)
                .collect::<Result<Vec<_>, _>>()?,
            Err(_) => MediaCategory::ALL.to_vec(),
        };

        let ingest = IngestConfig {
            namespace,
            max_file_size_bytes: env::var("MAX_FILE_SIZE_MB")
                .unwrap_or_else(|_| MAX_FILE_SIZE_MB.to_string())
                .parse::<u64>()
                .unwrap_or(MAX_FILE_SIZE_MB)
                * 1024
                * 1024,
            max_staged_files: env::var("MAX_STAGED_FILES")
                .unwrap_or_else(|_| MAX_STAGED_FILES.to_string())
                .parse()
                .unwrap_or(MAX_STAGED_FILES),
            allowed_categories,
            max_concurrent_transfers: env::var("MAX_CONCURRENT_TRANSFERS")
                .unwrap_or_else(|_| MAX_CONCURRENT_TRANSFERS.to_string())
                .parse()
                .unwrap_or(MAX_CONCURRENT_TRANSFERS),
            transfer_max_retries: env::var("TRANSFER_MAX_RETRIES")
                .unwrap_or_else(|_| TRANSFER_MAX_RETRIES.to_string())
                .parse()
                .unwrap_or(TRANSFER_MAX_RETRIES),
            transfer_retry_base: Duration::from_millis(
                env::var("TRANSFER_RETRY_BASE_MS")
                    .unwrap_or_else(|_| TRANSFER_RETRY_BASE_MS.to_string())
                    .parse()
                    .unwrap_or(TRANSFER_RETRY_BASE_MS),
            ),
            progress_chunk_bytes: env::var("PROGRESS_CHUNK_BYTES")
                .unwrap_or_else(|_| PROGRESS_CHUNK_BYTES.to_string())
                .parse()
                .unwrap_or(PROGRESS_CHUNK_BYTES),
            preview_max_dimension: env::var("PREVIEW_MAX_DIMENSION")
                .unwrap_or_else(|_| PREVIEW_MAX_DIMENSION.to_string())
                .parse()
                .unwrap_or(PREVIEW_MAX_DIMENSION),
            preview_max_source_bytes: env::var("PREVIEW_MAX_SOURCE_MB")
                .unwrap_or_else(|_| PREVIEW_MAX_SOURCE_MB.to_string())
                .parse::<u64>()
                .unwrap_or(PREVIEW_MAX_SOURCE_MB)
                * 1024
                * 1024,
        };

        Ok(Config {
            environment,
            log_format,
            storage,
            metadata,
            ingest,
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.ingest.validate()?;

        match self.storage.backend {
            StorageBackend::S3 => {
                if self.storage.s3_bucket.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_BUCKET must be set when STORAGE_BACKEND=s3"
                    ));
                }
                if self.storage.s3_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when STORAGE_BACKEND=s3"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.storage.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when STORAGE_BACKEND=local"
                    ));
                }
                if self.storage.local_storage_base_url.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_BASE_URL must be set when STORAGE_BACKEND=local"
                    ));
                }
            }
            StorageBackend::Memory => {
                if self.is_production() {
                    return Err(anyhow::anyhow!(
                        "STORAGE_BACKEND=memory is not allowed in production"
                    ));
                }
            }
        }

        match self.metadata.backend {
            MetadataBackend::Postgres => {
                if self.metadata.database_url.is_none() {
                    return Err(anyhow::anyhow!(
                        "DATABASE_URL must be set when METADATA_BACKEND=postgres"
                    ));
                }
            }
            MetadataBackend::Memory => {
                if self.is_production() {
                    return Err(anyhow::anyhow!(
                        "METADATA_BACKEND=memory is not allowed in production"
                    ));
                }
            }
        }

        Ok(())
    }
}
