//! Exhibit Core Library
//!
//! This crate provides the domain models, error taxonomy, configuration and
//! constants shared by every Exhibit component: the staging pipeline, the
//! object storage backends and the metadata store.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::{Config, IngestConfig, LogFormat, MetadataBackend, MetadataConfig, StorageConfig};
pub use error::{ErrorMetadata, IngestError, LogLevel};
pub use storage_types::StorageBackend;
