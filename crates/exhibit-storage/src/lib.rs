//! Exhibit Storage Library
//!
//! This crate provides the object storage abstraction evidence payloads are
//! written through, with a local filesystem backend and `object_store` backed
//! S3 and in-memory backends.
//!
//! # Key format
//!
//! Objects are addressed by `(namespace, path)`. The namespace is one path segment
//! (a directory for local storage, a key prefix for object stores); evidence paths
//! follow `{owner_id}/{report_id}-{sequence}.{ext}`. Keys must not contain `..` or a
//! leading `/`. Key handling is centralized in the `keys` module so all backends
//! stay consistent.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(any(feature = "storage-s3", feature = "storage-memory"))]
pub mod object;
pub mod traits;

// Re-export commonly used types
pub use exhibit_core::StorageBackend;
pub use factory::create_storage;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(any(feature = "storage-s3", feature = "storage-memory"))]
pub use object::ObjectStoreStorage;
pub use traits::{Storage, StorageError, StorageResult};
