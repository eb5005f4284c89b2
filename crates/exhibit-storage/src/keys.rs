//! Shared key handling for storage backends.
//!
//! Object path format: `{owner_id}/{report_id}-{sequence}.{ext}` inside a namespace.
//! Every backend validates namespaces and paths through this module.

use crate::{StorageError, StorageResult};

/// Build the object path of one evidence file.
pub fn evidence_object_path(owner_id: &str, report_id: &str, sequence: u64, ext: &str) -> String {
    format!("{}/{}-{}.{}", owner_id, report_id, sequence, ext)
}

/// Validate a namespace: one non-empty path segment.
pub fn validate_namespace(namespace: &str) -> StorageResult<()> {
    if namespace.is_empty()
        || namespace.contains('/')
        || namespace.contains('\\')
        || namespace == "."
        || namespace.contains("..")
    {
        return Err(StorageError::InvalidKey(format!(
            "Invalid namespace: {:?}",
            namespace
        )));
    }
    Ok(())
}

/// Validate a relative object path.
pub fn validate_path(path: &str) -> StorageResult<()> {
    if path.is_empty()
        || path.contains("..")
        || path.starts_with('/')
        || path.contains('\\')
        || path.split('/').any(|segment| segment.is_empty())
    {
        return Err(StorageError::InvalidKey(format!(
            "Invalid object path: {:?}",
            path
        )));
    }
    Ok(())
}

/// Validate both parts and join them into a full key.
pub fn object_key(namespace: &str, path: &str) -> StorageResult<String> {
    validate_namespace(namespace)?;
    validate_path(path)?;
    Ok(format!("{}/{}", namespace, path))
}
