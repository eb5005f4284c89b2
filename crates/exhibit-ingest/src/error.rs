//! Component errors of the ingestion pipeline and their mapping into `IngestError`.

use exhibit_core::models::{StagedFileId, StagedStatus};
use exhibit_core::IngestError;
use exhibit_db::MetadataError;
use exhibit_storage::StorageError;
use thiserror::Error;

/// Rejected staging store operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StagingError {
    #[error("Staged file not found: {0}")]
    NotFound(StagedFileId),

    #[error("Staged file {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: StagedFileId,
        from: StagedStatus,
        to: StagedStatus,
    },

    #[error("Progress of {id} cannot go from {current} back to {requested}")]
    ProgressRegression {
        id: StagedFileId,
        current: u8,
        requested: u8,
    },

    #[error("Progress must be between 0 and 100, got {0}")]
    ProgressOutOfRange(u8),

    #[error("Staging store is full ({capacity} files)")]
    Full { capacity: usize },
}

#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("No preview available for {0}")]
    Unsupported(String),

    #[error("File too large for a preview: {0} bytes")]
    TooLarge(u64),

    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Failed to encode preview: {0}")]
    Encode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Preview task failed: {0}")]
    Task(String),
}

/// Failure while reading a raw payload during intake.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("Failed to read payload: {0}")]
    Io(#[from] std::io::Error),

    #[error("Payload size changed: expected {expected} bytes, read {actual}")]
    SizeMismatch { expected: u64, actual: u64 },
}

impl From<StagingError> for IngestError {
    fn from(err: StagingError) -> Self {
        match err {
            StagingError::NotFound(_) | StagingError::Full { .. } => {
                IngestError::Validation(err.to_string())
            }
            _ => IngestError::Internal(err.to_string()),
        }
    }
}

impl From<PreviewError> for IngestError {
    fn from(err: PreviewError) -> Self {
        IngestError::Preview(err.to_string())
    }
}

impl From<TransferError> for IngestError {
    fn from(err: TransferError) -> Self {
        IngestError::Transfer(err.to_string())
    }
}

/// Storage failures during an object transfer.
pub(crate) fn transfer_error(err: &StorageError) -> IngestError {
    IngestError::Transfer(err.to_string())
}

/// Storage failures while provisioning the namespace.
pub(crate) fn provisioning_error(namespace: &str, err: &StorageError) -> IngestError {
    IngestError::Provisioning(format!("namespace {}: {}", namespace, err))
}

pub(crate) fn persistence_error(err: &MetadataError) -> IngestError {
    IngestError::Persistence(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use exhibit_core::models::ErrorKind;

    #[test]
    fn test_unknown_id_maps_to_validation() {
        let err: IngestError = StagingError::NotFound(StagedFileId::new()).into();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_transfer_and_preview_kinds() {
        let transfer: IngestError = TransferError::SizeMismatch {
            expected: 10,
            actual: 4,
        }
        .into();
        assert_eq!(transfer.kind(), ErrorKind::Transfer);

        let preview: IngestError = PreviewError::Unsupported("audio/mpeg".to_string()).into();
        assert_eq!(preview.kind(), ErrorKind::Preview);
    }

    #[test]
    fn test_provisioning_message_names_namespace() {
        let err = provisioning_error(
            "evidence",
            &StorageError::NamespaceUnavailable("denied".to_string()),
        );
        assert_eq!(err.kind(), ErrorKind::Provisioning);
        assert!(err.to_string().contains("evidence"));
    }
}
