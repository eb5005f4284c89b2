//! Error types module
//!
//! `IngestError` is the classified failure taxonomy of the ingestion pipeline.
//! Component errors (storage, metadata store, preview, staging) are mapped into
//! it at the coordinator boundary so callers only ever see these kinds.

use crate::models::{EntryError, ErrorKind};

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata describing how an error should be reported and handled.
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g., "TRANSFER_ERROR")
    fn error_code(&self) -> &'static str;

    /// Whether the failed operation can be retried as-is
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the caller
    fn suggested_action(&self) -> Option<&'static str>;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IngestError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Preview generation failed: {0}")]
    Preview(String),

    #[error("Transfer failed: {0}")]
    Transfer(String),

    #[error("Namespace provisioning failed: {0}")]
    Provisioning(String),

    #[error("Persistence failed: {0}")]
    Persistence(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IngestError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IngestError::Validation(_) => ErrorKind::Validation,
            IngestError::Preview(_) => ErrorKind::Preview,
            IngestError::Transfer(_) => ErrorKind::Transfer,
            IngestError::Provisioning(_) => ErrorKind::Provisioning,
            IngestError::Persistence(_) => ErrorKind::Persistence,
            IngestError::Internal(_) => ErrorKind::Internal,
        }
    }

    fn message(&self) -> &str {
        match self {
            IngestError::Validation(m)
            | IngestError::Preview(m)
            | IngestError::Transfer(m)
            | IngestError::Provisioning(m)
            | IngestError::Persistence(m)
            | IngestError::Internal(m) => m,
        }
    }

    /// Convert into the form recorded on a staged entry.
    pub fn to_entry_error(&self) -> EntryError {
        EntryError::new(self.kind(), self.message())
    }
}

impl From<EntryError> for IngestError {
    fn from(err: EntryError) -> Self {
        match err.kind {
            ErrorKind::Validation => IngestError::Validation(err.message),
            ErrorKind::Preview => IngestError::Preview(err.message),
            ErrorKind::Transfer => IngestError::Transfer(err.message),
            ErrorKind::Provisioning => IngestError::Provisioning(err.message),
            ErrorKind::Persistence => IngestError::Persistence(err.message),
            ErrorKind::Internal => IngestError::Internal(err.message),
        }
    }
}

/// Static metadata for each variant: (error_code, recoverable, suggested_action, log_level).
fn ingest_error_static_metadata(
    err: &IngestError,
) -> (&'static str, bool, Option<&'static str>, LogLevel) {
    match err {
        IngestError::Validation(_) => (
            "VALIDATION_ERROR",
            false,
            Some("Check the file type and size, then stage it again"),
            LogLevel::Debug,
        ),
        IngestError::Preview(_) => ("PREVIEW_ERROR", false, None, LogLevel::Debug),
        IngestError::Transfer(_) => (
            "TRANSFER_ERROR",
            true,
            Some("Commit again to retry the failed files"),
            LogLevel::Warn,
        ),
        IngestError::Provisioning(_) => (
            "PROVISIONING_ERROR",
            true,
            Some("Check storage configuration and commit again"),
            LogLevel::Error,
        ),
        IngestError::Persistence(_) => (
            "PERSISTENCE_ERROR",
            true,
            Some("Commit again to retry the failed files"),
            LogLevel::Error,
        ),
        IngestError::Internal(_) => (
            "INTERNAL_ERROR",
            false,
            Some("Contact support if this error persists"),
            LogLevel::Error,
        ),
    }
}

impl ErrorMetadata for IngestError {
    fn error_code(&self) -> &'static str {
        ingest_error_static_metadata(self).0
    }

    fn is_recoverable(&self) -> bool {
        ingest_error_static_metadata(self).1
    }

    fn suggested_action(&self) -> Option<&'static str> {
        ingest_error_static_metadata(self).2
    }

    fn log_level(&self) -> LogLevel {
        ingest_error_static_metadata(self).3
    }
}
