//! Metadata store abstraction: reports and the evidence records attached to them.

use async_trait::async_trait;
use exhibit_core::models::{EvidenceRecord, NewEvidenceRecord, NewReport, ReportDraft};
use thiserror::Error;
use uuid::Uuid;

/// Metadata store errors
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Report not found: {0}")]
    ReportNotFound(Uuid),

    #[error("Report already exists: {0}")]
    DuplicateReport(Uuid),

    #[error("Invalid record: {0}")]
    Invalid(String),

    #[error("Metadata store unavailable: {0}")]
    Unavailable(String),
}

pub type MetadataResult<T> = Result<T, MetadataError>;

/// Creates case records and their evidence records.
///
/// Records are append-only: nothing in the ingestion pipeline updates or deletes them.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Create a report with the caller-chosen id.
    async fn create_report(&self, report: NewReport) -> MetadataResult<ReportDraft>;

    /// Append an evidence record to an existing report.
    async fn create_evidence_record(
        &self,
        record: NewEvidenceRecord,
    ) -> MetadataResult<EvidenceRecord>;

    async fn get_report(&self, id: Uuid) -> MetadataResult<Option<ReportDraft>>;

    /// Evidence of a report, oldest first.
    async fn list_evidence(&self, report_id: Uuid) -> MetadataResult<Vec<EvidenceRecord>>;
}

pub(crate) fn validate_new_record(record: &NewEvidenceRecord) -> MetadataResult<()> {
    if record.object_locator.trim().is_empty() {
        return Err(MetadataError::Invalid(
            "object_locator must not be empty".to_string(),
        ));
    }
    if record.owner_id.trim().is_empty() {
        return Err(MetadataError::Invalid("owner_id must not be empty".to_string()));
    }
    if record.size_bytes < 0 {
        return Err(MetadataError::Invalid(
            "size_bytes must not be negative".to_string(),
        ));
    }
    Ok(())
}
