//! Postgres repositories and the `MetadataStore` implementation built from them.

mod evidence;
mod report;

pub use evidence::EvidenceRepository;
pub use report::ReportRepository;

use async_trait::async_trait;
use exhibit_core::models::{EvidenceRecord, NewEvidenceRecord, NewReport, ReportDraft};
use sqlx::PgPool;
use uuid::Uuid;

use crate::traits::{MetadataError, MetadataResult, MetadataStore};

const FOREIGN_KEY_VIOLATION: &str = "23503";
const UNIQUE_VIOLATION: &str = "23505";

/// Classify constraint violations raised by inserts that reference `report_id`.
pub(crate) fn map_insert_error(err: sqlx::Error, report_id: Uuid) -> MetadataError {
    let code = err
        .as_database_error()
        .and_then(|db| db.code())
        .map(|c| c.into_owned());

    match code.as_deref() {
        Some(FOREIGN_KEY_VIOLATION) => MetadataError::ReportNotFound(report_id),
        Some(UNIQUE_VIOLATION) => MetadataError::DuplicateReport(report_id),
        _ => MetadataError::Database(err),
    }
}

/// `MetadataStore` backed by Postgres.
#[derive(Clone)]
pub struct PgMetadataStore {
    reports: ReportRepository,
    evidence: EvidenceRepository,
}

impl PgMetadataStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            reports: ReportRepository::new(pool.clone()),
            evidence: EvidenceRepository::new(pool),
        }
    }
}

#[async_trait]
impl MetadataStore for PgMetadataStore {
    async fn create_report(&self, report: NewReport) -> MetadataResult<ReportDraft> {
        self.reports.create(report).await
    }

    async fn create_evidence_record(
        &self,
        record: NewEvidenceRecord,
    ) -> MetadataResult<EvidenceRecord> {
        self.evidence.create(record).await
    }

    async fn get_report(&self, id: Uuid) -> MetadataResult<Option<ReportDraft>> {
        self.reports.get(id).await
    }

    async fn list_evidence(&self, report_id: Uuid) -> MetadataResult<Vec<EvidenceRecord>> {
        self.evidence.list_by_report(report_id).await
    }
}
