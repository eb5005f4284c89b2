//! In-process `MetadataStore`, used for development and tests.

use async_trait::async_trait;
use chrono::Utc;
use exhibit_core::models::{EvidenceRecord, NewEvidenceRecord, NewReport, ReportDraft};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::traits::{validate_new_record, MetadataError, MetadataResult, MetadataStore};

#[derive(Default)]
struct Tables {
    reports: HashMap<Uuid, ReportDraft>,
    // Per report, in insertion order.
    evidence: HashMap<Uuid, Vec<EvidenceRecord>>,
}

/// Metadata store holding reports and evidence in memory.
#[derive(Default)]
pub struct MemoryMetadataStore {
    tables: RwLock<Tables>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of evidence records across all reports.
    pub async fn evidence_count(&self) -> usize {
        self.tables
            .read()
            .await
            .evidence
            .values()
            .map(|records| records.len())
            .sum()
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn create_report(&self, report: NewReport) -> MetadataResult<ReportDraft> {
        let mut tables = self.tables.write().await;
        if tables.reports.contains_key(&report.id) {
            return Err(MetadataError::DuplicateReport(report.id));
        }

        let draft = ReportDraft {
            id: report.id,
            owner_id: report.owner_id,
            title: report.title,
            status: report.status,
            created_at: Utc::now(),
        };
        tables.reports.insert(draft.id, draft.clone());
        tracing::debug!(report_id = %draft.id, "Report created in memory store");
        Ok(draft)
    }

    async fn create_evidence_record(
        &self,
        record: NewEvidenceRecord,
    ) -> MetadataResult<EvidenceRecord> {
        validate_new_record(&record)?;

        let mut tables = self.tables.write().await;
        if !tables.reports.contains_key(&record.report_id) {
            return Err(MetadataError::ReportNotFound(record.report_id));
        }

        let evidence = EvidenceRecord {
            id: Uuid::new_v4(),
            report_id: record.report_id,
            owner_id: record.owner_id,
            object_locator: record.object_locator,
            media_type: record.media_type,
            filename: record.filename,
            size_bytes: record.size_bytes,
            sha256: record.sha256,
            created_at: Utc::now(),
        };
        tables
            .evidence
            .entry(evidence.report_id)
            .or_default()
            .push(evidence.clone());
        Ok(evidence)
    }

    async fn get_report(&self, id: Uuid) -> MetadataResult<Option<ReportDraft>> {
        Ok(self.tables.read().await.reports.get(&id).cloned())
    }

    async fn list_evidence(&self, report_id: Uuid) -> MetadataResult<Vec<EvidenceRecord>> {
        Ok(self
            .tables
            .read()
            .await
            .evidence
            .get(&report_id)
            .cloned()
            .unwrap_or_default())
    }
}
