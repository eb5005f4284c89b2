//! Output shaping for the `exhibit` binary.

use exhibit_core::models::{EntryError, EvidenceRecord, StagedFileId};
use exhibit_core::{ErrorMetadata, IngestError};
use exhibit_ingest::{CommitResult, StageOutcome};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

/// One file that did not make it, by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileProblem {
    pub file: String,
    pub kind: String,
    /// Machine-readable code, e.g. `TRANSFER_ERROR`
    pub code: &'static str,
    pub message: String,
    /// Whether committing again can fix it
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<&'static str>,
}

/// JSON document printed by `exhibit ingest`.
#[derive(Debug, Clone, Serialize)]
pub struct IngestSummary {
    pub report_id: Uuid,
    /// "n of m committed"
    pub summary: String,
    pub records: Vec<EvidenceRecord>,
    pub failures: Vec<FileProblem>,
    pub rejected: Vec<FileProblem>,
}

impl IngestSummary {
    /// `filenames` maps staged ids to the names they were staged under.
    pub fn new(
        outcome: &StageOutcome,
        result: &CommitResult,
        filenames: &HashMap<StagedFileId, String>,
    ) -> Self {
        let failures = result
            .failures
            .iter()
            .map(|(id, error)| problem(filenames.get(id).cloned().unwrap_or_else(|| id.to_string()), error))
            .collect();
        let rejected = outcome
            .rejected
            .iter()
            .map(|r| problem(r.filename.clone(), &r.error.to_entry_error()))
            .collect();

        Self {
            report_id: result.report_id,
            summary: format!(
                "{} of {} committed",
                result.records.len(),
                result.attempted() + outcome.rejected.len()
            ),
            records: result.records.clone(),
            failures,
            rejected,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.rejected.is_empty()
    }
}

fn problem(file: String, error: &EntryError) -> FileProblem {
    let classified = IngestError::from(error.clone());
    FileProblem {
        file,
        kind: error.kind.to_string(),
        code: classified.error_code(),
        message: error.message.clone(),
        retryable: classified.is_recoverable(),
        action: classified.suggested_action(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exhibit_core::models::ErrorKind;
    use exhibit_ingest::RejectedFile;

    fn record(report_id: Uuid, filename: &str) -> EvidenceRecord {
        EvidenceRecord {
            id: Uuid::new_v4(),
            report_id,
            owner_id: "u1".to_string(),
            object_locator: format!("memory://evidence/u1/{}", filename),
            media_type: "image/png".to_string(),
            filename: filename.to_string(),
            size_bytes: 10,
            sha256: "00".repeat(32),
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_summary_counts_rejections_and_failures() {
        let report_id = Uuid::new_v4();
        let failed = StagedFileId::new();
        let outcome = StageOutcome {
            staged: vec![StagedFileId::new(), failed],
            rejected: vec![RejectedFile {
                index: 2,
                filename: "empty.png".to_string(),
                error: IngestError::Validation("File is empty".to_string()),
            }],
        };
        let result = CommitResult {
            report_id,
            records: vec![record(report_id, "a.png")],
            failures: vec![(failed, EntryError::new(ErrorKind::Transfer, "timeout"))],
        };
        let names = HashMap::from([(failed, "b.png".to_string())]);

        let summary = IngestSummary::new(&outcome, &result, &names);
        assert_eq!(summary.summary, "1 of 3 committed");
        assert!(!summary.is_complete());
        assert_eq!(
            summary.failures,
            vec![FileProblem {
                file: "b.png".to_string(),
                kind: "transfer".to_string(),
                code: "TRANSFER_ERROR",
                message: "timeout".to_string(),
                retryable: true,
                action: Some("Commit again to retry the failed files"),
            }]
        );
        assert_eq!(summary.rejected[0].kind, "validation");
        assert_eq!(summary.rejected[0].code, "VALIDATION_ERROR");
        assert!(!summary.rejected[0].retryable);
    }

    #[test]
    fn test_unknown_failure_falls_back_to_id() {
        let report_id = Uuid::new_v4();
        let failed = StagedFileId::new();
        let result = CommitResult {
            report_id,
            records: Vec::new(),
            failures: vec![(failed, EntryError::new(ErrorKind::Persistence, "down"))],
        };
        let summary = IngestSummary::new(&StageOutcome::default(), &result, &HashMap::new());
        assert_eq!(summary.failures[0].file, failed.to_string());
        assert_eq!(summary.summary, "0 of 1 committed");
    }
}
