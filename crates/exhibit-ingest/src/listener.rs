//! Downstream notification of committed evidence.
//!
//! Implementors deliver notifications elsewhere (queues, websockets, audit logs).
//! A failing listener never fails the commit; the coordinator only logs it.

use async_trait::async_trait;
use exhibit_core::models::EvidenceRecord;
use uuid::Uuid;

#[async_trait]
pub trait CommitListener: Send + Sync {
    /// Called once per commit that created at least one record.
    async fn on_committed(&self, report_id: Uuid, records: &[EvidenceRecord])
        -> anyhow::Result<()>;
}

/// Listener for when nothing downstream cares
pub struct NoOpCommitListener;

#[async_trait]
impl CommitListener for NoOpCommitListener {
    async fn on_committed(
        &self,
        _report_id: Uuid,
        _records: &[EvidenceRecord],
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Writes one log line per committed record.
pub struct LoggingCommitListener;

#[async_trait]
impl CommitListener for LoggingCommitListener {
    async fn on_committed(
        &self,
        report_id: Uuid,
        records: &[EvidenceRecord],
    ) -> anyhow::Result<()> {
        for record in records {
            tracing::info!(
                report_id = %report_id,
                record_id = %record.id,
                object_locator = %record.object_locator,
                sha256 = %record.sha256,
                size_bytes = record.size_bytes,
                "Evidence committed"
            );
        }
        Ok(())
    }
}
