use exhibit_core::models::{EvidenceRecord, NewEvidenceRecord};
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use super::map_insert_error;
use crate::traits::{validate_new_record, MetadataResult};

/// Repository for the evidence_records table
#[derive(Clone)]
pub struct EvidenceRepository {
    pool: PgPool,
}

impl EvidenceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert an evidence record. The parent report must exist.
    #[tracing::instrument(skip(self, record), fields(db.table = "evidence_records", db.operation = "insert", report_id = %record.report_id))]
    pub async fn create(&self, record: NewEvidenceRecord) -> MetadataResult<EvidenceRecord> {
        validate_new_record(&record)?;

        let row = sqlx::query_as::<Postgres, EvidenceRecord>(
            r#"
            INSERT INTO evidence_records
                (id, report_id, owner_id, object_locator, media_type, filename, size_bytes, sha256)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, report_id, owner_id, object_locator, media_type, filename,
                      size_bytes, sha256, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(record.report_id)
        .bind(&record.owner_id)
        .bind(&record.object_locator)
        .bind(&record.media_type)
        .bind(&record.filename)
        .bind(record.size_bytes)
        .bind(&record.sha256)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, record.report_id))?;

        Ok(row)
    }

    /// List evidence of a report, oldest first
    #[tracing::instrument(skip(self), fields(db.table = "evidence_records", db.operation = "select", report_id = %report_id))]
    pub async fn list_by_report(&self, report_id: Uuid) -> MetadataResult<Vec<EvidenceRecord>> {
        let rows = sqlx::query_as::<Postgres, EvidenceRecord>(
            r#"
            SELECT id, report_id, owner_id, object_locator, media_type, filename,
                   size_bytes, sha256, created_at
            FROM evidence_records
            WHERE report_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(report_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
