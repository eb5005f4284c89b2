use exhibit_core::models::{NewReport, ReportDraft};
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use super::map_insert_error;
use crate::traits::MetadataResult;

/// Repository for the reports table
#[derive(Clone)]
pub struct ReportRepository {
    pool: PgPool,
}

impl ReportRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a report and return it
    #[tracing::instrument(skip(self, report), fields(db.table = "reports", db.operation = "insert", db.record_id = %report.id))]
    pub async fn create(&self, report: NewReport) -> MetadataResult<ReportDraft> {
        let id = report.id;
        let row = sqlx::query_as::<Postgres, ReportDraft>(
            r#"
            INSERT INTO reports (id, owner_id, title, status)
            VALUES ($1, $2, $3, $4)
            RETURNING id, owner_id, title, status, created_at
            "#,
        )
        .bind(report.id)
        .bind(&report.owner_id)
        .bind(&report.title)
        .bind(report.status)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, id))?;

        Ok(row)
    }

    /// Fetch a report by id
    #[tracing::instrument(skip(self), fields(db.table = "reports", db.operation = "select", db.record_id = %id))]
    pub async fn get(&self, id: Uuid) -> MetadataResult<Option<ReportDraft>> {
        let row = sqlx::query_as::<Postgres, ReportDraft>(
            "SELECT id, owner_id, title, status, created_at FROM reports WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }
}
