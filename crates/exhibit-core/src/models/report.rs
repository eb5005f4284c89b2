//! Report (case record) models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "report_status", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Draft,
    Submitted,
}

impl Display for ReportStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ReportStatus::Draft => write!(f, "draft"),
            ReportStatus::Submitted => write!(f, "submitted"),
        }
    }
}

/// Case record that evidence is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ReportDraft {
    pub id: Uuid,
    pub owner_id: String,
    pub title: String,
    pub status: ReportStatus,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a report.
#[derive(Debug, Clone)]
pub struct NewReport {
    pub id: Uuid,
    pub owner_id: String,
    pub title: String,
    pub status: ReportStatus,
}
