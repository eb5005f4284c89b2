//! Evidence record models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Persisted result of a committed staged file. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct EvidenceRecord {
    pub id: Uuid,
    pub report_id: Uuid,
    pub owner_id: String,
    pub object_locator: String,
    pub media_type: String,
    pub filename: String,
    pub size_bytes: i64,
    /// Hex SHA-256 of the payload as read during intake.
    pub sha256: String,
    pub created_at: DateTime<Utc>,
}

/// Input for creating an evidence record.
#[derive(Debug, Clone)]
pub struct NewEvidenceRecord {
    pub report_id: Uuid,
    pub owner_id: String,
    pub object_locator: String,
    pub media_type: String,
    pub filename: String,
    pub size_bytes: i64,
    pub sha256: String,
}
