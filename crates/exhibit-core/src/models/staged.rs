//! Staged file models: identity, lifecycle status and the read-only view handed to callers.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

use super::media::MediaCategory;

/// Stable identifier of a staged file. Assigned once at staging time and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StagedFileId(pub Uuid);

impl StagedFileId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for StagedFileId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for StagedFileId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        self.0.fmt(f)
    }
}

impl FromStr for StagedFileId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Lifecycle of a staged file.
///
/// The happy path is `Staged -> Previewing -> Ready -> Uploading -> Uploaded ->
/// Committing -> Committed`. Preview steps may be skipped when intake overtakes them.
/// `Failed` is reachable from every non-terminal state and is left again only by a
/// commit retry. `Removed` and `Committed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StagedStatus {
    Staged,
    Previewing,
    Ready,
    Uploading,
    Uploaded,
    Committing,
    Committed,
    Failed,
    Removed,
}

impl StagedStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, StagedStatus::Committed | StagedStatus::Removed)
    }

    pub fn can_transition_to(self, next: StagedStatus) -> bool {
        use StagedStatus::*;

        if self.is_terminal() {
            return false;
        }
        if matches!(next, Removed) {
            return true;
        }

        match (self, next) {
            (Staged, Previewing | Ready | Uploading | Failed) => true,
            (Previewing, Ready | Uploading | Failed) => true,
            (Ready, Uploading | Failed) => true,
            (Uploading, Uploaded | Failed) => true,
            (Uploaded, Committing | Failed) => true,
            (Committing, Committed | Uploaded | Failed) => true,
            (Failed, Committing) => true,
            _ => false,
        }
    }
}

impl Display for StagedStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let s = match self {
            StagedStatus::Staged => "staged",
            StagedStatus::Previewing => "previewing",
            StagedStatus::Ready => "ready",
            StagedStatus::Uploading => "uploading",
            StagedStatus::Uploaded => "uploaded",
            StagedStatus::Committing => "committing",
            StagedStatus::Committed => "committed",
            StagedStatus::Failed => "failed",
            StagedStatus::Removed => "removed",
        };
        write!(f, "{}", s)
    }
}

/// Classified reason an entry did not make it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Preview,
    Transfer,
    Provisioning,
    Persistence,
    Internal,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let s = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Preview => "preview",
            ErrorKind::Transfer => "transfer",
            ErrorKind::Provisioning => "provisioning",
            ErrorKind::Persistence => "persistence",
            ErrorKind::Internal => "internal",
        };
        write!(f, "{}", s)
    }
}

/// Failure recorded on a staged entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryError {
    pub kind: ErrorKind,
    pub message: String,
}

impl EntryError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Transfer and persistence failures are retried by the next commit.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind, ErrorKind::Transfer | ErrorKind::Persistence)
    }
}

impl Display for EntryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Small in-memory preview of a staged file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preview {
    /// `data:` URI holding the encoded thumbnail.
    pub data_uri: String,
    pub width: u32,
    pub height: u32,
}

/// Read-only projection of a staged file. Never exposes the raw payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedFileView {
    pub id: StagedFileId,
    pub sequence: u64,
    pub filename: String,
    pub media_type: String,
    pub category: MediaCategory,
    pub size_bytes: u64,
    pub progress: u8,
    pub status: StagedStatus,
    pub preview: Option<Preview>,
    pub error: Option<EntryError>,
    pub sha256: Option<String>,
    pub object_locator: Option<String>,
}
