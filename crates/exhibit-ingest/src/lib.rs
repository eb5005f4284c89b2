//! Exhibit ingestion pipeline
//!
//! Files are staged into a [`FileStagingStore`], previewed and read in by
//! background tasks, and committed by the [`IngestionCoordinator`]: objects are
//! transferred to [`exhibit_storage::Storage`] first, then one evidence record
//! per object is written to [`exhibit_db::MetadataStore`].
//!
//! ```text
//! stage ──▶ staged ──▶ previewing ──▶ uploading (0..100) ──▶ uploaded
//!                                                              │ commit
//!                                        committed ◀── committing
//! ```
//!
//! Any non-terminal entry can fail or be removed. Failed transfers and record
//! writes are retried by the next commit.

pub mod coordinator;
pub mod error;
pub mod handle;
pub mod listener;
pub mod preview;
pub mod progress;
pub mod staging;
pub mod validation;

pub use coordinator::{
    CommitRequest, CommitResult, IngestionCoordinator, RejectedFile, StageOutcome,
};
pub use error::{PreviewError, StagingError, TransferError};
pub use handle::RawHandle;
pub use listener::{CommitListener, LoggingCommitListener, NoOpCommitListener};
pub use preview::{PreviewGenerator, ThumbnailPreviewGenerator};
pub use progress::{IntakeEvent, IntakeOutput, ProgressEmitter};
pub use staging::{FileStagingStore, NewStagedFile};
