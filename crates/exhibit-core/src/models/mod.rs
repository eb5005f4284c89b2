//! Data models for the application
//!
//! Staged files live only inside the ingestion pipeline; reports and evidence
//! records are what the metadata store persists.

mod evidence;
pub mod media;
mod report;
mod staged;

// Re-export all models for convenient imports
pub use evidence::*;
pub use media::MediaCategory;
pub use report::*;
pub use staged::*;
