//! Exhibit metadata store
//!
//! Persists reports and the evidence records that reference stored objects.
//! Two backends implement [`MetadataStore`]:
//!
//! - **Postgres**: sqlx repositories over the `reports` and `evidence_records` tables
//! - **Memory**: process-local tables for development and tests

pub mod memory;
pub mod repository;
pub mod setup;
pub mod traits;

pub use memory::MemoryMetadataStore;
pub use repository::{EvidenceRepository, PgMetadataStore, ReportRepository};
pub use setup::{connect, create_metadata_store, run_migrations};
pub use traits::{MetadataError, MetadataResult, MetadataStore};
