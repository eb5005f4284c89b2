//! End-to-end ingestion from disk into filesystem storage.
//!
//! Run with: `cargo test -p exhibit-ingest --test local_storage_test`

mod helpers;

use exhibit_core::IngestConfig;
use exhibit_db::{MemoryMetadataStore, MetadataStore};
use exhibit_ingest::{IngestionCoordinator, RawHandle};
use exhibit_storage::{LocalStorage, Storage};
use helpers::{pdf, png, test_config};
use sha2::{Digest, Sha256};
use std::sync::Arc;

#[tokio::test]
async fn test_ingest_files_from_disk() {
    let inbox = tempfile::tempdir().unwrap();
    let objects = tempfile::tempdir().unwrap();

    let photo = inbox.path().join("window.png");
    let statement = inbox.path().join("witness statement.pdf");
    tokio::fs::write(&photo, png(64, 64)).await.unwrap();
    tokio::fs::write(&statement, pdf()).await.unwrap();

    let storage = Arc::new(
        LocalStorage::new(objects.path(), "http://localhost:8080/objects".to_string())
            .await
            .unwrap(),
    );
    let metadata = Arc::new(MemoryMetadataStore::new());
    let config = IngestConfig {
        namespace: "cases".to_string(),
        ..test_config()
    };
    let coordinator = IngestionCoordinator::new(config, storage.clone(), metadata.clone());

    let outcome = coordinator
        .stage(vec![
            RawHandle::from_path(&photo),
            RawHandle::from_path(&statement),
        ])
        .await;
    assert_eq!(outcome.staged.len(), 2);

    let result = coordinator.commit("officer-7", None).await.unwrap();
    assert_eq!(result.records.len(), 2);
    assert!(result.failures.is_empty());

    let statement_record = &result.records[1];
    assert_eq!(statement_record.filename, "witness_statement.pdf");
    assert_eq!(statement_record.media_type, "application/pdf");
    let expected_path = format!("officer-7/{}-1.pdf", result.report_id);
    assert_eq!(
        statement_record.object_locator,
        format!("http://localhost:8080/objects/cases/{}", expected_path)
    );

    let stored = storage.get_object("cases", &expected_path).await.unwrap();
    let original = tokio::fs::read(&statement).await.unwrap();
    assert_eq!(stored.as_ref(), original.as_slice());
    assert_eq!(
        statement_record.sha256,
        hex::encode(Sha256::digest(&original))
    );

    let evidence = metadata.list_evidence(result.report_id).await.unwrap();
    assert_eq!(evidence.len(), 2);
    assert!(objects.path().join("cases").is_dir());
}
