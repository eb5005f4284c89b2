//! Test helpers: fault-injecting storage and metadata doubles plus fixtures.
//!
//! Run with: `cargo test -p exhibit-ingest`. No external services are needed,
//! both doubles delegate to the in-memory backends.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use exhibit_core::models::{
    EvidenceRecord, NewEvidenceRecord, NewReport, ReportDraft, StagedFileId,
    StagedFileView, StagedStatus,
};
use exhibit_core::IngestConfig;
use exhibit_db::{MemoryMetadataStore, MetadataError, MetadataResult, MetadataStore};
use exhibit_ingest::{IngestionCoordinator, RawHandle};
use exhibit_storage::{ObjectStoreStorage, Storage, StorageBackend, StorageError, StorageResult};
use image::{ImageBuffer, ImageFormat, Rgb};
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

/// Failure rule: fail the next `remaining` puts whose path contains `pattern`.
struct PutFailure {
    pattern: String,
    remaining: usize,
}

/// In-memory object storage that can be told to fail.
pub struct FlakyStorage {
    inner: ObjectStoreStorage,
    ensure_calls: AtomicUsize,
    fail_namespace: AtomicBool,
    put_failures: Mutex<Vec<PutFailure>>,
    put_attempts: Mutex<Vec<String>>,
    put_delay: Mutex<Option<Duration>>,
}

impl FlakyStorage {
    pub fn new() -> Self {
        Self {
            inner: ObjectStoreStorage::in_memory(),
            ensure_calls: AtomicUsize::new(0),
            fail_namespace: AtomicBool::new(false),
            put_failures: Mutex::new(Vec::new()),
            put_attempts: Mutex::new(Vec::new()),
            put_delay: Mutex::new(None),
        }
    }

    pub fn fail_puts_matching(&self, pattern: &str, times: usize) {
        self.put_failures.lock().unwrap().push(PutFailure {
            pattern: pattern.to_string(),
            remaining: times,
        });
    }

    pub fn set_namespace_failing(&self, failing: bool) {
        self.fail_namespace.store(failing, Ordering::SeqCst);
    }

    pub fn set_put_delay(&self, delay: Duration) {
        *self.put_delay.lock().unwrap() = Some(delay);
    }

    pub fn ensure_calls(&self) -> usize {
        self.ensure_calls.load(Ordering::SeqCst)
    }

    /// Every put attempt so far, including failed ones.
    pub fn put_attempts(&self) -> Vec<String> {
        self.put_attempts.lock().unwrap().clone()
    }

    pub fn attempts_matching(&self, pattern: &str) -> usize {
        self.put_attempts()
            .iter()
            .filter(|p| p.contains(pattern))
            .count()
    }

    fn take_failure(&self, path: &str) -> bool {
        let mut failures = self.put_failures.lock().unwrap();
        match failures
            .iter_mut()
            .find(|f| f.remaining > 0 && path.contains(&f.pattern))
        {
            Some(failure) => {
                failure.remaining -= 1;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl Storage for FlakyStorage {
    async fn ensure_namespace(&self, namespace: &str) -> StorageResult<()> {
        self.ensure_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_namespace.load(Ordering::SeqCst) {
            return Err(StorageError::NamespaceUnavailable(format!(
                "{} is not reachable",
                namespace
            )));
        }
        self.inner.ensure_namespace(namespace).await
    }

    async fn put_object(
        &self,
        namespace: &str,
        path: &str,
        content_type: &str,
        payload: Bytes,
    ) -> StorageResult<String> {
        self.put_attempts.lock().unwrap().push(path.to_string());
        let delay = *self.put_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.take_failure(path) {
            return Err(StorageError::UploadFailed(format!("injected failure for {}", path)));
        }
        self.inner
            .put_object(namespace, path, content_type, payload)
            .await
    }

    fn public_locator(&self, namespace: &str, path: &str) -> StorageResult<String> {
        self.inner.public_locator(namespace, path)
    }

    async fn get_object(&self, namespace: &str, path: &str) -> StorageResult<Bytes> {
        self.inner.get_object(namespace, path).await
    }

    async fn exists(&self, namespace: &str, path: &str) -> StorageResult<bool> {
        self.inner.exists(namespace, path).await
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Memory
    }
}

/// In-memory metadata store that can be told to fail.
pub struct FlakyMetadataStore {
    pub inner: MemoryMetadataStore,
    report_failures: AtomicUsize,
    record_failures: Mutex<Vec<(String, usize)>>,
}

impl FlakyMetadataStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryMetadataStore::new(),
            report_failures: AtomicUsize::new(0),
            record_failures: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_next_reports(&self, times: usize) {
        self.report_failures.store(times, Ordering::SeqCst);
    }

    /// Fail the next `times` records for files named `filename`.
    pub fn fail_records_for(&self, filename: &str, times: usize) {
        self.record_failures
            .lock()
            .unwrap()
            .push((filename.to_string(), times));
    }

    pub async fn evidence_count(&self) -> usize {
        self.inner.evidence_count().await
    }
}

#[async_trait]
impl MetadataStore for FlakyMetadataStore {
    async fn create_report(&self, report: NewReport) -> MetadataResult<ReportDraft> {
        let remaining = self.report_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.report_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(MetadataError::Unavailable("injected report failure".to_string()));
        }
        self.inner.create_report(report).await
    }

    async fn create_evidence_record(
        &self,
        record: NewEvidenceRecord,
    ) -> MetadataResult<EvidenceRecord> {
        let fail = {
            let mut failures = self.record_failures.lock().unwrap();
            match failures
                .iter_mut()
                .find(|(name, remaining)| *remaining > 0 && *name == record.filename)
            {
                Some((_, remaining)) => {
                    *remaining -= 1;
                    true
                }
                None => false,
            }
        };
        if fail {
            return Err(MetadataError::Unavailable(format!(
                "injected record failure for {}",
                record.filename
            )));
        }
        self.inner.create_evidence_record(record).await
    }

    async fn get_report(&self, id: Uuid) -> MetadataResult<Option<ReportDraft>> {
        self.inner.get_report(id).await
    }

    async fn list_evidence(&self, report_id: Uuid) -> MetadataResult<Vec<EvidenceRecord>> {
        self.inner.list_evidence(report_id).await
    }
}

/// Ingest settings with small chunks and no transfer retries.
pub fn test_config() -> IngestConfig {
    IngestConfig {
        max_staged_files: 10,
        transfer_max_retries: 0,
        transfer_retry_base: Duration::from_millis(1),
        progress_chunk_bytes: 256,
        preview_max_dimension: 32,
        ..IngestConfig::default()
    }
}

pub struct TestPipeline {
    pub coordinator: Arc<IngestionCoordinator>,
    pub storage: Arc<FlakyStorage>,
    pub metadata: Arc<FlakyMetadataStore>,
}

pub fn pipeline() -> TestPipeline {
    pipeline_with(test_config())
}

pub fn pipeline_with(config: IngestConfig) -> TestPipeline {
    let storage = Arc::new(FlakyStorage::new());
    let metadata = Arc::new(FlakyMetadataStore::new());
    let coordinator = Arc::new(IngestionCoordinator::new(
        config,
        storage.clone(),
        metadata.clone(),
    ));
    TestPipeline {
        coordinator,
        storage,
        metadata,
    }
}

/// PNG image of the given size.
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let img = ImageBuffer::from_pixel(width, height, Rgb([40u8, 90, 160]));
    let mut buffer = Vec::new();
    img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .unwrap();
    buffer
}

pub fn pdf() -> Vec<u8> {
    let mut data = b"%PDF-1.4\n".to_vec();
    data.extend_from_slice(&[b'x'; 2000]);
    data.extend_from_slice(b"\n%%EOF\n");
    data
}

pub fn image_handles(count: usize) -> Vec<RawHandle> {
    (0..count)
        .map(|i| RawHandle::from_bytes(format!("photo-{}.png", i), png(48 + i as u32, 24)))
        .collect()
}

/// Wait for intake of every staged file, failing the test after 10 seconds.
pub async fn settle(coordinator: &IngestionCoordinator) {
    tokio::time::timeout(Duration::from_secs(10), coordinator.wait_for_intake())
        .await
        .expect("intake did not finish");
}

/// Wait until `id` reaches `status`.
pub async fn wait_for_status(
    coordinator: &IngestionCoordinator,
    id: StagedFileId,
    status: StagedStatus,
) -> StagedFileView {
    let mut revisions = coordinator.subscribe();
    let wait = async {
        loop {
            if let Some(view) = coordinator.get(id) {
                if view.status == status {
                    return view;
                }
            }
            revisions.changed().await.unwrap();
        }
    };
    tokio::time::timeout(Duration::from_secs(10), wait)
        .await
        .expect("status not reached")
}

/// Wait until every entry in `ids` carries a preview.
pub async fn wait_for_previews(coordinator: &IngestionCoordinator, ids: &[StagedFileId]) {
    let mut revisions = coordinator.subscribe();
    let wait = async {
        loop {
            let ready = ids
                .iter()
                .all(|id| coordinator.get(*id).is_some_and(|v| v.preview.is_some()));
            if ready {
                return;
            }
            revisions.changed().await.unwrap();
        }
    };
    tokio::time::timeout(Duration::from_secs(10), wait)
        .await
        .expect("previews not generated");
}
