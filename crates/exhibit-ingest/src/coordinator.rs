//! Ingestion coordinator
//!
//! Owns the staging store and drives every staged file through preview and intake,
//! then commits the staged set in two phases: objects go to storage first, evidence
//! records are written to the metadata store second. A failure in either phase is
//! recorded on the affected entry only, so a commit can partly succeed and the next
//! commit retries what is left.

use bytes::Bytes;
use exhibit_core::constants::{DEFAULT_REPORT_TITLE, SNIFF_LEN};
use exhibit_core::models::media::extension_for_mime;
use exhibit_core::models::{
    EntryError, EvidenceRecord, NewEvidenceRecord, NewReport, ReportDraft, ReportStatus,
    StagedFileId, StagedFileView, StagedStatus,
};
use exhibit_core::{ErrorMetadata, IngestConfig, IngestError, LogLevel};
use exhibit_db::MetadataStore;
use exhibit_storage::keys::evidence_object_path;
use exhibit_storage::{Storage, StorageError};
use futures::StreamExt;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{persistence_error, provisioning_error, transfer_error, PreviewError};
use crate::handle::RawHandle;
use crate::listener::{CommitListener, NoOpCommitListener};
use crate::preview::{PreviewGenerator, ThumbnailPreviewGenerator};
use crate::progress::{IntakeEvent, ProgressEmitter};
use crate::staging::{CommitCandidate, FileStagingStore, NewStagedFile};
use crate::validation::{sanitize_filename, validate_media, validate_owner_id, validate_size};

const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(30);

/// A file `stage` refused.
#[derive(Debug, Clone)]
pub struct RejectedFile {
    /// Position in the input of `stage`.
    pub index: usize,
    pub filename: String,
    pub error: IngestError,
}

#[derive(Debug, Clone, Default)]
pub struct StageOutcome {
    pub staged: Vec<StagedFileId>,
    pub rejected: Vec<RejectedFile>,
}

#[derive(Debug, Clone)]
pub struct CommitRequest {
    pub owner_id: String,
    /// Existing report to attach evidence to. A new one is minted when absent.
    pub report_id: Option<Uuid>,
    /// Title of a newly created report.
    pub title: Option<String>,
}

impl CommitRequest {
    pub fn new(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            report_id: None,
            title: None,
        }
    }

    pub fn with_report(mut self, report_id: Uuid) -> Self {
        self.report_id = Some(report_id);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Outcome of one commit. Partial failure is reported here, never as an `Err`.
#[derive(Debug, Clone, Serialize)]
pub struct CommitResult {
    pub report_id: Uuid,
    pub records: Vec<EvidenceRecord>,
    pub failures: Vec<(StagedFileId, EntryError)>,
}

impl CommitResult {
    /// Number of entries this commit accounted for.
    pub fn attempted(&self) -> usize {
        self.records.len() + self.failures.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

enum TransferOutcome {
    Stored(String),
    Failed(IngestError),
    // Entry removed while its transfer was in flight.
    Discarded,
}

/// Exponential backoff for transfer retries, capped at 30 seconds.
pub(crate) fn retry_backoff(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
        .min(MAX_RETRY_BACKOFF)
}

pub struct IngestionCoordinator {
    config: IngestConfig,
    store: Arc<FileStagingStore>,
    storage: Arc<dyn Storage>,
    metadata: Arc<dyn MetadataStore>,
    preview: Arc<dyn PreviewGenerator>,
    listener: Arc<dyn CommitListener>,
    emitter: ProgressEmitter,
    transfers: Arc<Semaphore>,
    provisioned: Mutex<HashSet<String>>,
    commit_lock: Mutex<()>,
}

impl IngestionCoordinator {
    pub fn new(
        config: IngestConfig,
        storage: Arc<dyn Storage>,
        metadata: Arc<dyn MetadataStore>,
    ) -> Self {
        let preview = Arc::new(ThumbnailPreviewGenerator::new(
            config.preview_max_dimension,
            config.preview_max_source_bytes,
        ));
        Self {
            store: Arc::new(FileStagingStore::with_capacity_limit(
                config.max_staged_files,
            )),
            storage,
            metadata,
            preview,
            listener: Arc::new(NoOpCommitListener),
            emitter: ProgressEmitter::new(config.progress_chunk_bytes),
            transfers: Arc::new(Semaphore::new(config.max_concurrent_transfers.max(1))),
            provisioned: Mutex::new(HashSet::new()),
            commit_lock: Mutex::new(()),
            config,
        }
    }

    pub fn with_preview_generator(mut self, preview: Arc<dyn PreviewGenerator>) -> Self {
        self.preview = preview;
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn CommitListener>) -> Self {
        self.listener = listener;
        self
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Validate and stage `files`. Returns once every file is validated; preview
    /// and intake continue in the background.
    #[tracing::instrument(skip_all, fields(count = files.len()))]
    pub async fn stage(&self, files: Vec<RawHandle>) -> StageOutcome {
        let mut outcome = StageOutcome::default();

        for (index, handle) in files.into_iter().enumerate() {
            let filename = sanitize_filename(&handle.filename());
            match self.stage_one(handle, filename.clone()).await {
                Ok(id) => outcome.staged.push(id),
                Err(error) => {
                    tracing::debug!(index, filename = %filename, error = %error, "File rejected");
                    outcome.rejected.push(RejectedFile {
                        index,
                        filename,
                        error,
                    });
                }
            }
        }

        tracing::info!(
            staged = outcome.staged.len(),
            rejected = outcome.rejected.len(),
            "Files staged"
        );
        outcome
    }

    async fn stage_one(
        &self,
        handle: RawHandle,
        filename: String,
    ) -> Result<StagedFileId, IngestError> {
        let unreadable =
            |e: std::io::Error| IngestError::Validation(format!("Cannot read {}: {}", filename, e));

        let size_bytes = handle.len().await.map_err(unreadable)?;
        validate_size(size_bytes, &self.config)?;
        let prefix = handle.read_prefix(SNIFF_LEN).await.map_err(unreadable)?;
        let accepted = validate_media(&filename, &prefix, &self.config)?;

        let id = self.store.add(NewStagedFile {
            handle,
            filename,
            media_type: accepted.media_type.clone(),
            category: accepted.category,
            size_bytes,
        })?;
        self.spawn_entry_task(id, accepted.media_type, size_bytes)?;
        Ok(id)
    }

    fn spawn_entry_task(
        &self,
        id: StagedFileId,
        media_type: String,
        size_bytes: u64,
    ) -> Result<(), IngestError> {
        let (handle, cancel) = self.store.intake_parts(id)?;
        let task = Arc::new(EntryTask {
            id,
            store: self.store.clone(),
            preview: self.preview.clone(),
            emitter: self.emitter.clone(),
            cancel: cancel.clone(),
        });

        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!(id = %id, "Staged file removed, background work stopped");
                }
                _ = task.run(handle, media_type, size_bytes) => {}
            }
        });
        Ok(())
    }

    /// Drop a staged file and cancel whatever is running for it.
    #[tracing::instrument(skip_all, fields(id = %id))]
    pub fn remove(&self, id: StagedFileId) -> Result<StagedFileView, IngestError> {
        let view = self.store.remove(id)?;
        tracing::info!(filename = %view.filename, "Staged file removed");
        Ok(view)
    }

    /// Read-only view of the staged files in insertion order.
    pub fn snapshot(&self) -> Vec<StagedFileView> {
        self.store.list()
    }

    pub fn get(&self, id: StagedFileId) -> Option<StagedFileView> {
        self.store.get(id)
    }

    /// Revision counter bumped on every change to the staged set.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.store.subscribe()
    }

    /// Wait until no staged file is still being read in.
    pub async fn wait_for_intake(&self) {
        let mut revisions = self.store.subscribe();
        while self.store.has_pending_intake() {
            if revisions.changed().await.is_err() {
                return;
            }
        }
    }

    pub async fn commit(
        &self,
        owner_id: &str,
        report_id: Option<Uuid>,
    ) -> Result<CommitResult, IngestError> {
        self.commit_request(CommitRequest {
            owner_id: owner_id.to_string(),
            report_id,
            title: None,
        })
        .await
    }

    /// Persist every staged file that finished intake.
    ///
    /// Returns `Err` only when nothing was attempted: validation of the request,
    /// a failed report lookup or a failed namespace provisioning.
    #[tracing::instrument(skip_all, fields(owner_id = %request.owner_id))]
    pub async fn commit_request(&self, request: CommitRequest) -> Result<CommitResult, IngestError> {
        let _guard = self.commit_lock.lock().await;
        let started = Instant::now();

        validate_owner_id(&request.owner_id)?;
        if self.store.is_empty() {
            return Err(IngestError::Validation("No files staged".to_string()));
        }
        let existing_report = self.lookup_report(&request).await?;

        self.wait_for_intake().await;
        let report_id = request.report_id.unwrap_or_else(Uuid::new_v4);

        let mut failures = Vec::new();
        let mut participants = Vec::new();
        for candidate in self.store.commit_candidates() {
            let retryable = candidate
                .error
                .as_ref()
                .is_some_and(EntryError::is_retryable)
                && (candidate.payload.is_some() || candidate.object_locator.is_some());
            match candidate.status {
                // Commits are serialised, so a `committing` entry here was left behind
                // by a commit future that was dropped before it finished.
                StagedStatus::Uploaded | StagedStatus::Committing => participants.push(candidate),
                StagedStatus::Failed if retryable => participants.push(candidate),
                StagedStatus::Failed => {
                    if let Some(error) = candidate.error {
                        failures.push((candidate.id, error));
                    }
                }
                _ => {}
            }
        }

        if participants.is_empty() {
            if failures.is_empty() {
                return Err(IngestError::Validation(
                    "No files ready to commit".to_string(),
                ));
            }
            return Ok(self.finish(report_id, Vec::new(), failures, started).await);
        }

        if participants.iter().any(|c| c.object_locator.is_none()) {
            self.ensure_namespace().await?;
        }

        let participants: Vec<CommitCandidate> = participants
            .into_iter()
            .filter(|c| {
                c.status == StagedStatus::Committing
                    || self.store.set_status(c.id, StagedStatus::Committing).is_ok()
            })
            .collect();

        // Phase 1: objects.
        let transfers = participants
            .iter()
            .filter(|c| c.object_locator.is_none())
            .map(|c| self.transfer(&request.owner_id, report_id, c));
        for (id, outcome) in futures::future::join_all(transfers).await {
            match outcome {
                TransferOutcome::Stored(locator) => {
                    if self.store.set_object_locator(id, locator).is_err() {
                        tracing::debug!(id = %id, "Entry removed after its object was stored");
                    }
                }
                TransferOutcome::Failed(err) => {
                    let entry_error = err.to_entry_error();
                    if self.store.set_error(id, entry_error.clone()).is_ok() {
                        failures.push((id, entry_error));
                    }
                }
                TransferOutcome::Discarded => {
                    tracing::debug!(id = %id, "Transfer discarded, entry removed");
                }
            }
        }

        // Phase 2: metadata.
        let located: Vec<CommitCandidate> = self
            .store
            .commit_candidates()
            .into_iter()
            .filter(|c| c.status == StagedStatus::Committing && c.object_locator.is_some())
            .collect();

        let mut records = Vec::new();
        if !located.is_empty() {
            if existing_report.is_none() {
                let report = NewReport {
                    id: report_id,
                    owner_id: request.owner_id.clone(),
                    title: request
                        .title
                        .clone()
                        .unwrap_or_else(|| DEFAULT_REPORT_TITLE.to_string()),
                    status: ReportStatus::Submitted,
                };
                if let Err(e) = self.metadata.create_report(report).await {
                    tracing::error!(
                        report_id = %report_id,
                        error = %e,
                        "Report creation failed, stored objects kept for retry"
                    );
                    let entry_error = persistence_error(&e).to_entry_error();
                    for candidate in &located {
                        if self.store.set_error(candidate.id, entry_error.clone()).is_ok() {
                            failures.push((candidate.id, entry_error.clone()));
                        }
                    }
                    return Ok(self.finish(report_id, records, failures, started).await);
                }
            }

            for candidate in located {
                if !self.store.contains(candidate.id) {
                    tracing::debug!(id = %candidate.id, "Entry removed before its record was written");
                    continue;
                }
                match self
                    .create_record(&request.owner_id, report_id, &candidate)
                    .await
                {
                    Ok(record) => {
                        if self
                            .store
                            .set_status(candidate.id, StagedStatus::Committed)
                            .is_ok()
                        {
                            let _ = self.store.remove(candidate.id);
                        }
                        records.push(record);
                    }
                    Err(err) => {
                        log_entry_failure(candidate.id, &err, "Evidence record failed");
                        let entry_error = err.to_entry_error();
                        if self.store.set_error(candidate.id, entry_error.clone()).is_ok() {
                            failures.push((candidate.id, entry_error));
                        }
                    }
                }
            }
        }

        Ok(self.finish(report_id, records, failures, started).await)
    }

    async fn lookup_report(&self, request: &CommitRequest) -> Result<Option<ReportDraft>, IngestError> {
        let Some(report_id) = request.report_id else {
            return Ok(None);
        };
        let report = self
            .metadata
            .get_report(report_id)
            .await
            .map_err(|e| persistence_error(&e))?;
        if let Some(report) = &report {
            if report.owner_id != request.owner_id {
                return Err(IngestError::Validation(format!(
                    "Report {} belongs to another owner",
                    report_id
                )));
            }
        }
        Ok(report)
    }

    async fn ensure_namespace(&self) -> Result<(), IngestError> {
        let namespace = &self.config.namespace;
        let mut provisioned = self.provisioned.lock().await;
        if provisioned.contains(namespace) {
            return Ok(());
        }

        self.storage
            .ensure_namespace(namespace)
            .await
            .map_err(|e| {
                tracing::error!(namespace = %namespace, error = %e, "Namespace provisioning failed");
                provisioning_error(namespace, &e)
            })?;
        provisioned.insert(namespace.clone());
        tracing::info!(namespace = %namespace, "Storage namespace ready");
        Ok(())
    }

    async fn transfer(
        &self,
        owner_id: &str,
        report_id: Uuid,
        candidate: &CommitCandidate,
    ) -> (StagedFileId, TransferOutcome) {
        let id = candidate.id;
        let Some(payload) = candidate.payload.clone() else {
            return (
                id,
                TransferOutcome::Failed(IngestError::Internal(
                    "Payload no longer available".to_string(),
                )),
            );
        };
        let path = evidence_object_path(
            owner_id,
            &report_id.to_string(),
            candidate.sequence,
            extension_for_mime(&candidate.media_type),
        );

        let outcome = tokio::select! {
            _ = candidate.cancel.cancelled() => TransferOutcome::Discarded,
            result = self.put_with_retry(id, &path, &candidate.media_type, payload) => match result {
                Ok(locator) => TransferOutcome::Stored(locator),
                Err(e) => TransferOutcome::Failed(transfer_error(&e)),
            },
        };
        (id, outcome)
    }

    async fn put_with_retry(
        &self,
        id: StagedFileId,
        path: &str,
        content_type: &str,
        payload: Bytes,
    ) -> Result<String, StorageError> {
        let _permit = self
            .transfers
            .acquire()
            .await
            .map_err(|e| StorageError::BackendError(e.to_string()))?;

        let mut attempt = 0u32;
        loop {
            let started = Instant::now();
            match self
                .storage
                .put_object(&self.config.namespace, path, content_type, payload.clone())
                .await
            {
                Ok(locator) => {
                    tracing::info!(
                        id = %id,
                        path = %path,
                        size_bytes = payload.len(),
                        duration_ms = started.elapsed().as_millis() as u64,
                        attempt,
                        "Object stored"
                    );
                    return Ok(locator);
                }
                Err(e) if e.is_retryable() && attempt < self.config.transfer_max_retries => {
                    let delay = retry_backoff(self.config.transfer_retry_base, attempt);
                    tracing::warn!(
                        id = %id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Object transfer failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(id = %id, path = %path, attempt, error = %e, "Object transfer failed");
                    return Err(e);
                }
            }
        }
    }

    async fn create_record(
        &self,
        owner_id: &str,
        report_id: Uuid,
        candidate: &CommitCandidate,
    ) -> Result<EvidenceRecord, IngestError> {
        let (Some(object_locator), Some(sha256)) =
            (candidate.object_locator.clone(), candidate.sha256.clone())
        else {
            return Err(IngestError::Internal(
                "Entry has no stored object".to_string(),
            ));
        };
        let size_bytes = i64::try_from(candidate.size_bytes)
            .map_err(|_| IngestError::Internal("File size out of range".to_string()))?;

        self.metadata
            .create_evidence_record(NewEvidenceRecord {
                report_id,
                owner_id: owner_id.to_string(),
                object_locator,
                media_type: candidate.media_type.clone(),
                filename: candidate.filename.clone(),
                size_bytes,
                sha256,
            })
            .await
            .map_err(|e| persistence_error(&e))
    }

    async fn finish(
        &self,
        report_id: Uuid,
        records: Vec<EvidenceRecord>,
        failures: Vec<(StagedFileId, EntryError)>,
        started: Instant,
    ) -> CommitResult {
        if !records.is_empty() {
            if let Err(e) = self.listener.on_committed(report_id, &records).await {
                tracing::warn!(report_id = %report_id, error = %e, "Commit listener failed");
            }
        }

        let result = CommitResult {
            report_id,
            records,
            failures,
        };
        tracing::info!(
            report_id = %report_id,
            committed = result.records.len(),
            attempted = result.attempted(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Commit finished"
        );
        result
    }
}

/// Log a failure recorded on one entry at the level its kind asks for.
fn log_entry_failure(id: StagedFileId, err: &IngestError, message: &str) {
    let code = err.error_code();
    match err.log_level() {
        LogLevel::Debug => tracing::debug!(id = %id, code, error = %err, "{}", message),
        LogLevel::Warn => tracing::warn!(id = %id, code, error = %err, "{}", message),
        LogLevel::Error => tracing::error!(id = %id, code, error = %err, "{}", message),
    }
}

/// Background preview and intake of one staged file.
struct EntryTask {
    id: StagedFileId,
    store: Arc<FileStagingStore>,
    preview: Arc<dyn PreviewGenerator>,
    emitter: ProgressEmitter,
    cancel: CancellationToken,
}

impl EntryTask {
    /// Preview runs as its own task so a panicking generator cannot take intake
    /// down with it.
    async fn run(self: Arc<Self>, handle: RawHandle, media_type: String, size_bytes: u64) {
        let preview = tokio::spawn({
            let task = self.clone();
            let handle = handle.clone();
            async move {
                tokio::select! {
                    _ = task.cancel.cancelled() => {}
                    _ = task.run_preview(&handle, &media_type) => {}
                }
            }
        });

        self.run_intake(handle, size_bytes).await;

        if let Err(e) = preview.await {
            tracing::error!(id = %self.id, error = %e, "Preview task aborted");
        }
    }

    async fn run_preview(&self, handle: &RawHandle, media_type: &str) {
        if self.store.set_status(self.id, StagedStatus::Previewing).is_err() {
            return;
        }

        match self.preview.generate(handle, media_type).await {
            Ok(preview) => {
                if self.store.set_preview(self.id, preview).is_err() {
                    return;
                }
            }
            Err(PreviewError::Unsupported(_)) => {}
            Err(e) => {
                tracing::warn!(id = %self.id, error = %e, "Preview generation failed");
            }
        }

        // Intake usually has moved the entry past `ready` already.
        let _ = self.store.set_status(self.id, StagedStatus::Ready);
    }

    async fn run_intake(&self, handle: RawHandle, size_bytes: u64) {
        let started = Instant::now();
        if self.store.set_status(self.id, StagedStatus::Uploading).is_err() {
            return;
        }

        let events = self.emitter.track(self.id, handle, size_bytes);
        tokio::pin!(events);

        while let Some(event) = events.next().await {
            let written = match event {
                Ok(IntakeEvent::Progress(progress)) => self.store.set_progress(self.id, progress),
                Ok(IntakeEvent::Complete(output)) => {
                    tracing::debug!(
                        id = %self.id,
                        size_bytes,
                        duration_ms = started.elapsed().as_millis() as u64,
                        "Staged file read in"
                    );
                    self.store
                        .complete_intake(self.id, output.payload, output.sha256)
                }
                Err(e) => {
                    let err = IngestError::from(e);
                    log_entry_failure(self.id, &err, "Intake failed");
                    self.store.set_error(self.id, err.to_entry_error())
                }
            };
            if let Err(e) = written {
                tracing::debug!(id = %self.id, error = %e, "Intake update dropped");
                return;
            }
        }
    }
}
