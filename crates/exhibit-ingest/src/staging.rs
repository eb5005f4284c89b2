//! Staging store: the identity-keyed, insertion-ordered set of files awaiting commit.
//!
//! Every mutation is a single replacement under the store lock, and removal takes
//! the same lock, so once `remove` returns no later write for that id can land.

use bytes::Bytes;
use exhibit_core::models::{
    EntryError, MediaCategory, Preview, StagedFileId, StagedFileView, StagedStatus,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::StagingError;
use crate::handle::RawHandle;

/// A file accepted by validation, ready to be added.
#[derive(Debug, Clone)]
pub struct NewStagedFile {
    pub handle: RawHandle,
    pub filename: String,
    pub media_type: String,
    pub category: MediaCategory,
    pub size_bytes: u64,
}

struct StagedEntry {
    id: StagedFileId,
    sequence: u64,
    // Raw handle until intake completes, then the payload read from it.
    handle: Option<RawHandle>,
    payload: Option<Bytes>,
    filename: String,
    media_type: String,
    category: MediaCategory,
    size_bytes: u64,
    progress: u8,
    status: StagedStatus,
    preview: Option<Preview>,
    error: Option<EntryError>,
    sha256: Option<String>,
    object_locator: Option<String>,
    cancel: CancellationToken,
}

impl StagedEntry {
    fn view(&self) -> StagedFileView {
        StagedFileView {
            id: self.id,
            sequence: self.sequence,
            filename: self.filename.clone(),
            media_type: self.media_type.clone(),
            category: self.category,
            size_bytes: self.size_bytes,
            progress: self.progress,
            status: self.status,
            preview: self.preview.clone(),
            error: self.error.clone(),
            sha256: self.sha256.clone(),
            object_locator: self.object_locator.clone(),
        }
    }

    fn transition(&mut self, next: StagedStatus) -> Result<(), StagingError> {
        if self.status == next {
            return Ok(());
        }
        if !self.status.can_transition_to(next) {
            return Err(StagingError::InvalidTransition {
                id: self.id,
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        if next != StagedStatus::Failed {
            self.error = None;
        }
        Ok(())
    }
}

/// Everything the coordinator needs to commit one entry.
#[derive(Debug, Clone)]
pub(crate) struct CommitCandidate {
    pub id: StagedFileId,
    pub sequence: u64,
    pub filename: String,
    pub media_type: String,
    pub size_bytes: u64,
    pub status: StagedStatus,
    pub error: Option<EntryError>,
    pub payload: Option<Bytes>,
    pub sha256: Option<String>,
    pub object_locator: Option<String>,
    pub cancel: CancellationToken,
}

#[derive(Default)]
struct Inner {
    next_sequence: u64,
    order: BTreeMap<u64, StagedFileId>,
    entries: HashMap<StagedFileId, StagedEntry>,
}

impl Inner {
    fn entry_mut(&mut self, id: StagedFileId) -> Result<&mut StagedEntry, StagingError> {
        self.entries.get_mut(&id).ok_or(StagingError::NotFound(id))
    }

    fn ordered(&self) -> impl Iterator<Item = &StagedEntry> {
        self.order.values().filter_map(|id| self.entries.get(id))
    }
}

pub struct FileStagingStore {
    inner: RwLock<Inner>,
    capacity: usize,
    revision: watch::Sender<u64>,
}

impl Default for FileStagingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FileStagingStore {
    pub fn new() -> Self {
        Self::with_capacity_limit(usize::MAX)
    }

    /// Store that refuses to hold more than `capacity` entries at once.
    pub fn with_capacity_limit(capacity: usize) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            inner: RwLock::new(Inner::default()),
            capacity,
            revision,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn bump(&self) {
        self.revision.send_modify(|rev| *rev = rev.wrapping_add(1));
    }

    /// Apply `f` to one entry under the write lock and notify subscribers on success.
    fn mutate<T>(
        &self,
        id: StagedFileId,
        f: impl FnOnce(&mut StagedEntry) -> Result<T, StagingError>,
    ) -> Result<T, StagingError> {
        let result = {
            let mut inner = self.write();
            f(inner.entry_mut(id)?)
        };
        if result.is_ok() {
            self.bump();
        }
        result
    }

    /// Add a file in state `staged` and return its new id.
    pub fn add(&self, file: NewStagedFile) -> Result<StagedFileId, StagingError> {
        let id = StagedFileId::new();
        {
            let mut inner = self.write();
            if inner.entries.len() >= self.capacity {
                return Err(StagingError::Full {
                    capacity: self.capacity,
                });
            }
            let sequence = inner.next_sequence;
            inner.next_sequence += 1;
            inner.order.insert(sequence, id);
            inner.entries.insert(
                id,
                StagedEntry {
                    id,
                    sequence,
                    handle: Some(file.handle),
                    payload: None,
                    filename: file.filename,
                    media_type: file.media_type,
                    category: file.category,
                    size_bytes: file.size_bytes,
                    progress: 0,
                    status: StagedStatus::Staged,
                    preview: None,
                    error: None,
                    sha256: None,
                    object_locator: None,
                    cancel: CancellationToken::new(),
                },
            );
        }
        self.bump();
        Ok(id)
    }

    /// Excise an entry, cancelling its in-flight work and dropping its payload and preview.
    pub fn remove(&self, id: StagedFileId) -> Result<StagedFileView, StagingError> {
        let removed = {
            let mut inner = self.write();
            let entry = inner
                .entries
                .remove(&id)
                .ok_or(StagingError::NotFound(id))?;
            inner.order.remove(&entry.sequence);
            entry
        };
        removed.cancel.cancel();
        self.bump();

        let mut view = removed.view();
        view.status = StagedStatus::Removed;
        view.preview = None;
        Ok(view)
    }

    pub fn get(&self, id: StagedFileId) -> Option<StagedFileView> {
        self.read().entries.get(&id).map(StagedEntry::view)
    }

    pub fn contains(&self, id: StagedFileId) -> bool {
        self.read().entries.contains_key(&id)
    }

    /// All entries in insertion order.
    pub fn list(&self) -> Vec<StagedFileView> {
        self.read().ordered().map(StagedEntry::view).collect()
    }

    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Receiver of a revision counter bumped after every mutation.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Move an entry along its lifecycle. `removed` excises it like [`Self::remove`].
    pub fn set_status(&self, id: StagedFileId, status: StagedStatus) -> Result<(), StagingError> {
        if status == StagedStatus::Removed {
            return self.remove(id).map(|_| ());
        }
        self.mutate(id, |entry| entry.transition(status))
    }

    pub fn set_progress(&self, id: StagedFileId, progress: u8) -> Result<(), StagingError> {
        if progress > 100 {
            return Err(StagingError::ProgressOutOfRange(progress));
        }
        self.mutate(id, |entry| {
            if progress < entry.progress {
                return Err(StagingError::ProgressRegression {
                    id,
                    current: entry.progress,
                    requested: progress,
                });
            }
            entry.progress = progress;
            Ok(())
        })
    }

    pub fn set_preview(&self, id: StagedFileId, preview: Preview) -> Result<(), StagingError> {
        self.mutate(id, |entry| {
            entry.preview = Some(preview);
            Ok(())
        })
    }

    /// Record a failure; the entry moves to `failed`.
    pub fn set_error(&self, id: StagedFileId, error: EntryError) -> Result<(), StagingError> {
        self.mutate(id, |entry| {
            entry.transition(StagedStatus::Failed)?;
            entry.error = Some(error);
            Ok(())
        })
    }

    /// Swap the raw handle for the payload read from it and mark the entry uploaded.
    pub(crate) fn complete_intake(
        &self,
        id: StagedFileId,
        payload: Bytes,
        sha256: String,
    ) -> Result<(), StagingError> {
        self.mutate(id, |entry| {
            entry.transition(StagedStatus::Uploaded)?;
            entry.progress = 100;
            entry.handle = None;
            entry.payload = Some(payload);
            entry.sha256 = Some(sha256);
            Ok(())
        })
    }

    pub(crate) fn set_object_locator(
        &self,
        id: StagedFileId,
        locator: String,
    ) -> Result<(), StagingError> {
        self.mutate(id, |entry| {
            entry.object_locator = Some(locator);
            Ok(())
        })
    }

    /// Handle and cancellation token for the entry's intake task.
    pub(crate) fn intake_parts(
        &self,
        id: StagedFileId,
    ) -> Result<(RawHandle, CancellationToken), StagingError> {
        let inner = self.read();
        let entry = inner.entries.get(&id).ok_or(StagingError::NotFound(id))?;
        let handle = entry.handle.clone().ok_or(StagingError::InvalidTransition {
            id,
            from: entry.status,
            to: StagedStatus::Uploading,
        })?;
        Ok((handle, entry.cancel.clone()))
    }

    /// Whether any entry is still before the end of intake.
    pub(crate) fn has_pending_intake(&self) -> bool {
        self.read().entries.values().any(|entry| {
            matches!(
                entry.status,
                StagedStatus::Staged
                    | StagedStatus::Previewing
                    | StagedStatus::Ready
                    | StagedStatus::Uploading
            )
        })
    }

    pub(crate) fn commit_candidates(&self) -> Vec<CommitCandidate> {
        self.read()
            .ordered()
            .map(|entry| CommitCandidate {
                id: entry.id,
                sequence: entry.sequence,
                filename: entry.filename.clone(),
                media_type: entry.media_type.clone(),
                size_bytes: entry.size_bytes,
                status: entry.status,
                error: entry.error.clone(),
                payload: entry.payload.clone(),
                sha256: entry.sha256.clone(),
                object_locator: entry.object_locator.clone(),
                cancel: entry.cancel.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exhibit_core::models::ErrorKind;

    fn new_file(name: &str) -> NewStagedFile {
        NewStagedFile {
            handle: RawHandle::from_bytes(name, b"abc".to_vec()),
            filename: name.to_string(),
            media_type: "image/png".to_string(),
            category: MediaCategory::Image,
            size_bytes: 3,
        }
    }

    #[test]
    fn test_list_keeps_insertion_order_across_removals() {
        let store = FileStagingStore::new();
        let a = store.add(new_file("a.png")).unwrap();
        let b = store.add(new_file("b.png")).unwrap();
        let c = store.add(new_file("c.png")).unwrap();

        store.remove(b).unwrap();
        let ids: Vec<_> = store.list().iter().map(|v| v.id).collect();
        assert_eq!(ids, vec![a, c]);

        let d = store.add(new_file("d.png")).unwrap();
        let views = store.list();
        assert_eq!(views.last().unwrap().id, d);
        assert_eq!(views.last().unwrap().sequence, 3);
    }

    #[test]
    fn test_writes_to_removed_id_are_rejected() {
        let store = FileStagingStore::new();
        let id = store.add(new_file("a.png")).unwrap();
        store.remove(id).unwrap();

        assert_eq!(store.set_progress(id, 10), Err(StagingError::NotFound(id)));
        assert_eq!(
            store.set_status(id, StagedStatus::Uploading),
            Err(StagingError::NotFound(id))
        );
        assert!(store.get(id).is_none());
        assert_eq!(store.remove(id), Err(StagingError::NotFound(id)));
    }

    #[test]
    fn test_progress_never_decreases() {
        let store = FileStagingStore::new();
        let id = store.add(new_file("a.png")).unwrap();
        store.set_progress(id, 40).unwrap();
        assert!(matches!(
            store.set_progress(id, 30),
            Err(StagingError::ProgressRegression { current: 40, .. })
        ));
        assert_eq!(store.get(id).unwrap().progress, 40);
        assert!(store.set_progress(id, 101).is_err());
    }

    #[test]
    fn test_status_cannot_regress() {
        let store = FileStagingStore::new();
        let id = store.add(new_file("a.png")).unwrap();
        store.set_status(id, StagedStatus::Uploading).unwrap();
        assert!(store.set_status(id, StagedStatus::Ready).is_err());
        assert_eq!(store.get(id).unwrap().status, StagedStatus::Uploading);
    }

    #[test]
    fn test_error_only_while_failed() {
        let store = FileStagingStore::new();
        let id = store.add(new_file("a.png")).unwrap();
        store.set_status(id, StagedStatus::Uploading).unwrap();
        store
            .complete_intake(id, Bytes::from_static(b"abc"), "00".to_string())
            .unwrap();
        store
            .set_error(id, EntryError::new(ErrorKind::Transfer, "boom"))
            .unwrap();

        let view = store.get(id).unwrap();
        assert_eq!(view.status, StagedStatus::Failed);
        assert_eq!(view.error.unwrap().kind, ErrorKind::Transfer);

        store.set_status(id, StagedStatus::Committing).unwrap();
        assert!(store.get(id).unwrap().error.is_none());
    }

    #[test]
    fn test_capacity_limit() {
        let store = FileStagingStore::with_capacity_limit(1);
        store.add(new_file("a.png")).unwrap();
        assert_eq!(
            store.add(new_file("b.png")),
            Err(StagingError::Full { capacity: 1 })
        );
    }

    #[test]
    fn test_remove_cancels_and_notifies() {
        let store = FileStagingStore::new();
        let id = store.add(new_file("a.png")).unwrap();
        let (_, token) = store.intake_parts(id).unwrap();
        let rx = store.subscribe();
        let before = *rx.borrow();

        let view = store.remove(id).unwrap();
        assert_eq!(view.status, StagedStatus::Removed);
        assert!(token.is_cancelled());
        assert!(*rx.borrow() > before);
        assert!(store.is_empty());
    }

    #[test]
    fn test_complete_intake_swaps_handle_for_payload() {
        let store = FileStagingStore::new();
        let id = store.add(new_file("a.png")).unwrap();
        store.set_status(id, StagedStatus::Uploading).unwrap();
        store
            .complete_intake(id, Bytes::from_static(b"abc"), "digest".to_string())
            .unwrap();

        let view = store.get(id).unwrap();
        assert_eq!(view.status, StagedStatus::Uploaded);
        assert_eq!(view.progress, 100);
        assert_eq!(view.sha256.as_deref(), Some("digest"));
        assert!(store.intake_parts(id).is_err());

        let candidate = &store.commit_candidates()[0];
        assert_eq!(candidate.payload.as_deref(), Some(&b"abc"[..]));
    }
}
