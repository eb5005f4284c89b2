//! Intake of raw payloads with byte-driven progress.
//!
//! Progress is the share of the expected length read so far. Values are strictly
//! increasing, `100` is only reported once the reader hit EOF at exactly the
//! expected length, and it is followed by the payload and its SHA-256.

use bytes::{Bytes, BytesMut};
use exhibit_core::models::StagedFileId;
use futures::stream::{self, Stream};
use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::TransferError;
use crate::handle::RawHandle;

/// Payload read during intake.
#[derive(Debug, Clone)]
pub struct IntakeOutput {
    pub payload: Bytes,
    /// Hex-encoded SHA-256 of `payload`.
    pub sha256: String,
}

#[derive(Debug, Clone)]
pub enum IntakeEvent {
    Progress(u8),
    Complete(IntakeOutput),
}

#[derive(Debug, Clone)]
pub struct ProgressEmitter {
    chunk_bytes: usize,
}

struct IntakeState {
    id: StagedFileId,
    handle: RawHandle,
    reader: Option<Box<dyn AsyncRead + Send + Unpin>>,
    hasher: Sha256,
    buffer: BytesMut,
    scratch: Vec<u8>,
    expected: u64,
    read: u64,
    last: u8,
    eof: bool,
    done: bool,
}

impl IntakeState {
    fn percent(&self) -> u8 {
        if self.expected == 0 {
            return 100;
        }
        (self.read.saturating_mul(100) / self.expected).min(100) as u8
    }

    fn fail(mut self, err: TransferError) -> Option<(Result<IntakeEvent, TransferError>, Self)> {
        self.done = true;
        self.reader = None;
        Some((Err(err), self))
    }

    fn finish(mut self) -> Option<(Result<IntakeEvent, TransferError>, Self)> {
        self.done = true;
        self.reader = None;
        let hasher = std::mem::take(&mut self.hasher);
        let output = IntakeOutput {
            payload: std::mem::take(&mut self.buffer).freeze(),
            sha256: hex::encode(hasher.finalize()),
        };
        tracing::debug!(id = %self.id, size_bytes = self.read, "Intake complete");
        Some((Ok(IntakeEvent::Complete(output)), self))
    }
}

impl ProgressEmitter {
    pub fn new(chunk_bytes: usize) -> Self {
        Self {
            chunk_bytes: chunk_bytes.max(1),
        }
    }

    /// Read `handle` to the end, yielding progress and finally the payload.
    ///
    /// The stream ends after the first error.
    pub fn track(
        &self,
        id: StagedFileId,
        handle: RawHandle,
        expected_len: u64,
    ) -> impl Stream<Item = Result<IntakeEvent, TransferError>> + Send + 'static {
        let state = IntakeState {
            id,
            handle,
            reader: None,
            hasher: Sha256::new(),
            buffer: BytesMut::with_capacity(expected_len.min(64 * 1024 * 1024) as usize),
            scratch: vec![0u8; self.chunk_bytes],
            expected: expected_len,
            read: 0,
            last: 0,
            eof: false,
            done: false,
        };

        stream::unfold(state, |mut state| async move {
            if state.done {
                return None;
            }
            if state.eof {
                return state.finish();
            }

            let mut reader = match state.reader.take() {
                Some(reader) => reader,
                None => match state.handle.open().await {
                    Ok(reader) => reader,
                    Err(e) => return state.fail(e.into()),
                },
            };

            loop {
                let n = match reader.read(&mut state.scratch).await {
                    Ok(n) => n,
                    Err(e) => return state.fail(e.into()),
                };

                if n == 0 {
                    if state.read != state.expected {
                        let err = TransferError::SizeMismatch {
                            expected: state.expected,
                            actual: state.read,
                        };
                        return state.fail(err);
                    }
                    state.eof = true;
                    if state.last < 100 {
                        state.last = 100;
                        return Some((Ok(IntakeEvent::Progress(100)), state));
                    }
                    return state.finish();
                }

                state.hasher.update(&state.scratch[..n]);
                state.buffer.extend_from_slice(&state.scratch[..n]);
                state.read += n as u64;
                if state.read > state.expected {
                    let err = TransferError::SizeMismatch {
                        expected: state.expected,
                        actual: state.read,
                    };
                    return state.fail(err);
                }

                // 100 waits for EOF.
                let percent = state.percent();
                if percent < 100 && percent > state.last {
                    state.last = percent;
                    state.reader = Some(reader);
                    return Some((Ok(IntakeEvent::Progress(percent)), state));
                }
            }
        })
    }
}
