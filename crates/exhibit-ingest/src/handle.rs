//! Raw input handles: the original payload of a staged file.

use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Opaque reference to a user-supplied payload.
///
/// Cloning is cheap: in-memory data is reference counted and files are read lazily.
#[derive(Debug, Clone)]
pub enum RawHandle {
    Bytes { filename: String, data: Bytes },
    File { path: PathBuf },
}

impl RawHandle {
    pub fn from_bytes(filename: impl Into<String>, data: impl Into<Bytes>) -> Self {
        RawHandle::Bytes {
            filename: filename.into(),
            data: data.into(),
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Self {
        RawHandle::File {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Name the caller supplied, before sanitizing.
    pub fn filename(&self) -> String {
        match self {
            RawHandle::Bytes { filename, .. } => filename.clone(),
            RawHandle::File { path } => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        }
    }

    pub async fn len(&self) -> std::io::Result<u64> {
        match self {
            RawHandle::Bytes { data, .. } => Ok(data.len() as u64),
            RawHandle::File { path } => {
                let metadata = tokio::fs::metadata(path).await?;
                if !metadata.is_file() {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        format!("{} is not a regular file", path.display()),
                    ));
                }
                Ok(metadata.len())
            }
        }
    }

    /// Open the payload for sequential reading.
    pub async fn open(&self) -> std::io::Result<Box<dyn AsyncRead + Send + Unpin>> {
        match self {
            RawHandle::Bytes { data, .. } => Ok(Box::new(std::io::Cursor::new(data.clone()))),
            RawHandle::File { path } => Ok(Box::new(tokio::fs::File::open(path).await?)),
        }
    }

    /// First `limit` bytes of the payload, used for content sniffing.
    pub async fn read_prefix(&self, limit: usize) -> std::io::Result<Vec<u8>> {
        match self {
            RawHandle::Bytes { data, .. } => Ok(data[..data.len().min(limit)].to_vec()),
            RawHandle::File { .. } => {
                let mut prefix = Vec::with_capacity(limit);
                self.open()
                    .await?
                    .take(limit as u64)
                    .read_to_end(&mut prefix)
                    .await?;
                Ok(prefix)
            }
        }
    }

    /// Whole payload in memory.
    pub async fn read_all(&self) -> std::io::Result<Bytes> {
        match self {
            RawHandle::Bytes { data, .. } => Ok(data.clone()),
            RawHandle::File { path } => Ok(Bytes::from(tokio::fs::read(path).await?)),
        }
    }
}
