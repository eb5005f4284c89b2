//! Media categories and MIME/extension tables used to accept and name evidence.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Broad media category a staged file belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaCategory {
    Image,
    Video,
    Audio,
    Document,
}

impl MediaCategory {
    pub const ALL: [MediaCategory; 4] = [
        MediaCategory::Image,
        MediaCategory::Video,
        MediaCategory::Audio,
        MediaCategory::Document,
    ];

    /// Classify a MIME type. Returns `None` for anything the pipeline does not accept.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let mime = mime.to_lowercase();
        if mime.starts_with("image/") {
            Some(MediaCategory::Image)
        } else if mime.starts_with("video/") {
            Some(MediaCategory::Video)
        } else if mime.starts_with("audio/") {
            Some(MediaCategory::Audio)
        } else if DOCUMENT_MIME_TYPES.contains(&mime.as_str()) {
            Some(MediaCategory::Document)
        } else {
            None
        }
    }
}

impl FromStr for MediaCategory {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "image" => Ok(MediaCategory::Image),
            "video" => Ok(MediaCategory::Video),
            "audio" => Ok(MediaCategory::Audio),
            "document" => Ok(MediaCategory::Document),
            _ => Err(anyhow::anyhow!("Invalid media category: {}", s)),
        }
    }
}

impl Display for MediaCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            MediaCategory::Image => write!(f, "image"),
            MediaCategory::Video => write!(f, "video"),
            MediaCategory::Audio => write!(f, "audio"),
            MediaCategory::Document => write!(f, "document"),
        }
    }
}

const DOCUMENT_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "text/plain",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

// (extension, mime) pairs. The first entry for a MIME type is its canonical extension.
const EXTENSIONS: &[(&str, &str)] = &[
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("heic", "image/heic"),
    ("mp4", "video/mp4"),
    ("mov", "video/quicktime"),
    ("webm", "video/webm"),
    ("mkv", "video/x-matroska"),
    ("avi", "video/x-msvideo"),
    ("mp3", "audio/mpeg"),
    ("wav", "audio/x-wav"),
    ("ogg", "audio/ogg"),
    ("m4a", "audio/mp4"),
    ("pdf", "application/pdf"),
    ("txt", "text/plain"),
    ("doc", "application/msword"),
    (
        "docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
];

/// Look up the MIME type for a file extension (case-insensitive, no leading dot).
pub fn mime_from_extension(ext: &str) -> Option<&'static str> {
    let ext = ext.trim_start_matches('.').to_lowercase();
    EXTENSIONS
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, mime)| *mime)
}

/// Canonical extension for a MIME type, `bin` when unknown.
pub fn extension_for_mime(mime: &str) -> &'static str {
    let mime = mime.to_lowercase();
    EXTENSIONS
        .iter()
        .find(|(_, m)| *m == mime)
        .map(|(e, _)| *e)
        .unwrap_or("bin")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_from_mime() {
        assert_eq!(
            MediaCategory::from_mime("image/jpeg"),
            Some(MediaCategory::Image)
        );
        assert_eq!(
            MediaCategory::from_mime("application/pdf"),
            Some(MediaCategory::Document)
        );
        assert_eq!(MediaCategory::from_mime("application/x-msdownload"), None);
    }

    #[test]
    fn test_extension_tables() {
        assert_eq!(mime_from_extension("JPG"), Some("image/jpeg"));
        assert_eq!(mime_from_extension(".pdf"), Some("application/pdf"));
        assert_eq!(extension_for_mime("image/jpeg"), "jpg");
        assert_eq!(extension_for_mime("application/octet-stream"), "bin");
    }
}
