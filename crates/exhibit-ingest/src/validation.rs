//! Per-file checks applied when a file is staged.

use exhibit_core::models::media::mime_from_extension;
use exhibit_core::models::MediaCategory;
use exhibit_core::{IngestConfig, IngestError};

const MAX_FILENAME_LEN: usize = 255;

/// Media type and category accepted for a staged file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedMedia {
    pub media_type: String,
    pub category: MediaCategory,
}

/// Keep only the base name and replace characters outside `[A-Za-z0-9._-]`.
pub fn sanitize_filename(filename: &str) -> String {
    let base = std::path::Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(filename);
    if base.contains("..") {
        return "invalid_filename".to_string();
    }
    let s: String = base
        .chars()
        .take(MAX_FILENAME_LEN)
        .map(|c| {
            if c.is_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if s.trim().is_empty() {
        "file".to_string()
    } else {
        s
    }
}

fn extension(filename: &str) -> Option<&str> {
    std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
}

/// Content sniffing first, extension lookup second.
pub fn detect_media_type(filename: &str, prefix: &[u8]) -> Option<String> {
    if let Some(kind) = infer::get(prefix) {
        return Some(kind.mime_type().to_string());
    }
    extension(filename)
        .and_then(mime_from_extension)
        .map(str::to_string)
}

pub fn validate_size(size_bytes: u64, config: &IngestConfig) -> Result<(), IngestError> {
    if size_bytes == 0 {
        return Err(IngestError::Validation("File is empty".to_string()));
    }
    if size_bytes > config.max_file_size_bytes {
        return Err(IngestError::Validation(format!(
            "File size {} bytes exceeds maximum of {} bytes",
            size_bytes, config.max_file_size_bytes
        )));
    }
    Ok(())
}

pub fn validate_media(
    filename: &str,
    prefix: &[u8],
    config: &IngestConfig,
) -> Result<AcceptedMedia, IngestError> {
    let media_type = detect_media_type(filename, prefix).ok_or_else(|| {
        IngestError::Validation(format!("Unrecognized file type: {}", filename))
    })?;
    let category = MediaCategory::from_mime(&media_type).ok_or_else(|| {
        IngestError::Validation(format!("Unsupported media type: {}", media_type))
    })?;
    if !config.allowed_categories.contains(&category) {
        return Err(IngestError::Validation(format!(
            "Media category {} is not allowed",
            category
        )));
    }
    Ok(AcceptedMedia {
        media_type,
        category,
    })
}

/// Owner ids become the first segment of object paths.
pub fn validate_owner_id(owner_id: &str) -> Result<(), IngestError> {
    if owner_id.trim().is_empty() {
        return Err(IngestError::Validation("Owner id must not be empty".to_string()));
    }
    if owner_id.trim() != owner_id
        || owner_id.contains('/')
        || owner_id.contains('\\')
        || owner_id.contains("..")
    {
        return Err(IngestError::Validation(format!(
            "Owner id is not usable as a path segment: {:?}",
            owner_id
        )));
    }
    Ok(())
}
