//! Preview generation for staged files.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use exhibit_core::constants::PREVIEW_MIME;
use exhibit_core::models::Preview;
use image::{GenericImageView, ImageFormat};
use std::io::Cursor;

use crate::error::PreviewError;
use crate::handle::RawHandle;

/// Produces a small in-memory preview of a raw payload.
#[async_trait]
pub trait PreviewGenerator: Send + Sync {
    async fn generate(&self, handle: &RawHandle, media_type: &str)
        -> Result<Preview, PreviewError>;
}

/// Downscaled PNG thumbnails of images, returned as `data:` URIs.
#[derive(Debug, Clone)]
pub struct ThumbnailPreviewGenerator {
    max_dimension: u32,
    max_source_bytes: u64,
}

impl ThumbnailPreviewGenerator {
    pub fn new(max_dimension: u32, max_source_bytes: u64) -> Self {
        Self {
            max_dimension: max_dimension.max(1),
            max_source_bytes,
        }
    }

    fn render(data: &[u8], max_dimension: u32) -> Result<Preview, PreviewError> {
        let img = image::ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(PreviewError::Io)?
            .decode()
            .map_err(|e| PreviewError::Decode(e.to_string()))?;

        let thumb = img.thumbnail(max_dimension, max_dimension);
        let (width, height) = thumb.dimensions();

        let mut buffer = Vec::new();
        thumb
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .map_err(|e| PreviewError::Encode(e.to_string()))?;

        Ok(Preview {
            data_uri: format!("data:{};base64,{}", PREVIEW_MIME, STANDARD.encode(&buffer)),
            width,
            height,
        })
    }
}

#[async_trait]
impl PreviewGenerator for ThumbnailPreviewGenerator {
    async fn generate(
        &self,
        handle: &RawHandle,
        media_type: &str,
    ) -> Result<Preview, PreviewError> {
        if !media_type.starts_with("image/") {
            return Err(PreviewError::Unsupported(media_type.to_string()));
        }

        let size = handle.len().await?;
        if size > self.max_source_bytes {
            return Err(PreviewError::TooLarge(size));
        }

        let data = handle.read_all().await?;
        let max_dimension = self.max_dimension;
        tokio::task::spawn_blocking(move || Self::render(&data, max_dimension))
            .await
            .map_err(|e| PreviewError::Task(e.to_string()))?
    }
}
