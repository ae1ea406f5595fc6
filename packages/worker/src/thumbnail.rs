use std::io::Cursor;
use std::sync::Arc;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use tracing::{debug, info};
use uuid::Uuid;

use common::events::PhotoUploaded;
use common::photos::PhotoStore;
use common::storage::ObjectStore;

use crate::error::WorkerError;

/// JPEG quality for every thumbnail.
const JPEG_QUALITY: u8 = 85;

/// Everything one message needs: the two stores and the size set to produce.
pub struct ThumbnailContext {
    pub storage: Arc<dyn ObjectStore>,
    pub photos: Arc<dyn PhotoStore>,
    pub sizes: Vec<u32>,
}

/// Process one `photo.uploaded` event: fetch the original, render a JPEG
/// thumbnail per configured size, store it, and record it in the photo's
/// metadata. Non-image uploads are skipped.
pub async fn process_event(
    ctx: &ThumbnailContext,
    event: &PhotoUploaded,
) -> Result<(), WorkerError> {
    if !event.mime.starts_with("image/") {
        debug!(mime = %event.mime, "Skipping non-image MIME type");
        return Ok(());
    }

    let id: Uuid = event
        .id
        .parse()
        .map_err(|_| WorkerError::BadEvent(format!("invalid photo id: {}", event.id)))?;

    let data = ctx.storage.get_bytes(&event.s3_key).await?;

    for &size in &ctx.sizes {
        let bytes = data.clone();
        let thumb = tokio::task::spawn_blocking(move || render_thumbnail(&bytes, size))
            .await
            .map_err(|e| WorkerError::Join(e.to_string()))??;

        let key = thumbnail_key(size, id);
        ctx.storage
            .put(&key, Bytes::from(thumb), "image/jpeg")
            .await?;
        ctx.photos
            .merge_thumbnail(id, &size.to_string(), &key)
            .await?;

        info!(photo_id = %id, size, %key, "Created thumbnail");
    }

    Ok(())
}

pub fn thumbnail_key(size: u32, id: Uuid) -> String {
    format!("thumb/{size}/{id}.jpg")
}

/// Decode, fit-resize so the longest side is at most `size` (never
/// upscaling), and encode as JPEG. Alpha is flattened since JPEG carries
/// none.
pub fn render_thumbnail(data: &[u8], size: u32) -> Result<Vec<u8>, WorkerError> {
    let img =
        image::load_from_memory(data).map_err(|e| WorkerError::ImageDecode(e.to_string()))?;

    let resized = if img.width() <= size && img.height() <= size {
        img
    } else {
        img.resize(size, size, FilterType::Lanczos3)
    };

    let rgb = DynamicImage::ImageRgb8(resized.to_rgb8());

    let mut out = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
    rgb.write_with_encoder(encoder)
        .map_err(|e| WorkerError::ImageEncode(e.to_string()))?;

    Ok(out.into_inner())
}

/// Deterministic PNG for tests.
#[cfg(test)]
pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    }));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}
