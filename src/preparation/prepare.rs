//! Client-side image preparation: validation, pass-through or downscale

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use std::path::Path;
use tracing::{debug, info};

use crate::config::PreparationConfig;
use crate::error::{AppError, Result};
use crate::preparation::data_url;

const FALLBACK_MIME: &str = "application/octet-stream";

/// A user-selected file: its name and raw bytes
#[derive(Debug, Clone)]
pub struct RawImage {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl RawImage {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// Size of the file in bytes
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Image payload ready to submit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedImage {
    /// Encoded image as a `data:` URL
    pub data_url: String,
    pub was_downscaled: bool,
    /// Output dimensions, known only when the image was re-encoded
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl PreparedImage {
    /// Wrap an already encoded payload, e.g. one restored from history
    pub fn from_data_url(data_url: impl Into<String>) -> Self {
        Self {
            data_url: data_url.into(),
            was_downscaled: false,
            width: None,
            height: None,
        }
    }
}

/// Thresholds for [`prepare`]
#[derive(Debug, Clone)]
pub struct PrepareOptions {
    /// Longest edge after downscaling
    pub max_dim: u32,
    /// Files at or below this size pass through untouched
    pub max_bytes: u64,
    pub jpeg_quality: u8,
    /// Re-encode even when the file is small enough
    pub force: bool,
}

impl Default for PrepareOptions {
    fn default() -> Self {
        Self::from(&PreparationConfig::default())
    }
}

impl From<&PreparationConfig> for PrepareOptions {
    fn from(config: &PreparationConfig) -> Self {
        Self {
            max_dim: config.max_dim,
            max_bytes: config.max_bytes,
            jpeg_quality: config.jpeg_quality,
            force: false,
        }
    }
}

/// Accept only PNG and JPEG file names
pub fn validate_file_name(name: &str) -> Result<()> {
    let lower = name.to_ascii_lowercase();
    if lower.ends_with("png") || lower.ends_with("jpg") || lower.ends_with("jpeg") {
        Ok(())
    } else {
        Err(AppError::Validation(
            "Please upload a PNG or JPG file.".to_string(),
        ))
    }
}

/// Dimensions that fit `max_dim` on the longest edge, preserving aspect ratio.
/// Never scales up.
pub fn target_dimensions(width: u32, height: u32, max_dim: u32) -> (u32, u32) {
    let longest = width.max(height).max(1);
    let scale = (max_dim as f64 / longest as f64).min(1.0);
    let target_w = ((width as f64 * scale).round() as u32).max(1);
    let target_h = ((height as f64 * scale).round() as u32).max(1);
    (target_w, target_h)
}

/// Prepare an image for submission.
///
/// Small files are passed through as-is. Oversized files (or any file when
/// `force` is set) are decoded, scaled down to fit `max_dim` and re-encoded
/// as JPEG; this happens even when no scaling is needed.
pub fn prepare(raw: &RawImage, options: &PrepareOptions) -> Result<PreparedImage> {
    validate_file_name(&raw.name)?;

    let too_large = raw.size() > options.max_bytes;
    if !too_large && !options.force {
        let mime = data_url::sniff_mime(&raw.bytes).unwrap_or(FALLBACK_MIME);
        debug!(name = %raw.name, size = raw.size(), mime, "Passing image through");
        return Ok(PreparedImage {
            data_url: data_url::create(&raw.bytes, mime),
            was_downscaled: false,
            width: None,
            height: None,
        });
    }

    let img = image::load_from_memory(&raw.bytes)?;
    let (width, height) = (img.width(), img.height());
    let (target_w, target_h) = target_dimensions(width, height, options.max_dim);

    let resized = if (target_w, target_h) == (width, height) {
        img
    } else {
        img.resize_exact(target_w, target_h, FilterType::Triangle)
    };

    // JPEG has no alpha channel
    let rgb = resized.to_rgb8();
    let mut encoded = Vec::new();
    JpegEncoder::new_with_quality(&mut encoded, options.jpeg_quality)
        .encode_image(&rgb)
        .map_err(|e| AppError::Internal(format!("Failed to encode JPEG: {}", e)))?;

    info!(
        name = %raw.name,
        original_size = raw.size(),
        encoded_size = encoded.len(),
        from = %format!("{}x{}", width, height),
        to = %format!("{}x{}", target_w, target_h),
        "Downscaled image"
    );

    Ok(PreparedImage {
        data_url: data_url::create(&encoded, "image/jpeg"),
        was_downscaled: true,
        width: Some(target_w),
        height: Some(target_h),
    })
}

/// Run [`prepare`] on the blocking pool
pub async fn prepare_in_background(raw: RawImage, options: PrepareOptions) -> Result<PreparedImage> {
    tokio::task::spawn_blocking(move || prepare(&raw, &options))
        .await
        .map_err(|e| AppError::Internal(format!("Image preparation task failed: {}", e)))?
}

/// Read a file from disk and prepare it
pub async fn prepare_file<P: AsRef<Path>>(path: P, options: &PrepareOptions) -> Result<PreparedImage> {
    let raw = read_raw_image(path).await?;
    prepare_in_background(raw, options.clone()).await
}

/// Read a file from disk into a [`RawImage`] named after the file
pub async fn read_raw_image<P: AsRef<Path>>(path: P) -> Result<RawImage> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path).await?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    Ok(RawImage::new(name, bytes))
}
