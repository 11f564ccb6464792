//! Image decoding and normalization
//!
//! Turns a transport-encoded payload (base64, optionally behind a data-URL
//! prefix) into an RGB8 image plus a PNG re-encoding of it. Both backends
//! consume this normalized form, so neither depends on the caller's
//! original file type.

use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, ImageFormat, RgbImage};
use thiserror::Error;

/// Default cap on decoded image size (10MB)
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Errors raised while decoding an image payload
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Image data is empty")]
    EmptyData,

    #[error("Invalid base64 encoding: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("Image data is too large: {0} bytes (max: {1} bytes)")]
    TooLarge(usize, usize),

    #[error("Unsupported image format")]
    UnsupportedFormat,

    #[error("Failed to decode image: {0}")]
    Unreadable(String),

    #[error("Failed to normalize image: {0}")]
    Normalization(String),
}

/// An image normalized to RGB8 and re-encoded as PNG
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    pixels: RgbImage,
    png: Vec<u8>,
    source_format: ImageFormat,
}

impl NormalizedImage {
    /// Normalize an already decoded image
    pub fn from_dynamic(
        image: DynamicImage,
        source_format: ImageFormat,
    ) -> Result<Self, DecodeError> {
        let pixels = image.to_rgb8();

        let mut png = Vec::new();
        pixels
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| DecodeError::Normalization(e.to_string()))?;

        Ok(Self {
            pixels,
            png,
            source_format,
        })
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// RGB8 pixels
    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }

    /// PNG encoding of [`Self::pixels`]
    pub fn png_bytes(&self) -> &[u8] {
        &self.png
    }

    /// Container format the caller sent
    pub fn source_format(&self) -> ImageFormat {
        self.source_format
    }
}

/// Decoder for transport-encoded images
#[derive(Debug, Clone)]
pub struct ImageDecoder {
    max_image_bytes: usize,
}

impl Default for ImageDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_IMAGE_BYTES)
    }
}

impl ImageDecoder {
    pub fn new(max_image_bytes: usize) -> Self {
        Self { max_image_bytes }
    }

    /// Decode a base64 payload (with or without a data-URL prefix)
    pub fn decode(&self, encoded: &str) -> Result<NormalizedImage, DecodeError> {
        let payload = strip_data_url(encoded.trim());

        // Line-wrapped base64 is common in mail and spreadsheet exports
        let compact: String = payload
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        if compact.is_empty() {
            return Err(DecodeError::EmptyData);
        }

        let bytes = STANDARD.decode(compact.as_bytes())?;
        self.decode_bytes(&bytes)
    }

    /// Decode raw image bytes
    pub fn decode_bytes(&self, bytes: &[u8]) -> Result<NormalizedImage, DecodeError> {
        if bytes.is_empty() {
            return Err(DecodeError::EmptyData);
        }
        if bytes.len() > self.max_image_bytes {
            return Err(DecodeError::TooLarge(bytes.len(), self.max_image_bytes));
        }

        let format = image::guess_format(bytes).map_err(|_| DecodeError::UnsupportedFormat)?;
        let image = image::load_from_memory_with_format(bytes, format)
            .map_err(|e| DecodeError::Unreadable(e.to_string()))?;

        tracing::debug!(
            "Decoded {:?} image: {}x{}, {} bytes",
            format,
            image.width(),
            image.height(),
            bytes.len()
        );

        NormalizedImage::from_dynamic(image, format)
    }
}

/// Strip a `data:<mime>;base64,` prefix if present
pub fn strip_data_url(payload: &str) -> &str {
    if payload.starts_with("data:") {
        match payload.split_once(',') {
            Some((_, data)) => data,
            None => "",
        }
    } else {
        payload
    }
}
