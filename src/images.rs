//! Decoding of question images stored as JPEG data URIs.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::{DynamicImage, ImageFormat};

use crate::error::ImageError;

pub const JPEG_DATA_URI_PREFIX: &str = "data:image/jpeg;base64,";

/// A successfully decoded question image.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub bitmap: DynamicImage,
}

impl DecodedImage {
    pub fn width(&self) -> u32 {
        self.bitmap.width()
    }

    pub fn height(&self) -> u32 {
        self.bitmap.height()
    }
}

/// Decode a JPEG data URI.
///
/// Returns `Ok(None)` without touching the payload when `value` does not
/// carry the JPEG data-URI prefix; such cells are treated as "no image".
pub fn decode_data_uri(value: &str) -> Result<Option<DecodedImage>, ImageError> {
    let Some(payload) = value.strip_prefix(JPEG_DATA_URI_PREFIX) else {
        return Ok(None);
    };
    let bytes = STANDARD.decode(payload.trim())?;
    let bitmap = image::load_from_memory_with_format(&bytes, ImageFormat::Jpeg)?;
    Ok(Some(DecodedImage { bitmap }))
}
