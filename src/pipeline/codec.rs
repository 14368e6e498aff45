use image::codecs::jpeg::JpegEncoder;
use image::{ImageError, RgbImage};

use crate::pipeline::error::ValidationError;

pub const JPEG_QUALITY: u8 = 90;

/// Decodes inbound bytes into an RGB buffer. Alpha is dropped since every
/// artifact is written as JPEG.
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage, ValidationError> {
    if bytes.is_empty() {
        return Err(ValidationError("empty image payload".to_string()));
    }
    let decoded = image::load_from_memory(bytes)
        .map_err(|err| ValidationError(format!("unreadable image: {err}")))?;
    Ok(decoded.to_rgb8())
}

pub fn encode_jpeg(image: &RgbImage) -> Result<Vec<u8>, ImageError> {
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY).encode_image(image)?;
    Ok(buffer)
}
