//! Artifact re-encode step.
//!
//! The backend persists artifacts as PNG; delivery re-compresses them
//! to JPEG. Pure functions over byte buffers, independent of the graph
//! construction logic.

use base64::Engine;

/// JPEG quality used for delivered artifacts.
pub const DEFAULT_JPEG_QUALITY: u8 = 93;

/// Errors from the re-encode step.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("Failed to decode artifact image: {0}")]
    Decode(image::ImageError),

    #[error("Failed to encode JPEG: {0}")]
    Encode(image::ImageError),

    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Re-compress an image to JPEG at the given quality.
///
/// Alpha is dropped (JPEG has none); everything else is preserved.
pub fn reencode_jpeg(bytes: &[u8], quality: u8) -> Result<Vec<u8>, EncodeError> {
    let img = image::load_from_memory(bytes).map_err(EncodeError::Decode)?;
    let rgb = img.to_rgb8();

    let mut out = Vec::new();
    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, quality);
    encoder.encode_image(&rgb).map_err(EncodeError::Encode)?;
    Ok(out)
}

/// Standard base64 of a byte buffer (response payload form).
pub fn to_base64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Decode a standard-base64 request payload.
pub fn from_base64(payload: &str) -> Result<Vec<u8>, EncodeError> {
    Ok(base64::engine::general_purpose::STANDARD.decode(payload)?)
}
