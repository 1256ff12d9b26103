//! Image encoding: processed JPEG on disk → base64 `ImageData`.
//!
//! Vision APIs (Gemini, OpenAI, Anthropic) accept images as base64 data
//! embedded in the JSON request body. The preprocessor already produced a
//! high-quality JPEG, so the bytes are forwarded as-is rather than decoded
//! and re-encoded.

use crate::error::DigestError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use std::path::Path;
use tracing::debug;

/// Read an image file and wrap it for a vision request.
///
/// `detail: "high"` asks tiling models to use their full tile budget; small
/// Bengali body type is unreadable at the low-detail single-tile setting.
pub async fn encode_image_file(path: &Path) -> Result<ImageData, DigestError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| DigestError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(encode_bytes(&bytes, mime_for_path(path)))
}

/// Base64-wrap raw image bytes.
pub fn encode_bytes(bytes: &[u8], mime_type: &str) -> ImageData {
    let b64 = STANDARD.encode(bytes);
    debug!("Encoded image → {} bytes base64", b64.len());
    ImageData::new(b64, mime_type).with_detail("high")
}

/// MIME type from the file extension; processed files are always JPEG.
pub fn mime_for_path(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
}
