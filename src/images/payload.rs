//! Decoding stored payloads into servable image bytes

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use thiserror::Error;

/// Raw image bytes with their detected type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub data: Vec<u8>,
    pub mime_type: &'static str,
    pub extension: &'static str,
}

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("payload is not base64: {0}")]
    NotBase64(#[from] base64::DecodeError),
}

/// Decode a base64 payload (optionally a `data:` URL) and sniff its type
pub fn decode_payload(payload: &str) -> Result<DecodedImage, PayloadError> {
    let encoded = match payload.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => payload,
    };

    let data = BASE64.decode(encoded.trim())?;
    let (mime_type, extension) = sniff(&data);

    Ok(DecodedImage {
        data,
        mime_type,
        extension,
    })
}

/// Identify the image format from magic bytes
fn sniff(data: &[u8]) -> (&'static str, &'static str) {
    match data {
        [0x89, b'P', b'N', b'G', ..] => ("image/png", "png"),
        [0xFF, 0xD8, 0xFF, ..] => ("image/jpeg", "jpg"),
        [b'G', b'I', b'F', b'8', ..] => ("image/gif", "gif"),
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => ("image/webp", "webp"),
        _ => ("application/octet-stream", "bin"),
    }
}
