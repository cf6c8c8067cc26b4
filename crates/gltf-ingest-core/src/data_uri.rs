//! Embedded `data:` URI handling.
//!
//! Only the base64 form is accepted: `data:<media-type>;base64,<payload>`.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::error::{IngestError, Result};

const DATA_SCHEME: &str = "data:";
const BASE64_MARKER: &str = "base64,";

/// Default number of characters searched for the media type separator.
pub const DEFAULT_MEDIA_TYPE_SCAN: usize = 1000;

/// Decoded payload of a data URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedData {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

pub fn is_data_uri(uri: &str) -> bool {
    uri.starts_with(DATA_SCHEME)
}

pub fn decode_data_uri(uri: &str) -> Result<EmbeddedData> {
    decode_data_uri_with_limit(uri, DEFAULT_MEDIA_TYPE_SCAN)
}

/// Decode a base64 data URI, looking for the `;` separator within the first
/// `scan_limit` characters after the scheme.
pub fn decode_data_uri_with_limit(uri: &str, scan_limit: usize) -> Result<EmbeddedData> {
    let rest = uri
        .strip_prefix(DATA_SCHEME)
        .ok_or_else(|| IngestError::format("Not a data URI"))?;

    let window = &rest.as_bytes()[..rest.len().min(scan_limit)];
    let separator = window
        .iter()
        .position(|&b| b == b';')
        .ok_or_else(|| IngestError::format("Invalid data URI: missing media type separator"))?;

    let mime_type = &rest[..separator];
    let payload = rest[separator + 1..]
        .strip_prefix(BASE64_MARKER)
        .ok_or_else(|| IngestError::format("Invalid data URI: not base64 encoded"))?;

    let bytes = STANDARD
        .decode(payload.trim_end())
        .map_err(|e| IngestError::format(format!("Invalid base64 payload: {}", e)))?;

    Ok(EmbeddedData {
        mime_type: mime_type.to_string(),
        bytes,
    })
}

pub fn encode_data_uri(mime_type: &str, bytes: &[u8]) -> String {
    format!("{}{};{}{}", DATA_SCHEME, mime_type, BASE64_MARKER, STANDARD.encode(bytes))
}
