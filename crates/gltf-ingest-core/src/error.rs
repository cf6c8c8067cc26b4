//! Error kinds produced while ingesting a glTF asset.
//!
//! Container and document level errors abort a load outright. Everything
//! below that (a buffer, an image, an accessor, a primitive) is recorded on
//! the owning session and only flips its failure flag.

use thiserror::Error;

/// Errors that can occur while decoding a glTF/GLB asset.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IngestError {
    /// Malformed container, JSON document or embedded data.
    #[error("Format error: {0}")]
    Format(String),

    /// A required extension is not in the supported set.
    #[error("Unsupported extension: {0}")]
    UnsupportedExtension(String),

    /// Accessor component type / layout combination has no conversion.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// An external fetch collaborator reported a failure.
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Compressed mesh data could not be decoded.
    #[error("Decompression error: {0}")]
    Decompression(String),

    /// A decode job terminated without producing a result.
    #[error("Job failed: {0}")]
    Job(String),
}

impl IngestError {
    pub fn format(msg: impl Into<String>) -> Self {
        IngestError::Format(msg.into())
    }

    pub fn unsupported_format(msg: impl Into<String>) -> Self {
        IngestError::UnsupportedFormat(msg.into())
    }

    pub fn fetch(msg: impl Into<String>) -> Self {
        IngestError::Fetch(msg.into())
    }
}

impl From<serde_json::Error> for IngestError {
    fn from(e: serde_json::Error) -> Self {
        IngestError::Format(format!("JSON parse error: {}", e))
    }
}

impl From<std::str::Utf8Error> for IngestError {
    fn from(e: std::str::Utf8Error) -> Self {
        IngestError::Format(format!("JSON chunk is not UTF-8: {}", e))
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
