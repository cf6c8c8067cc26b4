use std::io;

use gltf_ingest_core::IngestError;
use thiserror::Error;

/// Errors from the file-system front-end and the writer.
#[derive(Error, Debug)]
pub enum IoError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error("JSON serialize error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid mesh: {0}")]
    InvalidMesh(String),
}

pub type Result<T> = std::result::Result<T, IoError>;
