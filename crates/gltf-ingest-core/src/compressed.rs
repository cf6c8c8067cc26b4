//! Compressed mesh path (`KHR_draco_mesh_compression`).
//!
//! The bitstream decoder itself is a collaborator: anything implementing
//! [`MeshDecompressor`] is handed the compressed bytes and the
//! semantic-to-attribute-id map, and returns canonical arrays directly.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::buffer::ByteView;
use crate::error::{IngestError, Result};
use crate::primitive::MeshData;
use crate::scheduler::{JobHandle, JobPool};

/// Decodes one compressed primitive.
///
/// `attributes` maps glTF semantics (`POSITION`, `NORMAL`, `TEXCOORD_0`...)
/// to attribute ids inside the compressed stream.
pub trait MeshDecompressor: Send + Sync {
    fn decompress(&self, data: &[u8], attributes: &BTreeMap<String, usize>) -> Result<MeshData>;
}

impl<F> MeshDecompressor for F
where
    F: Fn(&[u8], &BTreeMap<String, usize>) -> Result<MeshData> + Send + Sync,
{
    fn decompress(&self, data: &[u8], attributes: &BTreeMap<String, usize>) -> Result<MeshData> {
        self(data, attributes)
    }
}

/// Schedule decompression of `data` on the pool.
///
/// Without a decompressor the handle is already failed.
pub fn schedule_decompression(
    pool: &JobPool,
    decompressor: Option<&Arc<dyn MeshDecompressor>>,
    data: ByteView,
    attributes: BTreeMap<String, usize>,
) -> JobHandle<MeshData> {
    let Some(decompressor) = decompressor.cloned() else {
        return JobHandle::ready(Err(IngestError::Decompression(
            "no mesh decompressor configured".into(),
        )));
    };

    pool.spawn(move || {
        decompressor
            .decompress(data.as_slice(), &attributes)
            .map_err(|e| match e {
                IngestError::Decompression(_) => e,
                other => IngestError::Decompression(other.to_string()),
            })
    })
}
