//! Buffer resolution.
//!
//! Every `buffers[i]` entry ends up as one immutable byte region: buffer 0
//! of a GLB points into the BIN chunk of the original stream, embedded
//! buffers hold their decoded payload, and external buffers hold whatever
//! the fetch collaborator returned. Regions are shared read-only with the
//! decode jobs and released in one step once assembly is over.

use std::fmt;
use std::sync::Arc;

use crate::error::{IngestError, Result};
use crate::glb::ChunkRange;
use crate::schema::BufferView;

/// Start and length of a buffer inside its backing storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferRegion {
    pub start: usize,
    pub length: usize,
}

/// A read-only window into resolved buffer storage.
///
/// Cloning shares the storage; it never copies bytes.
#[derive(Clone)]
pub struct ByteView {
    storage: Arc<[u8]>,
    offset: usize,
    length: usize,
}

impl ByteView {
    fn new(storage: Arc<[u8]>, offset: usize, length: usize) -> Self {
        debug_assert!(offset + length <= storage.len());
        Self {
            storage,
            offset,
            length,
        }
    }

    pub fn from_vec(bytes: Vec<u8>) -> Self {
        let length = bytes.len();
        Self::new(Arc::from(bytes), 0, length)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.storage[self.offset..self.offset + self.length]
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Narrow the view to `[offset, offset + length)` relative to this view.
    pub fn slice(&self, offset: usize, length: usize) -> Result<ByteView> {
        let end = offset
            .checked_add(length)
            .filter(|&end| end <= self.length)
            .ok_or_else(|| {
                IngestError::format(format!(
                    "Range {}+{} exceeds view of {} bytes",
                    offset, length, self.length
                ))
            })?;
        Ok(Self::new(
            self.storage.clone(),
            self.offset + offset,
            end - offset,
        ))
    }

    /// Everything from `offset` to the end of the view.
    pub fn tail(&self, offset: usize) -> Result<ByteView> {
        let length = self.length.checked_sub(offset).ok_or_else(|| {
            IngestError::format(format!(
                "Offset {} exceeds view of {} bytes",
                offset, self.length
            ))
        })?;
        self.slice(offset, length)
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.as_slice().to_vec()
    }
}

impl fmt::Debug for ByteView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteView")
            .field("offset", &self.offset)
            .field("length", &self.length)
            .finish()
    }
}

/// Collects buffer payloads as they become available.
#[derive(Debug)]
pub struct BufferResolver {
    slots: Vec<Option<ByteView>>,
}

impl BufferResolver {
    pub fn new(buffer_count: usize) -> Self {
        Self {
            slots: vec![None; buffer_count],
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Point buffer 0 at the BIN chunk of `glb` without copying it.
    pub fn set_glb_binary(&mut self, glb: Arc<[u8]>, chunk: ChunkRange) -> Result<()> {
        if chunk.end() > glb.len() {
            return Err(IngestError::format("BIN chunk exceeds GLB stream"));
        }
        let slot = self
            .slots
            .first_mut()
            .ok_or_else(|| IngestError::format("GLB has a BIN chunk but no buffers"))?;
        *slot = Some(ByteView::new(glb, chunk.offset, chunk.length));
        Ok(())
    }

    pub fn set_bytes(&mut self, index: usize, bytes: Vec<u8>) -> Result<()> {
        let slot = self
            .slots
            .get_mut(index)
            .ok_or_else(|| IngestError::format(format!("Invalid buffer index: {}", index)))?;
        *slot = Some(ByteView::from_vec(bytes));
        Ok(())
    }

    pub fn missing(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_none())
            .map(|(i, _)| i)
            .collect()
    }

    /// All buffers must be present.
    pub fn finish(self) -> Result<ResolvedBuffers> {
        let missing = self.missing();
        if let Some(&first) = missing.first() {
            return Err(IngestError::format(format!(
                "Buffer {} was never resolved",
                first
            )));
        }
        Ok(ResolvedBuffers {
            buffers: self.slots.into_iter().flatten().collect(),
        })
    }
}

/// The immutable set of buffer bytes for one load.
#[derive(Debug)]
pub struct ResolvedBuffers {
    buffers: Vec<ByteView>,
}

impl ResolvedBuffers {
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn region(&self, index: usize) -> Option<BufferRegion> {
        self.buffers.get(index).map(|b| BufferRegion {
            start: b.offset,
            length: b.length,
        })
    }

    pub fn buffer(&self, index: usize) -> Result<ByteView> {
        self.buffers
            .get(index)
            .cloned()
            .ok_or_else(|| IngestError::format(format!("Invalid buffer index: {}", index)))
    }

    /// Bytes covered by a bufferView, bounds-checked against its buffer.
    pub fn view(&self, view: &BufferView) -> Result<ByteView> {
        let buffer = self.buffer(view.buffer)?;
        buffer.slice(view.byte_offset, view.byte_length).map_err(|_| {
            IngestError::format(format!(
                "bufferView range {}+{} exceeds buffer {} ({} bytes)",
                view.byte_offset,
                view.byte_length,
                view.buffer,
                buffer.len()
            ))
        })
    }

    /// Drop every region held by the load. Returns the number of bytes
    /// released.
    pub fn release(self) -> usize {
        let bytes = self.buffers.iter().map(ByteView::len).sum();
        tracing::debug!("Released {} buffers ({} bytes)", self.buffers.len(), bytes);
        bytes
    }
}
