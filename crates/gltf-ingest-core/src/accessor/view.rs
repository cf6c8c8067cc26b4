//! Bounds-checked strided element views over raw buffer bytes.

use crate::error::{IngestError, Result};

/// `count` elements of `element_size` bytes, `stride` bytes apart.
///
/// The whole extent is validated once in [`StridedView::new`]; element
/// access afterwards cannot run past the backing slice.
#[derive(Debug, Clone, Copy)]
pub struct StridedView<'a> {
    bytes: &'a [u8],
    count: usize,
    element_size: usize,
    stride: usize,
}

impl<'a> StridedView<'a> {
    /// `bytes` starts at the first element. A `stride` of `None` means
    /// tightly packed.
    pub fn new(
        bytes: &'a [u8],
        count: usize,
        element_size: usize,
        stride: Option<usize>,
    ) -> Result<Self> {
        if element_size == 0 {
            return Err(IngestError::format("Zero-sized accessor element"));
        }
        let stride = stride.unwrap_or(element_size);
        if stride < element_size {
            return Err(IngestError::format(format!(
                "byteStride {} smaller than element size {}",
                stride, element_size
            )));
        }

        if count > 0 {
            let needed = (count - 1)
                .checked_mul(stride)
                .and_then(|n| n.checked_add(element_size))
                .ok_or_else(|| IngestError::format("Accessor extent overflows"))?;
            if needed > bytes.len() {
                return Err(IngestError::format(format!(
                    "Accessor needs {} bytes but view holds {}",
                    needed,
                    bytes.len()
                )));
            }
        }

        Ok(Self {
            bytes,
            count,
            element_size,
            stride,
        })
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn element_size(&self) -> usize {
        self.element_size
    }

    pub fn is_interleaved(&self) -> bool {
        self.stride > self.element_size
    }

    /// Bytes of element `i`.
    pub fn element(&self, i: usize) -> &'a [u8] {
        let start = i * self.stride;
        &self.bytes[start..start + self.element_size]
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a [u8]> + 'a {
        let element_size = self.element_size;
        self.bytes
            .chunks(self.stride)
            .take(self.count)
            .map(move |chunk| &chunk[..element_size])
    }
}
