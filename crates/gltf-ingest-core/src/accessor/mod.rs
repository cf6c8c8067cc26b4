//! Accessor decoding.
//!
//! An [`AccessorPlan`] binds one accessor to the bytes it reads and to the
//! conversion routine chosen from the dispatch table. Plans are built on the
//! driving thread and run on the job pool.

pub mod component;
pub mod dispatch;
pub mod indices;
pub mod view;

pub use component::{Component, ComponentType};
pub use dispatch::{AttributeData, ConversionKey, ConvertFn, TargetShape};
pub use indices::Topology;
pub use view::StridedView;

use crate::buffer::{ByteView, ResolvedBuffers};
use crate::error::{IngestError, Result};
use crate::schema::{AccessorType, Document};

/// The role an accessor is decoded for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Semantic {
    Position,
    Normal,
    Tangent,
    TexCoord(u8),
    Color,
    Indices,
}

impl Semantic {
    /// Target shape for an accessor of `accessor_type` used in this role.
    pub fn target_shape(self, accessor_type: AccessorType) -> Result<TargetShape> {
        let shape = match (self, accessor_type) {
            (Semantic::Position | Semantic::Normal, AccessorType::Vec3) => TargetShape::Vec3,
            (Semantic::Tangent, AccessorType::Vec4) => TargetShape::Vec4,
            (Semantic::TexCoord(_), AccessorType::Vec2) => TargetShape::Vec2,
            (Semantic::Color, AccessorType::Vec3) => TargetShape::Color3,
            (Semantic::Color, AccessorType::Vec4) => TargetShape::Color4,
            (Semantic::Indices, AccessorType::Scalar) => TargetShape::Index,
            (semantic, ty) => {
                return Err(IngestError::unsupported_format(format!(
                    "{:?} accessor cannot be {}",
                    semantic,
                    ty.name()
                )))
            }
        };
        Ok(shape)
    }
}

/// One accessor ready to decode.
#[derive(Clone)]
pub struct AccessorPlan {
    accessor_index: usize,
    key: ConversionKey,
    convert: ConvertFn,
    count: usize,
    element_size: usize,
    stride: Option<usize>,
    /// `None` for accessors without a bufferView, which decode to zeros.
    source: Option<ByteView>,
}

impl AccessorPlan {
    pub fn new(
        document: &Document,
        buffers: &ResolvedBuffers,
        accessor_index: usize,
        semantic: Semantic,
    ) -> Result<Self> {
        let accessor = document.accessor(accessor_index)?;
        let shape = semantic.target_shape(accessor.accessor_type)?;
        let component = ComponentType::from_gl(accessor.component_type).ok_or_else(|| {
            IngestError::unsupported_format(format!(
                "Accessor {} has unknown component type {}",
                accessor_index, accessor.component_type
            ))
        })?;
        let element_size = component.byte_size() * accessor.accessor_type.num_components();

        let (source, stride) = match accessor.buffer_view {
            Some(view_index) => {
                let view = document.buffer_view(view_index)?;
                let bytes = buffers.view(view)?.tail(accessor.byte_offset)?;
                (Some(bytes), view.byte_stride)
            }
            None => (None, None),
        };

        let key = ConversionKey {
            shape,
            component,
            normalized: accessor.normalized,
            interleaved: document.is_accessor_interleaved(accessor_index),
        };
        let convert = dispatch::lookup(&key).ok_or_else(|| {
            IngestError::unsupported_format(format!(
                "Accessor {}: no conversion for {:?} from {}{}{}",
                accessor_index,
                shape,
                component.name(),
                if key.normalized { " normalized" } else { "" },
                if key.interleaved { " interleaved" } else { "" },
            ))
        })?;

        if let Some(bytes) = &source {
            StridedView::new(bytes.as_slice(), accessor.count, element_size, stride)?;
        }

        Ok(Self {
            accessor_index,
            key,
            convert,
            count: accessor.count,
            element_size,
            stride,
            source,
        })
    }

    pub fn accessor_index(&self) -> usize {
        self.accessor_index
    }

    pub fn key(&self) -> ConversionKey {
        self.key
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Decode into a freshly allocated output array.
    pub fn run(&self) -> Result<AttributeData> {
        match &self.source {
            None => Ok(AttributeData::zeroed(
                self.key.shape,
                self.key.component,
                self.count,
            )),
            Some(bytes) => {
                let view =
                    StridedView::new(bytes.as_slice(), self.count, self.element_size, self.stride)?;
                Ok((self.convert)(&view))
            }
        }
    }
}

impl std::fmt::Debug for AccessorPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessorPlan")
            .field("accessor_index", &self.accessor_index)
            .field("key", &self.key)
            .field("count", &self.count)
            .field("stride", &self.stride)
            .finish()
    }
}

/// Plan and run a single accessor on the calling thread.
pub fn decode_accessor(
    document: &Document,
    buffers: &ResolvedBuffers,
    accessor_index: usize,
    semantic: Semantic,
) -> Result<AttributeData> {
    AccessorPlan::new(document, buffers, accessor_index, semantic)?.run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferResolver;
    use crate::schema::{Accessor, Buffer, BufferView};

    fn accessor(view: Option<usize>, ct: u32, ty: AccessorType, count: usize) -> Accessor {
        Accessor {
            buffer_view: view,
            byte_offset: 0,
            component_type: ct,
            normalized: false,
            count,
            accessor_type: ty,
            min: Vec::new(),
            max: Vec::new(),
            name: None,
        }
    }

    fn fixture(bytes: Vec<u8>, stride: Option<usize>, accessors: Vec<Accessor>) -> (Document, ResolvedBuffers) {
        let doc = Document {
            buffers: vec![Buffer {
                byte_length: bytes.len(),
                uri: None,
                name: None,
            }],
            buffer_views: vec![BufferView {
                buffer: 0,
                byte_offset: 0,
                byte_length: bytes.len(),
                byte_stride: stride,
                target: None,
                name: None,
            }],
            accessors,
            ..Default::default()
        };
        let mut resolver = BufferResolver::new(1);
        resolver.set_bytes(0, bytes).unwrap();
        (doc, resolver.finish().unwrap())
    }

    #[test]
    fn test_interleaved_position_and_uv() {
        // Per vertex: position (12 bytes) + uv (8 bytes) = stride 20.
        let mut bytes = Vec::new();
        for v in 0..2 {
            for c in [v as f32, 1.0, 2.0, 0.5, 0.25] {
                bytes.extend_from_slice(&c.to_le_bytes());
            }
        }
        let mut uv = accessor(Some(0), 5126, AccessorType::Vec2, 2);
        uv.byte_offset = 12;
        let (doc, buffers) = fixture(
            bytes,
            Some(20),
            vec![accessor(Some(0), 5126, AccessorType::Vec3, 2), uv],
        );

        let pos = AccessorPlan::new(&doc, &buffers, 0, Semantic::Position).unwrap();
        assert!(pos.key().interleaved);
        assert_eq!(
            pos.run().unwrap(),
            AttributeData::Vec3(vec![[0.0, 1.0, 2.0], [1.0, 1.0, 2.0]])
        );
        assert_eq!(
            decode_accessor(&doc, &buffers, 1, Semantic::TexCoord(0)).unwrap(),
            AttributeData::Vec2(vec![[0.5, 0.25], [0.5, 0.25]])
        );
    }

    #[test]
    fn test_no_buffer_view_is_zeroed() {
        let (doc, buffers) = fixture(
            vec![0; 4],
            None,
            vec![accessor(None, 5126, AccessorType::Vec3, 3)],
        );
        assert_eq!(
            decode_accessor(&doc, &buffers, 0, Semantic::Normal).unwrap(),
            AttributeData::Vec3(vec![[0.0; 3]; 3])
        );
    }

    #[test]
    fn test_shape_mismatch_is_unsupported() {
        let (doc, buffers) = fixture(
            vec![0; 24],
            None,
            vec![accessor(Some(0), 5126, AccessorType::Vec2, 3)],
        );
        let err = AccessorPlan::new(&doc, &buffers, 0, Semantic::Position).unwrap_err();
        assert!(matches!(err, IngestError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_unknown_component_type() {
        let (doc, buffers) = fixture(
            vec![0; 12],
            None,
            vec![accessor(Some(0), 5124, AccessorType::Vec3, 1)],
        );
        let err = AccessorPlan::new(&doc, &buffers, 0, Semantic::Position).unwrap_err();
        assert!(matches!(err, IngestError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_out_of_range_accessor_is_format_error() {
        let (doc, buffers) = fixture(
            vec![0; 12],
            None,
            vec![accessor(Some(0), 5126, AccessorType::Vec3, 2)],
        );
        let err = AccessorPlan::new(&doc, &buffers, 0, Semantic::Position).unwrap_err();
        assert!(matches!(err, IngestError::Format(_)));
    }
}
