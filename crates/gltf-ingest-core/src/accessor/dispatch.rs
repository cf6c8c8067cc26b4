//! Conversion routines keyed by target shape and source layout.
//!
//! Every supported combination of (target shape, component type,
//! normalized, interleaved) has exactly one entry in a table built on
//! first use. Anything not in the table is an unsupported format.

use std::collections::HashMap;

use lazy_static::lazy_static;
use num_traits::AsPrimitive;

use super::component::{Component, ComponentType};
use super::view::StridedView;

/// The canonical array an accessor is decoded into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetShape {
    /// Texture coordinates.
    Vec2,
    /// Positions and normals.
    Vec3,
    /// Tangents.
    Vec4,
    /// RGB colors, widened to RGBA.
    Color3,
    Color4,
    Index,
}

impl TargetShape {
    /// Number of components read per source element.
    pub fn source_components(self) -> usize {
        match self {
            TargetShape::Index => 1,
            TargetShape::Vec2 => 2,
            TargetShape::Vec3 | TargetShape::Color3 => 3,
            TargetShape::Vec4 | TargetShape::Color4 => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConversionKey {
    pub shape: TargetShape,
    pub component: ComponentType,
    pub normalized: bool,
    pub interleaved: bool,
}

/// Decoded accessor contents.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeData {
    Vec2(Vec<[f32; 2]>),
    Vec3(Vec<[f32; 3]>),
    Vec4(Vec<[f32; 4]>),
    /// 8-bit colors stay compact.
    Rgba8(Vec<[u8; 4]>),
    RgbaF32(Vec<[f32; 4]>),
    Indices(Vec<u32>),
}

impl AttributeData {
    pub fn len(&self) -> usize {
        match self {
            AttributeData::Vec2(v) => v.len(),
            AttributeData::Vec3(v) => v.len(),
            AttributeData::Vec4(v) => v.len(),
            AttributeData::Rgba8(v) => v.len(),
            AttributeData::RgbaF32(v) => v.len(),
            AttributeData::Indices(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AttributeData::Vec2(_) => "vec2",
            AttributeData::Vec3(_) => "vec3",
            AttributeData::Vec4(_) => "vec4",
            AttributeData::Rgba8(_) => "rgba8",
            AttributeData::RgbaF32(_) => "rgba32f",
            AttributeData::Indices(_) => "indices",
        }
    }

    /// All-zero output for an accessor without a bufferView.
    pub fn zeroed(shape: TargetShape, component: ComponentType, count: usize) -> Self {
        match shape {
            TargetShape::Vec2 => AttributeData::Vec2(vec![[0.0; 2]; count]),
            TargetShape::Vec3 => AttributeData::Vec3(vec![[0.0; 3]; count]),
            TargetShape::Vec4 => AttributeData::Vec4(vec![[0.0; 4]; count]),
            TargetShape::Color3 | TargetShape::Color4 => {
                let opaque = shape == TargetShape::Color3;
                if component == ComponentType::UnsignedByte {
                    let a = if opaque { u8::MAX } else { 0 };
                    AttributeData::Rgba8(vec![[0, 0, 0, a]; count])
                } else {
                    let a = if opaque { 1.0 } else { 0.0 };
                    AttributeData::RgbaF32(vec![[0.0, 0.0, 0.0, a]; count])
                }
            }
            TargetShape::Index => AttributeData::Indices(vec![0; count]),
        }
    }
}

pub type ConvertFn = fn(&StridedView<'_>) -> AttributeData;

lazy_static! {
    static ref CONVERSIONS: HashMap<ConversionKey, ConvertFn> = build_table();
}

pub fn lookup(key: &ConversionKey) -> Option<ConvertFn> {
    CONVERSIONS.get(key).copied()
}

pub fn is_supported(key: &ConversionKey) -> bool {
    CONVERSIONS.contains_key(key)
}

pub fn supported_keys() -> impl Iterator<Item = &'static ConversionKey> {
    CONVERSIONS.keys()
}

// ============================================================================
// Element readers
// ============================================================================

fn read_raw<T: Component, const N: usize>(view: &StridedView<'_>) -> Vec<[f32; N]> {
    view.iter()
        .map(|element| {
            let mut out = [0.0f32; N];
            for (c, slot) in out.iter_mut().enumerate() {
                *slot = T::read(&element[c * T::SIZE..]).as_();
            }
            out
        })
        .collect()
}

fn read_normalized<T: Component, const N: usize>(view: &StridedView<'_>) -> Vec<[f32; N]> {
    view.iter()
        .map(|element| {
            let mut out = [0.0f32; N];
            for (c, slot) in out.iter_mut().enumerate() {
                *slot = T::read(&element[c * T::SIZE..]).normalize();
            }
            out
        })
        .collect()
}

fn vec2_raw<T: Component>(view: &StridedView<'_>) -> AttributeData {
    AttributeData::Vec2(read_raw::<T, 2>(view))
}

fn vec2_norm<T: Component>(view: &StridedView<'_>) -> AttributeData {
    AttributeData::Vec2(read_normalized::<T, 2>(view))
}

fn vec3_raw<T: Component>(view: &StridedView<'_>) -> AttributeData {
    AttributeData::Vec3(read_raw::<T, 3>(view))
}

fn vec3_norm<T: Component>(view: &StridedView<'_>) -> AttributeData {
    AttributeData::Vec3(read_normalized::<T, 3>(view))
}

fn vec4_raw<T: Component>(view: &StridedView<'_>) -> AttributeData {
    AttributeData::Vec4(read_raw::<T, 4>(view))
}

fn vec4_norm<T: Component>(view: &StridedView<'_>) -> AttributeData {
    AttributeData::Vec4(read_normalized::<T, 4>(view))
}

fn rgb_to_rgba<T: Component>(view: &StridedView<'_>) -> AttributeData {
    AttributeData::RgbaF32(
        read_normalized::<T, 3>(view)
            .into_iter()
            .map(|[r, g, b]| [r, g, b, 1.0])
            .collect(),
    )
}

fn rgba<T: Component>(view: &StridedView<'_>) -> AttributeData {
    AttributeData::RgbaF32(read_normalized::<T, 4>(view))
}

fn rgb8_to_rgba8(view: &StridedView<'_>) -> AttributeData {
    AttributeData::Rgba8(view.iter().map(|e| [e[0], e[1], e[2], u8::MAX]).collect())
}

fn rgba8(view: &StridedView<'_>) -> AttributeData {
    AttributeData::Rgba8(view.iter().map(|e| [e[0], e[1], e[2], e[3]]).collect())
}

fn indices<T: Component + AsPrimitive<u32>>(view: &StridedView<'_>) -> AttributeData {
    AttributeData::Indices(
        view.iter()
            .map(|e| <T as AsPrimitive<u32>>::as_(T::read(e)))
            .collect(),
    )
}

// ============================================================================
// Table
// ============================================================================

fn build_table() -> HashMap<ConversionKey, ConvertFn> {
    use ComponentType::*;

    let mut table: HashMap<ConversionKey, ConvertFn> = HashMap::new();
    let mut add = |shape: TargetShape, component: ComponentType, normalized: bool, f: ConvertFn| {
        for interleaved in [false, true] {
            table.insert(
                ConversionKey {
                    shape,
                    component,
                    normalized,
                    interleaved,
                },
                f,
            );
        }
    };

    // Positions, normals and texture coordinates. Integer sources come from
    // quantized meshes and may or may not be normalized.
    add(TargetShape::Vec3, Float, false, vec3_raw::<f32>);
    add(TargetShape::Vec3, Byte, false, vec3_raw::<i8>);
    add(TargetShape::Vec3, Byte, true, vec3_norm::<i8>);
    add(TargetShape::Vec3, UnsignedByte, false, vec3_raw::<u8>);
    add(TargetShape::Vec3, UnsignedByte, true, vec3_norm::<u8>);
    add(TargetShape::Vec3, Short, false, vec3_raw::<i16>);
    add(TargetShape::Vec3, Short, true, vec3_norm::<i16>);
    add(TargetShape::Vec3, UnsignedShort, false, vec3_raw::<u16>);
    add(TargetShape::Vec3, UnsignedShort, true, vec3_norm::<u16>);

    add(TargetShape::Vec2, Float, false, vec2_raw::<f32>);
    add(TargetShape::Vec2, Byte, false, vec2_raw::<i8>);
    add(TargetShape::Vec2, Byte, true, vec2_norm::<i8>);
    add(TargetShape::Vec2, UnsignedByte, false, vec2_raw::<u8>);
    add(TargetShape::Vec2, UnsignedByte, true, vec2_norm::<u8>);
    add(TargetShape::Vec2, Short, false, vec2_raw::<i16>);
    add(TargetShape::Vec2, Short, true, vec2_norm::<i16>);
    add(TargetShape::Vec2, UnsignedShort, false, vec2_raw::<u16>);
    add(TargetShape::Vec2, UnsignedShort, true, vec2_norm::<u16>);

    add(TargetShape::Vec4, Float, false, vec4_raw::<f32>);
    add(TargetShape::Vec4, Byte, true, vec4_norm::<i8>);
    add(TargetShape::Vec4, Short, true, vec4_norm::<i16>);

    // Integer colors are treated as normalized whatever the flag says.
    for normalized in [false, true] {
        add(TargetShape::Color3, UnsignedByte, normalized, rgb8_to_rgba8);
        add(TargetShape::Color3, UnsignedShort, normalized, rgb_to_rgba::<u16>);
        add(TargetShape::Color4, UnsignedByte, normalized, rgba8);
        add(TargetShape::Color4, UnsignedShort, normalized, rgba::<u16>);
    }
    add(TargetShape::Color3, Float, false, rgb_to_rgba::<f32>);
    add(TargetShape::Color4, Float, false, rgba::<f32>);

    // Index buffers are always tightly packed.
    for (component, f) in [
        (UnsignedByte, indices::<u8> as ConvertFn),
        (UnsignedShort, indices::<u16> as ConvertFn),
        (UnsignedInt, indices::<u32> as ConvertFn),
    ] {
        table.insert(
            ConversionKey {
                shape: TargetShape::Index,
                component,
                normalized: false,
                interleaved: false,
            },
            f,
        );
    }

    table
}
