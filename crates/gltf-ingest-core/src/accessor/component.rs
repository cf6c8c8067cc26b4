//! Accessor component types and their numeric reinterpretation.

use byteorder::{ByteOrder, LittleEndian};
use num_traits::AsPrimitive;

/// glTF accessor component types that have conversion routines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentType {
    Byte,
    UnsignedByte,
    Short,
    UnsignedShort,
    UnsignedInt,
    Float,
}

impl ComponentType {
    pub const fn gl(self) -> u32 {
        match self {
            ComponentType::Byte => 5120,
            ComponentType::UnsignedByte => 5121,
            ComponentType::Short => 5122,
            ComponentType::UnsignedShort => 5123,
            ComponentType::UnsignedInt => 5125,
            ComponentType::Float => 5126,
        }
    }

    pub fn from_gl(value: u32) -> Option<Self> {
        match value {
            5120 => Some(ComponentType::Byte),
            5121 => Some(ComponentType::UnsignedByte),
            5122 => Some(ComponentType::Short),
            5123 => Some(ComponentType::UnsignedShort),
            5125 => Some(ComponentType::UnsignedInt),
            5126 => Some(ComponentType::Float),
            _ => None,
        }
    }

    pub fn byte_size(self) -> usize {
        match self {
            ComponentType::Byte | ComponentType::UnsignedByte => 1,
            ComponentType::Short | ComponentType::UnsignedShort => 2,
            ComponentType::UnsignedInt | ComponentType::Float => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ComponentType::Byte => "BYTE",
            ComponentType::UnsignedByte => "UNSIGNED_BYTE",
            ComponentType::Short => "SHORT",
            ComponentType::UnsignedShort => "UNSIGNED_SHORT",
            ComponentType::UnsignedInt => "UNSIGNED_INT",
            ComponentType::Float => "FLOAT",
        }
    }
}

/// A scalar that can be read little-endian from a byte slice.
///
/// `normalize` applies the glTF rule: unsigned values map to `[0, 1]` as
/// `c / MAX`, signed values to `[-1, 1]` as `max(c / MAX, -1)`.
pub trait Component: Copy + Send + Sync + AsPrimitive<f32> + 'static {
    const SIZE: usize;

    /// Reads one value from the front of `bytes`. `bytes` must hold at
    /// least `SIZE` bytes.
    fn read(bytes: &[u8]) -> Self;

    fn normalize(self) -> f32;
}

impl Component for i8 {
    const SIZE: usize = 1;

    fn read(bytes: &[u8]) -> Self {
        bytes[0] as i8
    }

    fn normalize(self) -> f32 {
        (self as f32 / 127.0).max(-1.0)
    }
}

impl Component for u8 {
    const SIZE: usize = 1;

    fn read(bytes: &[u8]) -> Self {
        bytes[0]
    }

    fn normalize(self) -> f32 {
        self as f32 / 255.0
    }
}

impl Component for i16 {
    const SIZE: usize = 2;

    fn read(bytes: &[u8]) -> Self {
        LittleEndian::read_i16(bytes)
    }

    fn normalize(self) -> f32 {
        (self as f32 / 32767.0).max(-1.0)
    }
}

impl Component for u16 {
    const SIZE: usize = 2;

    fn read(bytes: &[u8]) -> Self {
        LittleEndian::read_u16(bytes)
    }

    fn normalize(self) -> f32 {
        self as f32 / 65535.0
    }
}

impl Component for u32 {
    const SIZE: usize = 4;

    fn read(bytes: &[u8]) -> Self {
        LittleEndian::read_u32(bytes)
    }

    fn normalize(self) -> f32 {
        (self as f64 / u32::MAX as f64) as f32
    }
}

impl Component for f32 {
    const SIZE: usize = 4;

    fn read(bytes: &[u8]) -> Self {
        LittleEndian::read_f32(bytes)
    }

    fn normalize(self) -> f32 {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gl_roundtrip() {
        for ct in [
            ComponentType::Byte,
            ComponentType::UnsignedByte,
            ComponentType::Short,
            ComponentType::UnsignedShort,
            ComponentType::UnsignedInt,
            ComponentType::Float,
        ] {
            assert_eq!(ComponentType::from_gl(ct.gl()), Some(ct));
        }
        // 5124 (signed int) is not a valid accessor component type.
        assert_eq!(ComponentType::from_gl(5124), None);
    }

    #[test]
    fn test_signed_normalization() {
        assert_eq!(i8::normalize(127), 1.0);
        assert_eq!(i8::normalize(-127), -1.0);
        assert_eq!(i8::normalize(-128), -1.0);
        assert_eq!(i16::normalize(-32768), -1.0);
        assert_eq!(i16::normalize(0), 0.0);
    }

    #[test]
    fn test_unsigned_normalization() {
        assert_eq!(u8::normalize(255), 1.0);
        assert_eq!(u8::normalize(0), 0.0);
        assert_eq!(u16::normalize(65535), 1.0);
    }

    #[test]
    fn test_little_endian_reads() {
        assert_eq!(u16::read(&[0x34, 0x12]), 0x1234);
        assert_eq!(i16::read(&[0xFF, 0xFF]), -1);
        assert_eq!(u32::read(&[1, 0, 0, 0]), 1);
        assert_eq!(f32::read(&1.5f32.to_le_bytes()), 1.5);
        assert_eq!(i8::read(&[0x80]), -128);
    }
}
