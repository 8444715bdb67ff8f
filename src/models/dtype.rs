//! Element types for field arrays.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Element type of a field array.
///
/// All element types are stored little-endian with a fixed width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    /// Boolean, one byte per element (0 or 1).
    Bool,
    /// Unsigned 8-bit integer.
    U8,
    /// Signed 8-bit integer.
    I8,
    /// Unsigned 16-bit integer.
    U16,
    /// Signed 16-bit integer.
    I16,
    /// Unsigned 32-bit integer.
    U32,
    /// Signed 32-bit integer.
    I32,
    /// Unsigned 64-bit integer.
    U64,
    /// Signed 64-bit integer.
    I64,
    /// 32-bit float.
    F32,
    /// 64-bit float.
    F64,
}

impl DType {
    /// Returns all element types.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Bool,
            Self::U8,
            Self::I8,
            Self::U16,
            Self::I16,
            Self::U32,
            Self::I32,
            Self::U64,
            Self::I64,
            Self::F32,
            Self::F64,
        ]
    }

    /// Width of one element in bytes.
    #[must_use]
    pub const fn size(&self) -> usize {
        match self {
            Self::Bool | Self::U8 | Self::I8 => 1,
            Self::U16 | Self::I16 => 2,
            Self::U32 | Self::I32 | Self::F32 => 4,
            Self::U64 | Self::I64 | Self::F64 => 8,
        }
    }

    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::U8 => "u8",
            Self::I8 => "i8",
            Self::U16 => "u16",
            Self::I16 => "i16",
            Self::U32 => "u32",
            Self::I32 => "i32",
            Self::U64 => "u64",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::F64 => "f64",
        }
    }

    /// Parses a dtype name, accepting numpy-style aliases.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "bool" => Some(Self::Bool),
            "u8" | "uint8" => Some(Self::U8),
            "i8" | "int8" => Some(Self::I8),
            "u16" | "uint16" => Some(Self::U16),
            "i16" | "int16" => Some(Self::I16),
            "u32" | "uint32" => Some(Self::U32),
            "i32" | "int32" => Some(Self::I32),
            "u64" | "uint64" => Some(Self::U64),
            "i64" | "int64" => Some(Self::I64),
            "f32" | "float32" => Some(Self::F32),
            "f64" | "float64" | "float" => Some(Self::F64),
            _ => None,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A Rust scalar type that maps onto a [`DType`].
pub trait Element: Copy {
    /// The matching element type.
    const DTYPE: DType;

    /// Appends the little-endian encoding of `self`.
    fn write_le(self, out: &mut Vec<u8>);

    /// Decodes one element from exactly `DTYPE.size()` bytes.
    fn read_le(bytes: &[u8]) -> Self;
}

macro_rules! impl_element {
    ($($ty:ty => $dtype:ident),* $(,)?) => {
        $(
            impl Element for $ty {
                const DTYPE: DType = DType::$dtype;

                fn write_le(self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }

                fn read_le(bytes: &[u8]) -> Self {
                    let mut buf = [0u8; std::mem::size_of::<$ty>()];
                    buf.copy_from_slice(bytes);
                    <$ty>::from_le_bytes(buf)
                }
            }
        )*
    };
}

impl_element!(
    u8 => U8,
    i8 => I8,
    u16 => U16,
    i16 => I16,
    u32 => U32,
    i32 => I32,
    u64 => U64,
    i64 => I64,
    f32 => F32,
    f64 => F64,
);

impl Element for bool {
    const DTYPE: DType = DType::Bool;

    fn write_le(self, out: &mut Vec<u8>) {
        out.push(u8::from(self));
    }

    fn read_le(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dtype_sizes() {
        assert_eq!(DType::Bool.size(), 1);
        assert_eq!(DType::I16.size(), 2);
        assert_eq!(DType::F32.size(), 4);
        assert_eq!(DType::U64.size(), 8);
    }

    #[test]
    fn test_dtype_parse_aliases() {
        assert_eq!(DType::parse("float32"), Some(DType::F32));
        assert_eq!(DType::parse("F64"), Some(DType::F64));
        assert_eq!(DType::parse("int64"), Some(DType::I64));
        assert_eq!(DType::parse("complex128"), None);
    }

    #[test]
    fn test_dtype_as_str_roundtrips() {
        for dtype in DType::all() {
            assert_eq!(DType::parse(dtype.as_str()), Some(*dtype));
        }
    }

    #[test]
    fn test_element_encoding() {
        let mut out = Vec::new();
        (-2i16).write_le(&mut out);
        1.5f32.write_le(&mut out);
        true.write_le(&mut out);
        assert_eq!(out.len(), 7);
        assert_eq!(i16::read_le(&out[0..2]), -2);
        assert!((f32::read_le(&out[2..6]) - 1.5).abs() < f32::EPSILON);
        assert!(bool::read_le(&out[6..7]));
    }
}
