//! Typed metadata values.
//!
//! A [`MetaValue`] is what a decoder extracted from the wire: nothing, a
//! single scalar, a homogeneous array backed by the arena, raw bytes, or
//! text with an encoding tag. Array elements are stored in native byte
//! order so read-back is a plain `from_ne_bytes` per element.

use crate::{ByteArena, ByteSpan, Result};

/// Encoding tag carried alongside text values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[must_use]
pub enum TextEncoding {
    #[default]
    Unknown,
    Ascii,
    Utf8,
    Utf16Le,
    Utf16Be,
}

/// Element type of scalars and arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum MetaElementType {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    /// IEEE-754 single-precision bits, never converted.
    F32Bits,
    /// IEEE-754 double-precision bits, never converted.
    F64Bits,
    URational,
    SRational,
}

impl MetaElementType {
    /// Byte size of one element as stored in the arena.
    pub fn size(self) -> usize {
        match self {
            MetaElementType::U8 | MetaElementType::I8 => 1,
            MetaElementType::U16 | MetaElementType::I16 => 2,
            MetaElementType::U32 | MetaElementType::I32 | MetaElementType::F32Bits => 4,
            MetaElementType::U64
            | MetaElementType::I64
            | MetaElementType::F64Bits
            | MetaElementType::URational
            | MetaElementType::SRational => 8,
        }
    }
}

/// Unsigned rational number (numerator/denominator).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct URational {
    pub num: u32,
    pub den: u32,
}

impl URational {
    pub const fn new(num: u32, den: u32) -> Self {
        Self { num, den }
    }

    /// Convert to f64, returning 0.0 if denominator is zero.
    pub fn to_f64(self) -> f64 {
        if self.den == 0 {
            0.0
        } else {
            f64::from(self.num) / f64::from(self.den)
        }
    }
}

impl std::fmt::Display for URational {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// Signed rational number (numerator/denominator).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct SRational {
    pub num: i32,
    pub den: i32,
}

impl SRational {
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /// Convert to f64, returning 0.0 if denominator is zero.
    pub fn to_f64(self) -> f64 {
        if self.den == 0 {
            0.0
        } else {
            f64::from(self.num) / f64::from(self.den)
        }
    }
}

impl std::fmt::Display for SRational {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// A single in-line scalar.
#[derive(Debug, Clone, Copy, PartialEq)]
#[must_use]
pub enum ScalarValue {
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    U64(u64),
    I64(i64),
    F32Bits(u32),
    F64Bits(u64),
    URational(URational),
    SRational(SRational),
}

impl ScalarValue {
    pub fn elem_type(self) -> MetaElementType {
        match self {
            ScalarValue::U8(_) => MetaElementType::U8,
            ScalarValue::I8(_) => MetaElementType::I8,
            ScalarValue::U16(_) => MetaElementType::U16,
            ScalarValue::I16(_) => MetaElementType::I16,
            ScalarValue::U32(_) => MetaElementType::U32,
            ScalarValue::I32(_) => MetaElementType::I32,
            ScalarValue::U64(_) => MetaElementType::U64,
            ScalarValue::I64(_) => MetaElementType::I64,
            ScalarValue::F32Bits(_) => MetaElementType::F32Bits,
            ScalarValue::F64Bits(_) => MetaElementType::F64Bits,
            ScalarValue::URational(_) => MetaElementType::URational,
            ScalarValue::SRational(_) => MetaElementType::SRational,
        }
    }

    /// Widen any unsigned scalar to u64.
    pub fn as_u64(self) -> Option<u64> {
        match self {
            ScalarValue::U8(v) => Some(u64::from(v)),
            ScalarValue::U16(v) => Some(u64::from(v)),
            ScalarValue::U32(v) => Some(u64::from(v)),
            ScalarValue::U64(v) => Some(v),
            _ => None,
        }
    }

    /// Widen any signed scalar to i64.
    pub fn as_i64(self) -> Option<i64> {
        match self {
            ScalarValue::I8(v) => Some(i64::from(v)),
            ScalarValue::I16(v) => Some(i64::from(v)),
            ScalarValue::I32(v) => Some(i64::from(v)),
            ScalarValue::I64(v) => Some(v),
            _ => None,
        }
    }
}

/// Decoded value of an [`Entry`](crate::Entry).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[must_use]
pub enum MetaValue {
    #[default]
    Empty,
    Scalar(ScalarValue),
    /// Homogeneous array; `data` holds `count` native-endian elements.
    Array {
        elem_type: MetaElementType,
        count: u32,
        data: ByteSpan,
    },
    Bytes(ByteSpan),
    Text {
        data: ByteSpan,
        encoding: TextEncoding,
    },
}

macro_rules! scalar_ctor {
    ($name:ident, $ty:ty, $variant:ident) => {
        #[doc = concat!("Single `", stringify!($ty), "` scalar.")]
        pub fn $name(v: $ty) -> MetaValue {
            MetaValue::Scalar(ScalarValue::$variant(v))
        }
    };
}

macro_rules! array_ctor {
    ($name:ident, $ty:ty, $elem:ident) => {
        #[doc = concat!("Array of `", stringify!($ty), "` written into the arena.")]
        pub fn $name(arena: &mut ByteArena, values: &[$ty]) -> Result<MetaValue> {
            let elem = MetaElementType::$elem;
            let size = (values.len() * elem.size()) as u32;
            let span = arena.allocate(size, elem.size() as u32)?;
            let dst = arena.span_mut(span);
            for (i, v) in values.iter().enumerate() {
                let raw = v.to_ne_bytes();
                dst[i * raw.len()..(i + 1) * raw.len()].copy_from_slice(&raw);
            }
            Ok(MetaValue::Array {
                elem_type: elem,
                count: values.len() as u32,
                data: span,
            })
        }
    };
}

impl MetaValue {
    scalar_ctor!(u8, u8, U8);
    scalar_ctor!(i8, i8, I8);
    scalar_ctor!(u16, u16, U16);
    scalar_ctor!(i16, i16, I16);
    scalar_ctor!(u32, u32, U32);
    scalar_ctor!(i32, i32, I32);
    scalar_ctor!(u64, u64, U64);
    scalar_ctor!(i64, i64, I64);
    scalar_ctor!(f32_bits, u32, F32Bits);
    scalar_ctor!(f64_bits, u64, F64Bits);

    pub fn urational(num: u32, den: u32) -> MetaValue {
        MetaValue::Scalar(ScalarValue::URational(URational::new(num, den)))
    }

    pub fn srational(num: i32, den: i32) -> MetaValue {
        MetaValue::Scalar(ScalarValue::SRational(SRational::new(num, den)))
    }

    array_ctor!(u8_array, u8, U8);
    array_ctor!(i8_array, i8, I8);
    array_ctor!(u16_array, u16, U16);
    array_ctor!(i16_array, i16, I16);
    array_ctor!(u32_array, u32, U32);
    array_ctor!(i32_array, i32, I32);
    array_ctor!(u64_array, u64, U64);
    array_ctor!(i64_array, i64, I64);

    /// Array of f32 bit patterns.
    pub fn f32_bits_array(arena: &mut ByteArena, bits: &[u32]) -> Result<MetaValue> {
        let v = Self::u32_array(arena, bits)?;
        Ok(match v {
            MetaValue::Array { count, data, .. } => MetaValue::Array {
                elem_type: MetaElementType::F32Bits,
                count,
                data,
            },
            other => other,
        })
    }

    /// Array of f64 bit patterns.
    pub fn f64_bits_array(arena: &mut ByteArena, bits: &[u64]) -> Result<MetaValue> {
        let v = Self::u64_array(arena, bits)?;
        Ok(match v {
            MetaValue::Array { count, data, .. } => MetaValue::Array {
                elem_type: MetaElementType::F64Bits,
                count,
                data,
            },
            other => other,
        })
    }

    /// Raw bytes copied into the arena.
    pub fn bytes(arena: &mut ByteArena, data: &[u8]) -> Result<MetaValue> {
        Ok(MetaValue::Bytes(arena.append(data)?))
    }

    /// Text copied into the arena with an encoding tag.
    pub fn text(arena: &mut ByteArena, s: &str, encoding: TextEncoding) -> Result<MetaValue> {
        Ok(MetaValue::Text {
            data: arena.append_str(s)?,
            encoding,
        })
    }

    /// Raw text bytes (already validated by the caller) with an encoding tag.
    pub fn text_bytes(
        arena: &mut ByteArena,
        raw: &[u8],
        encoding: TextEncoding,
    ) -> Result<MetaValue> {
        Ok(MetaValue::Text {
            data: arena.append(raw)?,
            encoding,
        })
    }

    /// Borrow a text value as `&str` (ASCII/UTF-8 encodings only).
    pub fn as_text<'a>(&self, arena: &'a ByteArena) -> Option<&'a str> {
        match *self {
            MetaValue::Text { data, encoding } => match encoding {
                TextEncoding::Ascii | TextEncoding::Utf8 => {
                    std::str::from_utf8(arena.span(data)).ok()
                }
                _ => None,
            },
            _ => None,
        }
    }

    /// Unsigned scalar widened to u64.
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            MetaValue::Scalar(s) => s.as_u64(),
            _ => None,
        }
    }

    /// Element count: 1 for scalars, `count` for arrays, byte length for
    /// bytes/text, 0 for empty.
    pub fn count(&self) -> u32 {
        match *self {
            MetaValue::Empty => 0,
            MetaValue::Scalar(_) => 1,
            MetaValue::Array { count, .. } => count,
            MetaValue::Bytes(span) => span.size,
            MetaValue::Text { data, .. } => data.size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_round_trip() {
        assert_eq!(MetaValue::u16(7).as_u64(), Some(7));
        assert_eq!(MetaValue::i32(-1).as_u64(), None);
        match MetaValue::urational(1, 2) {
            MetaValue::Scalar(ScalarValue::URational(r)) => assert_eq!(r.to_f64(), 0.5),
            other => panic!("unexpected value {other:?}"),
        }
    }

    #[test]
    fn arrays_store_native_endian() {
        let mut arena = ByteArena::new();
        let v = MetaValue::u16_array(&mut arena, &[0x1122, 0x3344]).unwrap();
        let MetaValue::Array { elem_type, count, data } = v else {
            panic!("expected array");
        };
        assert_eq!(elem_type, MetaElementType::U16);
        assert_eq!(count, 2);
        let raw = arena.span(data);
        assert_eq!(u16::from_ne_bytes([raw[0], raw[1]]), 0x1122);
        assert_eq!(u16::from_ne_bytes([raw[2], raw[3]]), 0x3344);
    }

    #[test]
    fn text_accessor_checks_encoding() {
        let mut arena = ByteArena::new();
        let t = MetaValue::text(&mut arena, "abc", TextEncoding::Ascii).unwrap();
        assert_eq!(t.as_text(&arena), Some("abc"));
        let raw = MetaValue::text_bytes(&mut arena, &[0xFF, 0xFE], TextEncoding::Utf16Le).unwrap();
        assert_eq!(raw.as_text(&arena), None);
    }
}
