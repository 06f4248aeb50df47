//! Element-type tags and raw typed buffers.
//!
//! Every dataset and attribute in a storage tree is a [`RawBuffer`]: a flat
//! little-endian byte run, an element count, and an [`ElementType`] tag. The tag
//! distinguishes typed numeric arrays from UTF-8 text and from opaque byte dumps,
//! so a reader can reject a buffer written for a different type.

use crate::error::{ArchiveError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The element type of a raw buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementType {
    /// Signed 8-bit integer.
    I8,
    /// Signed 16-bit integer.
    I16,
    /// Signed 32-bit integer.
    I32,
    /// Signed 64-bit integer.
    I64,
    /// Signed 128-bit integer.
    I128,
    /// Unsigned 8-bit integer.
    U8,
    /// Unsigned 16-bit integer.
    U16,
    /// Unsigned 32-bit integer.
    U32,
    /// Unsigned 64-bit integer.
    U64,
    /// Unsigned 128-bit integer.
    U128,
    /// IEEE-754 binary32.
    F32,
    /// IEEE-754 binary64.
    F64,
    /// One byte, `0` or `1`.
    Bool,
    /// A Unicode scalar value stored as `u32`.
    Char,
    /// UTF-8 text; the count is the byte length.
    Utf8,
    /// Opaque byte records of the given size.
    Opaque(u32),
}

impl ElementType {
    /// Size in bytes of one element.
    pub fn size(&self) -> usize {
        match self {
            Self::I8 | Self::U8 | Self::Bool | Self::Utf8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 | Self::Char => 4,
            Self::I64 | Self::U64 | Self::F64 => 8,
            Self::I128 | Self::U128 => 16,
            Self::Opaque(size) => *size as usize,
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::I8 => f.write_str("i8"),
            Self::I16 => f.write_str("i16"),
            Self::I32 => f.write_str("i32"),
            Self::I64 => f.write_str("i64"),
            Self::I128 => f.write_str("i128"),
            Self::U8 => f.write_str("u8"),
            Self::U16 => f.write_str("u16"),
            Self::U32 => f.write_str("u32"),
            Self::U64 => f.write_str("u64"),
            Self::U128 => f.write_str("u128"),
            Self::F32 => f.write_str("f32"),
            Self::F64 => f.write_str("f64"),
            Self::Bool => f.write_str("bool"),
            Self::Char => f.write_str("char"),
            Self::Utf8 => f.write_str("utf8"),
            Self::Opaque(size) => write!(f, "opaque[{size}]"),
        }
    }
}

/// A flat typed byte buffer: the unit of storage for datasets and attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBuffer {
    element_type: ElementType,
    count: u64,
    bytes: Vec<u8>,
}

fn opaque_record_size(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| {
        ArchiveError::Serialization(format!(
            "opaque record of {len} bytes exceeds the {} byte limit",
            u32::MAX
        ))
    })
}

impl RawBuffer {
    /// Builds a buffer, checking that `bytes` holds exactly `count` elements.
    ///
    /// # Errors
    /// Returns [`ArchiveError::Format`] when the byte length disagrees with the count.
    pub fn new(element_type: ElementType, count: u64, bytes: Vec<u8>) -> Result<Self> {
        let expected = count.checked_mul(element_type.size() as u64);
        if expected != Some(bytes.len() as u64) {
            return Err(ArchiveError::Format(format!(
                "buffer of {} bytes cannot hold {count} elements of {element_type}",
                bytes.len()
            )));
        }
        Ok(Self {
            element_type,
            count,
            bytes,
        })
    }

    /// A single scalar.
    pub fn scalar<T: Scalar>(value: T) -> Self {
        let mut bytes = Vec::with_capacity(T::ELEMENT.size());
        value.write_le(&mut bytes);
        Self {
            element_type: T::ELEMENT,
            count: 1,
            bytes,
        }
    }

    /// A contiguous run of scalars.
    pub fn from_scalars<'a, T, I>(values: I) -> Self
    where
        T: Scalar + 'a,
        I: IntoIterator<Item = &'a T>,
    {
        let mut bytes = Vec::new();
        let mut count = 0u64;
        for value in values {
            value.write_le(&mut bytes);
            count += 1;
        }
        Self {
            element_type: T::ELEMENT,
            count,
            bytes,
        }
    }

    /// UTF-8 text.
    pub fn utf8(text: &str) -> Self {
        Self {
            element_type: ElementType::Utf8,
            count: text.len() as u64,
            bytes: text.as_bytes().to_vec(),
        }
    }

    /// One opaque record holding `bytes` verbatim.
    ///
    /// # Errors
    /// Returns [`ArchiveError::Serialization`] when the record is larger than an
    /// `Opaque` tag can describe (`u32::MAX` bytes).
    pub fn opaque(bytes: Vec<u8>) -> Result<Self> {
        Ok(Self {
            element_type: ElementType::Opaque(opaque_record_size(bytes.len())?),
            count: 1,
            bytes,
        })
    }

    /// The element-type tag.
    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    /// The logical element count.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// The raw little-endian bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consumes the buffer, returning its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Fails with [`ArchiveError::TypeMismatch`] unless the tag equals `expected`.
    pub fn expect_type(&self, path: impl fmt::Display, expected: ElementType) -> Result<()> {
        if self.element_type != expected {
            return Err(ArchiveError::mismatch(path, expected, self.element_type));
        }
        Ok(())
    }

    /// Decodes the buffer as a run of `T`.
    pub fn to_scalars<T: Scalar>(&self, path: impl fmt::Display) -> Result<Vec<T>> {
        self.expect_type(&path, T::ELEMENT)?;
        self.bytes
            .chunks_exact(T::ELEMENT.size())
            .map(|chunk| {
                T::read_le(chunk).ok_or_else(|| {
                    ArchiveError::malformed(&path, format!("invalid {} element", T::ELEMENT))
                })
            })
            .collect()
    }

    /// Decodes the buffer as exactly one `T`.
    pub fn to_scalar<T: Scalar>(&self, path: impl fmt::Display) -> Result<T> {
        self.expect_type(&path, T::ELEMENT)?;
        if self.count != 1 {
            return Err(ArchiveError::malformed(
                &path,
                format!("expected a single element, found {}", self.count),
            ));
        }
        T::read_le(&self.bytes)
            .ok_or_else(|| ArchiveError::malformed(&path, format!("invalid {} element", T::ELEMENT)))
    }

    /// Decodes the buffer as UTF-8 text.
    pub fn to_utf8(&self, path: impl fmt::Display) -> Result<String> {
        self.expect_type(&path, ElementType::Utf8)?;
        String::from_utf8(self.bytes.clone())
            .map_err(|e| ArchiveError::malformed(&path, format!("invalid UTF-8: {e}")))
    }

    /// Short human readable rendering, used by the inspector.
    pub fn describe(&self) -> String {
        match self.element_type {
            ElementType::Utf8 => format!("{:?}", String::from_utf8_lossy(&self.bytes)),
            ElementType::U64 if self.count == 1 => u64::read_le(&self.bytes)
                .map(|v| v.to_string())
                .unwrap_or_default(),
            ElementType::U32 if self.count == 1 => u32::read_le(&self.bytes)
                .map(|v| v.to_string())
                .unwrap_or_default(),
            ElementType::I64 if self.count == 1 => i64::read_le(&self.bytes)
                .map(|v| v.to_string())
                .unwrap_or_default(),
            other => format!("{other} x {}", self.count),
        }
    }
}

/// A fixed-width value with a platform-independent little-endian layout.
///
/// Only these types are ever written as raw element bytes.
pub trait Scalar: Copy + 'static {
    /// The element tag written alongside the bytes.
    const ELEMENT: ElementType;

    /// Appends the little-endian encoding of `self`.
    fn write_le(&self, out: &mut Vec<u8>);

    /// Decodes one element from exactly `ELEMENT.size()` bytes.
    ///
    /// Returns `None` when the bytes do not form a valid value.
    fn read_le(chunk: &[u8]) -> Option<Self>;
}

macro_rules! impl_scalar {
    ($($t:ty => $tag:ident),* $(,)?) => {
        $(
            impl Scalar for $t {
                const ELEMENT: ElementType = ElementType::$tag;

                fn write_le(&self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }

                fn read_le(chunk: &[u8]) -> Option<Self> {
                    Some(<$t>::from_le_bytes(chunk.try_into().ok()?))
                }
            }
        )*
    };
}

impl_scalar!(
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    i128 => I128,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    u128 => U128,
    f32 => F32,
    f64 => F64,
);

impl Scalar for bool {
    const ELEMENT: ElementType = ElementType::Bool;

    fn write_le(&self, out: &mut Vec<u8>) {
        out.push(u8::from(*self));
    }

    fn read_le(chunk: &[u8]) -> Option<Self> {
        match chunk {
            [0] => Some(false),
            [1] => Some(true),
            _ => None,
        }
    }
}

impl Scalar for char {
    const ELEMENT: ElementType = ElementType::Char;

    fn write_le(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&u32::from(*self).to_le_bytes());
    }

    fn read_le(chunk: &[u8]) -> Option<Self> {
        char::from_u32(u32::read_le(chunk)?)
    }
}

// Pointer-sized integers are widened to 64 bits on disk.
impl Scalar for usize {
    const ELEMENT: ElementType = ElementType::U64;

    fn write_le(&self, out: &mut Vec<u8>) {
        (*self as u64).write_le(out);
    }

    fn read_le(chunk: &[u8]) -> Option<Self> {
        usize::try_from(u64::read_le(chunk)?).ok()
    }
}

impl Scalar for isize {
    const ELEMENT: ElementType = ElementType::I64;

    fn write_le(&self, out: &mut Vec<u8>) {
        (*self as i64).write_le(out);
    }

    fn read_le(chunk: &[u8]) -> Option<Self> {
        isize::try_from(i64::read_le(chunk)?).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_length_must_match_count() {
        assert!(RawBuffer::new(ElementType::I32, 2, vec![0; 8]).is_ok());
        assert!(matches!(
            RawBuffer::new(ElementType::I32, 2, vec![0; 7]),
            Err(ArchiveError::Format(_))
        ));
        assert!(RawBuffer::new(ElementType::Opaque(3), 2, vec![0; 6]).is_ok());
    }

    #[test]
    fn opaque_records_carry_their_size() {
        let buf = RawBuffer::opaque(vec![1, 2, 3]).unwrap();
        assert_eq!(buf.element_type(), ElementType::Opaque(3));
        assert_eq!(buf.count(), 1);
        assert_eq!(opaque_record_size(u32::MAX as usize).unwrap(), u32::MAX);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn oversized_opaque_records_are_refused() {
        let err = opaque_record_size(u32::MAX as usize + 1).unwrap_err();
        assert!(matches!(err, ArchiveError::Serialization(_)), "{err}");
    }

    #[test]
    fn scalars_are_little_endian() {
        let buf = RawBuffer::scalar(0x0102_0304u32);
        assert_eq!(buf.bytes(), &[4, 3, 2, 1]);
        assert_eq!(buf.to_scalar::<u32>("/x").unwrap(), 0x0102_0304);
    }

    #[test]
    fn tags_are_checked() {
        let buf = RawBuffer::scalar(1.5f64);
        let err = buf.to_scalar::<i64>("/x").unwrap_err();
        assert!(matches!(err, ArchiveError::TypeMismatch { .. }));
        assert!(buf.to_utf8("/x").is_err());
    }

    #[test]
    fn invalid_bool_and_char_are_rejected() {
        let bad_bool = RawBuffer::new(ElementType::Bool, 1, vec![7]).unwrap();
        assert!(matches!(
            bad_bool.to_scalar::<bool>("/b"),
            Err(ArchiveError::MalformedLayout { .. })
        ));
        let bad_char = RawBuffer::new(ElementType::Char, 1, 0xD800u32.to_le_bytes().to_vec()).unwrap();
        assert!(bad_char.to_scalar::<char>("/c").is_err());
    }

    #[test]
    fn pointer_sized_integers_widen() {
        let buf = RawBuffer::from_scalars(&[1usize, 2, 3]);
        assert_eq!(buf.element_type(), ElementType::U64);
        assert_eq!(buf.to_scalars::<u64>("/v").unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn describe_renders_attribute_values() {
        assert_eq!(RawBuffer::utf8("Advanced").describe(), "\"Advanced\"");
        assert_eq!(RawBuffer::scalar(3u32).describe(), "3");
        assert_eq!(RawBuffer::from_scalars(&[1.0f32, 2.0]).describe(), "f32 x 2");
    }
}
