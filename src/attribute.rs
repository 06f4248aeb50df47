//! Conversions between Rust values and attribute buffers.
//!
//! Attributes are small typed buffers attached to a group or dataset. Scalars,
//! strings and vectors of scalars convert directly.

use crate::element::RawBuffer;
use crate::error::Result;

/// A value that can be stored as an attribute.
pub trait ToAttribute {
    /// Encodes the value.
    fn to_attribute(&self) -> RawBuffer;
}

/// A value that can be read back from an attribute.
pub trait FromAttribute: Sized {
    /// Decodes the value; `location` names the attribute in error messages.
    fn from_attribute(buffer: &RawBuffer, location: &str) -> Result<Self>;
}

macro_rules! impl_scalar_attribute {
    ($($t:ty),* $(,)?) => {
        $(
            impl ToAttribute for $t {
                fn to_attribute(&self) -> RawBuffer {
                    RawBuffer::scalar(*self)
                }
            }

            impl FromAttribute for $t {
                fn from_attribute(buffer: &RawBuffer, location: &str) -> Result<Self> {
                    buffer.to_scalar(location)
                }
            }

            impl ToAttribute for [$t] {
                fn to_attribute(&self) -> RawBuffer {
                    RawBuffer::from_scalars(self)
                }
            }

            impl ToAttribute for Vec<$t> {
                fn to_attribute(&self) -> RawBuffer {
                    RawBuffer::from_scalars(self)
                }
            }

            impl FromAttribute for Vec<$t> {
                fn from_attribute(buffer: &RawBuffer, location: &str) -> Result<Self> {
                    buffer.to_scalars(location)
                }
            }
        )*
    };
}

impl_scalar_attribute!(
    i8, i16, i32, i64, i128, u8, u16, u32, u64, u128, f32, f64, bool, char, usize, isize,
);

impl ToAttribute for str {
    fn to_attribute(&self) -> RawBuffer {
        RawBuffer::utf8(self)
    }
}

impl ToAttribute for String {
    fn to_attribute(&self) -> RawBuffer {
        RawBuffer::utf8(self)
    }
}

impl FromAttribute for String {
    fn from_attribute(buffer: &RawBuffer, location: &str) -> Result<Self> {
        buffer.to_utf8(location)
    }
}

impl<T: ToAttribute + ?Sized> ToAttribute for &T {
    fn to_attribute(&self) -> RawBuffer {
        (**self).to_attribute()
    }
}

/// Raw buffers pass through unchanged.
impl ToAttribute for RawBuffer {
    fn to_attribute(&self) -> RawBuffer {
        self.clone()
    }
}

impl FromAttribute for RawBuffer {
    fn from_attribute(buffer: &RawBuffer, _location: &str) -> Result<Self> {
        Ok(buffer.clone())
    }
}
