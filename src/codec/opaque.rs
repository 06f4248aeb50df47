//! Opaque codecs: values written as one raw typed dataset.

use super::{Decode, Encode, Strategy};
use crate::archive::{InputArchive, OutputArchive};
use crate::element::{ElementType, RawBuffer};
use crate::error::{ArchiveError, Result};
use crate::path::StoragePath;

macro_rules! impl_scalar_codec {
    ($($t:ty),* $(,)?) => {
        $(
            impl Encode for $t {
                fn strategy() -> Strategy {
                    Strategy::Opaque
                }

                fn encode(&self, ar: &mut OutputArchive, path: &StoragePath) -> Result<()> {
                    ar.write_dataset(path, RawBuffer::scalar(*self))
                }

                fn encode_sequence<'a, I>(
                    items: I,
                    ar: &mut OutputArchive,
                    path: &StoragePath,
                ) -> Result<()>
                where
                    Self: 'a,
                    I: ExactSizeIterator<Item = &'a Self>,
                {
                    if ar.options().contiguous_sequences() {
                        ar.write_dataset(path, RawBuffer::from_scalars(items))
                    } else {
                        crate::rt::encode_elements(items, ar, path)
                    }
                }
            }

            impl Decode for $t {
                fn decode(ar: &mut InputArchive, path: &StoragePath) -> Result<Self> {
                    ar.read_dataset(path)?.to_scalar(path)
                }

                fn decode_sequence(ar: &mut InputArchive, path: &StoragePath) -> Result<Vec<Self>> {
                    if ar.backend().dataset_exists(path) {
                        ar.read_dataset(path)?.to_scalars(path)
                    } else {
                        crate::rt::decode_elements(ar, path)
                    }
                }
            }
        )*
    };
}

impl_scalar_codec!(
    i8, i16, i32, i64, i128, u8, u16, u32, u64, u128, f32, f64, char, usize, isize,
);

// Sequences of bool keep the per-element group layout.
impl Encode for bool {
    fn strategy() -> Strategy {
        Strategy::Opaque
    }

    fn encode(&self, ar: &mut OutputArchive, path: &StoragePath) -> Result<()> {
        ar.write_dataset(path, RawBuffer::scalar(*self))
    }
}

impl Decode for bool {
    fn decode(ar: &mut InputArchive, path: &StoragePath) -> Result<Self> {
        ar.read_dataset(path)?.to_scalar(path)
    }
}

impl Encode for str {
    fn encode(&self, ar: &mut OutputArchive, path: &StoragePath) -> Result<()> {
        ar.write_dataset(path, RawBuffer::utf8(self))
    }
}

impl Encode for String {
    fn strategy() -> Strategy {
        Strategy::Opaque
    }

    fn encode(&self, ar: &mut OutputArchive, path: &StoragePath) -> Result<()> {
        self.as_str().encode(ar, path)
    }
}

impl Decode for String {
    fn decode(ar: &mut InputArchive, path: &StoragePath) -> Result<Self> {
        ar.read_dataset(path)?.to_utf8(path)
    }
}

/// An uninterpreted byte record, stored as one opaque element.
///
/// Unlike `Vec<u8>`, which is a typed `u8` sequence, a blob's element tag is
/// `Opaque(len)` and it reads back only as a `Blob`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Blob(pub Vec<u8>);

impl Encode for Blob {
    fn strategy() -> Strategy {
        Strategy::Opaque
    }

    fn encode(&self, ar: &mut OutputArchive, path: &StoragePath) -> Result<()> {
        ar.write_dataset(path, RawBuffer::opaque(self.0.clone())?)
    }
}

impl Decode for Blob {
    fn decode(ar: &mut InputArchive, path: &StoragePath) -> Result<Self> {
        let data = ar.read_dataset(path)?;
        match data.element_type() {
            ElementType::Opaque(_) if data.count() == 1 => Ok(Self(data.into_bytes())),
            ElementType::Opaque(_) => Err(ArchiveError::malformed(
                path,
                format!("expected one opaque record, found {}", data.count()),
            )),
            other => Err(ArchiveError::mismatch(path, "opaque", other)),
        }
    }
}
