//! Sequence codecs. The element type decides the layout through
//! [`Encode::encode_sequence`]: opaque scalars collapse into one dataset, every
//! other element type gets the counted group layout.

use super::{Decode, Encode, Strategy};
use crate::archive::{InputArchive, OutputArchive};
use crate::error::{ArchiveError, Result};
use crate::path::StoragePath;
use std::collections::{LinkedList, VecDeque};

impl<T: Encode> Encode for Vec<T> {
    fn strategy() -> Strategy {
        Strategy::Sequence
    }

    fn encode(&self, ar: &mut OutputArchive, path: &StoragePath) -> Result<()> {
        T::encode_sequence(self.iter(), ar, path)
    }
}

impl<T: Decode> Decode for Vec<T> {
    fn decode(ar: &mut InputArchive, path: &StoragePath) -> Result<Self> {
        T::decode_sequence(ar, path)
    }
}

impl<T: Encode> Encode for VecDeque<T> {
    fn strategy() -> Strategy {
        Strategy::Sequence
    }

    fn encode(&self, ar: &mut OutputArchive, path: &StoragePath) -> Result<()> {
        T::encode_sequence(self.iter(), ar, path)
    }
}

impl<T: Decode> Decode for VecDeque<T> {
    fn decode(ar: &mut InputArchive, path: &StoragePath) -> Result<Self> {
        T::decode_sequence(ar, path).map(VecDeque::from)
    }
}

impl<T: Encode> Encode for LinkedList<T> {
    fn strategy() -> Strategy {
        Strategy::Sequence
    }

    fn encode(&self, ar: &mut OutputArchive, path: &StoragePath) -> Result<()> {
        T::encode_sequence(self.iter(), ar, path)
    }
}

impl<T: Decode> Decode for LinkedList<T> {
    fn decode(ar: &mut InputArchive, path: &StoragePath) -> Result<Self> {
        Ok(T::decode_sequence(ar, path)?.into_iter().collect())
    }
}

// Slices are write-only: there is nothing to decode into.
impl<T: Encode> Encode for [T] {
    fn strategy() -> Strategy
    where
        Self: Sized,
    {
        Strategy::Sequence
    }

    fn encode(&self, ar: &mut OutputArchive, path: &StoragePath) -> Result<()> {
        T::encode_sequence(self.iter(), ar, path)
    }
}

impl<T: Encode, const N: usize> Encode for [T; N] {
    fn strategy() -> Strategy {
        Strategy::Sequence
    }

    fn encode(&self, ar: &mut OutputArchive, path: &StoragePath) -> Result<()> {
        T::encode_sequence(self.iter(), ar, path)
    }
}

impl<T: Decode, const N: usize> Decode for [T; N] {
    fn decode(ar: &mut InputArchive, path: &StoragePath) -> Result<Self> {
        let items = T::decode_sequence(ar, path)?;
        let found = items.len();
        items.try_into().map_err(|_| {
            ArchiveError::malformed(path, format!("expected {N} elements, found {found}"))
        })
    }
}
