// src/rt.rs

//! Runtime utilities shared by the built-in codecs and generated code (macros).
//! Do not use directly.

use crate::archive::{InputArchive, OutputArchive};
use crate::class::{InfoMode, Polymorphic};
use crate::codec::{Decode, Encode};
use crate::constants::{CLASS_ATTRIBUTE, COUNT_ATTRIBUTE, VERSION_ATTRIBUTE};
use crate::error::{ArchiveError, Result};
use crate::path::StoragePath;

// --- COMPOSITES ---

/// Creates the group holding a composite's fields.
pub fn begin_composite(ar: &mut OutputArchive, path: &StoragePath) -> Result<()> {
    ar.create_group(path)
}

/// Writes field `index` of the composite at `path`.
pub fn encode_field<T: Encode + ?Sized>(
    ar: &mut OutputArchive,
    path: &StoragePath,
    index: usize,
    value: &T,
) -> Result<()> {
    value.encode(ar, &path.index(index))
}

/// Checks that `path` holds a composite group.
pub fn open_composite(ar: &mut InputArchive, path: &StoragePath) -> Result<()> {
    ar.expect_group(path)
}

/// Reads field `index` of the composite at `path`.
///
/// A missing child is a layout violation rather than a plain `NotFound`: the
/// parent exists, so the stored shape disagrees with the type.
pub fn decode_field<T: Decode>(
    ar: &mut InputArchive,
    path: &StoragePath,
    index: usize,
) -> Result<T> {
    let child = path.index(index);
    if !ar.backend().exists(&child) {
        return Err(ArchiveError::malformed(path, format!("missing child {index}")));
    }
    T::decode(ar, &child)
}

/// Hands out child indices for the fields of one composite. A field gated on
/// a class version newer than `version` was never written, so it takes no slot
/// and later fields shift down.
pub struct FieldCursor<'a> {
    path: &'a StoragePath,
    version: u32,
    next: usize,
}

impl<'a> FieldCursor<'a> {
    /// Starts at child 0 of the composite at `path`, written at `version`.
    pub fn new(path: &'a StoragePath, version: u32) -> Self {
        Self {
            path,
            version,
            next: 0,
        }
    }

    /// Writes the next field.
    pub fn encode<T: Encode + ?Sized>(&mut self, ar: &mut OutputArchive, value: &T) -> Result<()> {
        encode_field(ar, self.path, self.next, value)?;
        self.next += 1;
        Ok(())
    }

    /// Writes the next field if it exists at this cursor's version.
    pub fn encode_since<T: Encode + ?Sized>(
        &mut self,
        ar: &mut OutputArchive,
        since: u32,
        value: &T,
    ) -> Result<()> {
        if self.version < since {
            return Ok(());
        }
        self.encode(ar, value)
    }

    /// Reads the next field.
    pub fn decode<T: Decode>(&mut self, ar: &mut InputArchive) -> Result<T> {
        let value = decode_field(ar, self.path, self.next)?;
        self.next += 1;
        Ok(value)
    }

    /// Reads the next field, or yields `T::default()` when the recorded
    /// version predates it.
    pub fn decode_since<T: Decode + Default>(
        &mut self,
        ar: &mut InputArchive,
        since: u32,
    ) -> Result<T> {
        if self.version < since {
            return Ok(T::default());
        }
        self.decode(ar)
    }
}

// --- COLLECTIONS ---

/// Creates a counted collection group.
pub fn begin_collection(ar: &mut OutputArchive, path: &StoragePath, len: usize) -> Result<()> {
    ar.create_group(path)?;
    ar.write_attribute_at(path, COUNT_ATTRIBUTE, &(len as u64))
}

/// Checks a counted collection group and returns its element count.
pub fn open_collection(ar: &mut InputArchive, path: &StoragePath) -> Result<usize> {
    ar.expect_group(path)?;
    if !ar.backend().attribute_exists(path, COUNT_ATTRIBUTE) {
        return Err(ArchiveError::malformed(path, "missing element count"));
    }
    let count: u64 = ar.read_attribute_at(path, COUNT_ATTRIBUTE)?;
    usize::try_from(count)
        .map_err(|_| ArchiveError::malformed(path, format!("element count {count} overflows usize")))
}

/// The counted group layout of a sequence.
pub fn encode_elements<'a, T, I>(items: I, ar: &mut OutputArchive, path: &StoragePath) -> Result<()>
where
    T: Encode + 'a,
    I: ExactSizeIterator<Item = &'a T>,
{
    begin_collection(ar, path, items.len())?;
    for (index, item) in items.enumerate() {
        encode_field(ar, path, index, item)?;
    }
    Ok(())
}

/// Reads the counted group layout of a sequence.
pub fn decode_elements<T: Decode>(ar: &mut InputArchive, path: &StoragePath) -> Result<Vec<T>> {
    let count = open_collection(ar, path)?;
    let mut items = Vec::new();
    for index in 0..count {
        items.push(decode_field(ar, path, index)?);
    }
    Ok(items)
}

/// Writes one map entry as the composite `(key, value)`.
pub fn encode_entry<K: Encode + ?Sized, V: Encode + ?Sized>(
    ar: &mut OutputArchive,
    path: &StoragePath,
    key: &K,
    value: &V,
) -> Result<()> {
    begin_composite(ar, path)?;
    encode_field(ar, path, 0, key)?;
    encode_field(ar, path, 1, value)
}

// --- POLYMORPHIC ---

/// Writes the concrete encoding followed by the discriminator and, under
/// `ObjectClassInfo`, the class version.
pub fn encode_polymorphic<P: Polymorphic>(
    value: &P,
    ar: &mut OutputArchive,
    path: &StoragePath,
) -> Result<()> {
    let meta = value.class();
    value.save_concrete(ar, path, meta.version())?;
    if !ar.backend().exists(path) {
        ar.create_group(path)?;
    }
    ar.write_attribute_at(path, CLASS_ATTRIBUTE, meta.name())?;
    if meta.info() == InfoMode::ObjectClassInfo {
        ar.write_attribute_at(path, VERSION_ATTRIBUTE, &meta.version())?;
    }
    Ok(())
}

/// Reads the discriminator and dispatches to the matching member of `P`.
pub fn decode_polymorphic<P: Polymorphic>(ar: &mut InputArchive, path: &StoragePath) -> Result<P> {
    if !ar.backend().exists(path) {
        return Err(ArchiveError::NotFound(path.to_string()));
    }
    if !ar.backend().attribute_exists(path, CLASS_ATTRIBUTE) {
        return Err(ArchiveError::malformed(path, "missing class discriminator"));
    }
    let class: String = ar.read_attribute_at(path, CLASS_ATTRIBUTE)?;
    if P::class_named(&class).is_none() {
        return Err(ArchiveError::UnknownConcreteType {
            path: path.to_string(),
            class,
        });
    }
    let version = if ar.backend().attribute_exists(path, VERSION_ATTRIBUTE) {
        ar.read_attribute_at(path, VERSION_ATTRIBUTE)?
    } else {
        0
    };
    tracing::trace!(path = %path, class = %class, version, "decoding polymorphic value");
    P::load_concrete(ar, path, &class, version)
}
