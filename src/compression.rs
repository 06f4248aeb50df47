//! Pluggable compression for persisted images.
//!
//! Defines the `Compressor` trait and a registry mapping the id stored in the
//! image header to an implementation.

use crate::error::{ArchiveError, Result};
use std::borrow::Cow;

/// Interface for compression algorithms.
///
/// Each compressor is identified by a unique id, written into the image header.
pub trait Compressor: Send + Sync + std::fmt::Debug {
    /// Returns the id stored in the image header. 0 is reserved for no compression.
    fn id(&self) -> u8;

    /// Short display name.
    fn name(&self) -> &'static str;

    /// Compresses the data.
    ///
    /// May borrow the input when no compression is performed.
    fn compress<'a>(&self, data: &'a [u8]) -> Result<Cow<'a, [u8]>>;

    /// Decompresses the data.
    fn decompress<'a>(&self, data: &'a [u8]) -> Result<Cow<'a, [u8]>>;
}

// --- No Compression (Pass-through) ---

/// A compressor that performs no compression (pass-through, id 0).
#[derive(Debug, Clone, Copy)]
pub struct NoCompression;

impl Compressor for NoCompression {
    fn id(&self) -> u8 {
        0
    }

    fn name(&self) -> &'static str {
        "none"
    }

    fn compress<'a>(&self, data: &'a [u8]) -> Result<Cow<'a, [u8]>> {
        Ok(Cow::Borrowed(data))
    }

    fn decompress<'a>(&self, data: &'a [u8]) -> Result<Cow<'a, [u8]>> {
        Ok(Cow::Borrowed(data))
    }
}

// --- LZ4 Implementation ---

#[cfg(feature = "lz4_flex")]
/// A compressor using the LZ4 block format with a prepended size (id 1).
///
/// Available when the `lz4_flex` feature is enabled.
#[derive(Debug, Clone, Copy)]
pub struct Lz4Compressor;

#[cfg(feature = "lz4_flex")]
impl Compressor for Lz4Compressor {
    fn id(&self) -> u8 {
        1
    }

    fn name(&self) -> &'static str {
        "lz4"
    }

    fn compress<'a>(&self, data: &'a [u8]) -> Result<Cow<'a, [u8]>> {
        Ok(Cow::Owned(lz4_flex::compress_prepend_size(data)))
    }

    fn decompress<'a>(&self, data: &'a [u8]) -> Result<Cow<'a, [u8]>> {
        let vec = lz4_flex::decompress_size_prepended(data)
            .map_err(|e| ArchiveError::Compression(e.to_string()))?;
        Ok(Cow::Owned(vec))
    }
}

// --- REGISTRY ---

/// Centralized registry for compression algorithms.
#[derive(Debug)]
pub struct CompressorRegistry {
    algorithms: Vec<Option<Box<dyn Compressor>>>,
}

impl CompressorRegistry {
    /// Creates a registry with the default algorithms registered.
    ///
    /// *   ID 0: `NoCompression`
    /// *   ID 1: `Lz4Compressor` (if the `lz4_flex` feature is enabled)
    pub fn new() -> Self {
        let mut reg = Self {
            algorithms: (0..8).map(|_| None).collect(),
        };

        reg.register(Box::new(NoCompression));

        #[cfg(feature = "lz4_flex")]
        reg.register(Box::new(Lz4Compressor));

        reg
    }

    /// Registers a compressor in the slot named by its id, replacing any previous one.
    pub fn register(&mut self, algo: Box<dyn Compressor>) {
        let id = usize::from(algo.id());
        if id >= self.algorithms.len() {
            self.algorithms.resize_with(id + 1, || None);
        }
        if let Some(slot) = self.algorithms.get_mut(id) {
            *slot = Some(algo);
        }
    }

    /// Retrieves a compressor by its id.
    ///
    /// # Errors
    /// Returns `ArchiveError::Compression` if the id is not registered.
    pub fn get(&self, id: u8) -> Result<&dyn Compressor> {
        if let Some(algo) = self
            .algorithms
            .get(usize::from(id))
            .and_then(|opt| opt.as_ref())
        {
            return Ok(algo.as_ref());
        }

        Err(ArchiveError::Compression(format!(
            "algorithm id {id} is not registered or available"
        )))
    }
}

impl Default for CompressorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_borrows() {
        let registry = CompressorRegistry::new();
        let none = registry.get(0).unwrap();
        assert!(matches!(none.compress(b"abc").unwrap(), Cow::Borrowed(_)));
        assert_eq!(none.name(), "none");
    }

    #[test]
    fn unknown_ids_are_rejected() {
        let registry = CompressorRegistry::new();
        assert!(matches!(registry.get(7), Err(ArchiveError::Compression(_))));
        assert!(registry.get(200).is_err());
    }

    #[cfg(feature = "lz4_flex")]
    #[test]
    fn lz4_restores_input() {
        let registry = CompressorRegistry::new();
        let lz4 = registry.get(1).unwrap();
        let data = vec![7u8; 4096];
        let packed = lz4.compress(&data).unwrap();
        assert!(packed.len() < data.len());
        assert_eq!(lz4.decompress(&packed).unwrap().as_ref(), data.as_slice());
    }
}
