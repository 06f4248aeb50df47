//! Defines the physical binary layout of a persisted storage tree.
//!
//! # Image Layout
//! A file holds one encoded [`NodeTree`](crate::backend::NodeTree), optionally
//! compressed, followed by a fixed-size header at the very end of the file.
//!
//! File: `[ Payload ] [ Image Header ]`
//!
//! ## Header Anatomy
//! `Magic(4) + Version(2) + Compression(1) + PayloadLength(8) + Checksum(8) = 23`
//!
//! The checksum is the xxHash64 (seed 0) of the payload bytes as stored.

use crate::error::{ArchiveError, Result};
use std::hash::Hasher;
use twox_hash::XxHash64;

/// Magic bytes identifying the file format: "ARB1".
pub const MAGIC_BYTES: [u8; 4] = *b"ARB1";

/// The image layout version written by this crate.
pub const IMAGE_VERSION: u16 = 1;

/// The fixed size of the image header.
pub const IMAGE_HEADER_SIZE: usize = 23;

/// The header stored at the tail of an image file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageHeader {
    /// Always [`MAGIC_BYTES`].
    pub magic: [u8; 4],
    /// Layout version.
    pub version: u16,
    /// Compression algorithm id (see [`CompressorRegistry`](crate::compression::CompressorRegistry)).
    pub compression: u8,
    /// Length of the stored payload in bytes.
    pub payload_length: u64,
    /// xxHash64 of the stored payload.
    pub checksum: u64,
}

impl ImageHeader {
    /// Creates a header describing `payload`.
    pub fn new(compression: u8, payload: &[u8]) -> Self {
        Self {
            magic: MAGIC_BYTES,
            version: IMAGE_VERSION,
            compression,
            payload_length: payload.len() as u64,
            checksum: checksum(payload),
        }
    }

    /// Serializes the header to bytes (Little Endian).
    pub fn to_bytes(&self) -> [u8; IMAGE_HEADER_SIZE] {
        let mut buf = [0u8; IMAGE_HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.magic);
        buf[4..6].copy_from_slice(&self.version.to_le_bytes());
        buf[6] = self.compression;
        buf[7..15].copy_from_slice(&self.payload_length.to_le_bytes());
        buf[15..23].copy_from_slice(&self.checksum.to_le_bytes());
        buf
    }

    /// Parses and validates a header.
    ///
    /// # Errors
    /// Returns [`ArchiveError::Format`] on a short buffer, wrong magic or an
    /// unsupported version.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let bytes: &[u8; IMAGE_HEADER_SIZE] = bytes
            .try_into()
            .map_err(|_| ArchiveError::Format("image header has the wrong size".into()))?;

        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        if magic != MAGIC_BYTES {
            return Err(ArchiveError::Format("invalid magic bytes".into()));
        }

        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != IMAGE_VERSION {
            return Err(ArchiveError::Format(format!("unsupported image version: {version}")));
        }

        let mut word = [0u8; 8];
        word.copy_from_slice(&bytes[7..15]);
        let payload_length = u64::from_le_bytes(word);
        word.copy_from_slice(&bytes[15..23]);
        let checksum = u64::from_le_bytes(word);

        Ok(Self {
            magic,
            version,
            compression: bytes[6],
            payload_length,
            checksum,
        })
    }

    /// Fails with [`ArchiveError::Format`] unless `payload` matches the recorded
    /// length and checksum.
    pub fn verify(&self, payload: &[u8]) -> Result<()> {
        if payload.len() as u64 != self.payload_length {
            return Err(ArchiveError::Format(format!(
                "payload is {} bytes, header records {}",
                payload.len(),
                self.payload_length
            )));
        }
        if checksum(payload) != self.checksum {
            return Err(ArchiveError::Format("payload checksum mismatch".into()));
        }
        Ok(())
    }
}

/// xxHash64 with seed 0.
pub fn checksum(bytes: &[u8]) -> u64 {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(bytes);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_survives_encoding() {
        let header = ImageHeader::new(1, b"payload");
        let parsed = ImageHeader::from_bytes(&header.to_bytes()).unwrap();
        assert_eq!(header, parsed);
        assert!(parsed.verify(b"payload").is_ok());
    }

    #[test]
    fn corruption_is_detected() {
        let header = ImageHeader::new(0, b"payload");
        assert!(header.verify(b"paylaod").is_err());
        assert!(header.verify(b"payload!").is_err());

        let mut bytes = header.to_bytes();
        bytes[0] = b'X';
        assert!(matches!(ImageHeader::from_bytes(&bytes), Err(ArchiveError::Format(_))));
        assert!(ImageHeader::from_bytes(&bytes[1..]).is_err());
    }
}
