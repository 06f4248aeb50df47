//! Low-level I/O for persisting images.
//!
//! Images are written to a sibling temporary file and renamed into place on
//! [`ImageWriter::commit`], so a crash mid-write never leaves a truncated image
//! under the real name. A writer dropped before a successful commit removes
//! its staging file.

use crate::error::Result;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// A buffered writer that appends to a staging file and tracks the current offset.
#[derive(Debug)]
pub struct ImageWriter {
    writer: BufWriter<File>,
    staging: PathBuf,
    destination: PathBuf,
    current_offset: u64,
    committed: bool,
}

impl ImageWriter {
    /// Creates the staging file next to `destination`.
    pub fn create(destination: &Path) -> Result<Self> {
        let mut staging = destination.as_os_str().to_owned();
        staging.push(".tmp");
        let staging = PathBuf::from(staging);
        let file = File::create(&staging)?;
        Ok(Self {
            writer: BufWriter::with_capacity(crate::constants::DEFAULT_BUFFER_SIZE, file),
            staging,
            destination: destination.to_path_buf(),
            current_offset: 0,
            committed: false,
        })
    }

    /// Writes a complete buffer. Returns the offset where it started.
    pub fn write_all(&mut self, buffer: &[u8]) -> Result<u64> {
        let start_offset = self.current_offset;
        self.writer.write_all(buffer)?;
        self.current_offset += buffer.len() as u64;
        Ok(start_offset)
    }

    /// Returns the current file cursor position.
    pub fn current_offset(&self) -> u64 {
        self.current_offset
    }

    /// Flushes, syncs and moves the staging file over the destination.
    pub fn commit(mut self) -> Result<u64> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        std::fs::rename(&self.staging, &self.destination)?;
        self.committed = true;
        Ok(self.current_offset)
    }
}

impl Drop for ImageWriter {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.staging) {
            tracing::warn!(path = %self.staging.display(), error = %e, "failed to remove staging file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_replaces_the_destination() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("image.arb");
        let mut writer = ImageWriter::create(&destination).unwrap();
        assert_eq!(writer.write_all(b"abc").unwrap(), 0);
        assert_eq!(writer.commit().unwrap(), 3);
        assert_eq!(std::fs::read(&destination).unwrap(), b"abc");
        assert!(!dir.path().join("image.arb.tmp").exists());
    }

    #[test]
    fn abandoned_writers_remove_their_staging_file() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("image.arb");
        let mut writer = ImageWriter::create(&destination).unwrap();
        writer.write_all(b"partial").unwrap();
        assert!(dir.path().join("image.arb.tmp").exists());
        drop(writer);
        assert!(!dir.path().join("image.arb.tmp").exists());
        assert!(!destination.exists());
    }

    #[test]
    fn failed_commit_leaves_no_staging_file() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be replaced by a file rename.
        let destination = dir.path().join("occupied");
        std::fs::create_dir(&destination).unwrap();
        let mut writer = ImageWriter::create(&destination).unwrap();
        writer.write_all(b"data").unwrap();
        assert!(writer.commit().is_err());
        assert!(!dir.path().join("occupied.tmp").exists());
        assert!(destination.is_dir());
    }
}
