//! The persistent backend.
//!
//! A [`FileBackend`] keeps a working [`MemoryBackend`] and persists it as one
//! image file (see [`format`](crate::format)). Opening memory-maps the file,
//! validates the tail header and checksum, decompresses the payload and decodes
//! the tree with bincode. Flushing re-encodes the tree and atomically replaces
//! the file.
//!
//! Without the `file-backend` feature every open fails with
//! [`ArchiveError::BackendUnavailable`].

use super::memory::MemoryBackend;
use super::tree::NodeTree;
use super::{EntryKind, LinkKind, OpenMode, StorageBackend};
use crate::element::RawBuffer;
use crate::error::{ArchiveError, Result};
use crate::path::StoragePath;
use std::path::{Path, PathBuf};

/// Options for opening a [`FileBackend`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FileBackendBuilder {
    mode: OpenMode,
    compression: bool,
}

impl FileBackendBuilder {
    /// Sets the open mode. Defaults to `ReadWrite`.
    pub fn mode(mut self, mode: OpenMode) -> Self {
        self.mode = mode;
        self
    }

    /// Enables LZ4 compression of the image (requires the `lz4_flex` feature).
    pub fn compression(mut self, enable: bool) -> Self {
        self.compression = enable;
        self
    }

    /// Opens or creates the image at `path`.
    ///
    /// # Errors
    /// - `NotFound` when opening `ReadOnly` and the file does not exist.
    /// - `BackendUnavailable` when the file cannot be created, or the crate was
    ///   built without `file-backend`.
    /// - `Compression` when compression is requested but not compiled in.
    /// - `Format`, `Serialization`, `Io` when an existing image cannot be loaded.
    pub fn open<P: AsRef<Path>>(self, path: P) -> Result<FileBackend> {
        #[cfg(not(feature = "file-backend"))]
        {
            Err(ArchiveError::BackendUnavailable(format!(
                "cannot open {}: built without the `file-backend` feature",
                path.as_ref().display()
            )))
        }

        #[cfg(feature = "file-backend")]
        {
            let path = path.as_ref();
            let compression_id = if self.compression { 1 } else { 0 };
            crate::compression::CompressorRegistry::new().get(compression_id)?;

            let tree = match self.mode {
                OpenMode::ReadOnly => {
                    if !path.exists() {
                        return Err(ArchiveError::NotFound(path.display().to_string()));
                    }
                    image::load(path)?
                }
                OpenMode::ReadWrite => {
                    probe_writable(path, false)?;
                    image::load(path)?
                }
                OpenMode::Overwrite => {
                    probe_writable(path, true)?;
                    NodeTree::new()
                }
            };

            tracing::debug!(
                path = %path.display(),
                mode = ?self.mode,
                nodes = tree.len(),
                "opened file backend"
            );

            Ok(FileBackend {
                path: path.to_path_buf(),
                inner: MemoryBackend::from_tree(tree, self.mode),
                compression_id,
                dirty: self.mode == OpenMode::Overwrite,
            })
        }
    }
}

#[cfg(feature = "file-backend")]
fn probe_writable(path: &Path, truncate: bool) -> Result<()> {
    std::fs::OpenOptions::new()
        .create(true)
        .append(!truncate)
        .write(truncate)
        .truncate(truncate)
        .open(path)
        .map(|_| ())
        .map_err(|e| ArchiveError::BackendUnavailable(format!("cannot create {}: {e}", path.display())))
}

/// A storage tree persisted to a single image file.
///
/// Mutations are applied in memory and written out on [`StorageBackend::flush`]
/// (called by [`OutputArchive::close`](crate::OutputArchive::close)) or when the
/// backend is dropped.
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    inner: MemoryBackend,
    compression_id: u8,
    dirty: bool,
}

impl FileBackend {
    /// Returns a builder for configuring open options.
    pub fn builder() -> FileBackendBuilder {
        FileBackendBuilder::default()
    }

    /// Opens `path` with the given mode and no compression.
    pub fn open<P: AsRef<Path>>(path: P, mode: OpenMode) -> Result<Self> {
        Self::builder().mode(mode).open(path)
    }

    /// Creates (or truncates) `path`.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open(path, OpenMode::Overwrite)
    }

    /// The image location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The in-memory working copy.
    pub fn tree(&self) -> &NodeTree {
        self.inner.tree()
    }

    fn touched<T>(&mut self, result: Result<T>) -> Result<T> {
        if result.is_ok() {
            self.dirty = true;
        }
        result
    }
}

impl StorageBackend for FileBackend {
    fn mode(&self) -> OpenMode {
        self.inner.mode()
    }

    fn group_exists(&self, path: &StoragePath) -> bool {
        self.inner.group_exists(path)
    }

    fn create_group(&mut self, path: &StoragePath) -> Result<()> {
        let result = self.inner.create_group(path);
        self.touched(result)
    }

    fn dataset_exists(&self, path: &StoragePath) -> bool {
        self.inner.dataset_exists(path)
    }

    fn write_dataset(&mut self, path: &StoragePath, data: RawBuffer) -> Result<()> {
        let result = self.inner.write_dataset(path, data);
        self.touched(result)
    }

    fn read_dataset(&self, path: &StoragePath) -> Result<RawBuffer> {
        self.inner.read_dataset(path)
    }

    fn dataset_size(&self, path: &StoragePath) -> Result<u64> {
        self.inner.dataset_size(path)
    }

    fn attribute_exists(&self, container: &StoragePath, name: &str) -> bool {
        self.inner.attribute_exists(container, name)
    }

    fn write_attribute(
        &mut self,
        container: &StoragePath,
        name: &str,
        data: RawBuffer,
    ) -> Result<()> {
        let result = self.inner.write_attribute(container, name, data);
        self.touched(result)
    }

    fn read_attribute(&self, container: &StoragePath, name: &str) -> Result<RawBuffer> {
        self.inner.read_attribute(container, name)
    }

    fn attribute_size(&self, container: &StoragePath, name: &str) -> Result<u64> {
        self.inner.attribute_size(container, name)
    }

    fn attribute_names(&self, container: &StoragePath) -> Result<Vec<String>> {
        self.inner.attribute_names(container)
    }

    fn create_link(
        &mut self,
        existing: &StoragePath,
        new: &StoragePath,
        kind: LinkKind,
    ) -> Result<()> {
        let result = self.inner.create_link(existing, new, kind);
        self.touched(result)
    }

    fn entry_kind(&self, path: &StoragePath) -> Option<EntryKind> {
        self.inner.entry_kind(path)
    }

    fn children(&self, path: &StoragePath) -> Result<Vec<String>> {
        self.inner.children(path)
    }

    fn node_address(&self, path: &StoragePath) -> Option<u64> {
        self.inner.node_address(path)
    }

    fn flush(&mut self) -> Result<()> {
        if !self.dirty || !self.inner.mode().is_writable() {
            return Ok(());
        }
        #[cfg(feature = "file-backend")]
        {
            let written = image::store(&self.path, self.inner.tree(), self.compression_id)?;
            tracing::debug!(path = %self.path.display(), bytes = written, "flushed file backend");
        }
        self.dirty = false;
        Ok(())
    }
}

impl Drop for FileBackend {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to flush file backend on drop");
        }
    }
}

#[cfg(feature = "file-backend")]
mod image {
    use super::NodeTree;
    use crate::compression::CompressorRegistry;
    use crate::error::{ArchiveError, Result};
    use crate::format::{IMAGE_HEADER_SIZE, ImageHeader};
    use crate::io::ImageWriter;
    use memmap2::Mmap;
    use std::fs::File;
    use std::path::Path;

    /// Loads and validates the image at `path`. An empty file is an empty tree.
    pub(super) fn load(path: &Path) -> Result<NodeTree> {
        let file = File::open(path)?;
        let file_size = file.metadata()?.len();
        if file_size == 0 {
            return Ok(NodeTree::new());
        }
        if file_size < IMAGE_HEADER_SIZE as u64 {
            return Err(ArchiveError::Format("file smaller than image header".into()));
        }

        // Safety: the map is read once and dropped before returning. Concurrent
        // modification of the file by another process is outside the contract.
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file)? };

        let header_start = mmap.len() - IMAGE_HEADER_SIZE;
        let header = ImageHeader::from_bytes(&mmap[header_start..])?;
        let payload = &mmap[..header_start];
        header.verify(payload)?;

        let registry = CompressorRegistry::new();
        let raw = registry.get(header.compression)?.decompress(payload)?;
        let (tree, _): (NodeTree, usize) =
            bincode::serde::decode_from_slice(&raw, bincode::config::standard())
                .map_err(|e| ArchiveError::Serialization(e.to_string()))?;
        tree.verify()?;

        tracing::trace!(path = %path.display(), bytes = file_size, "loaded image");
        Ok(tree)
    }

    /// Encodes `tree` and atomically replaces the file at `path`.
    pub(super) fn store(path: &Path, tree: &NodeTree, compression_id: u8) -> Result<u64> {
        let raw = bincode::serde::encode_to_vec(tree, bincode::config::standard())
            .map_err(|e| ArchiveError::Serialization(e.to_string()))?;
        let registry = CompressorRegistry::new();
        let payload = registry.get(compression_id)?.compress(&raw)?;
        let header = ImageHeader::new(compression_id, &payload);

        let mut writer = ImageWriter::create(path)?;
        writer.write_all(&payload)?;
        writer.write_all(&header.to_bytes())?;
        writer.commit()
    }
}
