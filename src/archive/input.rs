use crate::attribute::FromAttribute;
use crate::backend::StorageBackend;
use crate::codec::Decode;
use crate::constants::{
    ARCHIVE_MARKER_ATTRIBUTE, CLASS_ATTRIBUTE, FORMAT_VERSION, FORMAT_VERSION_ATTRIBUTE,
    OBJECT_ATTRIBUTE, VERSION_ATTRIBUTE,
};
use crate::element::RawBuffer;
use crate::error::{ArchiveError, Result};
use crate::path::StoragePath;
use std::any::Any;
use std::collections::HashMap;
use tracing::debug;

/// Reads named values back from a storage backend it exclusively owns.
///
/// Links are dereferenced transparently. Shared pointers written under
/// `Tracking::Always` come back shared: every path aliasing one stored node
/// decodes to a clone of the same pointer.
pub struct InputArchive {
    backend: Box<dyn StorageBackend>,
    format_version: u32,
    shared: HashMap<u64, Box<dyn Any>>,
}

impl InputArchive {
    /// Opens an archive over `backend`.
    ///
    /// # Errors
    /// - `NotFound` when the backend holds no archive root marker.
    /// - `Format` when the archive was written by a newer format version.
    pub fn open<B: StorageBackend + 'static>(backend: B) -> Result<Self> {
        Self::open_boxed(Box::new(backend))
    }

    /// Opens an archive over an already boxed backend.
    pub fn open_boxed(backend: Box<dyn StorageBackend>) -> Result<Self> {
        let root = StoragePath::root();
        if !backend.attribute_exists(&root, ARCHIVE_MARKER_ATTRIBUTE) {
            return Err(ArchiveError::NotFound(format!(
                "archive marker '{ARCHIVE_MARKER_ATTRIBUTE}' on /"
            )));
        }
        let format_version = if backend.attribute_exists(&root, FORMAT_VERSION_ATTRIBUTE) {
            let raw = backend.read_attribute(&root, FORMAT_VERSION_ATTRIBUTE)?;
            u32::from_attribute(&raw, "/@format_version")?
        } else {
            0
        };
        if format_version > FORMAT_VERSION {
            return Err(ArchiveError::Format(format!(
                "archive format version {format_version} is newer than supported {FORMAT_VERSION}"
            )));
        }
        debug!(mode = ?backend.mode(), format_version, "opened input archive");
        Ok(Self {
            backend,
            format_version,
            shared: HashMap::new(),
        })
    }

    // --- Public surface ---

    /// Reads the value stored under the absolute path `name`.
    ///
    /// # Errors
    /// - `InvalidPath` when `name` is not absolute.
    /// - `NotFound` when nothing is stored under `name`.
    /// - `TypeMismatch`, `MalformedLayout`, `UnknownConcreteType` when the stored
    ///   data does not fit `T`.
    pub fn read<T: Decode>(&mut self, name: &str) -> Result<T> {
        let path = StoragePath::parse(name)?;
        if !self.backend.exists(&path) {
            return Err(ArchiveError::NotFound(path.to_string()));
        }
        debug!(path = %path, "reading value");
        T::decode(self, &path)
    }

    /// Reads an attribute of the group or dataset at `name`.
    pub fn read_attribute<A: FromAttribute>(&self, name: &str, attribute: &str) -> Result<A> {
        let path = StoragePath::parse(name)?;
        self.read_attribute_at(&path, attribute)
    }

    /// Returns true if something is stored under `name`. Never fails.
    pub fn contains(&self, name: &str) -> bool {
        StoragePath::parse(name).is_ok_and(|path| self.backend.exists(&path))
    }

    /// The concrete class recorded for the polymorphic value at `name`.
    pub fn recorded_class(&self, name: &str) -> Result<String> {
        self.read_attribute(name, CLASS_ATTRIBUTE)
    }

    /// The class version recorded for the polymorphic value at `name`, or 0 when
    /// the class was written under `InfoMode::NoInfo`.
    pub fn recorded_version(&self, name: &str) -> Result<u32> {
        let path = StoragePath::parse(name)?;
        if !self.backend.exists(&path) {
            return Err(ArchiveError::NotFound(path.to_string()));
        }
        if self.backend.attribute_exists(&path, VERSION_ATTRIBUTE) {
            self.read_attribute_at(&path, VERSION_ATTRIBUTE)
        } else {
            Ok(0)
        }
    }

    /// The archive format version found on open.
    pub fn format_version(&self) -> u32 {
        self.format_version
    }

    /// Read access to the backend.
    pub fn backend(&self) -> &dyn StorageBackend {
        &*self.backend
    }

    /// Releases the backend, returning it to the caller.
    pub fn close(self) -> Box<dyn StorageBackend> {
        self.backend
    }

    // --- Codec surface ---

    /// Decodes a `T` at an explicit path. Used by hand-written codecs.
    pub fn decode_at<T: Decode>(&mut self, path: &StoragePath) -> Result<T> {
        T::decode(self, path)
    }

    /// Reads a raw dataset.
    pub fn read_dataset(&self, path: &StoragePath) -> Result<RawBuffer> {
        self.backend.read_dataset(path)
    }

    /// Reads an attribute at an explicit path.
    pub fn read_attribute_at<A: FromAttribute>(&self, path: &StoragePath, attribute: &str) -> Result<A> {
        let raw = self.backend.read_attribute(path, attribute)?;
        A::from_attribute(&raw, &format!("{path}@{attribute}"))
    }

    /// Fails unless `path` resolves to a group: `NotFound` when absent,
    /// `MalformedLayout` when it is a dataset.
    pub fn expect_group(&self, path: &StoragePath) -> Result<()> {
        if self.backend.group_exists(path) {
            Ok(())
        } else if self.backend.dataset_exists(path) {
            Err(ArchiveError::malformed(path, "expected a group, found a dataset"))
        } else {
            Err(ArchiveError::NotFound(path.to_string()))
        }
    }

    /// For a node written as a tracked object, the address of the stored node;
    /// `None` for untracked nodes.
    pub fn tracked_node(&self, path: &StoragePath) -> Result<Option<u64>> {
        if !self.backend.exists(path) {
            return Err(ArchiveError::NotFound(path.to_string()));
        }
        if !self.backend.attribute_exists(path, OBJECT_ATTRIBUTE) {
            return Ok(None);
        }
        self.backend
            .node_address(path)
            .map(Some)
            .ok_or_else(|| ArchiveError::NotFound(path.to_string()))
    }

    /// The pointer already decoded for tracked node `node`, if any.
    ///
    /// # Errors
    /// Returns `TypeMismatch` when the node was decoded as a different pointer type.
    pub fn shared<T: Clone + 'static>(&self, node: u64) -> Result<Option<T>> {
        match self.shared.get(&node) {
            None => Ok(None),
            Some(any) => any.downcast_ref::<T>().cloned().map(Some).ok_or_else(|| {
                ArchiveError::mismatch(
                    format!("tracked node #{node}"),
                    std::any::type_name::<T>(),
                    "a different pointer type",
                )
            }),
        }
    }

    /// Remembers the pointer decoded for tracked node `node`.
    pub fn share(&mut self, node: u64, pointer: Box<dyn Any>) {
        self.shared.insert(node, pointer);
    }
}

impl std::fmt::Debug for InputArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputArchive")
            .field("backend", &self.backend)
            .field("format_version", &self.format_version)
            .field("shared", &self.shared.len())
            .finish()
    }
}
