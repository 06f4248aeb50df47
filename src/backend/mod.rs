//! The storage capability contract and its implementations.
//!
//! A storage tree is made of named **groups** (directories), **datasets** (typed
//! raw buffers), **attributes** (small typed buffers attached to a group or a
//! dataset) and **links** (hard links share a node, soft links name a target
//! path). The archives only ever talk to a tree through [`StorageBackend`].
//!
//! Two backends ship with the crate:
//!
//! - [`MemoryBackend`]: an in-process arena tree.
//! - [`FileBackend`]: the same tree persisted as a single checksummed image file
//!   (feature `file-backend`, on by default).

/// Defines the `NodeId` type.
pub mod id;
/// The in-memory backend.
pub mod memory;
/// The arena tree shared by both backends.
pub mod tree;

/// The persistent backend.
pub mod file;

pub use file::{FileBackend, FileBackendBuilder};
pub use id::NodeId;
pub use memory::MemoryBackend;
pub use tree::NodeTree;

use crate::element::RawBuffer;
use crate::error::Result;
use crate::path::StoragePath;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a backend handle was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OpenMode {
    /// Reads only; every mutation fails with `ReadOnly`.
    ReadOnly,
    /// Reads and writes, keeping existing content.
    #[default]
    ReadWrite,
    /// Discards existing content.
    Overwrite,
}

impl OpenMode {
    /// Returns true unless the mode is `ReadOnly`.
    pub fn is_writable(self) -> bool {
        !matches!(self, Self::ReadOnly)
    }
}

/// The kind of link created for an alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LinkKind {
    /// The new name refers to the very same node.
    Hard,
    /// The new name stores the target path and is resolved on access.
    #[default]
    Soft,
}

/// What a single name in a group refers to, without following a final soft link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    /// A group.
    Group,
    /// A dataset with its element type and count.
    Dataset {
        /// Element tag of the stored buffer.
        element_type: crate::element::ElementType,
        /// Element count of the stored buffer.
        count: u64,
    },
    /// A soft link and its target.
    SoftLink(StoragePath),
}

/// The capability contract every storage tree implements.
///
/// Probes (`*_exists`) never fail: anything that cannot be resolved, including
/// paths below a missing ancestor, yields `false`. Links are dereferenced
/// transparently by every operation except [`StorageBackend::entry_kind`] and
/// [`StorageBackend::soft_link_target`].
///
/// Writes never overwrite: a dataset, attribute or link written over an existing
/// name fails with `AlreadyExists`. Missing parent groups are created.
pub trait StorageBackend: fmt::Debug {
    /// The mode the handle was opened with.
    fn mode(&self) -> OpenMode;

    /// Returns true if `path` resolves to a group.
    fn group_exists(&self, path: &StoragePath) -> bool;

    /// Creates `path` and any missing ancestors. Creating an existing group is a no-op.
    fn create_group(&mut self, path: &StoragePath) -> Result<()>;

    /// Returns true if `path` resolves to a dataset.
    fn dataset_exists(&self, path: &StoragePath) -> bool;

    /// Writes a new dataset at `path`.
    fn write_dataset(&mut self, path: &StoragePath, data: RawBuffer) -> Result<()>;

    /// Reads the dataset at `path`.
    fn read_dataset(&self, path: &StoragePath) -> Result<RawBuffer>;

    /// The element count of the dataset at `path`.
    fn dataset_size(&self, path: &StoragePath) -> Result<u64>;

    /// Returns true if the group or dataset at `container` carries attribute `name`.
    fn attribute_exists(&self, container: &StoragePath, name: &str) -> bool;

    /// Attaches a new attribute. A missing container is created as a group.
    fn write_attribute(&mut self, container: &StoragePath, name: &str, data: RawBuffer)
    -> Result<()>;

    /// Reads an attribute.
    fn read_attribute(&self, container: &StoragePath, name: &str) -> Result<RawBuffer>;

    /// The element count of an attribute.
    fn attribute_size(&self, container: &StoragePath, name: &str) -> Result<u64>;

    /// Names of the attributes on `container`, sorted.
    fn attribute_names(&self, container: &StoragePath) -> Result<Vec<String>>;

    /// Creates `new` as an alias of `existing`.
    ///
    /// Hard links require `existing` to resolve; soft links may dangle until the
    /// target is written.
    fn create_link(&mut self, existing: &StoragePath, new: &StoragePath, kind: LinkKind)
    -> Result<()>;

    /// What the last component of `path` names, without following it if it is a
    /// soft link. `None` if nothing is stored under that name.
    fn entry_kind(&self, path: &StoragePath) -> Option<EntryKind>;

    /// The target of the soft link stored at `path`, if it is one.
    fn soft_link_target(&self, path: &StoragePath) -> Option<StoragePath> {
        match self.entry_kind(path) {
            Some(EntryKind::SoftLink(target)) => Some(target),
            _ => None,
        }
    }

    /// Sorted child names of the group at `path`.
    fn children(&self, path: &StoragePath) -> Result<Vec<String>>;

    /// A stable identity for the node `path` resolves to. Hard links to one node
    /// share an address.
    fn node_address(&self, path: &StoragePath) -> Option<u64>;

    /// Returns true if `path` resolves to a group or a dataset.
    fn exists(&self, path: &StoragePath) -> bool {
        self.group_exists(path) || self.dataset_exists(path)
    }

    /// Persists pending changes. A no-op for purely in-memory trees.
    fn flush(&mut self) -> Result<()>;
}
