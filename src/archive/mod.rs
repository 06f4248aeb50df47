//! Output and input archives.
//!
//! An [`OutputArchive`] owns a backend handle for its whole session and walks
//! values through their codecs into storage operations. An [`InputArchive`] owns
//! a backend for reading and performs the dual walk.
//!
//! Two archives over one storage tree at the same time are not supported; each
//! archive assumes exclusive ownership of its backend.

mod input;
mod output;

pub use input::InputArchive;
pub use output::{OutputArchive, OutputArchiveBuilder};

use crate::backend::LinkKind;
use crate::codec::Encode;

/// Session options of an [`OutputArchive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveOptions {
    link_kind: LinkKind,
    contiguous_sequences: bool,
}

impl ArchiveOptions {
    /// The link kind used for tracked re-references. Defaults to `Soft`.
    pub fn link_kind(&self) -> LinkKind {
        self.link_kind
    }

    /// Whether sequences of opaque scalars are written as one dataset.
    /// Defaults to `true`; when `false` they use the counted group layout.
    pub fn contiguous_sequences(&self) -> bool {
        self.contiguous_sequences
    }
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            link_kind: LinkKind::Soft,
            contiguous_sequences: true,
        }
    }
}

/// Counters of storage operations issued by one output session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteStatistics {
    /// Groups created (including no-op re-creations).
    pub groups: u64,
    /// Datasets written.
    pub datasets: u64,
    /// Attributes written.
    pub attributes: u64,
    /// Links created for tracked re-references or by explicit request.
    pub links: u64,
}

/// A value submitted under a name, for [`OutputArchive::write_many`].
#[derive(Clone, Copy)]
pub struct NamedValue<'a> {
    /// Absolute storage path.
    pub name: &'a str,
    /// The value.
    pub value: &'a dyn Encode,
}

impl<'a> NamedValue<'a> {
    /// Pairs a name with a value.
    pub fn new(name: &'a str, value: &'a dyn Encode) -> Self {
        Self { name, value }
    }
}

impl std::fmt::Debug for NamedValue<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamedValue").field("name", &self.name).finish_non_exhaustive()
    }
}
