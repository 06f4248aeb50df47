//! # Arbor
//!
//! Type-driven serialization of Rust values into a hierarchical store of
//! groups, datasets and attributes, in the style of HDF5.
//!
//! ## Overview
//!
//! Arbor does not flatten a value into one opaque byte stream. Every type is
//! mapped, at compile time, onto exactly one *codec strategy* that decides how
//! the value is laid out in the storage tree:
//!
//! *   **Opaque:** scalars, `char`, `bool`, strings and byte blobs become one
//!     typed dataset.
//! *   **Composite:** tuples and structs become a group whose field `i` lives at
//!     the child `i`.
//! *   **Sequence:** `Vec`, `VecDeque`, `LinkedList`, arrays and slices become a
//!     counted group of elements, or one contiguous dataset when every element
//!     is a numeric scalar.
//! *   **Associative:** sets and maps become a counted group of keys or
//!     `(key, value)` composites; decoding goes through `insert`.
//! *   **Polymorphic:** values behind a closed set of concrete classes carry a
//!     `class` discriminator and, optionally, a layout version. Their
//!     [`ClassMetadata`] also decides whether repeated submissions of one object
//!     are stored once and aliased by links.
//!
//! ## Architecture
//!
//! ### Storage Tree
//!
//! A [`StorageBackend`] exposes the tree through absolute [`StoragePath`]s:
//! groups hold named children, datasets hold typed [`RawBuffer`]s, and any node
//! may carry attributes. Hard links alias a node, soft links name a path.
//!
//! Two backends ship with the crate:
//! - [`MemoryBackend`]: an in-memory tree, useful for tests and as a staging area.
//! - [`FileBackend`] (feature `file-backend`): the same tree persisted as a
//!   checksummed, optionally compressed image file.
//!
//! ### File Format
//!
//! ```text
//! [Payload (compressed, bincode-encoded NodeTree)] [Image Header (23 bytes)]
//! ```
//!
//! The header at the end of the file carries the magic bytes, the image
//! version, the compression id, the payload length and an xxHash64 checksum of
//! the payload.
//!
//! ### Archives
//!
//! An [`OutputArchive`] owns its backend for the whole session and walks values
//! through their codecs. An [`InputArchive`] performs the dual walk. Both mark
//! the root group so that opening a foreign tree fails with `NotFound`.
//!
//! ## Usage Patterns
//!
//! ### Containers
//!
//! ```rust
//! use arbor::{InputArchive, MemoryBackend, OutputArchive};
//! use std::collections::BTreeMap;
//!
//! let mut out = OutputArchive::open(MemoryBackend::new())?;
//! out.write("/v", &vec![0i32, 1, 2])?;
//! out.write("/m", &BTreeMap::from([(0i32, 0i32), (1, 1)]))?;
//! let backend = out.close()?;
//!
//! let mut input = InputArchive::open_boxed(backend)?;
//! assert_eq!(input.read::<Vec<i32>>("/v")?, vec![0, 1, 2]);
//! assert_eq!(input.read::<BTreeMap<i32, i32>>("/m")?.len(), 2);
//! # Ok::<(), arbor::ArchiveError>(())
//! ```
//!
//! ### Derived Types
//!
//! ```rust
//! use arbor::{Codec, InputArchive, MemoryBackend, OutputArchive};
//!
//! #[derive(Codec, Debug, PartialEq)]
//! struct Reading {
//!     channel: u16,
//!     samples: Vec<f32>,
//! }
//!
//! let reading = Reading { channel: 3, samples: vec![0.5, 0.25] };
//! let mut out = OutputArchive::open(MemoryBackend::new())?;
//! out.write("/run/0", &reading)?;
//!
//! let mut input = InputArchive::open_boxed(out.close()?)?;
//! assert_eq!(input.read::<Reading>("/run/0")?, reading);
//! # Ok::<(), arbor::ArchiveError>(())
//! ```
//!
//! ### Shared Objects
//!
//! Classes declared with `Tracking::Always` and written through `Rc`/`Arc` are
//! stored once; later submissions of the same allocation become links, and the
//! input archive hands back clones of one `Rc`.
//!
//! ## Safety and Error Handling
//!
//! * **Encapsulated Unsafe:** the only `unsafe` is the memory map in the file
//!   backend's image loader.
//! * **No Panics:** no `unwrap()` or `panic!()` in the library (enforced by clippy lints).
//! * **Comprehensive Errors:** every failure is an [`ArchiveError`].

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![warn(missing_docs)]

// Lets the derive output name `::arbor` from inside this crate's own tests.
extern crate self as arbor;

// --- PUBLIC API MODULES ---
pub mod archive;
pub mod attribute;
pub mod backend;
pub mod class;
pub mod codec;
pub mod compression;
pub mod element;
pub mod error;
pub mod format;
pub mod identity;
pub mod inspector;
pub mod path;

// --- INTERNAL IMPLEMENTATION MODULES (Hidden from Docs) ---
#[doc(hidden)]
pub mod io;

// --- MACRO SUPPORT MODULES ---

/// Runtime utilities used by the derived code.
#[doc(hidden)]
pub mod rt;

// --- RE-EXPORTS ---

#[cfg(feature = "lz4_flex")]
pub use compression::Lz4Compressor;
pub use compression::{Compressor, CompressorRegistry, NoCompression};

pub use archive::{
    ArchiveOptions, InputArchive, NamedValue, OutputArchive, OutputArchiveBuilder,
    WriteStatistics,
};
pub use attribute::{FromAttribute, ToAttribute};
pub use backend::{
    EntryKind, FileBackend, FileBackendBuilder, LinkKind, MemoryBackend, OpenMode,
    StorageBackend,
};
pub use class::{Class, ClassMetadata, InfoMode, Polymorphic, Tracking};
pub use codec::{Blob, Decode, Encode, Strategy};
pub use element::{ElementType, RawBuffer, Scalar};
pub use error::{ArchiveError, Result};
pub use identity::{ObjectIdentityRecord, ObjectKey};
pub use inspector::{ArchiveInspector, DebugReport};
pub use path::StoragePath;

// Re-export the derive macros so they are accessible as `arbor::Codec` etc.
// Derives live in the macro namespace and do not clash with the traits.
pub use arbor_derive::{Class, Codec, Polymorphic};

/// Constants used throughout the library.
pub mod constants {
    /// The default buffer size for I/O operations.
    pub const DEFAULT_BUFFER_SIZE: usize = 8 * 1024;

    /// Soft links followed before a path is treated as dangling.
    pub const MAX_SOFT_LINK_DEPTH: usize = 16;

    /// Largest class version; versions are persisted in one byte.
    pub const MAX_CLASS_VERSION: u32 = 255;

    /// Archive layout version written on the root group.
    pub const FORMAT_VERSION: u32 = 1;

    /// Value of the root marker attribute.
    pub const ARCHIVE_MARKER: &str = "arbor";

    /// Root attribute identifying an archive.
    pub const ARCHIVE_MARKER_ATTRIBUTE: &str = "archive";

    /// Root attribute holding [`FORMAT_VERSION`].
    pub const FORMAT_VERSION_ATTRIBUTE: &str = "format_version";

    /// Polymorphic discriminator.
    pub const CLASS_ATTRIBUTE: &str = "class";

    /// Recorded class version.
    pub const VERSION_ATTRIBUTE: &str = "version";

    /// Session-local object number of a tracked object.
    pub const OBJECT_ATTRIBUTE: &str = "object";

    /// Element count of sequence and associative groups.
    pub const COUNT_ATTRIBUTE: &str = "count";
}
