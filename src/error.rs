//! Centralized error handling for arbor.
//!
//! Every fallible operation in the crate returns [`Result`], whose error type is
//! [`ArchiveError`]. The library never panics on bad input: malformed paths,
//! missing nodes and corrupt layouts all come back as typed errors.
//!
//! ## Error Categories
//!
//! - **Backend** ([`ArchiveError::BackendUnavailable`], [`ArchiveError::ReadOnly`]):
//!   the storage capability is missing or refuses mutation.
//! - **Lookup** ([`ArchiveError::NotFound`], [`ArchiveError::AlreadyExists`]):
//!   a path names nothing, or names something that may not be replaced.
//! - **Decoding** ([`ArchiveError::TypeMismatch`], [`ArchiveError::UnknownConcreteType`],
//!   [`ArchiveError::MalformedLayout`]): stored data does not fit the requested type.
//! - **Precondition** ([`ArchiveError::InvalidPath`]): the caller passed a path that
//!   is not absolute. Distinct from `NotFound`.
//! - **Image** ([`ArchiveError::Io`], [`ArchiveError::Serialization`],
//!   [`ArchiveError::Compression`], [`ArchiveError::Format`]): persisting or loading
//!   the file backend failed.
//!
//! ## Usage
//!
//! ```rust
//! use arbor::{ArchiveError, InputArchive, MemoryBackend};
//!
//! // An empty backend carries no archive marker.
//! match InputArchive::open(MemoryBackend::new()) {
//!     Err(ArchiveError::NotFound(what)) => println!("nothing archived: {what}"),
//!     Err(e) => println!("other failure: {e}"),
//!     Ok(_) => unreachable!(),
//! }
//! ```

use std::io;
use std::sync::Arc;

/// A specialized `Result` type for archive operations.
pub type Result<T> = std::result::Result<T, ArchiveError>;

/// The error enum covering every failure domain of the crate.
///
/// This type is `Clone`; I/O errors are wrapped in an `Arc` so cloning stays cheap.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ArchiveError {
    /// The storage capability is not compiled in, or the container could not be
    /// created or opened.
    #[error("storage backend unavailable: {0}")]
    BackendUnavailable(String),

    /// A requested path, attribute or archive root does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The stored element type does not match the type being decoded.
    #[error("type mismatch at {path}: expected {expected}, found {found}")]
    TypeMismatch {
        /// Path of the offending node.
        path: String,
        /// What the decoder asked for.
        expected: String,
        /// What the storage holds.
        found: String,
    },

    /// A polymorphic discriminator names a class outside the registered set.
    #[error("unknown concrete type '{class}' at {path}")]
    UnknownConcreteType {
        /// Path of the polymorphic node.
        path: String,
        /// The recorded discriminator.
        class: String,
    },

    /// The stored structure does not have the shape the codec expects
    /// (missing children, wrong counts, a dataset where a group should be).
    #[error("malformed layout at {path}: {reason}")]
    MalformedLayout {
        /// Path of the offending node.
        path: String,
        /// Human readable description of the violation.
        reason: String,
    },

    /// A storage path failed validation (empty, or missing the leading `/`).
    #[error("invalid storage path '{path}': {reason}")]
    InvalidPath {
        /// The rejected input.
        path: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Overwriting an existing dataset, attribute or link is not supported.
    #[error("{0} already exists")]
    AlreadyExists(String),

    /// A mutation was attempted through a read-only backend.
    #[error("storage backend is opened read-only")]
    ReadOnly,

    /// Low-level I/O failure while persisting or loading a file image.
    #[error("I/O error: {0}")]
    Io(#[source] Arc<io::Error>),

    /// Encoding or decoding the storage image failed (bincode), or a value has
    /// no representable raw layout.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Compressing or decompressing the storage image failed.
    #[error("compression error: {0}")]
    Compression(String),

    /// The file image is truncated, corrupt, or has an unsupported version.
    #[error("format error: {0}")]
    Format(String),
}

impl ArchiveError {
    /// Shorthand for [`ArchiveError::MalformedLayout`].
    pub fn malformed(path: impl ToString, reason: impl Into<String>) -> Self {
        Self::MalformedLayout {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    /// Shorthand for [`ArchiveError::TypeMismatch`].
    pub fn mismatch(path: impl ToString, expected: impl ToString, found: impl ToString) -> Self {
        Self::TypeMismatch {
            path: path.to_string(),
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    /// Returns true for [`ArchiveError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<io::Error> for ArchiveError {
    fn from(err: io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}
