//! Class metadata and polymorphic dispatch.
//!
//! A concrete type that can be stored behind a polymorphic reference implements
//! [`Class`]. Its [`ClassMetadata`] is an associated constant: a name used as the
//! persisted discriminator, a layout version, an identity-tracking policy and an
//! info mode deciding whether the version is recorded at all.
//!
//! A *closed set* of concrete classes is described by [`Polymorphic`]. Every
//! `Class` is trivially a one-member set (see [`impl_polymorphic!`]); an enum of
//! concrete classes forms a larger one (`#[derive(Polymorphic)]`).
//!
//! ```rust
//! use arbor::{Class, ClassMetadata, InfoMode, Tracking};
//!
//! const SENSOR: ClassMetadata = ClassMetadata::new("Sensor")
//!     .with_version(2)
//!     .with_tracking(Tracking::Always)
//!     .with_info(InfoMode::ObjectClassInfo);
//!
//! assert_eq!(SENSOR.recorded_version(), 2);
//! assert_eq!(SENSOR.with_info(InfoMode::NoInfo).recorded_version(), 0);
//! ```

use crate::archive::{InputArchive, OutputArchive};
use crate::error::Result;
use crate::path::StoragePath;

/// Whether repeated submissions of one object are collapsed into aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tracking {
    /// Every submission is encoded in full.
    Never,
    /// The first submission is encoded; later ones become links to it.
    ///
    /// Identity needs a stable witness: a value reaches the identity table only
    /// through `Rc<T>`, `Arc<T>` or [`OutputArchive::write_tracked`]. Writing the
    /// same value twice by plain reference (`out.write("/a", &value)`) encodes it
    /// twice, exactly as under `Never`.
    Always,
}

/// Whether the class version is persisted next to the discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InfoMode {
    /// Only the discriminator is written; decoders observe version 0.
    ///
    /// Fields gated with `#[arbor(since = N)]` cannot be read back without a
    /// recorded version, so the derive refuses the combination:
    ///
    /// ```compile_fail
    /// #[derive(arbor::Class)]
    /// #[arbor(version = 1, info = "no_info")]
    /// struct Quiet {
    ///     id: u32,
    ///     #[arbor(since = 1)]
    ///     extra: u8,
    /// }
    /// ```
    NoInfo,
    /// The discriminator and the version are written.
    ObjectClassInfo,
}

/// Immutable, per-class serialization policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassMetadata {
    name: &'static str,
    version: u32,
    tracking: Tracking,
    info: InfoMode,
}

impl ClassMetadata {
    /// Metadata with version 0, `Tracking::Never` and `InfoMode::ObjectClassInfo`.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            version: 0,
            tracking: Tracking::Never,
            info: InfoMode::ObjectClassInfo,
        }
    }

    /// Sets the layout version. Versions are limited to one byte; a larger value
    /// fails constant evaluation.
    pub const fn with_version(mut self, version: u32) -> Self {
        assert!(
            version <= crate::constants::MAX_CLASS_VERSION,
            "class versions must be below 256"
        );
        self.version = version;
        self
    }

    /// Sets the tracking policy.
    pub const fn with_tracking(mut self, tracking: Tracking) -> Self {
        self.tracking = tracking;
        self
    }

    /// Sets the info mode.
    pub const fn with_info(mut self, info: InfoMode) -> Self {
        self.info = info;
        self
    }

    /// The persisted discriminator.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// The declared layout version.
    pub const fn version(&self) -> u32 {
        self.version
    }

    /// The tracking policy.
    pub const fn tracking(&self) -> Tracking {
        self.tracking
    }

    /// The info mode.
    pub const fn info(&self) -> InfoMode {
        self.info
    }

    /// The version a reader will observe: the declared version, or 0 under `NoInfo`.
    pub const fn recorded_version(&self) -> u32 {
        match self.info {
            InfoMode::NoInfo => 0,
            InfoMode::ObjectClassInfo => self.version,
        }
    }
}

/// A concrete type that may sit behind a polymorphic reference.
///
/// `save` receives the declared version; `load` receives the version recorded in
/// the archive (0 under `InfoMode::NoInfo`), which may differ from the one the
/// reading program declares.
pub trait Class: Sized + 'static {
    /// The class policy.
    const CLASS: ClassMetadata;

    /// Writes the concrete encoding at `path`.
    fn save(&self, ar: &mut OutputArchive, path: &StoragePath, version: u32) -> Result<()>;

    /// Reads the concrete encoding at `path`.
    fn load(ar: &mut InputArchive, path: &StoragePath, version: u32) -> Result<Self>;
}

/// A closed set of concrete classes, dispatched by persisted discriminator.
pub trait Polymorphic: Sized + 'static {
    /// Metadata of the concrete class held by `self`.
    fn class(&self) -> &'static ClassMetadata;

    /// Metadata of every member of the set.
    fn classes() -> &'static [&'static ClassMetadata];

    /// Writes the concrete encoding of `self` at `path`.
    fn save_concrete(&self, ar: &mut OutputArchive, path: &StoragePath, version: u32)
    -> Result<()>;

    /// Reads the member named `class` from `path`.
    ///
    /// # Errors
    /// Returns `UnknownConcreteType` when `class` is not a member.
    fn load_concrete(
        ar: &mut InputArchive,
        path: &StoragePath,
        class: &str,
        version: u32,
    ) -> Result<Self>;

    /// Looks up a member's metadata by discriminator.
    fn class_named(name: &str) -> Option<&'static ClassMetadata> {
        Self::classes().iter().copied().find(|meta| meta.name() == name)
    }
}

/// Makes a hand-written [`Class`] a one-member [`Polymorphic`] set and gives it
/// the polymorphic [`Encode`](crate::Encode)/[`Decode`](crate::Decode) layout.
///
/// ```rust
/// use arbor::{Class, ClassMetadata, InputArchive, OutputArchive, StoragePath};
///
/// struct Probe { depth: f64 }
///
/// impl Class for Probe {
///     const CLASS: ClassMetadata = ClassMetadata::new("Probe").with_version(1);
///
///     fn save(&self, ar: &mut OutputArchive, path: &StoragePath, _version: u32) -> arbor::Result<()> {
///         ar.encode_at(&path.index(0), &self.depth)
///     }
///
///     fn load(ar: &mut InputArchive, path: &StoragePath, _version: u32) -> arbor::Result<Self> {
///         Ok(Self { depth: ar.decode_at(&path.index(0))? })
///     }
/// }
///
/// arbor::impl_polymorphic!(Probe);
/// ```
#[macro_export]
macro_rules! impl_polymorphic {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::Polymorphic for $ty {
                fn class(&self) -> &'static $crate::ClassMetadata {
                    const CLASS: &$crate::ClassMetadata = &<$ty as $crate::Class>::CLASS;
                    CLASS
                }

                fn classes() -> &'static [&'static $crate::ClassMetadata] {
                    const CLASSES: &[&$crate::ClassMetadata] = &[&<$ty as $crate::Class>::CLASS];
                    CLASSES
                }

                fn save_concrete(
                    &self,
                    ar: &mut $crate::OutputArchive,
                    path: &$crate::StoragePath,
                    version: u32,
                ) -> $crate::Result<()> {
                    <$ty as $crate::Class>::save(self, ar, path, version)
                }

                fn load_concrete(
                    ar: &mut $crate::InputArchive,
                    path: &$crate::StoragePath,
                    class: &str,
                    version: u32,
                ) -> $crate::Result<Self> {
                    if class == <$ty as $crate::Class>::CLASS.name() {
                        <$ty as $crate::Class>::load(ar, path, version)
                    } else {
                        Err($crate::ArchiveError::UnknownConcreteType {
                            path: path.to_string(),
                            class: class.to_string(),
                        })
                    }
                }
            }

            impl $crate::Encode for $ty {
                fn strategy() -> $crate::Strategy
                where
                    Self: Sized,
                {
                    $crate::Strategy::Polymorphic
                }

                fn encode(
                    &self,
                    ar: &mut $crate::OutputArchive,
                    path: &$crate::StoragePath,
                ) -> $crate::Result<()> {
                    $crate::rt::encode_polymorphic(self, ar, path)
                }
            }

            impl $crate::Decode for $ty {
                fn decode(
                    ar: &mut $crate::InputArchive,
                    path: &$crate::StoragePath,
                ) -> $crate::Result<Self> {
                    $crate::rt::decode_polymorphic(ar, path)
                }
            }
        )+
    };
}
