//! The type codec registry.
//!
//! Every storable type implements [`Encode`] and [`Decode`], and thereby picks
//! exactly one [`Strategy`]. Dispatch is static: requesting a codec for a type
//! without an implementation is a compile error.
//!
//! | Strategy      | Types                                             | Layout at `P`                                  |
//! |---------------|---------------------------------------------------|------------------------------------------------|
//! | `Opaque`      | integers, floats, `bool`, `char`, `String`, [`Blob`] | one dataset                                 |
//! | `Composite`   | tuples, `()`, `#[derive(Codec)]` structs          | group `P`, field `i` at `P/i`                  |
//! | `Sequence`    | `Vec`, `VecDeque`, `LinkedList`, arrays, slices   | one dataset, or group with `count` and `P/i`   |
//! | `Associative` | `BTreeSet`, `HashSet`, `BTreeMap`, `HashMap`      | group with `count`; keys or `(k, v)` at `P/i`  |
//! | `Polymorphic` | [`Class`](crate::Class) types, `Rc`/`Arc` of them | concrete encoding plus `class`/`version` attrs |

mod associative;
mod composite;
mod opaque;
mod sequence;
mod shared;

pub use opaque::Blob;

use crate::archive::{InputArchive, OutputArchive};
use crate::error::Result;
use crate::path::StoragePath;

/// The five ways a type can be laid out in a storage tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// A single raw typed buffer.
    Opaque,
    /// A group with one child per field.
    Composite,
    /// An ordered run of elements.
    Sequence,
    /// A keyed collection rebuilt through insertion.
    Associative,
    /// A member of a closed class set, with a persisted discriminator.
    Polymorphic,
}

/// Writes a value at a storage path.
///
/// The trait is object safe; [`NamedValue`](crate::NamedValue) holds `&dyn Encode`.
pub trait Encode {
    /// The layout strategy of this type.
    fn strategy() -> Strategy
    where
        Self: Sized;

    /// Writes `self` at `path`, which must not exist yet.
    fn encode(&self, ar: &mut OutputArchive, path: &StoragePath) -> Result<()>;

    /// Writes a run of values as a sequence at `path`.
    ///
    /// The default is the group layout: a `count` attribute and one child per
    /// element. Opaque scalars override it with a single contiguous dataset.
    fn encode_sequence<'a, I>(items: I, ar: &mut OutputArchive, path: &StoragePath) -> Result<()>
    where
        Self: Sized + 'a,
        I: ExactSizeIterator<Item = &'a Self>,
    {
        crate::rt::encode_elements(items, ar, path)
    }
}

/// Reads a value back from a storage path.
pub trait Decode: Sized {
    /// Reads the value stored at `path`.
    fn decode(ar: &mut InputArchive, path: &StoragePath) -> Result<Self>;

    /// Reads a sequence written by [`Encode::encode_sequence`].
    fn decode_sequence(ar: &mut InputArchive, path: &StoragePath) -> Result<Vec<Self>> {
        crate::rt::decode_elements(ar, path)
    }
}
