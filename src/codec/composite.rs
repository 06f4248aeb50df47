//! Composite codecs: a group with one child per field, named by position.

use super::{Decode, Encode, Strategy};
use crate::archive::{InputArchive, OutputArchive};
use crate::error::Result;
use crate::path::StoragePath;
use crate::rt;

impl Encode for () {
    fn strategy() -> Strategy {
        Strategy::Composite
    }

    fn encode(&self, ar: &mut OutputArchive, path: &StoragePath) -> Result<()> {
        rt::begin_composite(ar, path)
    }
}

impl Decode for () {
    fn decode(ar: &mut InputArchive, path: &StoragePath) -> Result<Self> {
        rt::open_composite(ar, path)
    }
}

macro_rules! impl_tuple_codec {
    ($(($($idx:tt $name:ident),+)),+ $(,)?) => {
        $(
            impl<$($name: Encode),+> Encode for ($($name,)+) {
                fn strategy() -> Strategy {
                    Strategy::Composite
                }

                fn encode(&self, ar: &mut OutputArchive, path: &StoragePath) -> Result<()> {
                    rt::begin_composite(ar, path)?;
                    $( rt::encode_field(ar, path, $idx, &self.$idx)?; )+
                    Ok(())
                }
            }

            impl<$($name: Decode),+> Decode for ($($name,)+) {
                fn decode(ar: &mut InputArchive, path: &StoragePath) -> Result<Self> {
                    rt::open_composite(ar, path)?;
                    Ok(($( rt::decode_field::<$name>(ar, path, $idx)?, )+))
                }
            }
        )+
    };
}

impl_tuple_codec!(
    (0 A),
    (0 A, 1 B),
    (0 A, 1 B, 2 C),
    (0 A, 1 B, 2 C, 3 D),
    (0 A, 1 B, 2 C, 3 D, 4 E),
    (0 A, 1 B, 2 C, 3 D, 4 E, 5 F),
    (0 A, 1 B, 2 C, 3 D, 4 E, 5 F, 6 G),
    (0 A, 1 B, 2 C, 3 D, 4 E, 5 F, 6 G, 7 H),
    (0 A, 1 B, 2 C, 3 D, 4 E, 5 F, 6 G, 7 H, 8 I),
    (0 A, 1 B, 2 C, 3 D, 4 E, 5 F, 6 G, 7 H, 8 I, 9 J),
    (0 A, 1 B, 2 C, 3 D, 4 E, 5 F, 6 G, 7 H, 8 I, 9 J, 10 K),
    (0 A, 1 B, 2 C, 3 D, 4 E, 5 F, 6 G, 7 H, 8 I, 9 J, 10 K, 11 L),
);

// Boxes are transparent: the pointee is stored in place.
impl<T: Encode> Encode for Box<T> {
    fn strategy() -> Strategy {
        T::strategy()
    }

    fn encode(&self, ar: &mut OutputArchive, path: &StoragePath) -> Result<()> {
        (**self).encode(ar, path)
    }
}

impl<T: Decode> Decode for Box<T> {
    fn decode(ar: &mut InputArchive, path: &StoragePath) -> Result<Self> {
        T::decode(ar, path).map(Box::new)
    }
}
