//! Associative codecs: a counted group of keys (sets) or key/value composites
//! (maps). Decoding rebuilds the container through insertion, so iteration order
//! on disk carries no meaning.

use super::{Decode, Encode, Strategy};
use crate::archive::{InputArchive, OutputArchive};
use crate::error::Result;
use crate::path::StoragePath;
use crate::rt;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::hash::{BuildHasher, Hash};

impl<K: Encode> Encode for BTreeSet<K> {
    fn strategy() -> Strategy {
        Strategy::Associative
    }

    fn encode(&self, ar: &mut OutputArchive, path: &StoragePath) -> Result<()> {
        rt::begin_collection(ar, path, self.len())?;
        for (index, key) in self.iter().enumerate() {
            rt::encode_field(ar, path, index, key)?;
        }
        Ok(())
    }
}

impl<K: Decode + Ord> Decode for BTreeSet<K> {
    fn decode(ar: &mut InputArchive, path: &StoragePath) -> Result<Self> {
        let count = rt::open_collection(ar, path)?;
        let mut set = BTreeSet::new();
        for index in 0..count {
            set.insert(rt::decode_field::<K>(ar, path, index)?);
        }
        Ok(set)
    }
}

impl<K: Encode, S> Encode for HashSet<K, S> {
    fn strategy() -> Strategy {
        Strategy::Associative
    }

    fn encode(&self, ar: &mut OutputArchive, path: &StoragePath) -> Result<()> {
        rt::begin_collection(ar, path, self.len())?;
        for (index, key) in self.iter().enumerate() {
            rt::encode_field(ar, path, index, key)?;
        }
        Ok(())
    }
}

impl<K, S> Decode for HashSet<K, S>
where
    K: Decode + Eq + Hash,
    S: BuildHasher + Default,
{
    fn decode(ar: &mut InputArchive, path: &StoragePath) -> Result<Self> {
        let count = rt::open_collection(ar, path)?;
        let mut set = HashSet::with_hasher(S::default());
        for index in 0..count {
            set.insert(rt::decode_field::<K>(ar, path, index)?);
        }
        Ok(set)
    }
}

impl<K: Encode, V: Encode> Encode for BTreeMap<K, V> {
    fn strategy() -> Strategy {
        Strategy::Associative
    }

    fn encode(&self, ar: &mut OutputArchive, path: &StoragePath) -> Result<()> {
        rt::begin_collection(ar, path, self.len())?;
        for (index, (key, value)) in self.iter().enumerate() {
            rt::encode_entry(ar, &path.index(index), key, value)?;
        }
        Ok(())
    }
}

impl<K: Decode + Ord, V: Decode> Decode for BTreeMap<K, V> {
    fn decode(ar: &mut InputArchive, path: &StoragePath) -> Result<Self> {
        let count = rt::open_collection(ar, path)?;
        let mut map = BTreeMap::new();
        for index in 0..count {
            let (key, value) = rt::decode_field::<(K, V)>(ar, path, index)?;
            map.insert(key, value);
        }
        Ok(map)
    }
}

impl<K: Encode, V: Encode, S> Encode for HashMap<K, V, S> {
    fn strategy() -> Strategy {
        Strategy::Associative
    }

    fn encode(&self, ar: &mut OutputArchive, path: &StoragePath) -> Result<()> {
        rt::begin_collection(ar, path, self.len())?;
        for (index, (key, value)) in self.iter().enumerate() {
            rt::encode_entry(ar, &path.index(index), key, value)?;
        }
        Ok(())
    }
}

impl<K, V, S> Decode for HashMap<K, V, S>
where
    K: Decode + Eq + Hash,
    V: Decode,
    S: BuildHasher + Default,
{
    fn decode(ar: &mut InputArchive, path: &StoragePath) -> Result<Self> {
        let count = rt::open_collection(ar, path)?;
        let mut map = HashMap::with_hasher(S::default());
        for index in 0..count {
            let (key, value) = rt::decode_field::<(K, V)>(ar, path, index)?;
            map.insert(key, value);
        }
        Ok(map)
    }
}
