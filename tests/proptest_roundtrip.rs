#![allow(missing_docs)]

use arbor::{InputArchive, MemoryBackend, OutputArchive};
use proptest::prelude::*;
use std::collections::{BTreeMap, HashSet};

fn roundtrip<T>(value: &T, contiguous: bool) -> arbor::Result<T>
where
    T: arbor::Encode + arbor::Decode,
{
    let mut out = OutputArchive::builder()
        .contiguous_sequences(contiguous)
        .open(MemoryBackend::new())?;
    out.write("/value", value)?;
    let mut input = InputArchive::open_boxed(out.close()?)?;
    input.read("/value")
}

proptest! {
    #[test]
    fn scalar_vectors_survive_either_layout(values in prop::collection::vec(any::<i64>(), 0..64), contiguous in any::<bool>()) {
        prop_assert_eq!(roundtrip(&values, contiguous).unwrap(), values);
    }

    #[test]
    fn strings_survive(text in ".*") {
        prop_assert_eq!(roundtrip(&text, true).unwrap(), text);
    }

    #[test]
    fn maps_survive(map in prop::collection::btree_map(any::<u16>(), ".{0,8}", 0..16)) {
        let loaded: BTreeMap<u16, String> = roundtrip(&map, true).unwrap();
        prop_assert_eq!(loaded, map);
    }

    #[test]
    fn sets_of_tuples_survive(set in prop::collection::hash_set((any::<u8>(), any::<bool>()), 0..16)) {
        let loaded: HashSet<(u8, bool)> = roundtrip(&set, true).unwrap();
        prop_assert_eq!(loaded, set);
    }

    #[test]
    fn nested_sequences_survive(nested in prop::collection::vec(prop::collection::vec(any::<f32>().prop_filter("finite", |f| f.is_finite()), 0..8), 0..8)) {
        prop_assert_eq!(roundtrip(&nested, true).unwrap(), nested);
    }

    #[test]
    fn invalid_names_never_write(name in "[a-z][a-z/]{0,12}") {
        let mut out = OutputArchive::open(MemoryBackend::new()).unwrap();
        prop_assert!(out.write(&name, &1u8).is_err());
        prop_assert_eq!(out.statistics().datasets, 0);
    }
}
