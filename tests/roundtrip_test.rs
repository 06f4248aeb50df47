#![allow(missing_docs)]

use arbor::{
    Blob, ElementType, EntryKind, InputArchive, MemoryBackend, OutputArchive, StorageBackend,
    StoragePath,
};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, LinkedList, VecDeque};

fn path(s: &str) -> StoragePath {
    StoragePath::parse(s).unwrap()
}

fn reopen(out: OutputArchive) -> arbor::Result<InputArchive> {
    InputArchive::open_boxed(out.close()?)
}

// --- LAYOUTS ---

/// A tuple is a composite: one group, one child per field.
#[test]
fn test_tuple_layout_and_roundtrip() -> arbor::Result<()> {
    let value = (1i32, -1.0f64, String::from("test string"));
    let mut out = OutputArchive::open(MemoryBackend::new())?;
    out.write("/t", &value)?;

    let backend = out.backend();
    assert!(backend.group_exists(&path("/t")));
    assert!(backend.dataset_exists(&path("/t/0")));
    assert!(backend.dataset_exists(&path("/t/1")));
    assert!(backend.dataset_exists(&path("/t/2")));
    assert_eq!(backend.children(&path("/t"))?, vec!["0", "1", "2"]);

    let mut input = reopen(out)?;
    let loaded: (i32, f64, String) = input.read("/t")?;
    assert_eq!(loaded, value);
    Ok(())
}

/// A vector of arithmetic scalars collapses into one dataset.
#[test]
fn test_scalar_vec_is_one_dataset() -> arbor::Result<()> {
    let mut out = OutputArchive::open(MemoryBackend::new())?;
    out.write("/v", &vec![0i32, 1, 2])?;

    assert_eq!(
        out.backend().entry_kind(&path("/v")),
        Some(EntryKind::Dataset {
            element_type: ElementType::I32,
            count: 3
        })
    );
    assert_eq!(out.backend().dataset_size(&path("/v"))?, 3);

    let mut input = reopen(out)?;
    assert_eq!(input.read::<Vec<i32>>("/v")?, vec![0, 1, 2]);
    Ok(())
}

/// A map is a counted group of `(key, value)` composites.
#[test]
fn test_map_layout_and_roundtrip() -> arbor::Result<()> {
    let map = BTreeMap::from([(0i32, 0i32), (1, 1)]);
    let mut out = OutputArchive::open(MemoryBackend::new())?;
    out.write("/m", &map)?;

    let backend = out.backend();
    assert!(backend.group_exists(&path("/m")));
    assert!(backend.attribute_exists(&path("/m"), "count"));
    assert!(backend.group_exists(&path("/m/0")));
    assert!(backend.group_exists(&path("/m/1")));
    assert!(backend.dataset_exists(&path("/m/1/0")));
    assert!(backend.dataset_exists(&path("/m/1/1")));

    let mut input = reopen(out)?;
    let count: u64 = input.read_attribute("/m", "count")?;
    assert_eq!(count, 2);
    assert_eq!(input.read::<BTreeMap<i32, i32>>("/m")?, map);
    Ok(())
}

/// Sequences of non-scalar elements use the counted group layout.
#[test]
fn test_nested_containers() -> arbor::Result<()> {
    let nested: Vec<Vec<(u8, String)>> = vec![
        vec![(1, "one".into()), (2, "two".into())],
        vec![],
        vec![(3, "three".into())],
    ];
    let mut out = OutputArchive::open(MemoryBackend::new())?;
    out.write("/nested", &nested)?;

    assert!(out.backend().group_exists(&path("/nested")));
    assert!(out.backend().group_exists(&path("/nested/0/1")));

    let mut input = reopen(out)?;
    assert_eq!(input.read::<Vec<Vec<(u8, String)>>>("/nested")?, nested);
    Ok(())
}

#[test]
fn test_contiguous_sequences_can_be_disabled() -> arbor::Result<()> {
    let mut out = OutputArchive::builder()
        .contiguous_sequences(false)
        .open(MemoryBackend::new())?;
    out.write("/v", &vec![0i32, 1, 2])?;

    assert!(out.backend().group_exists(&path("/v")));
    assert!(out.backend().dataset_exists(&path("/v/2")));

    let mut input = reopen(out)?;
    assert_eq!(input.read::<Vec<i32>>("/v")?, vec![0, 1, 2]);
    Ok(())
}

#[test]
fn test_bool_sequences_keep_group_layout() -> arbor::Result<()> {
    let flags = vec![true, false, true];
    let mut out = OutputArchive::open(MemoryBackend::new())?;
    out.write("/flags", &flags)?;
    assert!(out.backend().group_exists(&path("/flags")));

    let mut input = reopen(out)?;
    assert_eq!(input.read::<Vec<bool>>("/flags")?, flags);
    Ok(())
}

// --- ROUNDTRIPS ---

#[test]
fn test_standard_containers_roundtrip() -> arbor::Result<()> {
    let deque: VecDeque<u16> = (0..10).collect();
    let list: LinkedList<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
    let array = [1.5f32, 2.5, 3.5, 4.5];
    let tree_set: BTreeSet<i64> = [-3, 0, 9].into_iter().collect();
    let hash_set: HashSet<String> = ["x", "y"].iter().map(|s| s.to_string()).collect();
    let hash_map: HashMap<String, Vec<u32>> = HashMap::from([
        ("evens".to_string(), vec![0, 2, 4]),
        ("odds".to_string(), vec![1, 3]),
    ]);
    let boxed = Box::new((7u8, 'z'));
    let blob = Blob(vec![0xde, 0xad, 0xbe, 0xef]);

    let mut out = OutputArchive::open(MemoryBackend::new())?;
    out.write("/deque", &deque)?;
    out.write("/list", &list)?;
    out.write("/array", &array)?;
    out.write("/tree_set", &tree_set)?;
    out.write("/hash_set", &hash_set)?;
    out.write("/hash_map", &hash_map)?;
    out.write("/boxed", &boxed)?;
    out.write("/blob", &blob)?;
    out.write("/unit", &())?;
    out.write("/text", "plain str")?;
    out.write("/slice", &[9u64, 8, 7][..])?;

    let mut input = reopen(out)?;
    assert_eq!(input.read::<VecDeque<u16>>("/deque")?, deque);
    assert_eq!(input.read::<LinkedList<String>>("/list")?, list);
    assert_eq!(input.read::<[f32; 4]>("/array")?, array);
    assert_eq!(input.read::<BTreeSet<i64>>("/tree_set")?, tree_set);
    assert_eq!(input.read::<HashSet<String>>("/hash_set")?, hash_set);
    assert_eq!(input.read::<HashMap<String, Vec<u32>>>("/hash_map")?, hash_map);
    assert_eq!(input.read::<Box<(u8, char)>>("/boxed")?, boxed);
    assert_eq!(input.read::<Blob>("/blob")?, blob);
    input.read::<()>("/unit")?;
    assert_eq!(input.read::<String>("/text")?, "plain str");
    assert_eq!(input.read::<Vec<u64>>("/slice")?, vec![9, 8, 7]);
    Ok(())
}

#[test]
fn test_scalar_edge_values() -> arbor::Result<()> {
    let mut out = OutputArchive::open(MemoryBackend::new())?;
    out.write("/min", &i128::MIN)?;
    out.write("/max", &u128::MAX)?;
    out.write("/nan", &f64::NAN)?;
    out.write("/char", &'\u{1F332}')?;
    out.write("/size", &usize::MAX)?;
    out.write("/empty", &String::new())?;

    let mut input = reopen(out)?;
    assert_eq!(input.read::<i128>("/min")?, i128::MIN);
    assert_eq!(input.read::<u128>("/max")?, u128::MAX);
    assert!(input.read::<f64>("/nan")?.is_nan());
    assert_eq!(input.read::<char>("/char")?, '\u{1F332}');
    assert_eq!(input.read::<usize>("/size")?, usize::MAX);
    assert_eq!(input.read::<String>("/empty")?, "");
    Ok(())
}

#[test]
fn test_nested_names_create_intermediate_groups() -> arbor::Result<()> {
    let mut out = OutputArchive::open(MemoryBackend::new())?;
    out.write("/runs/7/temperature", &21.5f32)?;
    assert!(out.backend().group_exists(&path("/runs/7")));
    assert!(out.contains("/runs"));
    assert!(!out.contains("/runs/8"));

    let mut input = reopen(out)?;
    assert_eq!(input.read::<f32>("/runs/7/temperature")?, 21.5);
    Ok(())
}

#[test]
fn test_write_many_and_statistics() -> arbor::Result<()> {
    let id = 5u32;
    let label = String::from("five");
    let mut out = OutputArchive::open(MemoryBackend::new())?;
    out.write_many(&[
        arbor::NamedValue::new("/id", &id),
        arbor::NamedValue::new("/label", &label),
    ])?;
    out.write_attribute("/id", "unit", "count")?;

    let stats = out.statistics();
    assert_eq!(stats.datasets, 2);
    assert_eq!(stats.attributes, 1);
    assert_eq!(stats.links, 0);

    let input = reopen(out)?;
    assert_eq!(input.read_attribute::<String>("/id", "unit")?, "count");
    assert_eq!(input.format_version(), arbor::constants::FORMAT_VERSION);
    Ok(())
}
