#![allow(missing_docs)]

use arbor::{
    ArchiveError, Class, ClassMetadata, EntryKind, InfoMode, InputArchive, LinkKind,
    MemoryBackend, ObjectKey, OutputArchive, StorageBackend, StoragePath, Tracking,
};
use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;

// --- TEST DOUBLES ---

/// Counts how often its save hook actually ran.
#[derive(Debug)]
struct Advanced {
    value: i32,
    saves: Cell<u32>,
}

impl Advanced {
    fn new(value: i32) -> Self {
        Self {
            value,
            saves: Cell::new(0),
        }
    }
}

impl PartialEq for Advanced {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Class for Advanced {
    const CLASS: ClassMetadata = ClassMetadata::new("Advanced")
        .with_version(2)
        .with_tracking(Tracking::Always);

    fn save(&self, ar: &mut OutputArchive, path: &StoragePath, _version: u32) -> arbor::Result<()> {
        self.saves.set(self.saves.get() + 1);
        ar.encode_at(&path.index(0), &self.value)
    }

    fn load(ar: &mut InputArchive, path: &StoragePath, _version: u32) -> arbor::Result<Self> {
        Ok(Self::new(ar.decode_at(&path.index(0))?))
    }
}

#[derive(Debug)]
struct Basic {
    label: String,
    saves: Cell<u32>,
}

impl Class for Basic {
    const CLASS: ClassMetadata = ClassMetadata::new("Basic").with_tracking(Tracking::Never);

    fn save(&self, ar: &mut OutputArchive, path: &StoragePath, _version: u32) -> arbor::Result<()> {
        self.saves.set(self.saves.get() + 1);
        ar.encode_at(&path.index(0), &self.label)
    }

    fn load(ar: &mut InputArchive, path: &StoragePath, _version: u32) -> arbor::Result<Self> {
        Ok(Self {
            label: ar.decode_at(&path.index(0))?,
            saves: Cell::new(0),
        })
    }
}

/// Remembers the version its load hook was handed.
#[derive(Debug)]
struct Versioned {
    seen_version: u32,
}

impl Class for Versioned {
    const CLASS: ClassMetadata = ClassMetadata::new("Versioned").with_version(7);

    fn save(&self, _ar: &mut OutputArchive, _path: &StoragePath, _version: u32) -> arbor::Result<()> {
        Ok(())
    }

    fn load(_ar: &mut InputArchive, _path: &StoragePath, version: u32) -> arbor::Result<Self> {
        Ok(Self {
            seen_version: version,
        })
    }
}

#[derive(Debug)]
struct Quiet {
    seen_version: u32,
}

impl Class for Quiet {
    const CLASS: ClassMetadata = ClassMetadata::new("Quiet")
        .with_version(7)
        .with_info(InfoMode::NoInfo);

    fn save(&self, _ar: &mut OutputArchive, _path: &StoragePath, version: u32) -> arbor::Result<()> {
        assert_eq!(version, 7, "writers always see the declared version");
        Ok(())
    }

    fn load(_ar: &mut InputArchive, _path: &StoragePath, version: u32) -> arbor::Result<Self> {
        Ok(Self {
            seen_version: version,
        })
    }
}

/// A tracked class whose first save collides with itself.
#[derive(Debug)]
struct Flaky {
    value: i32,
    fail_next: Cell<bool>,
}

impl Class for Flaky {
    const CLASS: ClassMetadata = ClassMetadata::new("Flaky").with_tracking(Tracking::Always);

    fn save(&self, ar: &mut OutputArchive, path: &StoragePath, _version: u32) -> arbor::Result<()> {
        ar.encode_at(&path.index(0), &self.value)?;
        if self.fail_next.replace(false) {
            ar.encode_at(&path.index(0), &self.value)?;
        }
        Ok(())
    }

    fn load(ar: &mut InputArchive, path: &StoragePath, _version: u32) -> arbor::Result<Self> {
        Ok(Self {
            value: ar.decode_at(&path.index(0))?,
            fail_next: Cell::new(false),
        })
    }
}

arbor::impl_polymorphic!(Advanced, Basic, Versioned, Quiet, Flaky);

fn path(s: &str) -> StoragePath {
    StoragePath::parse(s).unwrap()
}

// --- TRACKING ---

/// `Always`: one encode, one link, two readable names.
#[test]
fn test_always_tracked_object_is_written_once() -> arbor::Result<()> {
    let shared = Rc::new(Advanced::new(11));
    let mut out = OutputArchive::open(MemoryBackend::new())?;
    out.write("/a", &shared)?;
    out.write("/b", &shared)?;

    assert_eq!(shared.saves.get(), 1);
    let stats = out.statistics();
    assert_eq!(stats.datasets, 1);
    assert_eq!(stats.links, 1);

    let record = out.identity_record(ObjectKey::of_rc(&shared)).unwrap();
    assert_eq!(record.path, path("/a"));
    assert_eq!(record.references, 2);
    assert_eq!(
        out.backend().entry_kind(&path("/b")),
        Some(EntryKind::SoftLink(path("/a")))
    );

    let mut input = InputArchive::open_boxed(out.close()?)?;
    let a: Rc<Advanced> = input.read("/a")?;
    let b: Rc<Advanced> = input.read("/b")?;
    assert_eq!(*a, *shared);
    assert!(Rc::ptr_eq(&a, &b), "aliases decode to one shared object");
    Ok(())
}

/// A failed first encode leaves nothing to link to: the next submission of the
/// same object is encoded in full.
#[test]
fn test_failed_first_write_is_not_an_alias_target() -> arbor::Result<()> {
    let shared = Rc::new(Flaky {
        value: 4,
        fail_next: Cell::new(true),
    });
    let mut out = OutputArchive::open(MemoryBackend::new())?;
    let err = out.write("/a", &shared).unwrap_err();
    assert!(matches!(err, ArchiveError::AlreadyExists(_)), "{err}");
    assert!(out.identity_record(ObjectKey::of_rc(&shared)).is_none());

    out.write("/b", &shared)?;
    assert_eq!(out.statistics().links, 0);
    let record = out.identity_record(ObjectKey::of_rc(&shared)).unwrap();
    assert_eq!(record.path, path("/b"));
    assert_eq!(record.references, 1);

    out.write("/c", &shared)?;
    assert_eq!(
        out.backend().entry_kind(&path("/c")),
        Some(EntryKind::SoftLink(path("/b")))
    );

    let mut input = InputArchive::open_boxed(out.close()?)?;
    let b: Rc<Flaky> = input.read("/b")?;
    let c: Rc<Flaky> = input.read("/c")?;
    assert_eq!(b.value, 4);
    assert!(Rc::ptr_eq(&b, &c));
    Ok(())
}

/// `Never`: every submission is a full, independent encode.
#[test]
fn test_never_tracked_object_is_written_each_time() -> arbor::Result<()> {
    let shared = Rc::new(Basic {
        label: "plain".into(),
        saves: Cell::new(0),
    });
    let mut out = OutputArchive::open(MemoryBackend::new())?;
    out.write("/a", &shared)?;
    out.write("/b", &shared)?;

    assert_eq!(shared.saves.get(), 2);
    assert_eq!(out.statistics().links, 0);
    assert!(out.identity_record(ObjectKey::of_rc(&shared)).is_none());
    assert!(out.backend().dataset_exists(&path("/b/0")));

    let mut input = InputArchive::open_boxed(out.close()?)?;
    let a: Rc<Basic> = input.read("/a")?;
    let b: Rc<Basic> = input.read("/b")?;
    assert_eq!(a.label, b.label);
    assert!(!Rc::ptr_eq(&a, &b));
    Ok(())
}

#[test]
fn test_hard_links_share_the_node() -> arbor::Result<()> {
    let shared = Arc::new(Advanced::new(3));
    let mut out = OutputArchive::builder()
        .link_kind(LinkKind::Hard)
        .open(MemoryBackend::new())?;
    out.write("/first", &shared)?;
    out.write("/again/second", &shared)?;

    assert_eq!(shared.saves.get(), 1);
    let backend = out.backend();
    assert!(backend.group_exists(&path("/again/second")));
    assert_eq!(
        backend.node_address(&path("/first")),
        backend.node_address(&path("/again/second"))
    );

    let mut input = InputArchive::open_boxed(out.close()?)?;
    let first: Arc<Advanced> = input.read("/first")?;
    let second: Arc<Advanced> = input.read("/again/second")?;
    assert!(Arc::ptr_eq(&first, &second));
    Ok(())
}

#[test]
fn test_write_tracked_uses_caller_keys() -> arbor::Result<()> {
    let key = ObjectKey::new(42);
    let value = Advanced::new(-8);
    let mut out = OutputArchive::open(MemoryBackend::new())?;
    out.write_tracked("/objects/0", key, &value)?;
    out.write_tracked("/objects/1", key, &value)?;
    out.write_tracked("/objects/2", ObjectKey::new(43), &value)?;

    assert_eq!(value.saves.get(), 2);
    assert_eq!(out.identity_record(key).unwrap().references, 2);
    assert_eq!(out.identity_records().count(), 2);

    let mut input = InputArchive::open_boxed(out.close()?)?;
    let aliased: Rc<Advanced> = input.read("/objects/1")?;
    assert_eq!(aliased.value, -8);
    Ok(())
}

// --- VERSIONS ---

#[test]
fn test_recorded_version_reaches_load() -> arbor::Result<()> {
    let mut out = OutputArchive::open(MemoryBackend::new())?;
    out.write("/versioned", &Versioned { seen_version: 0 })?;
    out.write("/quiet", &Quiet { seen_version: 0 })?;

    let mut input = InputArchive::open_boxed(out.close()?)?;
    assert_eq!(input.recorded_class("/versioned")?, "Versioned");
    assert_eq!(input.recorded_version("/versioned")?, 7);
    assert_eq!(input.recorded_version("/quiet")?, 0);
    assert!(!input.backend().attribute_exists(&path("/quiet"), "version"));

    assert_eq!(input.read::<Versioned>("/versioned")?.seen_version, 7);
    assert_eq!(input.read::<Quiet>("/quiet")?.seen_version, 0);
    Ok(())
}

// --- DISPATCH ERRORS ---

#[test]
fn test_unknown_class_is_reported() -> arbor::Result<()> {
    let mut out = OutputArchive::open(MemoryBackend::new())?;
    out.write("/x", &Rc::new(Advanced::new(1)))?;
    out.write("/y", &5u8)?;

    let mut input = InputArchive::open_boxed(out.close()?)?;
    match input.read::<Rc<Basic>>("/x") {
        Err(ArchiveError::UnknownConcreteType { class, .. }) => assert_eq!(class, "Advanced"),
        other => panic!("expected UnknownConcreteType, got {other:?}"),
    }
    // Siblings stay readable after a failed read.
    assert_eq!(input.read::<u8>("/y")?, 5);
    assert_eq!(input.read::<Rc<Advanced>>("/x")?.value, 1);
    Ok(())
}

#[test]
fn test_missing_discriminator_is_malformed() -> arbor::Result<()> {
    let mut out = OutputArchive::open(MemoryBackend::new())?;
    out.write("/plain", &(1i32,))?;

    let mut input = InputArchive::open_boxed(out.close()?)?;
    let err = input.read::<Advanced>("/plain").unwrap_err();
    assert!(matches!(err, ArchiveError::MalformedLayout { .. }), "{err}");
    Ok(())
}
