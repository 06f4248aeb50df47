use super::{ArchiveOptions, NamedValue, WriteStatistics};
use crate::attribute::ToAttribute;
use crate::backend::{LinkKind, MemoryBackend, StorageBackend};
use crate::class::{Polymorphic, Tracking};
use crate::codec::Encode;
use crate::constants::{
    ARCHIVE_MARKER, ARCHIVE_MARKER_ATTRIBUTE, FORMAT_VERSION, FORMAT_VERSION_ATTRIBUTE,
    OBJECT_ATTRIBUTE,
};
use crate::element::RawBuffer;
use crate::error::{ArchiveError, Result};
use crate::identity::{IdentityTable, ObjectIdentityRecord, ObjectKey};
use crate::path::StoragePath;
use crate::rt;
use std::any::Any;
use tracing::{debug, trace, warn};

/// Configures and opens an [`OutputArchive`].
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputArchiveBuilder {
    options: ArchiveOptions,
}

impl OutputArchiveBuilder {
    /// Link kind for tracked re-references.
    pub fn link_kind(mut self, kind: LinkKind) -> Self {
        self.options.link_kind = kind;
        self
    }

    /// Whether sequences of opaque scalars collapse into one dataset.
    pub fn contiguous_sequences(mut self, enable: bool) -> Self {
        self.options.contiguous_sequences = enable;
        self
    }

    /// Opens an archive over `backend`.
    pub fn open<B: StorageBackend + 'static>(self, backend: B) -> Result<OutputArchive> {
        self.open_boxed(Box::new(backend))
    }

    /// Opens an archive over an already boxed backend.
    ///
    /// # Errors
    /// Returns `ReadOnly` when the backend refuses writes.
    pub fn open_boxed(self, mut backend: Box<dyn StorageBackend>) -> Result<OutputArchive> {
        if !backend.mode().is_writable() {
            return Err(ArchiveError::ReadOnly);
        }
        let root = StoragePath::root();
        if !backend.attribute_exists(&root, ARCHIVE_MARKER_ATTRIBUTE) {
            backend.write_attribute(&root, ARCHIVE_MARKER_ATTRIBUTE, ARCHIVE_MARKER.to_attribute())?;
            backend.write_attribute(&root, FORMAT_VERSION_ATTRIBUTE, FORMAT_VERSION.to_attribute())?;
        }
        debug!(mode = ?backend.mode(), options = ?self.options, "opened output archive");
        Ok(OutputArchive {
            backend,
            options: self.options,
            identities: IdentityTable::default(),
            statistics: WriteStatistics::default(),
        })
    }
}

/// Writes named values into a storage backend it exclusively owns.
///
/// The backend is flushed and released by [`OutputArchive::close`], or on drop
/// (errors during a drop-time flush are logged, not returned). A failure part-way
/// through a value leaves whatever was already written in place.
///
/// ```rust
/// use arbor::{InputArchive, MemoryBackend, OutputArchive};
///
/// let mut out = OutputArchive::open(MemoryBackend::new())?;
/// out.write("/t", &(1i32, -1.0f64, String::from("test string")))?;
/// let backend = out.close()?;
///
/// let mut input = InputArchive::open_boxed(backend)?;
/// let t: (i32, f64, String) = input.read("/t")?;
/// assert_eq!(t.2, "test string");
/// # Ok::<(), arbor::ArchiveError>(())
/// ```
#[derive(Debug)]
pub struct OutputArchive {
    backend: Box<dyn StorageBackend>,
    options: ArchiveOptions,
    identities: IdentityTable,
    statistics: WriteStatistics,
}

impl OutputArchive {
    /// Returns a builder for configuring session options.
    pub fn builder() -> OutputArchiveBuilder {
        OutputArchiveBuilder::default()
    }

    /// Opens an archive with default options.
    pub fn open<B: StorageBackend + 'static>(backend: B) -> Result<Self> {
        Self::builder().open(backend)
    }

    /// Opens an archive over an already boxed backend with default options.
    pub fn open_boxed(backend: Box<dyn StorageBackend>) -> Result<Self> {
        Self::builder().open_boxed(backend)
    }

    // --- Public surface ---

    /// Writes `value` under the absolute path `name`.
    ///
    /// Identity tracking applies to `Rc<T>`/`Arc<T>` values and to
    /// [`write_tracked`](Self::write_tracked). A `Tracking::Always` class passed
    /// here by plain reference is encoded in full on every call.
    ///
    /// # Errors
    /// - `InvalidPath` when `name` is not absolute or names the root.
    /// - `AlreadyExists` when something is already stored under `name`.
    /// - Any error raised by the value's codec or the backend.
    pub fn write<T: Encode + ?Sized>(&mut self, name: &str, value: &T) -> Result<()> {
        let path = self.vacant_path(name)?;
        debug!(path = %path, "writing value");
        value.encode(self, &path)
    }

    /// Writes each named value in order, stopping at the first failure.
    pub fn write_many(&mut self, values: &[NamedValue<'_>]) -> Result<()> {
        for named in values {
            self.write(named.name, named.value)?;
        }
        Ok(())
    }

    /// Writes a polymorphic value under a caller-supplied identity.
    ///
    /// Equivalent to writing through a shared pointer, but keyed by `key` (an
    /// arena index, a database id) instead of an allocation address.
    pub fn write_tracked<P: Polymorphic>(&mut self, name: &str, key: ObjectKey, value: &P) -> Result<()> {
        let path = self.vacant_path(name)?;
        self.encode_identified(&path, key, value, None)
    }

    /// Attaches an attribute to the group or dataset at `name`.
    pub fn write_attribute<A: ToAttribute + ?Sized>(
        &mut self,
        name: &str,
        attribute: &str,
        value: &A,
    ) -> Result<()> {
        let path = StoragePath::parse(name)?;
        self.write_attribute_at(&path, attribute, value)
    }

    /// Returns true if something is stored under `name`. Never fails: an invalid
    /// path is simply absent.
    pub fn contains(&self, name: &str) -> bool {
        StoragePath::parse(name).is_ok_and(|path| self.backend().entry_kind(&path).is_some())
    }

    /// The identity record of a tracked object, if it was written this session.
    pub fn identity_record(&self, key: ObjectKey) -> Option<&ObjectIdentityRecord> {
        self.identities.get(key)
    }

    /// All identity records of this session.
    pub fn identity_records(&self) -> impl Iterator<Item = (&ObjectKey, &ObjectIdentityRecord)> {
        self.identities.records()
    }

    /// Storage operations issued so far.
    pub fn statistics(&self) -> WriteStatistics {
        self.statistics
    }

    /// Session options.
    pub fn options(&self) -> &ArchiveOptions {
        &self.options
    }

    /// Read access to the backend.
    pub fn backend(&self) -> &dyn StorageBackend {
        &*self.backend
    }

    /// Flushes and releases the backend, returning it to the caller.
    pub fn close(mut self) -> Result<Box<dyn StorageBackend>> {
        self.backend.flush()?;
        let backend = std::mem::replace(&mut self.backend, Box::new(MemoryBackend::new()));
        debug!(
            objects = self.identities.len(),
            statistics = ?self.statistics,
            "closed output archive"
        );
        Ok(backend)
    }

    // --- Codec surface ---

    /// Encodes `value` at an explicit path. Used by hand-written codecs.
    pub fn encode_at<T: Encode + ?Sized>(&mut self, path: &StoragePath, value: &T) -> Result<()> {
        value.encode(self, path)
    }

    /// Creates a group (and its ancestors).
    pub fn create_group(&mut self, path: &StoragePath) -> Result<()> {
        self.backend_mut().create_group(path)?;
        self.statistics.groups += 1;
        Ok(())
    }

    /// Writes a raw dataset.
    pub fn write_dataset(&mut self, path: &StoragePath, data: RawBuffer) -> Result<()> {
        trace!(path = %path, element = %data.element_type(), count = data.count(), "dataset");
        self.backend_mut().write_dataset(path, data)?;
        self.statistics.datasets += 1;
        Ok(())
    }

    /// Attaches an attribute at an explicit path.
    pub fn write_attribute_at<A: ToAttribute + ?Sized>(
        &mut self,
        path: &StoragePath,
        attribute: &str,
        value: &A,
    ) -> Result<()> {
        self.backend_mut()
            .write_attribute(path, attribute, value.to_attribute())?;
        self.statistics.attributes += 1;
        Ok(())
    }

    /// Creates `new` as an alias of `existing`.
    pub fn link(&mut self, existing: &StoragePath, new: &StoragePath, kind: LinkKind) -> Result<()> {
        debug!(from = %new, to = %existing, kind = ?kind, "creating link");
        self.backend_mut().create_link(existing, new, kind)?;
        self.statistics.links += 1;
        Ok(())
    }

    /// Writes a polymorphic value under `key`, honoring its class tracking policy.
    ///
    /// Under `Tracking::Always` the first submission is encoded and recorded;
    /// later ones only create a link to the first path. Under `Tracking::Never`
    /// every submission is encoded in full. `keep_alive` is retained for the rest
    /// of the session when the object is recorded.
    pub fn encode_identified<P: Polymorphic>(
        &mut self,
        path: &StoragePath,
        key: ObjectKey,
        value: &P,
        keep_alive: Option<Box<dyn Any>>,
    ) -> Result<()> {
        if value.class().tracking() == Tracking::Never {
            return rt::encode_polymorphic(value, self, path);
        }

        if let Some(original) = self.identities.alias(key) {
            trace!(key = key.as_u64(), original = %original, "tracked object seen again");
            let kind = self.options.link_kind;
            return self.link(&original, path, kind);
        }

        let object = self.identities.register(key, path.clone(), keep_alive);
        let written = rt::encode_polymorphic(value, self, path)
            .and_then(|()| self.write_attribute_at(path, OBJECT_ATTRIBUTE, &object));
        if written.is_err() {
            // The partial encoding at `path` must not become a link target.
            self.identities.forget(key);
        }
        written
    }

    // --- Internals ---

    fn backend_mut(&mut self) -> &mut dyn StorageBackend {
        &mut *self.backend
    }

    fn vacant_path(&self, name: &str) -> Result<StoragePath> {
        let path = StoragePath::parse(name)?;
        if path.is_root() {
            return Err(ArchiveError::InvalidPath {
                path: name.to_string(),
                reason: "values cannot be written at the root".into(),
            });
        }
        if self.backend().entry_kind(&path).is_some() {
            return Err(ArchiveError::AlreadyExists(path.to_string()));
        }
        Ok(path)
    }
}

impl Drop for OutputArchive {
    fn drop(&mut self) {
        if let Err(e) = self.backend.flush() {
            warn!(error = %e, "failed to flush output archive on drop");
        }
    }
}
