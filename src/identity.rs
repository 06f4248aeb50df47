//! Object identity tracking.
//!
//! An [`ObjectKey`] names one logical object for the lifetime of an output
//! session. Keys either come from the caller (an arena index, a database id) or
//! are derived from a shared pointer; in the latter case the archive keeps a clone
//! of the pointer alive until it closes, so the allocation cannot be freed and its
//! address reused by another object mid-session.

use crate::path::StoragePath;
use std::any::Any;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

/// A stable identity for one logical object within an output session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey(u64);

impl ObjectKey {
    /// A caller-supplied identity.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The identity of the allocation behind an `Rc`.
    pub fn of_rc<T: ?Sized>(rc: &Rc<T>) -> Self {
        Self(Rc::as_ptr(rc).cast::<()>() as usize as u64)
    }

    /// The identity of the allocation behind an `Arc`.
    pub fn of_arc<T: ?Sized>(arc: &Arc<T>) -> Self {
        Self(Arc::as_ptr(arc).cast::<()>() as usize as u64)
    }

    /// The raw value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// Where an object was first written and how often it has been submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectIdentityRecord {
    /// Path of the one full encoding.
    pub path: StoragePath,
    /// Session-local object number, stored as the `object` attribute.
    pub object: u64,
    /// Number of submissions: 1 after the first write, +1 per alias.
    pub references: u64,
}

/// Per-session table of tracked objects.
#[derive(Default)]
pub(crate) struct IdentityTable {
    records: HashMap<ObjectKey, ObjectIdentityRecord>,
    retained: Vec<Box<dyn Any>>,
    next_object: u64,
}

impl IdentityTable {
    pub(crate) fn get(&self, key: ObjectKey) -> Option<&ObjectIdentityRecord> {
        self.records.get(&key)
    }

    /// Counts one more submission of a known object and returns its path.
    pub(crate) fn alias(&mut self, key: ObjectKey) -> Option<StoragePath> {
        let record = self.records.get_mut(&key)?;
        record.references += 1;
        Some(record.path.clone())
    }

    /// Records the first submission of `key` and returns its object number.
    pub(crate) fn register(
        &mut self,
        key: ObjectKey,
        path: StoragePath,
        keep_alive: Option<Box<dyn Any>>,
    ) -> u64 {
        let object = self.next_object;
        self.next_object += 1;
        self.records.insert(
            key,
            ObjectIdentityRecord {
                path,
                object,
                references: 1,
            },
        );
        if let Some(handle) = keep_alive {
            self.retained.push(handle);
        }
        object
    }

    /// Drops the record of `key` after its first encoding failed. Any retained
    /// handle stays pinned, so the key cannot be reused by another allocation.
    pub(crate) fn forget(&mut self, key: ObjectKey) {
        self.records.remove(&key);
    }

    pub(crate) fn records(&self) -> impl Iterator<Item = (&ObjectKey, &ObjectIdentityRecord)> {
        self.records.iter()
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }
}

impl std::fmt::Debug for IdentityTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityTable")
            .field("records", &self.records)
            .field("retained", &self.retained.len())
            .finish()
    }
}
