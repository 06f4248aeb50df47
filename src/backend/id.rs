use serde::{Deserialize, Serialize};
use std::fmt;

/// A strong type representing a node in the storage arena.
/// Hard links are two names holding the same `NodeId`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(u32); // u32 is sufficient for 4 billion nodes per tree.

impl NodeId {
    /// The root group always occupies slot zero.
    pub const ROOT: Self = Self(0);

    /// Creates a new NodeId.
    /// Restrict visibility to the backend module to prevent arbitrary creation.
    pub(crate) fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw numeric value.
    pub fn as_u32(&self) -> u32 {
        self.0
    }

    pub(crate) fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
