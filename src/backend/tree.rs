//! The arena tree behind both shipped backends.
//!
//! Nodes live in a flat `Vec` indexed by [`NodeId`]; groups map child names to
//! ids. A hard link is simply a second name for an id, so the structure is a
//! graph rather than a tree and may even contain cycles (a hard link to `/`).
//! Soft links are nodes holding a target path, resolved on every lookup with a
//! bounded depth.

use super::id::NodeId;
use super::{EntryKind, LinkKind};
use crate::constants::MAX_SOFT_LINK_DEPTH;
use crate::element::RawBuffer;
use crate::error::{ArchiveError, Result};
use crate::path::StoragePath;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What a node stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) enum NodeKind {
    Group(BTreeMap<String, NodeId>),
    Dataset(RawBuffer),
    SoftLink(StoragePath),
}

/// A single node: its payload plus the attributes attached to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Node {
    kind: NodeKind,
    attributes: BTreeMap<String, RawBuffer>,
}

impl Node {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            attributes: BTreeMap::new(),
        }
    }
}

/// The arena holding an entire storage tree. Slot zero is the root group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeTree {
    nodes: Vec<Node>,
}

impl NodeTree {
    /// Creates a tree holding only the empty root group.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::new(NodeKind::Group(BTreeMap::new()))],
        }
    }

    /// Number of nodes in the arena, the root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the tree holds nothing but an empty root.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
            && self.nodes.first().is_some_and(|root| {
                root.attributes.is_empty()
                    && matches!(&root.kind, NodeKind::Group(children) if children.is_empty())
            })
    }

    /// Checks the structural invariants of a tree decoded from an untrusted image.
    pub fn verify(&self) -> Result<()> {
        match self.nodes.first() {
            Some(Node {
                kind: NodeKind::Group(_),
                ..
            }) => {}
            _ => return Err(ArchiveError::Format("root node is not a group".into())),
        }
        for (index, node) in self.nodes.iter().enumerate() {
            if let NodeKind::Group(children) = &node.kind
                && let Some((name, id)) = children.iter().find(|(_, id)| id.index() >= self.nodes.len())
            {
                return Err(ArchiveError::Format(format!(
                    "node #{index} child '{name}' points at missing node {id}"
                )));
            }
            let buffers = node.attributes.values().chain(match &node.kind {
                NodeKind::Dataset(data) => Some(data),
                _ => None,
            });
            for buffer in buffers {
                RawBuffer::new(buffer.element_type(), buffer.count(), buffer.bytes().to_vec())
                    .map_err(|e| ArchiveError::Format(format!("node #{index}: {e}")))?;
            }
        }
        Ok(())
    }

    // --- Lookup ---

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(id.index())
            .ok_or_else(|| ArchiveError::Format(format!("dangling node id {id}")))
    }

    fn child_of(&self, group: NodeId, name: &str) -> Option<NodeId> {
        match &self.node(group)?.kind {
            NodeKind::Group(children) => children.get(name).copied(),
            _ => None,
        }
    }

    fn follow(&self, id: NodeId, depth: usize) -> Option<NodeId> {
        match &self.node(id)?.kind {
            NodeKind::SoftLink(target) => self.resolve_at(target, depth + 1),
            _ => Some(id),
        }
    }

    fn resolve_at(&self, path: &StoragePath, depth: usize) -> Option<NodeId> {
        if depth > MAX_SOFT_LINK_DEPTH {
            return None;
        }
        let mut current = NodeId::ROOT;
        for component in path.components() {
            let child = self.child_of(current, component)?;
            current = self.follow(child, depth)?;
        }
        Some(current)
    }

    /// Resolves `path` to a node, following every soft link on the way.
    pub fn resolve(&self, path: &StoragePath) -> Option<NodeId> {
        self.resolve_at(path, 0)
    }

    /// Resolves the entry named by `path` without following a final soft link.
    fn entry(&self, path: &StoragePath) -> Option<NodeId> {
        match (path.parent(), path.name()) {
            (Some(parent), Some(name)) => self.child_of(self.resolve(&parent)?, name),
            _ => Some(NodeId::ROOT),
        }
    }

    fn resolved(&self, path: &StoragePath) -> Result<&Node> {
        self.resolve(path)
            .and_then(|id| self.node(id))
            .ok_or_else(|| ArchiveError::NotFound(path.to_string()))
    }

    // --- Probes ---

    /// Returns true if `path` resolves to a group.
    pub fn group_exists(&self, path: &StoragePath) -> bool {
        self.resolve(path)
            .and_then(|id| self.node(id))
            .is_some_and(|node| matches!(node.kind, NodeKind::Group(_)))
    }

    /// Returns true if `path` resolves to a dataset.
    pub fn dataset_exists(&self, path: &StoragePath) -> bool {
        self.resolve(path)
            .and_then(|id| self.node(id))
            .is_some_and(|node| matches!(node.kind, NodeKind::Dataset(_)))
    }

    /// Returns true if the node at `container` carries attribute `name`.
    pub fn attribute_exists(&self, container: &StoragePath, name: &str) -> bool {
        self.resolve(container)
            .and_then(|id| self.node(id))
            .is_some_and(|node| node.attributes.contains_key(name))
    }

    /// Describes the entry at `path` without following a final soft link.
    pub fn entry_kind(&self, path: &StoragePath) -> Option<EntryKind> {
        let node = self.node(self.entry(path)?)?;
        Some(match &node.kind {
            NodeKind::Group(_) => EntryKind::Group,
            NodeKind::Dataset(data) => EntryKind::Dataset {
                element_type: data.element_type(),
                count: data.count(),
            },
            NodeKind::SoftLink(target) => EntryKind::SoftLink(target.clone()),
        })
    }

    // --- Reads ---

    /// Clones the dataset at `path`.
    pub fn read_dataset(&self, path: &StoragePath) -> Result<RawBuffer> {
        match &self.resolved(path)?.kind {
            NodeKind::Dataset(data) => Ok(data.clone()),
            _ => Err(ArchiveError::malformed(path, "expected a dataset, found a group")),
        }
    }

    /// Clones an attribute.
    pub fn read_attribute(&self, container: &StoragePath, name: &str) -> Result<RawBuffer> {
        self.resolved(container)?
            .attributes
            .get(name)
            .cloned()
            .ok_or_else(|| ArchiveError::NotFound(format!("attribute '{name}' on {container}")))
    }

    /// Sorted attribute names on `container`.
    pub fn attribute_names(&self, container: &StoragePath) -> Result<Vec<String>> {
        Ok(self.resolved(container)?.attributes.keys().cloned().collect())
    }

    /// Sorted child names of the group at `path`.
    pub fn children(&self, path: &StoragePath) -> Result<Vec<String>> {
        match &self.resolved(path)?.kind {
            NodeKind::Group(children) => Ok(children.keys().cloned().collect()),
            _ => Err(ArchiveError::malformed(path, "expected a group, found a dataset")),
        }
    }

    // --- Writes ---

    /// Walks `path` from the root, creating every missing group.
    pub fn ensure_group(&mut self, path: &StoragePath) -> Result<NodeId> {
        let mut current = NodeId::ROOT;
        let mut walked = StoragePath::root();
        for component in path.components() {
            walked = walked.join(component)?;
            current = match self.child_of(current, component) {
                Some(child) => self
                    .follow(child, 0)
                    .ok_or_else(|| ArchiveError::NotFound(format!("soft link target of {walked}")))?,
                None => {
                    let id = self.push(Node::new(NodeKind::Group(BTreeMap::new())))?;
                    self.attach(current, component, id)?;
                    id
                }
            };
            if !matches!(self.node(current).map(|n| &n.kind), Some(NodeKind::Group(_))) {
                return Err(ArchiveError::malformed(&walked, "path component is a dataset"));
            }
        }
        Ok(current)
    }

    /// Creates the group at `path` and its ancestors.
    pub fn create_group(&mut self, path: &StoragePath) -> Result<()> {
        self.ensure_group(path).map(|_| ())
    }

    fn push(&mut self, node: Node) -> Result<NodeId> {
        let raw = u32::try_from(self.nodes.len())
            .map_err(|_| ArchiveError::Format("storage tree exceeds u32::MAX nodes".into()))?;
        self.nodes.push(node);
        Ok(NodeId::new(raw))
    }

    fn attach(&mut self, group: NodeId, name: &str, child: NodeId) -> Result<()> {
        match &mut self.node_mut(group)?.kind {
            NodeKind::Group(children) => {
                children.insert(name.to_string(), child);
                Ok(())
            }
            _ => Err(ArchiveError::Format(format!("node {group} is not a group"))),
        }
    }

    /// Reserves the name `path` in its (auto-created) parent and returns the parent id.
    fn claim(&mut self, path: &StoragePath) -> Result<(NodeId, String)> {
        let (Some(parent), Some(name)) = (path.parent(), path.name()) else {
            return Err(ArchiveError::AlreadyExists(path.to_string()));
        };
        let name = name.to_string();
        let parent_id = self.ensure_group(&parent)?;
        if self.child_of(parent_id, &name).is_some() {
            return Err(ArchiveError::AlreadyExists(path.to_string()));
        }
        Ok((parent_id, name))
    }

    /// Stores a new dataset at `path`.
    pub fn write_dataset(&mut self, path: &StoragePath, data: RawBuffer) -> Result<()> {
        let (parent, name) = self.claim(path)?;
        let id = self.push(Node::new(NodeKind::Dataset(data)))?;
        self.attach(parent, &name, id)
    }

    /// Attaches a new attribute, creating `container` as a group when missing.
    pub fn write_attribute(
        &mut self,
        container: &StoragePath,
        name: &str,
        data: RawBuffer,
    ) -> Result<()> {
        let id = match self.resolve(container) {
            Some(id) => id,
            None => self.ensure_group(container)?,
        };
        let node = self.node_mut(id)?;
        if node.attributes.contains_key(name) {
            return Err(ArchiveError::AlreadyExists(format!(
                "attribute '{name}' on {container}"
            )));
        }
        node.attributes.insert(name.to_string(), data);
        Ok(())
    }

    /// Creates `new` as an alias of `existing`.
    pub fn create_link(
        &mut self,
        existing: &StoragePath,
        new: &StoragePath,
        kind: LinkKind,
    ) -> Result<()> {
        let target = match kind {
            LinkKind::Hard => Some(
                self.resolve(existing)
                    .ok_or_else(|| ArchiveError::NotFound(existing.to_string()))?,
            ),
            LinkKind::Soft => None,
        };
        let (parent, name) = self.claim(new)?;
        let id = match target {
            Some(id) => id,
            None => self.push(Node::new(NodeKind::SoftLink(existing.clone())))?,
        };
        self.attach(parent, &name, id)
    }
}

impl Default for NodeTree {
    fn default() -> Self {
        Self::new()
    }
}
