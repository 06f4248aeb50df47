use super::tree::NodeTree;
use super::{EntryKind, LinkKind, OpenMode, StorageBackend};
use crate::element::RawBuffer;
use crate::error::{ArchiveError, Result};
use crate::path::StoragePath;

/// A storage tree held entirely in process memory.
///
/// Useful on its own for tests and scratch archives, and as the working copy
/// behind [`FileBackend`](super::FileBackend).
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    tree: NodeTree,
    mode: OpenMode,
}

impl MemoryBackend {
    /// An empty, writable tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an existing tree.
    pub fn from_tree(tree: NodeTree, mode: OpenMode) -> Self {
        Self { tree, mode }
    }

    /// Reopens the same content read-only.
    pub fn into_read_only(self) -> Self {
        Self {
            mode: OpenMode::ReadOnly,
            ..self
        }
    }

    /// The underlying arena.
    pub fn tree(&self) -> &NodeTree {
        &self.tree
    }

    fn writable(&mut self) -> Result<&mut NodeTree> {
        if self.mode.is_writable() {
            Ok(&mut self.tree)
        } else {
            Err(ArchiveError::ReadOnly)
        }
    }
}

impl StorageBackend for MemoryBackend {
    fn mode(&self) -> OpenMode {
        self.mode
    }

    fn group_exists(&self, path: &StoragePath) -> bool {
        self.tree.group_exists(path)
    }

    fn create_group(&mut self, path: &StoragePath) -> Result<()> {
        self.writable()?.create_group(path)
    }

    fn dataset_exists(&self, path: &StoragePath) -> bool {
        self.tree.dataset_exists(path)
    }

    fn write_dataset(&mut self, path: &StoragePath, data: RawBuffer) -> Result<()> {
        self.writable()?.write_dataset(path, data)
    }

    fn read_dataset(&self, path: &StoragePath) -> Result<RawBuffer> {
        self.tree.read_dataset(path)
    }

    fn dataset_size(&self, path: &StoragePath) -> Result<u64> {
        self.tree.read_dataset(path).map(|data| data.count())
    }

    fn attribute_exists(&self, container: &StoragePath, name: &str) -> bool {
        self.tree.attribute_exists(container, name)
    }

    fn write_attribute(
        &mut self,
        container: &StoragePath,
        name: &str,
        data: RawBuffer,
    ) -> Result<()> {
        self.writable()?.write_attribute(container, name, data)
    }

    fn read_attribute(&self, container: &StoragePath, name: &str) -> Result<RawBuffer> {
        self.tree.read_attribute(container, name)
    }

    fn attribute_size(&self, container: &StoragePath, name: &str) -> Result<u64> {
        self.tree
            .read_attribute(container, name)
            .map(|data| data.count())
    }

    fn attribute_names(&self, container: &StoragePath) -> Result<Vec<String>> {
        self.tree.attribute_names(container)
    }

    fn create_link(
        &mut self,
        existing: &StoragePath,
        new: &StoragePath,
        kind: LinkKind,
    ) -> Result<()> {
        self.writable()?.create_link(existing, new, kind)
    }

    fn entry_kind(&self, path: &StoragePath) -> Option<EntryKind> {
        self.tree.entry_kind(path)
    }

    fn children(&self, path: &StoragePath) -> Result<Vec<String>> {
        self.tree.children(path)
    }

    fn node_address(&self, path: &StoragePath) -> Option<u64> {
        self.tree.resolve(path).map(|id| u64::from(id.as_u32()))
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(raw: &str) -> StoragePath {
        StoragePath::parse(raw).unwrap()
    }

    // --- Probes ---

    #[test]
    fn probes_on_an_empty_tree_are_false() {
        let backend = MemoryBackend::new();
        assert!(backend.group_exists(&StoragePath::root()));
        assert!(!backend.group_exists(&p("/dummy")));
        assert!(!backend.group_exists(&p("/dummy/")));
        assert!(!backend.dataset_exists(&p("/dummy/child")));
        assert!(!backend.attribute_exists(&p("/dummy"), "attr"));
    }

    #[test]
    fn probes_with_parent_present_but_child_absent() {
        let mut backend = MemoryBackend::new();
        backend.create_group(&p("/test_dir/")).unwrap();
        assert!(backend.group_exists(&p("/test_dir")));
        assert!(!backend.group_exists(&p("/test_dir/dummy")));
        assert!(!backend.dataset_exists(&p("/test_dir/dummy")));
        assert!(!backend.attribute_exists(&p("/test_dir"), "dummy"));
    }

    // --- Links ---

    #[test]
    fn links_to_groups_and_datasets() {
        let mut backend = MemoryBackend::new();
        backend.create_group(&p("/link_dir/data")).unwrap();
        backend
            .write_dataset(&p("/link_dir/data/values"), RawBuffer::from_scalars(&[1.0f64, 2.0]))
            .unwrap();

        backend
            .create_link(&StoragePath::root(), &p("/link_dir/hard_links/link_to_root"), LinkKind::Hard)
            .unwrap();
        backend
            .create_link(&p("/link_dir/data"), &p("/link_dir/soft_links/link_to_group"), LinkKind::Soft)
            .unwrap();
        backend
            .create_link(
                &p("/link_dir/data/values"),
                &p("/link_dir/hard_links/link_to_values"),
                LinkKind::Hard,
            )
            .unwrap();

        assert!(backend.group_exists(&p("/link_dir/hard_links/link_to_root")));
        assert!(backend.group_exists(&p("/link_dir/soft_links/link_to_group")));
        assert!(backend.dataset_exists(&p("/link_dir/soft_links/link_to_group/values")));
        assert!(backend.dataset_exists(&p("/link_dir/hard_links/link_to_values")));
        assert_eq!(backend.dataset_size(&p("/link_dir/hard_links/link_to_values")).unwrap(), 2);
        assert_eq!(
            backend.node_address(&p("/link_dir/hard_links/link_to_values")),
            backend.node_address(&p("/link_dir/data/values"))
        );
        assert_eq!(
            backend.soft_link_target(&p("/link_dir/soft_links/link_to_group")),
            Some(p("/link_dir/data"))
        );
    }

    #[test]
    fn hard_link_to_missing_target_fails() {
        let mut backend = MemoryBackend::new();
        let err = backend
            .create_link(&p("/missing"), &p("/alias"), LinkKind::Hard)
            .unwrap_err();
        assert!(err.is_not_found());
    }

    // --- Mode ---

    #[test]
    fn read_only_rejects_mutation_but_reads() {
        let mut backend = MemoryBackend::new();
        backend.write_dataset(&p("/x"), RawBuffer::scalar(9i64)).unwrap();
        let mut backend = backend.into_read_only();
        assert!(matches!(backend.create_group(&p("/g")), Err(ArchiveError::ReadOnly)));
        assert!(matches!(
            backend.write_attribute(&p("/x"), "a", RawBuffer::scalar(1u8)),
            Err(ArchiveError::ReadOnly)
        ));
        assert_eq!(backend.read_dataset(&p("/x")).unwrap().count(), 1);
    }

    #[test]
    fn attributes_on_groups_and_datasets() {
        let mut backend = MemoryBackend::new();
        backend.write_attribute(&p("/g"), "answer", RawBuffer::scalar(42u32)).unwrap();
        assert!(backend.group_exists(&p("/g")));
        backend.write_dataset(&p("/g/d"), RawBuffer::utf8("hi")).unwrap();
        backend
            .write_attribute(&p("/g/d"), "weights", RawBuffer::from_scalars(&[1i32, 2, 3]))
            .unwrap();
        assert_eq!(backend.attribute_size(&p("/g/d"), "weights").unwrap(), 3);
        assert_eq!(backend.attribute_names(&p("/g")).unwrap(), vec!["answer".to_string()]);
        assert!(backend.read_attribute(&p("/g"), "missing").unwrap_err().is_not_found());
    }
}
