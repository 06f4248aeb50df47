// src/inspector.rs

//! Tools for inspecting the structure of a storage tree.
//! Useful for checking codec layouts and link aliasing.

use crate::backend::{EntryKind, StorageBackend};
use crate::error::Result;
use crate::path::StoragePath;
use serde::Serialize;
use std::collections::HashMap;

/// A structural report of a storage tree.
#[derive(Debug, Serialize)]
pub struct DebugReport {
    /// Groups reached, counting each node once.
    pub groups: u64,
    /// Datasets reached, counting each node once.
    pub datasets: u64,
    /// Soft links found.
    pub soft_links: u64,
    /// Names found to alias an already visited node.
    pub hard_links: u64,
    /// The hierarchical tree, starting at `/`.
    pub tree: NodeInfo,
}

/// Metadata for a single name in the tree.
#[derive(Debug, Serialize)]
pub struct NodeInfo {
    /// Absolute path of the name.
    pub path: StoragePath,
    /// "Group", "Dataset", "Soft Link" or "Hard Link".
    pub node_type_hint: String,
    /// Element type and count of a dataset.
    pub dataset_info: Option<String>,
    /// Target of a soft link, or the first path of a hard-linked node.
    pub link_target: Option<StoragePath>,
    /// Attribute names and short renderings of their values.
    pub attributes: Vec<(String, String)>,
    /// Child names.
    pub children: Vec<NodeInfo>,
}

/// The storage tree inspector.
#[derive(Debug)]
pub struct ArchiveInspector;

impl ArchiveInspector {
    /// Walks `backend` from the root and returns a structural report.
    pub fn inspect(backend: &dyn StorageBackend) -> Result<DebugReport> {
        let mut walk = Walk {
            backend,
            seen: HashMap::new(),
            report_counts: [0; 4],
        };
        let tree = walk.node(StoragePath::root())?;
        let [groups, datasets, soft_links, hard_links] = walk.report_counts;
        Ok(DebugReport {
            groups,
            datasets,
            soft_links,
            hard_links,
            tree,
        })
    }
}

struct Walk<'a> {
    backend: &'a dyn StorageBackend,
    seen: HashMap<u64, StoragePath>,
    report_counts: [u64; 4],
}

impl Walk<'_> {
    fn node(&mut self, path: StoragePath) -> Result<NodeInfo> {
        let mut info = NodeInfo {
            path: path.clone(),
            node_type_hint: String::new(),
            dataset_info: None,
            link_target: None,
            attributes: Vec::new(),
            children: Vec::new(),
        };

        if let Some(EntryKind::SoftLink(target)) = self.backend.entry_kind(&path) {
            self.report_counts[2] += 1;
            info.node_type_hint = "Soft Link".to_string();
            info.link_target = Some(target);
            return Ok(info);
        }

        if let Some(address) = self.backend.node_address(&path) {
            if let Some(first) = self.seen.get(&address) {
                self.report_counts[3] += 1;
                info.node_type_hint = "Hard Link".to_string();
                info.link_target = Some(first.clone());
                return Ok(info);
            }
            self.seen.insert(address, path.clone());
        }

        for name in self.backend.attribute_names(&path)? {
            let raw = self.backend.read_attribute(&path, &name)?;
            info.attributes.push((name, raw.describe()));
        }

        if self.backend.group_exists(&path) {
            self.report_counts[0] += 1;
            info.node_type_hint = "Group".to_string();
            for name in self.backend.children(&path)? {
                let child = self.node(path.join(&name)?)?;
                info.children.push(child);
            }
        } else {
            self.report_counts[1] += 1;
            info.node_type_hint = "Dataset".to_string();
            let data = self.backend.read_dataset(&path)?;
            info.dataset_info = Some(format!("{} x {}", data.element_type(), data.count()));
        }
        Ok(info)
    }
}

impl std::fmt::Display for DebugReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== ARBOR INSPECTOR REPORT ===")?;
        writeln!(
            f,
            "Groups: {} | Datasets: {} | Soft links: {} | Hard links: {}",
            self.groups, self.datasets, self.soft_links, self.hard_links
        )?;
        writeln!(f, "\n[TREE LAYOUT]")?;
        self.tree.fmt_recursive(f, "", true)
    }
}

impl NodeInfo {
    fn fmt_recursive(
        &self,
        f: &mut std::fmt::Formatter<'_>,
        prefix: &str,
        is_last: bool,
    ) -> std::fmt::Result {
        let connector = if is_last { "└── " } else { "├── " };
        let child_prefix = if is_last { "    " } else { "│   " };
        let name = self.path.name().unwrap_or("/");
        let detail = self
            .dataset_info
            .as_deref()
            .map(|d| format!(" {d}"))
            .or_else(|| self.link_target.as_ref().map(|t| format!(" -> {t}")))
            .unwrap_or_default();
        let attributes = if self.attributes.is_empty() {
            String::new()
        } else {
            let rendered: Vec<String> = self
                .attributes
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            format!(" {{{}}}", rendered.join(", "))
        };

        writeln!(
            f,
            "{}{}{} [{}]{}{}",
            prefix, connector, name, self.node_type_hint, detail, attributes
        )?;

        for (i, child) in self.children.iter().enumerate() {
            let is_last_child = i + 1 == self.children.len();
            child.fmt_recursive(f, &format!("{prefix}{child_prefix}"), is_last_child)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{LinkKind, MemoryBackend};
    use crate::element::RawBuffer;

    fn path(s: &str) -> StoragePath {
        StoragePath::parse(s).unwrap()
    }

    #[test]
    fn counts_links_once() {
        let mut backend = MemoryBackend::new();
        backend.write_dataset(&path("/g/x"), RawBuffer::scalar(7u32)).unwrap();
        backend.create_link(&path("/g/x"), &path("/hard"), LinkKind::Hard).unwrap();
        backend.create_link(&path("/g/x"), &path("/soft"), LinkKind::Soft).unwrap();

        let report = ArchiveInspector::inspect(&backend).unwrap();
        assert_eq!(report.groups, 2);
        assert_eq!(report.datasets, 1);
        assert_eq!(report.soft_links, 1);
        assert_eq!(report.hard_links, 1);

        let rendered = report.to_string();
        assert!(rendered.contains("soft [Soft Link] -> /g/x"));
        assert!(rendered.contains("x [Dataset] u32 x 1"));
    }
}
