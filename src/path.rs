//! Absolute, `/`-delimited storage paths.
//!
//! A [`StoragePath`] is always non-empty and always begins with `/`. Trailing and
//! repeated separators are folded away on parse, so `"/test_dir/"` and
//! `"/test_dir"` name the same group. The parent of a path is computed on demand.

use crate::error::{ArchiveError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A validated absolute path inside a storage tree.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StoragePath(String);

impl StoragePath {
    /// The root group `/`.
    pub fn root() -> Self {
        Self(String::from("/"))
    }

    /// Parses and normalizes a path.
    ///
    /// # Errors
    /// Returns [`ArchiveError::InvalidPath`] when the input is empty or does not
    /// begin with `/`, or when a component is `.` or `..`.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(ArchiveError::InvalidPath {
                path: String::new(),
                reason: "path is empty".into(),
            });
        }
        if !raw.starts_with('/') {
            return Err(ArchiveError::InvalidPath {
                path: raw.to_string(),
                reason: "path must begin with '/'".into(),
            });
        }

        let mut normalized = String::with_capacity(raw.len());
        for component in raw.split('/').filter(|c| !c.is_empty()) {
            if component == "." || component == ".." {
                return Err(ArchiveError::InvalidPath {
                    path: raw.to_string(),
                    reason: format!("relative component '{component}' is not allowed"),
                });
            }
            normalized.push('/');
            normalized.push_str(component);
        }
        if normalized.is_empty() {
            normalized.push('/');
        }
        Ok(Self(normalized))
    }

    /// Appends one component (or a relative run of components) to this path.
    ///
    /// # Errors
    /// Returns [`ArchiveError::InvalidPath`] when `child` is empty or contains
    /// a relative component.
    pub fn join(&self, child: &str) -> Result<Self> {
        let trimmed = child.trim_matches('/');
        if trimmed.is_empty() {
            return Err(ArchiveError::InvalidPath {
                path: format!("{}/{}", self.0.trim_end_matches('/'), child),
                reason: "child name is empty".into(),
            });
        }
        Self::parse(&format!("{}/{}", self.0.trim_end_matches('/'), trimmed))
    }

    /// Appends a zero-based index component, the naming scheme for composite
    /// fields and container elements.
    pub fn index(&self, index: usize) -> Self {
        if self.is_root() {
            Self(format!("/{index}"))
        } else {
            Self(format!("{}/{index}", self.0))
        }
    }

    /// Returns the parent group, or `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(0) => Some(Self::root()),
            Some(pos) => Some(Self(self.0[..pos].to_string())),
            None => None,
        }
    }

    /// The last component, or `None` for the root.
    pub fn name(&self) -> Option<&str> {
        if self.is_root() {
            None
        } else {
            self.0.rsplit('/').next()
        }
    }

    /// Iterates the components from the root down.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|c| !c.is_empty())
    }

    /// Returns true if this is `/`.
    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// The normalized textual form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for StoragePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StoragePath({})", self.0)
    }
}

impl fmt::Display for StoragePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for StoragePath {
    type Err = ArchiveError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl AsRef<str> for StoragePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_and_repeated_separators_fold() {
        assert_eq!(StoragePath::parse("/test_dir/").unwrap().as_str(), "/test_dir");
        assert_eq!(StoragePath::parse("//a///b/").unwrap().as_str(), "/a/b");
        assert!(StoragePath::parse("///").unwrap().is_root());
    }

    #[test]
    fn missing_leading_slash_is_a_precondition_failure() {
        let err = StoragePath::parse("no_leading_slash").unwrap_err();
        assert!(matches!(err, ArchiveError::InvalidPath { .. }));
        assert!(matches!(StoragePath::parse(""), Err(ArchiveError::InvalidPath { .. })));
        assert!(matches!(StoragePath::parse("/a/../b"), Err(ArchiveError::InvalidPath { .. })));
    }

    #[test]
    fn parent_and_name() {
        let p = StoragePath::parse("/a/b/c").unwrap();
        assert_eq!(p.name(), Some("c"));
        assert_eq!(p.parent().unwrap().as_str(), "/a/b");
        assert_eq!(StoragePath::parse("/a").unwrap().parent(), Some(StoragePath::root()));
        assert_eq!(StoragePath::root().parent(), None);
        assert_eq!(StoragePath::root().name(), None);
    }

    #[test]
    fn join_and_index() {
        let root = StoragePath::root();
        assert_eq!(root.index(3).as_str(), "/3");
        let t = root.join("t").unwrap();
        assert_eq!(t.index(0).as_str(), "/t/0");
        assert_eq!(t.join("x/y/").unwrap().as_str(), "/t/x/y");
        assert!(t.join("/").is_err());
        assert_eq!(t.components().collect::<Vec<_>>(), vec!["t"]);
    }
}
