//! Provider-agnostic data model for repository listings and fetched context.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Maximum number of listing paths kept for the structural summary.
pub const MAX_TREE_PATHS: usize = 300;

/// An `owner/name` pair identifying a hosted repository.
///
/// Immutable once parsed; see [`crate::locator::parse_repo_ref`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Kind of node in the remote tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    File,
    Directory,
}

/// One node of the remote repository tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    /// Repository-relative path, `/`-separated.
    pub path: String,
    pub kind: EntryKind,
    pub size_bytes: Option<u64>,
    /// Opaque locator used to download the entry (an API URL).
    pub fetch_handle: String,
}

impl TreeEntry {
    /// Final path segment (the file or directory name).
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// Decoded text of one selected file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContent {
    pub path: String,
    pub text: String,
}

/// Everything the report requester needs about a repository.
///
/// A fallback context carries no paths and no files; build it with
/// [`RepoContext::fallback`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoContext {
    pub tree_paths: Vec<String>,
    pub files: Vec<FileContent>,
    pub is_fallback: bool,
}

impl RepoContext {
    /// Builds a regular context, capping the structural path list.
    pub fn new<I>(tree_paths: I, files: Vec<FileContent>) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        Self {
            tree_paths: tree_paths.into_iter().take(MAX_TREE_PATHS).collect(),
            files,
            is_fallback: false,
        }
    }

    /// Name-only context used after the source host rate-limited us.
    pub fn fallback() -> Self {
        Self {
            tree_paths: Vec::new(),
            files: Vec::new(),
            is_fallback: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_name_is_last_segment() {
        let e = TreeEntry {
            path: "src/app/main.rs".into(),
            kind: EntryKind::File,
            size_bytes: Some(10),
            fetch_handle: "x".into(),
        };
        assert_eq!(e.name(), "main.rs");

        let root = TreeEntry {
            path: "README.md".into(),
            ..e
        };
        assert_eq!(root.name(), "README.md");
    }

    #[test]
    fn context_caps_tree_paths() {
        let ctx = RepoContext::new((0..1000).map(|i| format!("f{i}")), Vec::new());
        assert_eq!(ctx.tree_paths.len(), MAX_TREE_PATHS);
        assert_eq!(ctx.tree_paths[0], "f0");
        assert!(!ctx.is_fallback);
    }

    #[test]
    fn fallback_is_empty() {
        let ctx = RepoContext::fallback();
        assert!(ctx.is_fallback);
        assert!(ctx.files.is_empty());
        assert!(ctx.tree_paths.is_empty());
        assert_eq!(RepoRef::new("acme", "widget").to_string(), "acme/widget");
    }
}
