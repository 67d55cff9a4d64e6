//! Fetched project contents and project-kind classification.

use crate::error::Error;
use crate::manifest::{ProjectManifest, MANIFEST_FILE, STRICT_LOCKFILE, VERSION_PIN_FILES};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// In-memory file tree keyed by forward-slash relative path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileTree {
    files: BTreeMap<String, Vec<u8>>,
}

impl FileTree {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a file. Leading `./` and `/` are stripped.
    pub fn insert(&mut self, path: impl AsRef<str>, contents: impl Into<Vec<u8>>) {
        let path = normalize(path.as_ref());
        self.files.insert(path, contents.into());
    }

    #[must_use]
    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.files.get(&normalize(path)).map(Vec::as_slice)
    }

    /// File contents as text, with invalid UTF-8 replaced.
    #[must_use]
    pub fn get_text(&self, path: &str) -> Option<String> {
        self.get(path)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(&normalize(path))
    }

    /// Whether any file lives under directory `dir`.
    #[must_use]
    pub fn has_dir(&self, dir: &str) -> bool {
        let prefix = format!("{}/", normalize(dir));
        self.files.keys().any(|p| p.starts_with(&prefix))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.files.iter().map(|(p, c)| (p.as_str(), c.as_slice()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Sum of all file sizes.
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.files.values().map(|c| c.len() as u64).sum()
    }

    /// Parsed root manifest; `None` when missing or malformed.
    #[must_use]
    pub fn manifest(&self) -> Option<ProjectManifest> {
        self.get_text(MANIFEST_FILE)
            .and_then(|text| ProjectManifest::parse_lenient(&text))
    }

    /// First non-empty Node version pin file content.
    #[must_use]
    pub fn version_pin(&self) -> Option<String> {
        VERSION_PIN_FILES.iter().find_map(|name| {
            self.get_text(name)
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
        })
    }

    #[must_use]
    pub fn has_strict_lockfile(&self) -> bool {
        self.contains(STRICT_LOCKFILE)
    }
}

fn normalize(path: &str) -> String {
    path.trim_start_matches("./").trim_start_matches('/').to_string()
}

/// What kind of project a repository holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectKind {
    Node,
    Static,
    Python,
    Unknown,
}

impl ProjectKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Static => "static",
            Self::Python => "python",
            Self::Unknown => "unknown",
        }
    }

    /// Kinds the bootstrap pipeline knows how to start.
    #[must_use]
    pub fn is_runnable(&self) -> bool {
        matches!(self, Self::Node | Self::Static)
    }

    /// Classify a fetched tree.
    ///
    /// A root `package.json` wins, then any HTML entry point, then Python markers.
    #[must_use]
    pub fn detect(tree: &FileTree) -> Self {
        if tree.contains(MANIFEST_FILE) {
            return Self::Node;
        }
        if tree.iter().any(|(path, _)| {
            !path.contains('/') && path.ends_with(".html")
        }) || crate::staticsite::DOC_ROOT_CANDIDATES
            .iter()
            .any(|dir| tree.contains(&format!("{dir}/index.html")))
        {
            return Self::Static;
        }
        if tree.contains("requirements.txt")
            || tree.contains("pyproject.toml")
            || tree
                .iter()
                .any(|(path, _)| !path.contains('/') && path.ends_with(".py"))
        {
            return Self::Python;
        }
        Self::Unknown
    }
}

impl fmt::Display for ProjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "node" => Ok(Self::Node),
            "static" => Ok(Self::Static),
            "python" => Ok(Self::Python),
            "unknown" => Ok(Self::Unknown),
            other => Err(Error::InvalidProjectKind(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(paths: &[&str]) -> FileTree {
        let mut t = FileTree::new();
        for p in paths {
            t.insert(*p, b"x".to_vec());
        }
        t
    }

    #[test]
    fn test_detect_kinds() {
        assert_eq!(
            ProjectKind::detect(&tree(&["package.json", "index.html"])),
            ProjectKind::Node
        );
        assert_eq!(
            ProjectKind::detect(&tree(&["public/index.html", "README.md"])),
            ProjectKind::Static
        );
        assert_eq!(
            ProjectKind::detect(&tree(&["about.html"])),
            ProjectKind::Static
        );
        assert_eq!(
            ProjectKind::detect(&tree(&["main.py"])),
            ProjectKind::Python
        );
        assert_eq!(
            ProjectKind::detect(&tree(&["README.md"])),
            ProjectKind::Unknown
        );
    }

    #[test]
    fn test_runnable_kinds() {
        assert!(ProjectKind::Node.is_runnable());
        assert!(ProjectKind::Static.is_runnable());
        assert!(!ProjectKind::Python.is_runnable());
        assert!(!ProjectKind::Unknown.is_runnable());
    }

    #[test]
    fn test_parse_kind() {
        assert_eq!("Static".parse::<ProjectKind>().unwrap(), ProjectKind::Static);
        assert!("ruby".parse::<ProjectKind>().is_err());
    }

    #[test]
    fn test_tree_helpers() {
        let mut t = FileTree::new();
        t.insert("./public/index.html", b"<html>".to_vec());
        t.insert(".nvmrc", b"  v20.1.0\n".to_vec());
        assert!(t.contains("public/index.html"));
        assert!(t.has_dir("public"));
        assert!(!t.has_dir("pub"));
        assert_eq!(t.total_bytes(), 16);
        assert_eq!(t.version_pin().as_deref(), Some("v20.1.0"));
        assert!(t.manifest().is_none());
        assert!(!t.has_strict_lockfile());
    }
}
