//! Project file sources.
//!
//! A [`FileSource`] lists a repository's files and fetches their contents by
//! object id. [`fetch_tree`] turns that into the in-memory [`FileTree`] the
//! sandbox mounts.

pub mod github;
pub mod local;
pub mod repo;

pub use github::GithubSource;
pub use local::LocalSource;
pub use repo::RepoRef;

use crate::project::FileTree;
use async_trait::async_trait;
use thiserror::Error;

/// Default cap on total repository size.
pub const DEFAULT_MAX_TREE_BYTES: u64 = 50 * 1024 * 1024;

/// One file in a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Forward-slash path relative to the repository root.
    pub path: String,
    /// Content-addressed identifier used by [`FileSource::fetch`].
    pub id: String,
    pub size: u64,
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("GitHub API rate limit exceeded; set GITHUB_TOKEN or try again later")]
    RateLimited,

    #[error("repository or ref not found: {0}")]
    NotFound(String),

    #[error("repository is too large to preview ({total} bytes, limit {limit})")]
    TooLarge { total: u64, limit: u64 },

    #[error("file source request failed: {0}")]
    Http(String),

    #[error("unexpected response from file source: {0}")]
    InvalidResponse(String),

    #[error("file source I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for SourceError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.to_string())
    }
}

#[async_trait]
pub trait FileSource: Send + Sync {
    /// List every regular file in the repository.
    async fn list(&self) -> Result<Vec<FileEntry>, SourceError>;

    /// Raw bytes of the object `id`.
    async fn fetch(&self, id: &str) -> Result<Vec<u8>, SourceError>;

    /// Text content of the object `id`, with invalid UTF-8 replaced.
    async fn fetch_text(&self, id: &str) -> Result<String, SourceError> {
        let bytes = self.fetch(id).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Download a whole repository into memory.
///
/// The size limit is checked against the listing before any content is fetched.
pub async fn fetch_tree(source: &dyn FileSource, max_bytes: u64) -> Result<FileTree, SourceError> {
    let entries = source.list().await?;
    let total: u64 = entries.iter().map(|e| e.size).sum();
    if total > max_bytes {
        return Err(SourceError::TooLarge {
            total,
            limit: max_bytes,
        });
    }

    tracing::info!(files = entries.len(), bytes = total, "fetching project files");

    let mut tree = FileTree::new();
    for entry in entries {
        let contents = source.fetch(&entry.id).await?;
        tree.insert(&entry.path, contents);
    }
    Ok(tree)
}
