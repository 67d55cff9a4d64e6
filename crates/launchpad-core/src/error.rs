use std::path::PathBuf;
use thiserror::Error;

/// Core error type for launchpad operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read config at {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config at {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Project directory not found: {path}")]
    ProjectNotFound { path: PathBuf },

    #[error("Not a GitHub repository reference: {input} (expected owner/repo or a github.com URL)")]
    InvalidRepoRef { input: String },

    #[error("Invalid project kind '{0}' (expected node, static, python or unknown)")]
    InvalidProjectKind(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    #[must_use]
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}
