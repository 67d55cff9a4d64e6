//! Files from a directory on disk.

use super::{FileEntry, FileSource, SourceError};
use async_trait::async_trait;
use launchpad_util::fs::{safe_join, walk_project_files};
use launchpad_util::hash::object_id_for_file;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// A project checked out locally. Object ids are BLAKE3 content hashes.
#[derive(Debug)]
pub struct LocalSource {
    root: PathBuf,
    /// Object id to relative path, filled by [`FileSource::list`].
    index: Mutex<HashMap<String, String>>,
}

impl LocalSource {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            index: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl FileSource for LocalSource {
    async fn list(&self) -> Result<Vec<FileEntry>, SourceError> {
        let root = self.root.clone();
        let entries = tokio::task::spawn_blocking(move || -> std::io::Result<Vec<FileEntry>> {
            walk_project_files(&root)?
                .into_iter()
                .map(|f| {
                    Ok(FileEntry {
                        id: object_id_for_file(&f.abs_path)?,
                        path: f.rel_path,
                        size: f.size,
                    })
                })
                .collect()
        })
        .await
        .map_err(|e| SourceError::Io(std::io::Error::other(e)))??;

        let mut index = self
            .index
            .lock()
            .map_err(|_| SourceError::InvalidResponse("file index poisoned".to_string()))?;
        index.clear();
        index.extend(entries.iter().map(|e| (e.id.clone(), e.path.clone())));
        Ok(entries)
    }

    async fn fetch(&self, id: &str) -> Result<Vec<u8>, SourceError> {
        let rel = self
            .index
            .lock()
            .map_err(|_| SourceError::InvalidResponse("file index poisoned".to_string()))?
            .get(id)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(id.to_string()))?;
        let path = safe_join(&self.root, &rel)
            .ok_or_else(|| SourceError::InvalidResponse(format!("unsafe path: {rel}")))?;
        Ok(tokio::fs::read(path).await?)
    }
}
