use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Directory names never collected from a project checkout.
pub const SKIPPED_DIRS: &[&str] = &["node_modules", ".git", ".hg", ".svn"];

/// A regular file discovered under a project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkedFile {
    /// Forward-slash path relative to the walk root.
    pub rel_path: String,
    /// Absolute path on disk.
    pub abs_path: PathBuf,
    /// Size in bytes.
    pub size: u64,
}

/// Walk `root` and return every regular file, skipping [`SKIPPED_DIRS`].
///
/// Results are sorted by relative path so callers get a deterministic listing.
///
/// # Errors
/// Returns an error if the root cannot be read.
pub fn walk_project_files(root: &Path) -> io::Result<Vec<WalkedFile>> {
    let mut files = Vec::new();

    let walker = WalkDir::new(root).follow_links(false).into_iter();
    for entry in walker.filter_entry(|e| {
        e.depth() == 0
            || !(e.file_type().is_dir()
                && SKIPPED_DIRS.contains(&e.file_name().to_string_lossy().as_ref()))
    }) {
        let entry = entry.map_err(io::Error::other)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(root) else {
            continue;
        };
        let rel_path = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let size = entry.metadata().map_err(io::Error::other)?.len();
        files.push(WalkedFile {
            rel_path,
            abs_path: entry.path().to_path_buf(),
            size,
        });
    }

    files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    Ok(files)
}

/// Join a forward-slash relative path onto `root`, rejecting escapes.
///
/// Returns `None` for absolute paths or paths containing `..`.
#[must_use]
pub fn safe_join(root: &Path, rel_path: &str) -> Option<PathBuf> {
    let rel = Path::new(rel_path);
    let mut out = root.to_path_buf();
    for component in rel.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if out == root {
        return None;
    }
    Some(out)
}

/// Atomically write bytes to a file by writing to a temp file then renaming.
///
/// Parent directories are created as needed.
///
/// # Errors
/// Returns an error if the write or rename fails.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = path.parent().unwrap_or(Path::new("."));
    fs::create_dir_all(parent)?;

    // Same directory as the target so the rename stays on one filesystem
    let mut temp_path = parent.to_path_buf();
    temp_path.push(format!(
        ".{}.tmp.{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("file"),
        std::process::id()
    ));

    {
        let mut file = File::create(&temp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }

    match fs::rename(&temp_path, path) {
        Ok(()) => Ok(()),
        Err(e) => {
            // On Windows, rename can fail if target exists.
            if cfg!(windows) {
                fs::copy(&temp_path, path)?;
                let _ = fs::remove_file(&temp_path);
                Ok(())
            } else {
                let _ = fs::remove_file(&temp_path);
                Err(e)
            }
        }
    }
}
