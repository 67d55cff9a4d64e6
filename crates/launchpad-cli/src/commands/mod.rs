pub mod check;
pub mod plan;
pub mod run;
pub mod version;

use launchpad_core::source::DEFAULT_MAX_TREE_BYTES;
use launchpad_core::{fetch_tree, BootstrapConfig, FileTree, GithubSource, LocalSource, ProjectKind, RepoRef};
use miette::{IntoDiagnostic, Result};
use std::path::{Path, PathBuf};

/// A project read into memory, ready for checks or a run.
pub struct LoadedProject {
    /// What the user pointed at, for display.
    pub label: String,
    pub tree: FileTree,
    pub kind: ProjectKind,
    /// Directory `launchpad.json` is read from.
    pub config_dir: PathBuf,
}

impl LoadedProject {
    pub fn bootstrap_config(&self) -> Result<BootstrapConfig> {
        BootstrapConfig::load(&self.config_dir).into_diagnostic()
    }
}

/// Resolve `target` to a local directory or a GitHub repository and read it.
///
/// With no target the working directory is used. A target naming an existing
/// directory (relative to `cwd`) always wins over repository parsing.
pub async fn load_project(cwd: &Path, target: Option<&str>, kind: Option<ProjectKind>) -> Result<LoadedProject> {
    let local_dir = match target {
        None => Some(cwd.to_path_buf()),
        Some(t) => {
            let path = cwd.join(t);
            path.is_dir().then_some(path)
        }
    };

    let (label, tree, config_dir) = if let Some(dir) = local_dir {
        if !dir.is_dir() {
            return Err(launchpad_core::Error::ProjectNotFound { path: dir }).into_diagnostic();
        }
        let source = LocalSource::new(&dir);
        let tree = fetch_tree(&source, DEFAULT_MAX_TREE_BYTES).await.into_diagnostic()?;
        (dir.display().to_string(), tree, dir)
    } else {
        let raw = target.unwrap_or_default();
        let repo = RepoRef::parse(raw).into_diagnostic()?;
        tracing::info!(%repo, "fetching repository");
        let source = GithubSource::from_env(repo.clone()).into_diagnostic()?;
        let tree = fetch_tree(&source, DEFAULT_MAX_TREE_BYTES).await.into_diagnostic()?;
        (repo.to_string(), tree, cwd.to_path_buf())
    };

    let kind = kind.unwrap_or_else(|| ProjectKind::detect(&tree));
    tracing::debug!(files = tree.len(), bytes = tree.total_bytes(), %kind, "project loaded");

    Ok(LoadedProject {
        label,
        tree,
        kind,
        config_dir,
    })
}

/// Build a tokio runtime and load the project on it.
pub fn load_project_blocking(cwd: &Path, target: Option<&str>, kind: Option<ProjectKind>) -> Result<LoadedProject> {
    let runtime = tokio::runtime::Runtime::new().into_diagnostic()?;
    runtime.block_on(load_project(cwd, target, kind))
}
