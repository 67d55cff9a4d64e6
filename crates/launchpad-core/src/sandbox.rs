//! Execution sandbox contract.
//!
//! The orchestrator never touches processes or a filesystem directly. A
//! [`SandboxRuntime`] boots an isolated environment; the resulting [`Sandbox`]
//! accepts a file tree, spawns commands and announces bound ports.

use crate::project::FileTree;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};

/// Failures reported by a sandbox implementation.
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("sandbox operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("sandbox failed to boot: {0}")]
    Boot(String),

    #[error("failed to mount files: {0}")]
    Mount(String),

    #[error("failed to spawn `{command}`: {message}")]
    Spawn { command: String, message: String },

    #[error("sandbox I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SandboxError {
    /// Timeouts are the only failures worth retrying.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

/// Options passed to [`SandboxRuntime::boot`].
#[derive(Debug, Clone, Default)]
pub struct BootOptions {
    /// Working directory name inside the sandbox.
    pub workdir_name: Option<String>,
}

/// A server inside the sandbox bound a port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortEvent {
    pub port: u16,
    /// Candidate URL for reaching the port.
    pub url: String,
}

/// Out-of-band control over a spawned process.
pub trait ProcessControl: Send + Sync {
    /// Terminate the process. Calling it again is a no-op.
    fn kill(&self);

    /// Resize the process's terminal.
    fn resize(&self, cols: u16, rows: u16);
}

/// A process running inside the sandbox.
pub struct SpawnedProcess {
    /// Combined stdout/stderr text, pushed as it is produced.
    pub output: mpsc::Receiver<String>,
    /// Resolves with the exit code.
    pub exit: oneshot::Receiver<i32>,
    pub control: Arc<dyn ProcessControl>,
    /// Writer for the process's stdin, when it accepts input.
    pub input: Option<mpsc::Sender<String>>,
}

impl std::fmt::Debug for SpawnedProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpawnedProcess")
            .field("interactive", &self.input.is_some())
            .finish_non_exhaustive()
    }
}

/// A booted sandbox.
#[async_trait]
pub trait Sandbox: Send + Sync {
    /// Write `tree` into the sandbox working directory.
    async fn mount(&self, tree: &FileTree) -> Result<(), SandboxError>;

    async fn spawn(
        &self,
        command: &str,
        args: &[String],
        env: &BTreeMap<String, String>,
    ) -> Result<SpawnedProcess, SandboxError>;

    /// Receive port-bound notifications from now on.
    fn subscribe_ports(&self) -> broadcast::Receiver<PortEvent>;
}

/// Boots sandboxes.
#[async_trait]
pub trait SandboxRuntime: Send + Sync {
    async fn boot(&self, options: &BootOptions) -> Result<Box<dyn Sandbox>, SandboxError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_timeouts_retry() {
        assert!(SandboxError::Timeout(Duration::from_secs(1)).is_timeout());
        assert!(!SandboxError::Boot("no wasm".into()).is_timeout());
    }

    #[test]
    fn test_spawn_error_message() {
        let err = SandboxError::Spawn {
            command: "npm".into(),
            message: "not found".into(),
        };
        assert_eq!(err.to_string(), "failed to spawn `npm`: not found");
    }
}
