//! Terminal bootstrap failures.

use crate::sandbox::SandboxError;
use std::time::Duration;
use thiserror::Error;

/// Stable error codes for bootstrap failures.
///
/// All codes are SCREAMING_SNAKE_CASE and stable across versions.
pub mod codes {
    /// Pre-flight found a blocking issue (unsupported project, SSH dependency).
    pub const BOOTSTRAP_PREFLIGHT_BLOCKED: &str = "BOOTSTRAP_PREFLIGHT_BLOCKED";

    /// Every boot attempt timed out.
    pub const BOOTSTRAP_BOOT_TIMEOUT: &str = "BOOTSTRAP_BOOT_TIMEOUT";

    /// The sandbox refused to boot.
    pub const BOOTSTRAP_BOOT_FAILED: &str = "BOOTSTRAP_BOOT_FAILED";

    /// Files could not be written into the sandbox.
    pub const BOOTSTRAP_MOUNT_FAILED: &str = "BOOTSTRAP_MOUNT_FAILED";

    /// A single install attempt exceeded its time budget.
    pub const BOOTSTRAP_INSTALL_TIMEOUT: &str = "BOOTSTRAP_INSTALL_TIMEOUT";

    /// Every install strategy failed.
    pub const BOOTSTRAP_INSTALL_FAILED: &str = "BOOTSTRAP_INSTALL_FAILED";

    /// No dev/start/serve/develop script to run.
    pub const BOOTSTRAP_NO_START_SCRIPT: &str = "BOOTSTRAP_NO_START_SCRIPT";

    /// The dev server exited before becoming reachable.
    pub const BOOTSTRAP_SERVER_EXITED: &str = "BOOTSTRAP_SERVER_EXITED";

    /// A command could not be started.
    pub const BOOTSTRAP_SPAWN_FAILED: &str = "BOOTSTRAP_SPAWN_FAILED";

    /// An operation needed a booted sandbox.
    pub const BOOTSTRAP_NOT_BOOTED: &str = "BOOTSTRAP_NOT_BOOTED";

    /// Anything else.
    pub const BOOTSTRAP_INTERNAL: &str = "BOOTSTRAP_INTERNAL";
}

/// Why a run ended in the `error` state. Messages are shown to users verbatim.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("{}", blocked_message(.issues, .suggestions))]
    PreflightBlocked {
        issues: Vec<String>,
        suggestions: Vec<String>,
    },

    #[error("The sandbox did not start after {attempts} attempts. Reload the page and try again.")]
    BootTimeout { attempts: u32 },

    #[error("The sandbox failed to start: {0}")]
    BootFailed(#[source] SandboxError),

    #[error("Failed to load project files; the repository may be too large ({reason})")]
    MountFailed { reason: String },

    #[error("`{command}` did not finish within {}s. Open the terminal and run it manually to see where it hangs.", .timeout.as_secs())]
    InstallTimeout { command: String, timeout: Duration },

    #[error("Dependency installation failed after {attempts} attempts (last exit code {exit_code}). Check the output above for the failing package.")]
    InstallFailed { exit_code: i32, attempts: u32 },

    #[error("No start script found. Add a \"dev\" or \"start\" script to package.json.")]
    NoStartScript,

    #[error("The dev server exited with code {code} before it became reachable. Check the output above.")]
    ServerExited { code: i32 },

    #[error("Failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: SandboxError,
    },

    #[error("The sandbox is not running. Start a preview first.")]
    NotBooted,

    #[error("{0}")]
    Internal(String),
}

fn blocked_message(issues: &[String], suggestions: &[String]) -> String {
    let mut message = format!("This project cannot run in the browser: {}", issues.join("; "));
    if !suggestions.is_empty() {
        message.push_str(". ");
        message.push_str(&suggestions.join(". "));
    }
    message
}

impl BootstrapError {
    /// Stable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::PreflightBlocked { .. } => codes::BOOTSTRAP_PREFLIGHT_BLOCKED,
            Self::BootTimeout { .. } => codes::BOOTSTRAP_BOOT_TIMEOUT,
            Self::BootFailed(_) => codes::BOOTSTRAP_BOOT_FAILED,
            Self::MountFailed { .. } => codes::BOOTSTRAP_MOUNT_FAILED,
            Self::InstallTimeout { .. } => codes::BOOTSTRAP_INSTALL_TIMEOUT,
            Self::InstallFailed { .. } => codes::BOOTSTRAP_INSTALL_FAILED,
            Self::NoStartScript => codes::BOOTSTRAP_NO_START_SCRIPT,
            Self::ServerExited { .. } => codes::BOOTSTRAP_SERVER_EXITED,
            Self::Spawn { .. } => codes::BOOTSTRAP_SPAWN_FAILED,
            Self::NotBooted => codes::BOOTSTRAP_NOT_BOOTED,
            Self::Internal(_) => codes::BOOTSTRAP_INTERNAL,
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub(crate) fn spawn(command: &str, source: SandboxError) -> Self {
        Self::Spawn {
            command: command.to_string(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_codes_are_screaming_snake_case() {
        let codes = [
            codes::BOOTSTRAP_PREFLIGHT_BLOCKED,
            codes::BOOTSTRAP_BOOT_TIMEOUT,
            codes::BOOTSTRAP_BOOT_FAILED,
            codes::BOOTSTRAP_MOUNT_FAILED,
            codes::BOOTSTRAP_INSTALL_TIMEOUT,
            codes::BOOTSTRAP_INSTALL_FAILED,
            codes::BOOTSTRAP_NO_START_SCRIPT,
            codes::BOOTSTRAP_SERVER_EXITED,
            codes::BOOTSTRAP_SPAWN_FAILED,
            codes::BOOTSTRAP_NOT_BOOTED,
            codes::BOOTSTRAP_INTERNAL,
        ];

        for code in codes {
            assert!(
                code.chars().all(|c| c.is_uppercase() || c == '_'),
                "Code '{code}' should be SCREAMING_SNAKE_CASE"
            );
        }
    }

    #[test]
    fn test_messages_are_actionable() {
        let err = BootstrapError::MountFailed {
            reason: "timed out".into(),
        };
        assert!(err.to_string().contains("repository may be too large"));
        assert_eq!(err.code(), codes::BOOTSTRAP_MOUNT_FAILED);

        let err = BootstrapError::PreflightBlocked {
            issues: vec!["SSH dependency: leftpad".into()],
            suggestions: vec!["Use https".into()],
        };
        assert_eq!(
            err.to_string(),
            "This project cannot run in the browser: SSH dependency: leftpad. Use https"
        );
    }
}
