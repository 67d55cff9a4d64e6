#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)]

pub mod config;
pub mod error;
pub mod framework;
pub mod install;
pub mod manifest;
pub mod orchestrator;
pub mod preflight;
pub mod project;
pub mod readiness;
pub mod sandbox;
pub mod source;
pub mod staticsite;
pub mod version;

pub use config::{BootstrapConfig, Config};
pub use error::Error;
pub use framework::{configure, FrameworkConfig};
pub use install::{InstallLadder, InstallStrategy};
pub use manifest::ProjectManifest;
pub use orchestrator::{
    BootstrapError, ContainerStatus, RunOutcome, Session, SessionEvent,
};
pub use preflight::CompatibilityReport;
pub use project::{FileTree, ProjectKind};
pub use readiness::{PortDecision, ReadinessDetector};
pub use sandbox::{
    BootOptions, PortEvent, ProcessControl, Sandbox, SandboxError, SandboxRuntime,
    SpawnedProcess,
};
pub use source::{fetch_tree, FileEntry, FileSource, GithubSource, LocalSource, RepoRef, SourceError};
pub use version::VERSION;
