//! Bootstrap orchestrator.
//!
//! A [`Session`] owns everything one preview needs: the booted sandbox, the
//! live process, hint timers, output pumps, the interactive shell and the
//! readiness latch. [`Session::run`] drives
//!
//! ```text
//! idle -> booting -> mounting -> installing -> running -> ready
//! ```
//!
//! with an exit to `error` from every active phase. Observers follow along
//! through the [`SessionEvent`] channel given to [`Session::new`].
//!
//! Teardown kills the live process, cancels timers and output tasks, closes
//! the shell and returns to `idle`. It is idempotent and runs automatically at
//! the start of every run and on drop.

pub mod error;
pub mod event;
mod install;
mod output;
mod server;
pub mod status;
mod timers;

pub use error::{codes, BootstrapError};
pub use event::{EventSink, SessionEvent};
pub use status::ContainerStatus;

use crate::config::BootstrapConfig;
use crate::framework::{self, FrameworkConfig};
use crate::preflight::{self, CompatibilityReport};
use crate::project::{FileTree, ProjectKind};
use crate::readiness::ReadinessDetector;
use crate::sandbox::{BootOptions, ProcessControl, Sandbox, SandboxError, SandboxRuntime};
use crate::staticsite;
use futures::FutureExt;
use output::spawn_pump;
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use timers::Timers;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Result of a run that reached `ready`.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub url: String,
    pub port: u16,
    pub framework: FrameworkConfig,
    pub report: CompatibilityReport,
    pub install_attempts: u32,
    /// Document root chosen for a synthesized static server.
    pub doc_root: Option<String>,
}

struct ShellHandle {
    control: Arc<dyn ProcessControl>,
    input: Option<mpsc::Sender<String>>,
    pump: JoinHandle<()>,
}

pub struct Session {
    config: BootstrapConfig,
    runtime: Arc<dyn SandboxRuntime>,
    events: EventSink,
    status: ContainerStatus,
    sandbox: Option<Arc<dyn Sandbox>>,
    /// Live install or dev-server process.
    process: Option<Arc<dyn ProcessControl>>,
    timers: Timers,
    tasks: Vec<JoinHandle<()>>,
    shell: Option<ShellHandle>,
    detector: ReadinessDetector,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("status", &self.status)
            .field("booted", &self.sandbox.is_some())
            .field("process", &self.process.is_some())
            .field("shell", &self.shell.is_some())
            .finish_non_exhaustive()
    }
}

impl Session {
    #[must_use]
    pub fn new(
        runtime: Arc<dyn SandboxRuntime>,
        config: BootstrapConfig,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        Self {
            config,
            runtime,
            events: EventSink::new(events),
            status: ContainerStatus::Idle,
            sandbox: None,
            process: None,
            timers: Timers::default(),
            tasks: Vec::new(),
            shell: None,
            detector: ReadinessDetector::new(),
        }
    }

    #[must_use]
    pub fn status(&self) -> ContainerStatus {
        self.status
    }

    #[must_use]
    pub fn config(&self) -> &BootstrapConfig {
        &self.config
    }

    /// Whether a dev-server or install process is alive.
    #[must_use]
    pub fn has_live_process(&self) -> bool {
        self.process.is_some()
    }

    /// Timers armed and not yet fired.
    #[must_use]
    pub fn live_timers(&self) -> usize {
        self.timers.live()
    }

    /// Bootstrap `tree` as a project of `kind`.
    ///
    /// Any previous run is torn down first. On failure the session is left in
    /// `error` with its processes stopped, and an [`SessionEvent::Error`] has
    /// been emitted.
    pub async fn run(&mut self, tree: FileTree, kind: ProjectKind) -> Result<RunOutcome, BootstrapError> {
        self.teardown();

        let result = match AssertUnwindSafe(self.bootstrap(tree, kind)).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => Err(BootstrapError::internal(panic_message(payload.as_ref()))),
        };
        match result {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                tracing::error!(code = err.code(), error = %err, "bootstrap failed");
                self.stop();
                self.set_status(ContainerStatus::Error);
                self.events.emit(SessionEvent::Error {
                    code: err.code().to_string(),
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    async fn bootstrap(&mut self, mut tree: FileTree, kind: ProjectKind) -> Result<RunOutcome, BootstrapError> {
        self.set_status(ContainerStatus::Booting);
        let sandbox = self.boot().await?;

        self.set_status(ContainerStatus::Mounting);
        let doc_root = if kind == ProjectKind::Static && tree.manifest().is_none() {
            let site = staticsite::synthesize(&tree);
            tracing::info!(doc_root = %site.doc_root, "serving static site");
            site.apply(&mut tree);
            Some(site.doc_root)
        } else {
            None
        };
        self.mount(&sandbox, &tree).await?;

        let report = preflight::check_tree(&tree, kind, self.config.runtime_node_major);
        self.events.emit(SessionEvent::Preflight {
            report: report.clone(),
        });
        if !report.can_run {
            return Err(BootstrapError::PreflightBlocked {
                issues: report.issues,
                suggestions: report.suggestions,
            });
        }

        self.set_status(ContainerStatus::Installing);
        let install_attempts = self
            .install_dependencies(&sandbox, tree.has_strict_lockfile())
            .await?;

        let manifest = tree.manifest().unwrap_or_default();
        if framework::declared_start_script(&manifest).is_none() {
            return Err(BootstrapError::NoStartScript);
        }
        let config = framework::configure(&manifest);

        let (port, url) = self.launch_server(&sandbox, &config).await?;
        self.set_status(ContainerStatus::Ready);
        self.events.emit(SessionEvent::PreviewReady {
            url: url.clone(),
            port,
        });

        Ok(RunOutcome {
            url,
            port,
            framework: config,
            report,
            install_attempts,
            doc_root,
        })
    }

    /// Reuse the booted sandbox or boot one, retrying timeouts only.
    async fn boot(&mut self) -> Result<Arc<dyn Sandbox>, BootstrapError> {
        if let Some(sandbox) = &self.sandbox {
            return Ok(Arc::clone(sandbox));
        }

        let attempts = self.config.boot_attempts.max(1);
        let options = BootOptions::default();
        for attempt in 1..=attempts {
            let result = tokio::time::timeout(self.config.boot_timeout, self.runtime.boot(&options))
                .await
                .unwrap_or(Err(SandboxError::Timeout(self.config.boot_timeout)));

            match result {
                Ok(sandbox) => {
                    tracing::info!(attempt, "sandbox booted");
                    let sandbox: Arc<dyn Sandbox> = Arc::from(sandbox);
                    self.sandbox = Some(Arc::clone(&sandbox));
                    return Ok(sandbox);
                }
                Err(e) if e.is_timeout() => {
                    tracing::warn!(attempt, attempts, "sandbox boot timed out");
                    if attempt < attempts {
                        self.events
                            .hint(format!("Sandbox boot timed out, retrying ({}/{attempts})...", attempt + 1));
                    }
                }
                Err(e) => return Err(BootstrapError::BootFailed(e)),
            }
        }
        Err(BootstrapError::BootTimeout { attempts })
    }

    async fn mount(&self, sandbox: &Arc<dyn Sandbox>, tree: &FileTree) -> Result<(), BootstrapError> {
        let budget = self.config.mount_timeout_for(tree.total_bytes());
        tracing::debug!(files = tree.len(), bytes = tree.total_bytes(), ?budget, "mounting project");

        match tokio::time::timeout(budget, sandbox.mount(tree)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(BootstrapError::MountFailed {
                reason: e.to_string(),
            }),
            Err(_) => Err(BootstrapError::MountFailed {
                reason: format!("timed out after {}s", budget.as_secs()),
            }),
        }
    }

    /// Start the interactive shell in the booted sandbox.
    ///
    /// Shell output is published as [`SessionEvent::ShellOutput`]. An already
    /// open shell is closed first.
    pub async fn open_shell(&mut self, cols: u16, rows: u16) -> Result<(), BootstrapError> {
        let sandbox = self.sandbox.clone().ok_or(BootstrapError::NotBooted)?;
        self.close_shell();

        let command = self.config.shell_command.clone();
        let process = sandbox
            .spawn(&command, &[], &BTreeMap::new())
            .await
            .map_err(|e| BootstrapError::spawn(&command, e))?;
        process.control.resize(cols, rows);

        let (pump, _tap) = spawn_pump(
            process.output,
            self.events.clone(),
            self.config.output_coalesce,
            |data| SessionEvent::ShellOutput { data },
        );
        self.shell = Some(ShellHandle {
            control: process.control,
            input: process.input,
            pump,
        });
        tracing::debug!(%command, cols, rows, "shell opened");
        Ok(())
    }

    /// Send keystrokes to the shell. Returns `false` when no shell accepts input.
    pub async fn write_shell(&self, data: impl Into<String>) -> bool {
        let Some(input) = self.shell.as_ref().and_then(|s| s.input.clone()) else {
            return false;
        };
        input.send(data.into()).await.is_ok()
    }

    pub fn resize_shell(&self, cols: u16, rows: u16) {
        if let Some(shell) = &self.shell {
            shell.control.resize(cols, rows);
        }
    }

    fn close_shell(&mut self) {
        if let Some(mut shell) = self.shell.take() {
            shell.input.take();
            shell.pump.abort();
            shell.control.kill();
        }
    }

    /// Kill the live process and cancel every timer and output task.
    fn stop(&mut self) {
        if let Some(process) = self.process.take() {
            process.kill();
        }
        self.timers.cancel_all();
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }

    /// Stop everything and return to `idle`. Safe to call repeatedly.
    pub fn teardown(&mut self) {
        self.stop();
        self.close_shell();
        self.detector.reset();
        self.set_status(ContainerStatus::Idle);
    }

    /// Tear down and release the sandbox.
    pub fn dispose(mut self) {
        self.teardown();
        self.sandbox = None;
    }

    fn set_status(&mut self, next: ContainerStatus) {
        if self.status == next {
            return;
        }
        if !self.status.can_transition_to(next) {
            tracing::warn!(from = %self.status, to = %next, "unexpected status transition");
        }
        tracing::debug!(from = %self.status, to = %next, "status");
        self.status = next;
        self.events.emit(SessionEvent::Status { status: next });
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop();
        self.close_shell();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic");
    format!("Internal error while starting the preview: {detail}")
}
