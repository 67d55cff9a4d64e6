//! Scripted in-memory sandbox for orchestrator tests.

#![allow(dead_code)]

use async_trait::async_trait;
use launchpad_core::orchestrator::SessionEvent;
use launchpad_core::{
    BootOptions, FileTree, PortEvent, ProcessControl, Sandbox, SandboxError, SandboxRuntime,
    SpawnedProcess,
};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, Notify};

/// One step a scripted process performs.
#[derive(Debug, Clone)]
pub enum Step {
    Output(String),
    Port(u16, String),
    Sleep(Duration),
}

#[derive(Debug, Clone, Default)]
pub struct Script {
    pub steps: Vec<Step>,
    /// `None` keeps the process alive until killed.
    pub exit: Option<i32>,
    /// Report `exit` before this step and keep running the rest until killed,
    /// like a launcher that forks the real server and returns.
    pub detach_at: Option<usize>,
}

impl Script {
    pub fn exits(code: i32) -> Self {
        Self {
            exit: Some(code),
            ..Self::default()
        }
    }

    pub fn detach(mut self, code: i32) -> Self {
        self.exit = Some(code);
        self.detach_at = Some(self.steps.len());
        self
    }

    pub fn runs_forever() -> Self {
        Self::default()
    }

    pub fn output(mut self, text: &str) -> Self {
        self.steps.push(Step::Output(text.to_string()));
        self
    }

    pub fn port(mut self, port: u16, url: &str) -> Self {
        self.steps.push(Step::Port(port, url.to_string()));
        self
    }

    pub fn sleep(mut self, secs: u64) -> Self {
        self.steps.push(Step::Sleep(Duration::from_secs(secs)));
        self
    }
}

#[derive(Debug, Clone, Copy)]
pub enum BootBehavior {
    Hang,
    Fail,
}

#[derive(Debug, Clone)]
pub struct Spawned {
    pub argv: Vec<String>,
    pub env: BTreeMap<String, String>,
}

#[derive(Default)]
pub struct FakeState {
    pub scripts: Mutex<Vec<(String, Script)>>,
    pub boot_plan: Mutex<VecDeque<BootBehavior>>,
    pub boots: AtomicU32,
    pub mount_delay: Mutex<Option<Duration>>,
    pub mount_panics: AtomicBool,
    pub mounted: Mutex<Vec<FileTree>>,
    pub spawned: Mutex<Vec<Spawned>>,
    pub controls: Mutex<Vec<Arc<FakeControl>>>,
}

impl FakeState {
    pub fn spawned_argv(&self) -> Vec<Vec<String>> {
        self.spawned
            .lock()
            .unwrap()
            .iter()
            .map(|s| s.argv.clone())
            .collect()
    }

    pub fn all_killed(&self) -> bool {
        self.controls
            .lock()
            .unwrap()
            .iter()
            .all(|c| c.killed.load(Ordering::SeqCst) || c.finished.load(Ordering::SeqCst))
    }

    /// Longest script key that prefixes the command line.
    fn script_for(&self, command_line: &str) -> Script {
        self.scripts
            .lock()
            .unwrap()
            .iter()
            .filter(|(key, _)| command_line.starts_with(key.as_str()))
            .max_by_key(|(key, _)| key.len())
            .map(|(_, script)| script.clone())
            .unwrap_or_else(|| Script::exits(0))
    }
}

#[derive(Clone, Default)]
pub struct FakeRuntime {
    pub state: Arc<FakeState>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the process whose command line starts with `prefix`.
    pub fn script(self, prefix: &str, script: Script) -> Self {
        self.state
            .scripts
            .lock()
            .unwrap()
            .push((prefix.to_string(), script));
        self
    }

    pub fn boot_plan(self, plan: &[BootBehavior]) -> Self {
        self.state.boot_plan.lock().unwrap().extend(plan.iter().copied());
        self
    }

    pub fn mount_delay(self, delay: Duration) -> Self {
        *self.state.mount_delay.lock().unwrap() = Some(delay);
        self
    }

    pub fn mount_panics(self) -> Self {
        self.state.mount_panics.store(true, Ordering::SeqCst);
        self
    }
}

#[async_trait]
impl SandboxRuntime for FakeRuntime {
    async fn boot(&self, _options: &BootOptions) -> Result<Box<dyn Sandbox>, SandboxError> {
        self.state.boots.fetch_add(1, Ordering::SeqCst);
        let behavior = self.state.boot_plan.lock().unwrap().pop_front();
        match behavior {
            Some(BootBehavior::Hang) => std::future::pending().await,
            Some(BootBehavior::Fail) => Err(SandboxError::Boot("cross-origin isolation missing".into())),
            None => {
                let (ports, _) = broadcast::channel(16);
                Ok(Box::new(FakeSandbox {
                    state: Arc::clone(&self.state),
                    ports,
                }))
            }
        }
    }
}

pub struct FakeSandbox {
    state: Arc<FakeState>,
    ports: broadcast::Sender<PortEvent>,
}

#[derive(Default)]
pub struct FakeControl {
    pub killed: AtomicBool,
    pub finished: AtomicBool,
    notify: Notify,
}

impl ProcessControl for FakeControl {
    fn kill(&self) {
        self.killed.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    fn resize(&self, _cols: u16, _rows: u16) {}
}

#[async_trait]
impl Sandbox for FakeSandbox {
    async fn mount(&self, tree: &FileTree) -> Result<(), SandboxError> {
        let delay = *self.state.mount_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.state.mount_panics.load(Ordering::SeqCst) {
            panic!("mount table corrupted");
        }
        self.state.mounted.lock().unwrap().push(tree.clone());
        Ok(())
    }

    async fn spawn(
        &self,
        command: &str,
        args: &[String],
        env: &BTreeMap<String, String>,
    ) -> Result<SpawnedProcess, SandboxError> {
        let mut argv = vec![command.to_string()];
        argv.extend(args.iter().cloned());
        let script = self.state.script_for(&argv.join(" "));
        self.state.spawned.lock().unwrap().push(Spawned {
            argv,
            env: env.clone(),
        });

        let (out_tx, out_rx) = mpsc::channel(64);
        let (exit_tx, exit_rx) = oneshot::channel();
        let control = Arc::new(FakeControl::default());
        self.state.controls.lock().unwrap().push(Arc::clone(&control));

        let ports = self.ports.clone();
        let task_control = Arc::clone(&control);
        tokio::spawn(async move {
            let mut exit_tx = Some(exit_tx);
            let detach = |exit_tx: &mut Option<oneshot::Sender<i32>>| {
                if let (Some(tx), Some(code)) = (exit_tx.take(), script.exit) {
                    let _ = tx.send(code);
                }
            };
            for (index, step) in script.steps.into_iter().enumerate() {
                if task_control.killed.load(Ordering::SeqCst) {
                    return;
                }
                if script.detach_at == Some(index) {
                    detach(&mut exit_tx);
                }
                match step {
                    Step::Output(text) => {
                        let _ = out_tx.send(text).await;
                    }
                    Step::Port(port, url) => {
                        let _ = ports.send(PortEvent { port, url });
                    }
                    Step::Sleep(d) => tokio::time::sleep(d).await,
                }
            }
            if script.detach_at.is_some() {
                detach(&mut exit_tx);
            }
            match (script.exit, exit_tx) {
                (Some(code), Some(exit_tx)) => {
                    drop(out_tx);
                    task_control.finished.store(true, Ordering::SeqCst);
                    let _ = exit_tx.send(code);
                }
                (_, exit_tx) => {
                    task_control.notify.notified().await;
                    drop(out_tx);
                    drop(exit_tx);
                }
            }
        });

        Ok(SpawnedProcess {
            output: out_rx,
            exit: exit_rx,
            control,
            input: None,
        })
    }

    fn subscribe_ports(&self) -> broadcast::Receiver<PortEvent> {
        self.ports.subscribe()
    }
}

/// Drain everything already emitted.
pub fn drain(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        out.push(event);
    }
    out
}

pub fn statuses(events: &[SessionEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::Status { status } => Some(status.to_string()),
            _ => None,
        })
        .collect()
}

pub fn hints(events: &[SessionEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::Hint { message } => Some(message.clone()),
            _ => None,
        })
        .collect()
}

pub fn tree(files: &[(&str, &str)]) -> FileTree {
    let mut tree = FileTree::new();
    for (path, contents) in files {
        tree.insert(*path, *contents);
    }
    tree
}
