//! Host-machine sandbox backing `launchpad run`.
//!
//! The project is written into a temporary directory and processes run through
//! `tokio::process`. There is no port-forwarding layer to announce bound
//! ports, so each process gets a prober that polls candidate ports on loopback
//! and reports newly opened ones under the configured public host.

use async_trait::async_trait;
use launchpad_core::{
    BootOptions, FileTree, PortEvent, ProcessControl, Sandbox, SandboxError, SandboxRuntime,
    SpawnedProcess,
};
use launchpad_util::fs::{atomic_write, safe_join};
use std::collections::{BTreeMap, HashSet};
use std::net::Ipv4Addr;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::process::Command;
use tokio::sync::{broadcast, mpsc, oneshot, Notify};

/// Ports dev servers commonly bind, probed after `$PORT`.
pub const CANDIDATE_PORTS: &[u16] = &[3000, 5173, 8080, 4200, 8000, 4321, 5000];

const PROBE_INTERVAL: Duration = Duration::from_millis(500);
const CONNECT_TIMEOUT: Duration = Duration::from_millis(200);
const READ_CHUNK: usize = 8 * 1024;

#[derive(Debug, Clone)]
pub struct LocalRuntime {
    public_host: String,
}

impl LocalRuntime {
    pub fn new(public_host: impl Into<String>) -> Self {
        Self {
            public_host: public_host.into(),
        }
    }
}

#[async_trait]
impl SandboxRuntime for LocalRuntime {
    async fn boot(&self, options: &BootOptions) -> Result<Box<dyn Sandbox>, SandboxError> {
        let prefix = options.workdir_name.as_deref().unwrap_or("launchpad-");
        let dir = tempfile::Builder::new()
            .prefix(prefix)
            .tempdir()
            .map_err(|e| SandboxError::Boot(e.to_string()))?;
        tracing::debug!(dir = %dir.path().display(), "local sandbox booted");

        let (ports, _) = broadcast::channel(16);
        Ok(Box::new(LocalSandbox {
            dir,
            public_host: self.public_host.clone(),
            ports,
        }))
    }
}

pub struct LocalSandbox {
    dir: TempDir,
    public_host: String,
    ports: broadcast::Sender<PortEvent>,
}

impl LocalSandbox {
    pub fn root(&self) -> &Path {
        self.dir.path()
    }
}

#[async_trait]
impl Sandbox for LocalSandbox {
    /// Remounts over a running server, so each file is replaced atomically.
    async fn mount(&self, tree: &FileTree) -> Result<(), SandboxError> {
        let root = self.root().to_path_buf();
        let tree = tree.clone();
        let files = tree.len();

        tokio::task::spawn_blocking(move || {
            for (path, contents) in tree.iter() {
                let target = safe_join(&root, path)
                    .ok_or_else(|| SandboxError::Mount(format!("path escapes the sandbox: {path}")))?;
                atomic_write(&target, contents)?;
            }
            Ok::<_, SandboxError>(())
        })
        .await
        .map_err(|e| SandboxError::Mount(e.to_string()))??;

        tracing::debug!(files, root = %self.root().display(), "mounted");
        Ok(())
    }

    async fn spawn(
        &self,
        command: &str,
        args: &[String],
        env: &BTreeMap<String, String>,
    ) -> Result<SpawnedProcess, SandboxError> {
        let mut cmd = Command::new(command);
        cmd.args(args)
            .envs(env)
            .current_dir(self.root())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own group, so a kill also reaches servers forked by `npm run`.
        #[cfg(unix)]
        cmd.process_group(0);
        let mut child = cmd.spawn().map_err(|e| SandboxError::Spawn {
            command: command.to_string(),
            message: e.to_string(),
        })?;
        tracing::debug!(command, ?args, pid = child.id(), "spawned");

        let (out_tx, output) = mpsc::channel(64);
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward(stdout, out_tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward(stderr, out_tx));
        }

        let input = child.stdin.take().map(|mut stdin| {
            let (tx, mut rx) = mpsc::channel::<String>(32);
            tokio::spawn(async move {
                while let Some(data) = rx.recv().await {
                    if stdin.write_all(data.as_bytes()).await.is_err() || stdin.flush().await.is_err() {
                        break;
                    }
                }
            });
            tx
        });

        let probe = tokio::spawn(probe_ports(
            self.ports.clone(),
            self.public_host.clone(),
            candidate_ports(env),
        ));

        let control = Arc::new(LocalControl {
            pid: child.id(),
            requested: Notify::new(),
        });
        let kill = Arc::clone(&control);
        let (exit_tx, exit) = oneshot::channel();
        let name = command.to_string();
        tokio::spawn(async move {
            let status = tokio::select! {
                status = child.wait() => status,
                () = kill.requested.notified() => {
                    if let Err(e) = child.kill().await {
                        tracing::warn!(command = %name, error = %e, "kill failed");
                    }
                    child.wait().await
                }
            };
            probe.abort();

            let code = match status {
                Ok(status) => status.code().unwrap_or(-1),
                Err(e) => {
                    tracing::warn!(command = %name, error = %e, "wait failed");
                    -1
                }
            };
            tracing::debug!(command = %name, exit_code = code, "process exited");
            let _ = exit_tx.send(code);
        });

        Ok(SpawnedProcess {
            output,
            exit,
            control,
            input,
        })
    }

    fn subscribe_ports(&self) -> broadcast::Receiver<PortEvent> {
        self.ports.subscribe()
    }
}

struct LocalControl {
    /// Also the process group id.
    pid: Option<u32>,
    requested: Notify,
}

impl LocalControl {
    #[cfg(unix)]
    fn kill_group(&self) {
        let Some(pid) = self.pid.and_then(|pid| libc::pid_t::try_from(pid).ok()) else {
            return;
        };
        let ret = unsafe { libc::killpg(pid, libc::SIGKILL) };
        if ret != 0 {
            tracing::debug!(pid, error = %std::io::Error::last_os_error(), "killpg failed");
        }
    }

    #[cfg(not(unix))]
    fn kill_group(&self) {}
}

impl ProcessControl for LocalControl {
    fn kill(&self) {
        self.kill_group();
        self.requested.notify_one();
    }

    fn resize(&self, cols: u16, rows: u16) {
        // Pipes, not a pty.
        tracing::trace!(cols, rows, "resize ignored");
    }
}

async fn forward<R: AsyncRead + Unpin>(mut reader: R, tx: mpsc::Sender<String>) {
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let chunk = String::from_utf8_lossy(&buf[..n]).into_owned();
                if tx.send(chunk).await.is_err() {
                    break;
                }
            }
        }
    }
}

/// `$PORT` from the process environment first, then [`CANDIDATE_PORTS`].
fn candidate_ports(env: &BTreeMap<String, String>) -> Vec<u16> {
    let mut ports: Vec<u16> = env.get("PORT").and_then(|p| p.parse().ok()).into_iter().collect();
    for &port in CANDIDATE_PORTS {
        if !ports.contains(&port) {
            ports.push(port);
        }
    }
    ports
}

async fn is_listening(port: u16) -> bool {
    matches!(
        tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect((Ipv4Addr::LOCALHOST, port))).await,
        Ok(Ok(_))
    )
}

/// Report each candidate port the first time it accepts connections.
///
/// Ports already open when the process starts belong to something else and
/// are never reported.
async fn probe_ports(ports: broadcast::Sender<PortEvent>, host: String, candidates: Vec<u16>) {
    let mut seen = HashSet::new();
    for &port in &candidates {
        if is_listening(port).await {
            tracing::debug!(port, "port already in use, not probing");
            seen.insert(port);
        }
    }

    let mut interval = tokio::time::interval(PROBE_INTERVAL);
    loop {
        interval.tick().await;
        for &port in &candidates {
            if seen.contains(&port) || !is_listening(port).await {
                continue;
            }
            seen.insert(port);
            tracing::debug!(port, "port bound");
            let _ = ports.send(PortEvent {
                port,
                url: format!("http://{host}:{port}"),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_candidate_ports_prefer_env_port() {
        let ports = candidate_ports(&env(&[("PORT", "4000")]));
        assert_eq!(ports[0], 4000);
        assert_eq!(ports.len(), CANDIDATE_PORTS.len() + 1);

        let ports = candidate_ports(&env(&[("PORT", "5173")]));
        assert_eq!(ports[0], 5173);
        assert_eq!(ports.len(), CANDIDATE_PORTS.len());

        assert_eq!(candidate_ports(&env(&[("PORT", "nope")])), CANDIDATE_PORTS);
    }

    #[tokio::test]
    async fn test_mount_writes_nested_files() {
        let runtime = LocalRuntime::new("0.0.0.0");
        let sandbox = runtime.boot(&BootOptions::default()).await.unwrap();

        let mut tree = FileTree::new();
        tree.insert("package.json", "{}");
        tree.insert("public/css/site.css", "body {}");
        sandbox.mount(&tree).await.unwrap();

        let mut proc = sandbox
            .spawn("cat", &["public/css/site.css".to_string()], &BTreeMap::new())
            .await
            .unwrap();
        let mut out = String::new();
        while let Some(chunk) = proc.output.recv().await {
            out.push_str(&chunk);
        }
        assert_eq!(out, "body {}");
        assert_eq!(proc.exit.await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_spawn_missing_program_is_spawn_error() {
        let runtime = LocalRuntime::new("0.0.0.0");
        let sandbox = runtime.boot(&BootOptions::default()).await.unwrap();
        let err = sandbox
            .spawn("launchpad-no-such-program", &[], &BTreeMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SandboxError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_kill_reports_exit() {
        let runtime = LocalRuntime::new("0.0.0.0");
        let sandbox = runtime.boot(&BootOptions::default()).await.unwrap();
        let proc = sandbox
            .spawn("sleep", &["30".to_string()], &BTreeMap::new())
            .await
            .unwrap();
        proc.control.kill();
        let code = tokio::time::timeout(Duration::from_secs(5), proc.exit)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(code, -1);
    }

    /// Zombie, dead or gone entirely.
    #[cfg(target_os = "linux")]
    fn is_dead(pid: u32) -> bool {
        match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            Ok(stat) => stat
                .rsplit_once(')')
                .and_then(|(_, rest)| rest.trim_start().chars().next())
                .is_some_and(|state| matches!(state, 'Z' | 'X')),
            Err(_) => true,
        }
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_kill_reaches_forked_children() {
        let runtime = LocalRuntime::new("0.0.0.0");
        let sandbox = runtime.boot(&BootOptions::default()).await.unwrap();
        let mut proc = sandbox
            .spawn(
                "sh",
                &["-c".to_string(), "sleep 4242 & echo $!; wait".to_string()],
                &BTreeMap::new(),
            )
            .await
            .unwrap();

        let mut out = String::new();
        while !out.contains('\n') {
            let chunk = tokio::time::timeout(Duration::from_secs(5), proc.output.recv())
                .await
                .unwrap()
                .expect("shell prints the child pid");
            out.push_str(&chunk);
        }
        let grandchild: u32 = out.trim().parse().unwrap();
        assert!(!is_dead(grandchild));

        proc.control.kill();
        tokio::time::timeout(Duration::from_secs(5), proc.exit)
            .await
            .unwrap()
            .unwrap();

        let mut dead = false;
        for _ in 0..50 {
            if is_dead(grandchild) {
                dead = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(dead, "background child {grandchild} survived the kill");
    }
}
