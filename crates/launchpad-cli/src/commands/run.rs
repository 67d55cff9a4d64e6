use super::load_project;
use crate::sandbox::LocalRuntime;
use launchpad_core::{Config, ContainerStatus, ProjectKind, Session, SessionEvent};
use miette::{IntoDiagnostic, Result};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

const SHELL_COLS: u16 = 120;
const SHELL_ROWS: u16 = 30;

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub kind: Option<ProjectKind>,
    pub public_host: String,
    pub shell: bool,
}

pub fn run(config: &Config, target: Option<&str>, options: RunOptions) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().into_diagnostic()?;
    runtime.block_on(run_async(config, target, options))
}

async fn run_async(config: &Config, target: Option<&str>, options: RunOptions) -> Result<()> {
    let project = load_project(&config.cwd, target, options.kind).await?;
    let mut bootstrap = project.bootstrap_config()?;
    if options.shell {
        bootstrap.shell_command = std::env::var("SHELL").unwrap_or_else(|_| "sh".to_string());
    }

    let json = config.json_logs;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            print_event(&event, json);
        }
    });

    let sandbox = Arc::new(LocalRuntime::new(options.public_host));
    let mut session = Session::new(sandbox, bootstrap, tx);
    tracing::info!(project = %project.label, kind = %project.kind, "starting bootstrap");

    let outcome = {
        let run = session.run(project.tree, project.kind);
        tokio::pin!(run);
        tokio::select! {
            result = &mut run => Some(result),
            _ = tokio::signal::ctrl_c() => None,
        }
    };

    let result = match outcome {
        None => {
            tracing::info!("interrupted, tearing down");
            Ok(())
        }
        Some(Err(err)) => Err::<(), _>(err).into_diagnostic(),
        Some(Ok(outcome)) => {
            if !json {
                println!("\n\x1b[1;32mPreview ready:\x1b[0m {}  (Ctrl-C to stop)", outcome.url);
            }
            if options.shell {
                interactive_shell(&mut session).await
            } else {
                tokio::signal::ctrl_c().await.into_diagnostic()
            }
        }
    };

    session.dispose();
    let _ = printer.await;
    result
}

/// Forward stdin lines to the sandbox shell until Ctrl-C or end of input.
async fn interactive_shell(session: &mut Session) -> Result<()> {
    session.open_shell(SHELL_COLS, SHELL_ROWS).await.into_diagnostic()?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => match line.into_diagnostic()? {
                Some(line) => {
                    if !session.write_shell(format!("{line}\n")).await {
                        tracing::warn!("shell closed");
                        return Ok(());
                    }
                }
                None => return Ok(()),
            },
            _ = tokio::signal::ctrl_c() => return Ok(()),
        }
        if session.status() != ContainerStatus::Ready {
            return Ok(());
        }
    }
}

fn print_event(event: &SessionEvent, json: bool) {
    if json {
        if let Ok(line) = serde_json::to_string(event) {
            println!("{line}");
        }
        return;
    }

    match event {
        SessionEvent::Status { status } => println!("\x1b[2m[{status}]\x1b[0m"),
        SessionEvent::Output { data } | SessionEvent::ShellOutput { data } => {
            let mut out = std::io::stdout().lock();
            let _ = out.write_all(data.as_bytes());
            let _ = out.flush();
        }
        SessionEvent::Hint { message } => println!("\x1b[33mhint:\x1b[0m {message}"),
        SessionEvent::Preflight { report } => {
            if let Some(framework) = &report.framework_detected {
                println!("framework: {framework}");
            }
            for warning in &report.warnings {
                println!("\x1b[33mwarn:\x1b[0m {warning}");
            }
            for suggestion in &report.suggestions {
                println!("\x1b[2msuggestion: {suggestion}\x1b[0m");
            }
        }
        SessionEvent::InstallAttempt { attempt, command } => {
            println!("\x1b[1minstall #{attempt}:\x1b[0m {command}");
        }
        SessionEvent::PreviewReady { url, port } => println!("ready on port {port}: {url}"),
        SessionEvent::Error { code, message } => eprintln!("\x1b[31merror[{code}]:\x1b[0m {message}"),
    }
}
