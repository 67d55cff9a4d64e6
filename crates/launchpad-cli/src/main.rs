#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::too_many_lines)]

mod commands;
mod logging;
mod sandbox;

use clap::Parser;
use launchpad_core::{Config, ProjectKind};
use miette::Result;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "launchpad")]
#[command(author, version, about = "Boot a live preview of an unknown Node.js or static project", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted output (stable, machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Override the working directory
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print version information
    Version,

    /// Run compatibility pre-flight checks on a project
    Check {
        /// Local directory or GitHub repository (owner/repo or URL). Defaults to the working directory.
        target: Option<String>,

        /// Treat the project as this kind instead of detecting it
        #[arg(long, value_name = "KIND")]
        kind: Option<ProjectKind>,
    },

    /// Show how a project would be installed and started, without running anything
    Plan {
        /// Local directory or GitHub repository (owner/repo or URL). Defaults to the working directory.
        target: Option<String>,

        /// Treat the project as this kind instead of detecting it
        #[arg(long, value_name = "KIND")]
        kind: Option<ProjectKind>,
    },

    /// Bootstrap the project in a local sandbox and wait for the preview
    Run {
        /// Local directory or GitHub repository (owner/repo or URL). Defaults to the working directory.
        target: Option<String>,

        /// Treat the project as this kind instead of detecting it
        #[arg(long, value_name = "KIND")]
        kind: Option<ProjectKind>,

        /// Host used in reported preview URLs
        #[arg(long, value_name = "HOST", default_value = "0.0.0.0")]
        public_host: String,

        /// Open an interactive shell in the sandbox once the preview is ready
        #[arg(long)]
        shell: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    let config = Config::new(cwd.clone())
        .with_verbosity(cli.verbose)
        .with_json_logs(cli.json);

    logging::init(config.verbosity, config.json_logs);

    match cli.command {
        Some(Commands::Version) | None => commands::version::run(),
        Some(Commands::Check { target, kind }) => {
            let span = tracing::info_span!("check", cmd = "check", cwd = %cwd.display());
            let _guard = span.enter();
            commands::check::run(&config, target.as_deref(), kind)
        }
        Some(Commands::Plan { target, kind }) => {
            let span = tracing::info_span!("plan", cmd = "plan", cwd = %cwd.display());
            let _guard = span.enter();
            commands::plan::run(&config, target.as_deref(), kind)
        }
        Some(Commands::Run {
            target,
            kind,
            public_host,
            shell,
        }) => {
            let span = tracing::info_span!("run", cmd = "run", cwd = %cwd.display());
            let _guard = span.enter();
            commands::run::run(
                &config,
                target.as_deref(),
                commands::run::RunOptions {
                    kind,
                    public_host,
                    shell,
                },
            )
        }
    }
}
