use super::load_project_blocking;
use launchpad_core::install::{possible_strategies, Precondition};
use launchpad_core::{framework, staticsite, Config, FrameworkConfig, InstallStrategy, ProjectKind};
use miette::{IntoDiagnostic, Result};
use serde::Serialize;

#[derive(Serialize)]
struct InstallStep {
    precondition: Precondition,
    #[serde(flatten)]
    strategy: InstallStrategy,
}

#[derive(Serialize)]
struct StaticPlan {
    doc_root: String,
    served_dirs: Vec<String>,
}

#[derive(Serialize)]
struct PlanOutput {
    target: String,
    kind: ProjectKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    static_site: Option<StaticPlan>,
    install: Vec<InstallStep>,
    start_script: Option<String>,
    dev_server: FrameworkConfig,
}

/// Print what a run would do: install ladder, dev-server command and, for
/// static sites, the synthesized server.
pub fn run(config: &Config, target: Option<&str>, kind: Option<ProjectKind>) -> Result<()> {
    let mut project = load_project_blocking(&config.cwd, target, kind)?;

    let static_site = if project.kind == ProjectKind::Static && project.tree.manifest().is_none() {
        let site = staticsite::synthesize(&project.tree);
        site.apply(&mut project.tree);
        Some(StaticPlan {
            doc_root: site.doc_root,
            served_dirs: site.served_dirs,
        })
    } else {
        None
    };

    let manifest = project.tree.manifest().unwrap_or_default();
    let plan = PlanOutput {
        target: project.label,
        kind: project.kind,
        static_site,
        install: possible_strategies(project.tree.has_strict_lockfile())
            .into_iter()
            .map(|(precondition, strategy)| InstallStep {
                precondition,
                strategy,
            })
            .collect(),
        start_script: framework::declared_start_script(&manifest).map(str::to_string),
        dev_server: framework::configure(&manifest),
    };

    if config.json_logs {
        println!("{}", serde_json::to_string_pretty(&plan).into_diagnostic()?);
    } else {
        print_human(&plan);
    }
    Ok(())
}

fn print_human(plan: &PlanOutput) {
    println!("\x1b[1m{}\x1b[0m ({})", plan.target, plan.kind);

    if let Some(site) = &plan.static_site {
        println!("\n\x1b[1m## Static server\x1b[0m");
        println!("  Document root:  {}", site.doc_root);
        println!("  Served:         {}", site.served_dirs.join(", "));
    }

    println!("\n\x1b[1m## Install\x1b[0m");
    for (i, step) in plan.install.iter().enumerate() {
        let when = match step.precondition {
            Precondition::StrictLockfile => "lockfile present",
            Precondition::Always => "always",
            Precondition::PeerConflict => "after a peer conflict",
            Precondition::NativeBuildFailure => "after a native build failure",
        };
        println!("  {}. {:<55} ({when})", i + 1, step.strategy.command_line());
    }

    println!("\n\x1b[1m## Dev server\x1b[0m");
    match &plan.start_script {
        Some(script) => println!("  Script:     {script}"),
        None => println!("  Script:     \x1b[31mnone\x1b[0m (the run would stop here)"),
    }
    if let Some(name) = &plan.dev_server.name {
        println!("  Framework:  {name}");
    }
    println!("  Command:    {}", plan.dev_server.argv.join(" "));
    if let Some(env) = &plan.dev_server.env {
        for (key, value) in env {
            println!("  Env:        {key}={value}");
        }
    }
}
