use super::load_project_blocking;
use launchpad_core::preflight::{self, PREFLIGHT_SCHEMA_VERSION};
use launchpad_core::{CompatibilityReport, Config, ProjectKind};
use miette::{IntoDiagnostic, Result};
use serde::Serialize;

#[derive(Serialize)]
struct CheckOutput<'a> {
    schema_version: u32,
    target: &'a str,
    kind: ProjectKind,
    report: &'a CompatibilityReport,
}

/// Run pre-flight checks and print the report.
///
/// A blocked project is reported and then turned into a failing exit status.
pub fn run(config: &Config, target: Option<&str>, kind: Option<ProjectKind>) -> Result<()> {
    let project = load_project_blocking(&config.cwd, target, kind)?;
    let bootstrap = project.bootstrap_config()?;
    let report = preflight::check_tree(&project.tree, project.kind, bootstrap.runtime_node_major);

    if config.json_logs {
        let output = CheckOutput {
            schema_version: PREFLIGHT_SCHEMA_VERSION,
            target: &project.label,
            kind: project.kind,
            report: &report,
        };
        println!("{}", serde_json::to_string_pretty(&output).into_diagnostic()?);
    } else {
        print_human(&project.label, project.kind, &report);
    }

    if report.can_run {
        Ok(())
    } else {
        Err(miette::miette!("{} cannot run in the sandbox", project.label))
    }
}

fn print_human(label: &str, kind: ProjectKind, report: &CompatibilityReport) {
    println!("\x1b[1m{label}\x1b[0m ({kind})");
    if let Some(framework) = &report.framework_detected {
        println!("  Framework:  {framework}");
    }
    if let Some(node) = &report.node_version {
        println!("  Node:       {node}");
    }
    println!(
        "  Status:     {}",
        if report.can_run { "\x1b[32mok\x1b[0m" } else { "\x1b[31mblocked\x1b[0m" }
    );

    for issue in &report.issues {
        println!("  \x1b[31merror\x1b[0m: {issue}");
    }
    for warning in &report.warnings {
        println!("  \x1b[33mwarn\x1b[0m:  {warning}");
    }
    for suggestion in &report.suggestions {
        println!("  hint:  {suggestion}");
    }
}
