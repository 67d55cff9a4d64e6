//! Compatibility pre-flight.
//!
//! Static inspection of a fetched project before anything is spawned. The
//! result either blocks the run (`can_run == false`) or carries warnings and
//! suggestions that are shown alongside the install output.
//!
//! The check is pure and never fails: a missing or malformed `package.json`
//! yields a single warning and optimistic defaults.

pub mod node_version;
pub mod tables;

use crate::framework::{self, START_SCRIPTS};
use crate::manifest::ProjectManifest;
use crate::project::{FileTree, ProjectKind};
use serde::{Deserialize, Serialize};

/// Node major version shipped by the sandbox runtime.
pub const DEFAULT_RUNTIME_NODE_MAJOR: u32 = 18;

/// Schema version of the JSON report.
pub const PREFLIGHT_SCHEMA_VERSION: u32 = 1;

/// Outcome of the pre-flight scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatibilityReport {
    pub can_run: bool,
    /// Blocking problems, in discovery order.
    pub issues: Vec<String>,
    pub warnings: Vec<String>,
    pub suggestions: Vec<String>,
    pub has_native_deps: bool,
    pub has_git_ssh_deps: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub framework_detected: Option<String>,
    /// Raw Node constraint as declared by the project.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_version: Option<String>,
}

impl Default for CompatibilityReport {
    fn default() -> Self {
        Self {
            can_run: true,
            issues: Vec::new(),
            warnings: Vec::new(),
            suggestions: Vec::new(),
            has_native_deps: false,
            has_git_ssh_deps: false,
            framework_detected: None,
            node_version: None,
        }
    }
}

impl CompatibilityReport {
    /// Whether the report has nothing to say.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.can_run && self.issues.is_empty() && self.warnings.is_empty()
    }

    fn block(&mut self, issue: String) {
        self.can_run = false;
        self.issues.push(issue);
    }
}

/// Run the pre-flight against the sandbox's default Node version.
#[must_use]
pub fn check(
    manifest: Option<&ProjectManifest>,
    version_pin: Option<&str>,
    kind: ProjectKind,
) -> CompatibilityReport {
    check_for_runtime(manifest, version_pin, kind, DEFAULT_RUNTIME_NODE_MAJOR)
}

/// Run the pre-flight over a fetched tree.
#[must_use]
pub fn check_tree(tree: &FileTree, kind: ProjectKind, runtime_node_major: u32) -> CompatibilityReport {
    let manifest = tree.manifest();
    let pin = tree.version_pin();
    check_for_runtime(manifest.as_ref(), pin.as_deref(), kind, runtime_node_major)
}

/// Run the pre-flight against a specific runtime Node major version.
#[must_use]
pub fn check_for_runtime(
    manifest: Option<&ProjectManifest>,
    version_pin: Option<&str>,
    kind: ProjectKind,
    runtime_node_major: u32,
) -> CompatibilityReport {
    let mut report = CompatibilityReport::default();

    if !kind.is_runnable() {
        report.block(format!(
            "Unsupported project type: {kind}. Only Node.js and static sites can be previewed."
        ));
        return report;
    }

    let Some(manifest) = manifest else {
        report
            .warnings
            .push("No package.json found (manifest missing)".to_string());
        return report;
    };

    scan_native(manifest, &mut report);
    scan_git_ssh(manifest, &mut report);
    scan_peer_conflicts(manifest, &mut report);
    scan_node_version(manifest, version_pin, runtime_node_major, &mut report);

    let detected = framework::detect(manifest);
    report.framework_detected = detected.map(|sig| sig.name.to_string());

    if framework::declared_start_script(manifest).is_none() {
        report.warnings.push(format!(
            "No start script found (looked for: {})",
            START_SCRIPTS.join(", ")
        ));
        let script = detected.map_or(framework::DEFAULT_SCRIPT, |sig| sig.script);
        report.suggestions.push(format!(
            "Add a \"{script}\" script to package.json that starts the development server"
        ));
    }

    tracing::debug!(
        can_run = report.can_run,
        issues = report.issues.len(),
        warnings = report.warnings.len(),
        framework = report.framework_detected.as_deref().unwrap_or("none"),
        "pre-flight complete"
    );

    report
}

/// Names are listed in section order, sorted within each section, so the
/// warning is stable for a given manifest whatever order its keys were written in.
fn scan_native(manifest: &ProjectManifest, report: &mut CompatibilityReport) {
    let native: Vec<&str> = manifest
        .all_dependencies()
        .map(|(name, _, _)| name)
        .filter(|name| tables::is_native(name))
        .collect();
    if native.is_empty() {
        return;
    }

    report.has_native_deps = true;
    let shown = native
        .iter()
        .take(tables::NATIVE_NAMES_SHOWN)
        .copied()
        .collect::<Vec<_>>()
        .join(", ");
    let more = native.len().saturating_sub(tables::NATIVE_NAMES_SHOWN);
    let elision = if more > 0 {
        format!(" (+{more} more)")
    } else {
        String::new()
    };
    report
        .warnings
        .push(format!("Native dependencies detected: {shown}{elision}"));
    report.suggestions.push(
        "Packages with native add-ons may fail to build in the browser sandbox; expect some features to break"
            .to_string(),
    );
}

fn scan_git_ssh(manifest: &ProjectManifest, report: &mut CompatibilityReport) {
    let offending: Vec<&str> = manifest
        .all_dependencies()
        .filter(|(_, spec, _)| tables::is_git_ssh_spec(spec))
        .map(|(name, _, _)| name)
        .collect();
    if offending.is_empty() {
        return;
    }

    report.has_git_ssh_deps = true;
    report.block(format!(
        "Dependencies fetched over SSH cannot be installed in the sandbox: {}",
        offending.join(", ")
    ));
    report.suggestions.push(
        "Replace git+ssh dependencies with published npm versions or https:// git URLs".to_string(),
    );
}

fn scan_peer_conflicts(manifest: &ProjectManifest, report: &mut CompatibilityReport) {
    let matched = manifest
        .all_dependencies()
        .filter(|(name, _, _)| tables::is_peer_conflict_prone(name))
        .count();
    if matched >= tables::PEER_CONFLICT_THRESHOLD {
        report.suggestions.push(
            "Several packages commonly cause peer dependency conflicts; the install may need a --legacy-peer-deps retry"
                .to_string(),
        );
    }
}

fn scan_node_version(
    manifest: &ProjectManifest,
    version_pin: Option<&str>,
    runtime_node_major: u32,
    report: &mut CompatibilityReport,
) {
    let Some(raw) = manifest
        .engines_node
        .as_deref()
        .or(version_pin)
        .map(str::trim)
        .filter(|s| !s.is_empty())
    else {
        return;
    };

    report.node_version = Some(raw.to_string());
    for constraint in node_version::parse_constraints(raw) {
        if let Some(warning) = node_version::mismatch_warning(constraint, runtime_node_major) {
            report.warnings.push(warning);
        }
    }
}
