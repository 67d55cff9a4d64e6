//! Framework detection and dev-server launch configuration.
//!
//! A single ordered table drives both the pre-flight framework report and the
//! launch configuration. Order matters: the first entry with a matching
//! dependency wins, so meta-frameworks that ship on top of Vite or webpack are
//! listed before the bundlers themselves, and every front-end tool is listed
//! before the back-end server libraries.
//!
//! Front-end dev servers default to loopback, which the sandbox network bridge
//! cannot reach, so each gets a host override. Tools that read flags receive
//! them after npm's `--` separator; tools that read the host from the
//! environment get an env var instead.

use crate::manifest::ProjectManifest;
use serde::Serialize;
use std::collections::BTreeMap;

/// Script names that start a dev server, in priority order.
pub const START_SCRIPTS: &[&str] = &["dev", "start", "serve", "develop"];

/// Script used when the manifest declares none of [`START_SCRIPTS`].
pub const DEFAULT_SCRIPT: &str = "dev";

/// Port assumed for back-end servers and pattern matches without a port.
pub const DEFAULT_PORT: u16 = 3000;

/// Whether a framework builds a front-end or serves requests itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameworkKind {
    Frontend,
    Backend,
}

/// One row of the detection table.
#[derive(Debug, Clone, Copy)]
pub struct FrameworkSignature {
    pub name: &'static str,
    /// Any of these packages identifies the framework.
    pub deps: &'static [&'static str],
    /// Script the framework's templates conventionally declare.
    pub script: &'static str,
    pub kind: FrameworkKind,
    /// Host-binding flags, forwarded after `--`.
    pub host_args: &'static [&'static str],
    /// Extra environment (host binding or telemetry opt-out).
    pub env: &'static [(&'static str, &'static str)],
    /// Command a user can run by hand when the server never becomes reachable.
    pub manual_command: &'static str,
}

const BACKEND_ENV: &[(&str, &str)] = &[("PORT", "3000"), ("HOST", "0.0.0.0")];

pub const FRAMEWORKS: &[FrameworkSignature] = &[
    FrameworkSignature {
        name: "Next.js",
        deps: &["next"],
        script: "dev",
        kind: FrameworkKind::Frontend,
        host_args: &["-H", "0.0.0.0"],
        env: &[("NEXT_TELEMETRY_DISABLED", "1")],
        manual_command: "npx next dev -H 0.0.0.0",
    },
    FrameworkSignature {
        name: "Nuxt",
        deps: &["nuxt", "nuxt3"],
        script: "dev",
        kind: FrameworkKind::Frontend,
        host_args: &["--host", "0.0.0.0"],
        env: &[("NUXT_TELEMETRY_DISABLED", "1")],
        manual_command: "npx nuxi dev --host 0.0.0.0",
    },
    FrameworkSignature {
        name: "Remix",
        deps: &["@remix-run/dev"],
        script: "dev",
        kind: FrameworkKind::Frontend,
        host_args: &["--host", "0.0.0.0"],
        env: &[("REMIX_DISABLE_TELEMETRY", "1")],
        manual_command: "npx remix vite:dev --host 0.0.0.0",
    },
    FrameworkSignature {
        name: "SvelteKit",
        deps: &["@sveltejs/kit"],
        script: "dev",
        kind: FrameworkKind::Frontend,
        host_args: &["--host", "0.0.0.0"],
        env: &[],
        manual_command: "npx vite dev --host 0.0.0.0",
    },
    FrameworkSignature {
        name: "Astro",
        deps: &["astro"],
        script: "dev",
        kind: FrameworkKind::Frontend,
        host_args: &["--host", "0.0.0.0"],
        env: &[("ASTRO_TELEMETRY_DISABLED", "1")],
        manual_command: "npx astro dev --host 0.0.0.0",
    },
    FrameworkSignature {
        name: "Gatsby",
        deps: &["gatsby"],
        script: "develop",
        kind: FrameworkKind::Frontend,
        host_args: &["-H", "0.0.0.0"],
        env: &[("GATSBY_TELEMETRY_DISABLED", "1")],
        manual_command: "npx gatsby develop -H 0.0.0.0",
    },
    FrameworkSignature {
        name: "Angular",
        deps: &["@angular/cli", "@angular/core"],
        script: "start",
        kind: FrameworkKind::Frontend,
        host_args: &["--host", "0.0.0.0"],
        env: &[("NG_CLI_ANALYTICS", "false")],
        manual_command: "npx ng serve --host 0.0.0.0",
    },
    FrameworkSignature {
        name: "Vue CLI",
        deps: &["@vue/cli-service"],
        script: "serve",
        kind: FrameworkKind::Frontend,
        host_args: &["--host", "0.0.0.0"],
        env: &[],
        manual_command: "npx vue-cli-service serve --host 0.0.0.0",
    },
    FrameworkSignature {
        name: "Create React App",
        deps: &["react-scripts"],
        script: "start",
        kind: FrameworkKind::Frontend,
        host_args: &[],
        env: &[("HOST", "0.0.0.0"), ("BROWSER", "none")],
        manual_command: "HOST=0.0.0.0 npm start",
    },
    FrameworkSignature {
        name: "Vite",
        deps: &["vite"],
        script: "dev",
        kind: FrameworkKind::Frontend,
        host_args: &["--host", "0.0.0.0"],
        env: &[],
        manual_command: "npx vite --host 0.0.0.0",
    },
    FrameworkSignature {
        name: "Parcel",
        deps: &["parcel", "parcel-bundler"],
        script: "start",
        kind: FrameworkKind::Frontend,
        host_args: &["--host", "0.0.0.0"],
        env: &[],
        manual_command: "npx parcel index.html --host 0.0.0.0",
    },
    FrameworkSignature {
        name: "webpack-dev-server",
        deps: &["webpack-dev-server"],
        script: "start",
        kind: FrameworkKind::Frontend,
        host_args: &["--host", "0.0.0.0"],
        env: &[],
        manual_command: "npx webpack serve --host 0.0.0.0",
    },
    FrameworkSignature {
        name: "NestJS",
        deps: &["@nestjs/core"],
        script: "start",
        kind: FrameworkKind::Backend,
        host_args: &[],
        env: BACKEND_ENV,
        manual_command: "PORT=3000 HOST=0.0.0.0 npm start",
    },
    FrameworkSignature {
        name: "Express",
        deps: &["express"],
        script: "start",
        kind: FrameworkKind::Backend,
        host_args: &[],
        env: BACKEND_ENV,
        manual_command: "PORT=3000 HOST=0.0.0.0 npm start",
    },
    FrameworkSignature {
        name: "Fastify",
        deps: &["fastify"],
        script: "start",
        kind: FrameworkKind::Backend,
        host_args: &[],
        env: BACKEND_ENV,
        manual_command: "PORT=3000 HOST=0.0.0.0 npm start",
    },
    FrameworkSignature {
        name: "Koa",
        deps: &["koa"],
        script: "start",
        kind: FrameworkKind::Backend,
        host_args: &[],
        env: BACKEND_ENV,
        manual_command: "PORT=3000 HOST=0.0.0.0 npm start",
    },
    FrameworkSignature {
        name: "hapi",
        deps: &["@hapi/hapi"],
        script: "start",
        kind: FrameworkKind::Backend,
        host_args: &[],
        env: BACKEND_ENV,
        manual_command: "PORT=3000 HOST=0.0.0.0 npm start",
    },
];

/// How to start the project's dev server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameworkConfig {
    /// Detected framework, if any.
    pub name: Option<String>,
    /// Full command line, program first.
    pub argv: Vec<String>,
    pub env: Option<BTreeMap<String, String>>,
}

impl FrameworkConfig {
    #[must_use]
    pub fn program(&self) -> &str {
        self.argv.first().map_or("npm", String::as_str)
    }

    #[must_use]
    pub fn args(&self) -> &[String] {
        self.argv.get(1..).unwrap_or(&[])
    }

    /// The table row this config was derived from.
    #[must_use]
    pub fn signature(&self) -> Option<&'static FrameworkSignature> {
        let name = self.name.as_deref()?;
        FRAMEWORKS.iter().find(|f| f.name == name)
    }
}

/// First table entry whose dependency list intersects the manifest's
/// dependencies or devDependencies.
#[must_use]
pub fn detect(manifest: &ProjectManifest) -> Option<&'static FrameworkSignature> {
    FRAMEWORKS.iter().find(|sig| {
        sig.deps
            .iter()
            .any(|dep| manifest.has_runtime_or_dev_dependency(dep))
    })
}

/// First declared script from [`START_SCRIPTS`].
#[must_use]
pub fn declared_start_script(manifest: &ProjectManifest) -> Option<&'static str> {
    START_SCRIPTS.iter().copied().find(|s| manifest.has_script(s))
}

/// Build the launch configuration for a manifest.
#[must_use]
pub fn configure(manifest: &ProjectManifest) -> FrameworkConfig {
    let script = declared_start_script(manifest).unwrap_or(DEFAULT_SCRIPT);
    let mut argv = vec!["npm".to_string(), "run".to_string(), script.to_string()];

    let Some(sig) = detect(manifest) else {
        return FrameworkConfig {
            name: None,
            argv,
            env: None,
        };
    };

    if sig.kind == FrameworkKind::Frontend && !sig.host_args.is_empty() {
        argv.push("--".to_string());
        argv.extend(sig.host_args.iter().map(|a| (*a).to_string()));
    }

    let env: BTreeMap<String, String> = sig
        .env
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();

    FrameworkConfig {
        name: Some(sig.name.to_string()),
        argv,
        env: (!env.is_empty()).then_some(env),
    }
}

/// Hints shown when the server has not become reachable in time.
#[must_use]
pub fn troubleshooting_hints(config: &FrameworkConfig) -> Vec<String> {
    let mut hints = vec![
        "The dev server has not reported an external URL yet; it may still be compiling."
            .to_string(),
    ];
    match config.signature() {
        Some(sig) => hints.push(format!(
            "{} must listen on 0.0.0.0 to be reachable. Try in the shell: {}",
            sig.name, sig.manual_command
        )),
        None => hints.push(
            "Make sure the server listens on 0.0.0.0 rather than localhost, e.g. pass --host 0.0.0.0"
                .to_string(),
        ),
    }
    hints
}
