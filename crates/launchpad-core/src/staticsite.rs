//! Static-site server synthesis.
//!
//! Asset-only repositories have nothing to install or start, so a tiny Express
//! server and a one-dependency manifest are generated and mounted next to the
//! project. The run then goes through the regular install and launch steps.

use crate::project::FileTree;
use std::fmt::Write as _;

/// Directories that conventionally hold a site's `index.html`, in priority order.
pub const DOC_ROOT_CANDIDATES: &[&str] = &[
    "public", "dist", "build", "docs", "site", "www", "static", "out", "_site", "src",
];

/// Generated server entry point.
pub const SERVER_FILE: &str = "server.js";

/// Port the generated server listens on unless `PORT` is set.
pub const SERVER_PORT: u16 = 3000;

/// HTTP server library the generated manifest depends on.
pub const SERVER_DEPENDENCY: (&str, &str) = ("express", "^4.19.2");

/// Extension to content-type table served by the generated server.
pub const CONTENT_TYPES: &[(&str, &str)] = &[
    ("html", "text/html; charset=utf-8"),
    ("htm", "text/html; charset=utf-8"),
    ("css", "text/css; charset=utf-8"),
    ("js", "text/javascript; charset=utf-8"),
    ("mjs", "text/javascript; charset=utf-8"),
    ("json", "application/json; charset=utf-8"),
    ("map", "application/json; charset=utf-8"),
    ("txt", "text/plain; charset=utf-8"),
    ("xml", "application/xml"),
    ("svg", "image/svg+xml"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("avif", "image/avif"),
    ("ico", "image/x-icon"),
    ("woff", "font/woff"),
    ("woff2", "font/woff2"),
    ("ttf", "font/ttf"),
    ("otf", "font/otf"),
    ("wasm", "application/wasm"),
    ("pdf", "application/pdf"),
    ("mp4", "video/mp4"),
    ("webm", "video/webm"),
    ("mp3", "audio/mpeg"),
    ("wav", "audio/wav"),
    ("webmanifest", "application/manifest+json"),
];

/// Content type for a file name, by extension.
#[must_use]
pub fn content_type_for(path: &str) -> Option<&'static str> {
    let (_, ext) = path.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    CONTENT_TYPES
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, ct)| *ct)
}

/// The document root: the first candidate holding `index.html`, else `"."`.
#[must_use]
pub fn find_doc_root(tree: &FileTree) -> &'static str {
    DOC_ROOT_CANDIDATES
        .iter()
        .copied()
        .find(|dir| tree.contains(&format!("{dir}/index.html")))
        .unwrap_or(".")
}

/// Files generated for a static project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticSite {
    pub doc_root: String,
    /// Every directory served, document root first, repository root last.
    pub served_dirs: Vec<String>,
    pub server_js: String,
    pub package_json: String,
}

impl StaticSite {
    /// Add the generated files to `tree`.
    pub fn apply(&self, tree: &mut FileTree) {
        tree.insert(SERVER_FILE, self.server_js.clone());
        tree.insert(crate::manifest::MANIFEST_FILE, self.package_json.clone());
    }
}

/// Generate the server program and manifest for `tree`.
#[must_use]
pub fn synthesize(tree: &FileTree) -> StaticSite {
    let doc_root = find_doc_root(tree);

    let mut served_dirs = vec![doc_root.to_string()];
    served_dirs.extend(
        DOC_ROOT_CANDIDATES
            .iter()
            .filter(|dir| **dir != doc_root && tree.has_dir(dir))
            .map(|dir| (*dir).to_string()),
    );
    if doc_root != "." {
        served_dirs.push(".".to_string());
    }

    tracing::debug!(doc_root, served = served_dirs.len(), "synthesized static server");

    StaticSite {
        doc_root: doc_root.to_string(),
        server_js: render_server(doc_root, &served_dirs),
        package_json: render_manifest(),
        served_dirs,
    }
}

fn js_string(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

fn render_server(doc_root: &str, served_dirs: &[String]) -> String {
    let dirs = served_dirs
        .iter()
        .map(|d| js_string(d))
        .collect::<Vec<_>>()
        .join(", ");

    let mut types = String::new();
    for (ext, ct) in CONTENT_TYPES {
        let _ = writeln!(types, "  {}: {},", js_string(&format!(".{ext}")), js_string(ct));
    }

    let index = if doc_root == "." {
        "index.html".to_string()
    } else {
        format!("{doc_root}/index.html")
    };

    format!(
        r#"const express = require("express");
const fs = require("fs");
const path = require("path");

const app = express();
const port = Number(process.env.PORT) || {port};
const roots = [{dirs}].map((d) => path.join(__dirname, d));
const indexFile = path.join(__dirname, {index});
const types = {{
{types}}};

for (const root of roots) {{
  app.use(
    express.static(root, {{
      setHeaders(res, file) {{
        const type = types[path.extname(file).toLowerCase()];
        if (type) res.setHeader("Content-Type", type);
      }},
    }})
  );
}}

app.use((req, res) => {{
  if (req.method === "GET" && !path.extname(req.path) && fs.existsSync(indexFile)) {{
    res.setHeader("Content-Type", types[".html"]);
    return res.sendFile(indexFile);
  }}
  res.status(404).type("text/plain").send("Not found");
}});

app.listen(port, "0.0.0.0", () => {{
  console.log(`Server running at http://0.0.0.0:${{port}}`);
}});
"#,
        port = SERVER_PORT,
        dirs = dirs,
        index = js_string(&index),
        types = types,
    )
}

fn render_manifest() -> String {
    let (dep, version) = SERVER_DEPENDENCY;
    let manifest = serde_json::json!({
        "name": "static-site-preview",
        "private": true,
        "scripts": { "start": format!("node {SERVER_FILE}") },
        "dependencies": { dep: version },
    });
    serde_json::to_string_pretty(&manifest).unwrap_or_default()
}
