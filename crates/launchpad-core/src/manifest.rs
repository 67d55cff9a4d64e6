//! `package.json` reading.
//!
//! Only the fields the bootstrap pipeline looks at are kept. Extraction is
//! lenient: a section of the wrong type or a non-string version spec is skipped
//! and recorded in [`ProjectManifest::skipped`] instead of failing the parse.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

/// Manifest file name at the project root.
pub const MANIFEST_FILE: &str = "package.json";

/// Lockfile that allows a clean, frozen install.
pub const STRICT_LOCKFILE: &str = "package-lock.json";

/// Files that may pin a Node version, in lookup order.
pub const VERSION_PIN_FILES: &[&str] = &[".nvmrc", ".node-version"];

/// Why a manifest could not be read.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ManifestError {
    #[error("package.json is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("package.json must be a JSON object")]
    NotAnObject,
}

/// Which dependency table a package was declared in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepSection {
    Dependencies,
    DevDependencies,
    OptionalDependencies,
}

impl DepSection {
    /// The `package.json` key for this section.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::Dependencies => "dependencies",
            Self::DevDependencies => "devDependencies",
            Self::OptionalDependencies => "optionalDependencies",
        }
    }
}

/// Parsed dependency and script declaration of a project.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectManifest {
    pub name: Option<String>,
    pub scripts: BTreeMap<String, String>,
    pub dependencies: BTreeMap<String, String>,
    pub dev_dependencies: BTreeMap<String, String>,
    pub optional_dependencies: BTreeMap<String, String>,
    /// Raw `engines.node` constraint.
    pub engines_node: Option<String>,
    /// Entries dropped during lenient extraction, as `section.name` strings.
    pub skipped: Vec<String>,
}

impl ProjectManifest {
    /// Parse `package.json` content.
    ///
    /// # Errors
    /// Returns [`ManifestError`] if the content is not a JSON object.
    pub fn parse(content: &str) -> Result<Self, ManifestError> {
        let value: Value =
            serde_json::from_str(content).map_err(|e| ManifestError::InvalidJson(e.to_string()))?;
        let root = value.as_object().ok_or(ManifestError::NotAnObject)?;

        let mut manifest = Self {
            name: root.get("name").and_then(Value::as_str).map(str::to_string),
            engines_node: root
                .get("engines")
                .and_then(|e| e.get("node"))
                .and_then(Value::as_str)
                .map(str::to_string),
            ..Self::default()
        };

        manifest.scripts = extract_string_map(root, "scripts", &mut manifest.skipped);
        manifest.dependencies =
            extract_string_map(root, DepSection::Dependencies.key(), &mut manifest.skipped);
        manifest.dev_dependencies =
            extract_string_map(root, DepSection::DevDependencies.key(), &mut manifest.skipped);
        manifest.optional_dependencies = extract_string_map(
            root,
            DepSection::OptionalDependencies.key(),
            &mut manifest.skipped,
        );

        Ok(manifest)
    }

    /// Parse, mapping any failure to `None` (a malformed manifest counts as absent).
    #[must_use]
    pub fn parse_lenient(content: &str) -> Option<Self> {
        match Self::parse(content) {
            Ok(m) => Some(m),
            Err(e) => {
                tracing::debug!(error = %e, "ignoring unreadable package.json");
                None
            }
        }
    }

    /// Every declared dependency across all three sections, in section order and
    /// sorted by name within a section.
    pub fn all_dependencies(&self) -> impl Iterator<Item = (&str, &str, DepSection)> {
        let sections = [
            (&self.dependencies, DepSection::Dependencies),
            (&self.dev_dependencies, DepSection::DevDependencies),
            (&self.optional_dependencies, DepSection::OptionalDependencies),
        ];
        sections.into_iter().flat_map(|(map, section)| {
            map.iter()
                .map(move |(name, spec)| (name.as_str(), spec.as_str(), section))
        })
    }

    /// Whether `name` is declared in `dependencies` or `devDependencies`.
    #[must_use]
    pub fn has_runtime_or_dev_dependency(&self, name: &str) -> bool {
        self.dependencies.contains_key(name) || self.dev_dependencies.contains_key(name)
    }

    /// Whether a script called `name` is declared.
    #[must_use]
    pub fn has_script(&self, name: &str) -> bool {
        self.scripts.contains_key(name)
    }
}

fn extract_string_map(
    root: &Map<String, Value>,
    section: &str,
    skipped: &mut Vec<String>,
) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    let Some(value) = root.get(section) else {
        return out;
    };
    let Some(obj) = value.as_object() else {
        skipped.push(section.to_string());
        return out;
    };

    for (name, spec) in obj {
        match spec.as_str() {
            Some(s) => {
                out.insert(name.clone(), s.to_string());
            }
            None => skipped.push(format!("{section}.{name}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_all_sections() {
        let m = ProjectManifest::parse(
            r#"{
                "name": "demo",
                "scripts": { "dev": "vite", "build": "vite build" },
                "dependencies": { "react": "^18.2.0" },
                "devDependencies": { "vite": "^5.0.0" },
                "optionalDependencies": { "fsevents": "^2.3.0" },
                "engines": { "node": ">=18" }
            }"#,
        )
        .unwrap();

        assert_eq!(m.name.as_deref(), Some("demo"));
        assert!(m.has_script("dev"));
        assert!(m.has_runtime_or_dev_dependency("vite"));
        assert!(!m.has_runtime_or_dev_dependency("fsevents"));
        assert_eq!(m.engines_node.as_deref(), Some(">=18"));

        let all: Vec<_> = m.all_dependencies().map(|(n, _, s)| (n, s)).collect();
        assert_eq!(
            all,
            vec![
                ("react", DepSection::Dependencies),
                ("vite", DepSection::DevDependencies),
                ("fsevents", DepSection::OptionalDependencies),
            ]
        );
    }

    #[test]
    fn test_invalid_sections_are_skipped() {
        let m = ProjectManifest::parse(
            r#"{ "dependencies": { "a": "1.0.0", "b": 2 }, "devDependencies": [] }"#,
        )
        .unwrap();
        assert_eq!(m.dependencies.len(), 1);
        assert_eq!(m.skipped, vec!["dependencies.b", "devDependencies"]);
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            ProjectManifest::parse("{ not json"),
            Err(ManifestError::InvalidJson(_))
        ));
        assert_eq!(
            ProjectManifest::parse("[1, 2]"),
            Err(ManifestError::NotAnObject)
        );
        assert!(ProjectManifest::parse_lenient("{ not json").is_none());
    }
}
