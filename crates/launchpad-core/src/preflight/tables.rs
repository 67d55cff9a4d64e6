//! Package-name tables used by the pre-flight scan.
//!
//! Matching is exact and case-sensitive against declared package names.

/// Packages that compile native add-ons during install.
pub const NATIVE_PACKAGES: &[&str] = &[
    "@tensorflow/tfjs-node",
    "argon2",
    "bcrypt",
    "better-sqlite3",
    "canvas",
    "cpu-features",
    "fsevents",
    "grpc",
    "leveldown",
    "node-gyp",
    "node-pty",
    "node-sass",
    "re2",
    "robotjs",
    "serialport",
    "sharp",
    "sqlite3",
    "usb",
    "zeromq",
];

/// Packages whose peer ranges frequently disagree across a dependency tree.
pub const PEER_CONFLICT_PACKAGES: &[&str] = &[
    "@angular/common",
    "@angular/core",
    "@babel/core",
    "@testing-library/react",
    "@types/react",
    "eslint",
    "jest",
    "next",
    "react",
    "react-dom",
    "styled-components",
    "typescript",
    "vue",
    "webpack",
];

/// Matched peer-conflict packages needed before the legacy-peer-deps advisory.
pub const PEER_CONFLICT_THRESHOLD: usize = 3;

/// Native package names listed by name in the warning.
pub const NATIVE_NAMES_SHOWN: usize = 3;

/// Version-spec markers of dependencies fetched over SSH.
pub const GIT_SSH_MARKERS: &[&str] = &["git+ssh://", "ssh://", "git@"];

#[must_use]
pub fn is_native(name: &str) -> bool {
    NATIVE_PACKAGES.binary_search(&name).is_ok()
}

#[must_use]
pub fn is_peer_conflict_prone(name: &str) -> bool {
    PEER_CONFLICT_PACKAGES.binary_search(&name).is_ok()
}

#[must_use]
pub fn is_git_ssh_spec(spec: &str) -> bool {
    GIT_SSH_MARKERS.iter().any(|m| spec.contains(m))
}
