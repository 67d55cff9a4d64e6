//! Install-output failure classification.
//!
//! Exit codes from package managers are unreliable, so the ladder looks at what
//! the failed attempt printed. The tables are heuristic and meant to be
//! extended as new tool phrasings turn up.

use regex_lite::Regex;
use std::sync::OnceLock;

/// Phrasings of a peer dependency resolution conflict.
pub const PEER_CONFLICT_PATTERNS: &[&str] = &[
    r"ERESOLVE",
    r"(?i)conflicting peer dependency",
    r"(?i)could not resolve dependency",
    r"(?i)unable to resolve dependency tree",
    r"(?i)peer dep(endency)? missing",
    r"(?i)Fix the upstream dependency conflict",
];

/// Phrasings of a native add-on build failure.
pub const NATIVE_BUILD_PATTERNS: &[&str] = &[
    r"gyp ERR!",
    r"(?i)node-gyp",
    r"(?i)prebuild-install (WARN|ERR)",
    r"(?i)node-pre-gyp",
    r"(?i)make: \*\*\*",
    r"(?i)not found: (make|python|g\+\+|cc)",
    r"(?i)binding\.gyp",
];

/// What a failed attempt's output looks like.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FailureSignals {
    pub peer_conflict: bool,
    pub native_build: bool,
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|p| match Regex::new(p) {
            Ok(re) => Some(re),
            Err(e) => {
                tracing::warn!(pattern = p, error = %e, "skipping invalid failure pattern");
                None
            }
        })
        .collect()
}

fn peer_res() -> &'static [Regex] {
    static RES: OnceLock<Vec<Regex>> = OnceLock::new();
    RES.get_or_init(|| compile(PEER_CONFLICT_PATTERNS))
}

fn native_res() -> &'static [Regex] {
    static RES: OnceLock<Vec<Regex>> = OnceLock::new();
    RES.get_or_init(|| compile(NATIVE_BUILD_PATTERNS))
}

#[must_use]
pub fn is_peer_conflict(output: &str) -> bool {
    peer_res().iter().any(|re| re.is_match(output))
}

#[must_use]
pub fn is_native_build_failure(output: &str) -> bool {
    native_res().iter().any(|re| re.is_match(output))
}

/// Classify the full captured output of one attempt.
#[must_use]
pub fn classify(output: &str) -> FailureSignals {
    FailureSignals {
        peer_conflict: is_peer_conflict(output),
        native_build: is_native_build_failure(output),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_patterns_compile() {
        assert_eq!(peer_res().len(), PEER_CONFLICT_PATTERNS.len());
        assert_eq!(native_res().len(), NATIVE_BUILD_PATTERNS.len());
    }

    #[test]
    fn test_peer_conflict_output() {
        let out = "npm ERR! code ERESOLVE\nnpm ERR! ERESOLVE unable to resolve dependency tree";
        let signals = classify(out);
        assert!(signals.peer_conflict);
        assert!(!signals.native_build);
        assert!(is_peer_conflict("npm WARN Conflicting peer dependency: react@17.0.2"));
    }

    #[test]
    fn test_native_build_output() {
        let out = "npm ERR! gyp ERR! build error\nnpm ERR! gyp ERR! stack Error: `make` failed";
        let signals = classify(out);
        assert!(signals.native_build);
        assert!(!signals.peer_conflict);
    }

    #[test]
    fn test_generic_failure_has_no_signals() {
        assert_eq!(
            classify("npm ERR! code E404\nnpm ERR! 404 Not Found - GET https://registry"),
            FailureSignals::default()
        );
        assert_eq!(classify(""), FailureSignals::default());
    }
}
