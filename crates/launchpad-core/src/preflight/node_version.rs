//! Node version constraint extraction.
//!
//! Only three shapes are understood: an exact pin (`18`, `v20.11.1`), a lower
//! bound (`>=20`) and an upper bound (`<16`, recorded as 15). Anything else
//! (`^18`, `18.x`, `lts/*`) yields no constraint and therefore no warning.

use regex_lite::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeConstraint {
    /// Pinned major version.
    Exact(u32),
    /// Requires at least this major version.
    AtLeast(u32),
    /// Highest acceptable major version.
    AtMost(u32),
}

fn exact_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*v?(\d+)(?:\.\d+)*\s*$").expect("valid regex"))
}

fn lower_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r">=\s*v?(\d+)").expect("valid regex"))
}

fn upper_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<\s*v?(\d+)").expect("valid regex"))
}

fn first_number(re: &Regex, raw: &str) -> Option<u32> {
    re.captures(raw)?.get(1)?.as_str().parse().ok()
}

/// Parse every recognised constraint in `raw`.
#[must_use]
pub fn parse_constraints(raw: &str) -> Vec<NodeConstraint> {
    if let Some(major) = first_number(exact_re(), raw) {
        return vec![NodeConstraint::Exact(major)];
    }

    let mut out = Vec::new();
    if let Some(major) = first_number(lower_re(), raw) {
        out.push(NodeConstraint::AtLeast(major));
    }
    if let Some(major) = first_number(upper_re(), raw) {
        out.push(NodeConstraint::AtMost(major.saturating_sub(1)));
    }
    out
}

/// Warning text for a constraint the runtime does not satisfy.
#[must_use]
pub fn mismatch_warning(constraint: NodeConstraint, runtime_major: u32) -> Option<String> {
    match constraint {
        NodeConstraint::Exact(major) if major != runtime_major => Some(format!(
            "Project pins Node {major} but the sandbox runs Node {runtime_major}; some features may behave differently"
        )),
        NodeConstraint::AtLeast(major) if major > runtime_major => Some(format!(
            "Project requires Node >= {major} but the sandbox runs Node {runtime_major}"
        )),
        NodeConstraint::AtMost(major) if major < runtime_major => Some(format!(
            "Project supports Node up to {major} but the sandbox runs Node {runtime_major}"
        )),
        _ => None,
    }
}
