//! Dependency install strategy selection.
//!
//! The fallback ladder is plain data: an ordered list of steps, each guarded by
//! a [`Precondition`] evaluated against the project and the previous attempt's
//! output. [`InstallLadder`] walks it one failed attempt at a time.
//!
//! | # | Precondition           | Command                                                |
//! |---|------------------------|--------------------------------------------------------|
//! | 1 | strict lockfile        | `npm ci`                                               |
//! | 2 | always                 | `npm install`                                          |
//! | 3 | peer conflict output   | `npm install --legacy-peer-deps`                       |
//! | 4 | always                 | `npm install --force`                                  |
//! | 5 | native build output    | `npm install --ignore-scripts --legacy-peer-deps`      |

pub mod classify;

use serde::Serialize;
use std::collections::BTreeMap;

/// Flags appended to every install to keep output short and offline-friendly.
pub const QUIET_FLAGS: &[&str] = &["--no-audit", "--no-fund"];

/// When a ladder step is eligible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Precondition {
    /// The project ships a strict lockfile.
    StrictLockfile,
    Always,
    /// The previous attempt printed a peer dependency conflict.
    PeerConflict,
    /// The previous attempt printed a native build failure.
    NativeBuildFailure,
}

/// One row of the fallback ladder.
#[derive(Debug, Clone, Copy)]
pub struct LadderStep {
    pub label: &'static str,
    pub precondition: Precondition,
    /// Arguments after `npm`.
    pub args: &'static [&'static str],
    pub env: &'static [(&'static str, &'static str)],
    /// A peer conflict in this attempt's output leads to a legacy-peer-deps retry.
    pub retry_with_legacy: bool,
}

pub const LADDER: &[LadderStep] = &[
    LadderStep {
        label: "clean install",
        precondition: Precondition::StrictLockfile,
        args: &["ci"],
        env: &[],
        retry_with_legacy: true,
    },
    LadderStep {
        label: "install",
        precondition: Precondition::Always,
        args: &["install"],
        env: &[],
        retry_with_legacy: true,
    },
    LadderStep {
        label: "legacy peer deps",
        precondition: Precondition::PeerConflict,
        args: &["install", "--legacy-peer-deps"],
        env: &[],
        retry_with_legacy: false,
    },
    LadderStep {
        label: "forced install",
        precondition: Precondition::Always,
        args: &["install", "--force"],
        env: &[("npm_config_engine_strict", "false")],
        retry_with_legacy: false,
    },
    LadderStep {
        label: "skip install scripts",
        precondition: Precondition::NativeBuildFailure,
        args: &["install", "--ignore-scripts", "--legacy-peer-deps"],
        env: &[],
        retry_with_legacy: false,
    },
];

/// A concrete install invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallStrategy {
    pub label: String,
    /// Full command line, program first.
    pub argv: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<BTreeMap<String, String>>,
    pub retry_with_legacy: bool,
}

impl InstallStrategy {
    #[must_use]
    pub fn from_step(step: &LadderStep) -> Self {
        let argv = std::iter::once("npm")
            .chain(step.args.iter().copied())
            .chain(QUIET_FLAGS.iter().copied())
            .map(str::to_string)
            .collect();
        let env: BTreeMap<String, String> = step
            .env
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();

        Self {
            label: step.label.to_string(),
            argv,
            env: (!env.is_empty()).then_some(env),
            retry_with_legacy: step.retry_with_legacy,
        }
    }

    #[must_use]
    pub fn program(&self) -> &str {
        self.argv.first().map_or("npm", String::as_str)
    }

    #[must_use]
    pub fn args(&self) -> &[String] {
        self.argv.get(1..).unwrap_or(&[])
    }

    /// Command line as typed in a shell.
    #[must_use]
    pub fn command_line(&self) -> String {
        self.argv.join(" ")
    }
}

/// Walks [`LADDER`] across failed attempts.
#[derive(Debug, Clone)]
pub struct InstallLadder {
    has_strict_lockfile: bool,
    cursor: usize,
    attempts: u32,
}

impl InstallLadder {
    #[must_use]
    pub fn new(has_strict_lockfile: bool) -> Self {
        Self {
            has_strict_lockfile,
            cursor: 0,
            attempts: 0,
        }
    }

    /// Next strategy to try, or `None` when the ladder is exhausted.
    ///
    /// `last_output` is the complete output of the attempt that just failed;
    /// pass `None` before the first attempt.
    pub fn next(&mut self, last_output: Option<&str>) -> Option<InstallStrategy> {
        let signals = last_output.map(classify::classify).unwrap_or_default();

        while let Some(step) = LADDER.get(self.cursor) {
            self.cursor += 1;
            let eligible = match step.precondition {
                Precondition::StrictLockfile => self.has_strict_lockfile,
                Precondition::Always => true,
                Precondition::PeerConflict => signals.peer_conflict,
                Precondition::NativeBuildFailure => signals.native_build,
            };
            if eligible {
                self.attempts += 1;
                tracing::debug!(step = step.label, attempt = self.attempts, "selected install strategy");
                return Some(InstallStrategy::from_step(step));
            }
            tracing::trace!(step = step.label, "install step skipped");
        }
        None
    }

    /// Attempts handed out so far.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

/// Strategies that could ever run for a project, ignoring output-dependent
/// preconditions.
#[must_use]
pub fn possible_strategies(has_strict_lockfile: bool) -> Vec<(Precondition, InstallStrategy)> {
    LADDER
        .iter()
        .filter(|step| has_strict_lockfile || step.precondition != Precondition::StrictLockfile)
        .map(|step| (step.precondition, InstallStrategy::from_step(step)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PEER_OUTPUT: &str = "npm ERR! code ERESOLVE\nnpm ERR! ERESOLVE could not resolve";
    const GYP_OUTPUT: &str = "gyp ERR! build error";

    #[test]
    fn test_first_attempt_uses_lockfile_when_present() {
        let first = InstallLadder::new(true).next(None).unwrap();
        assert_eq!(first.argv, ["npm", "ci", "--no-audit", "--no-fund"]);
        assert!(first.env.is_none());

        let first = InstallLadder::new(false).next(None).unwrap();
        assert_eq!(first.argv, ["npm", "install", "--no-audit", "--no-fund"]);
    }

    #[test]
    fn test_generic_failures_skip_conditional_steps() {
        let mut ladder = InstallLadder::new(false);
        assert_eq!(ladder.next(None).unwrap().label, "install");
        let forced = ladder.next(Some("npm ERR! code E404")).unwrap();
        assert_eq!(forced.label, "forced install");
        assert_eq!(
            forced.env.unwrap().get("npm_config_engine_strict").map(String::as_str),
            Some("false")
        );
        assert!(ladder.next(Some("npm ERR! code E404")).is_none());
        assert_eq!(ladder.attempts(), 2);
    }

    #[test]
    fn test_peer_conflict_then_native_failure_walks_full_ladder() {
        let mut ladder = InstallLadder::new(true);
        let labels: Vec<String> = [None, Some("boom"), Some(PEER_OUTPUT), Some("boom"), Some(GYP_OUTPUT)]
            .into_iter()
            .map_while(|out| ladder.next(out).map(|s| s.label))
            .collect();
        assert_eq!(
            labels,
            [
                "clean install",
                "install",
                "legacy peer deps",
                "forced install",
                "skip install scripts"
            ]
        );
        assert!(ladder.next(Some(GYP_OUTPUT)).is_none());
    }

    #[test]
    fn test_classification_uses_latest_output_only() {
        let mut ladder = InstallLadder::new(false);
        ladder.next(None);
        // Peer conflict in the plain install output is consumed by step 3.
        let legacy = ladder.next(Some(PEER_OUTPUT)).unwrap();
        assert_eq!(legacy.label, "legacy peer deps");
        // The forced install runs regardless; its clean output skips step 5.
        assert_eq!(ladder.next(Some("other")).unwrap().label, "forced install");
        assert!(ladder.next(Some("still failing")).is_none());
    }

    #[test]
    fn test_every_strategy_is_quiet() {
        for (_, strategy) in possible_strategies(true) {
            assert_eq!(strategy.program(), "npm");
            assert!(strategy.args().ends_with(&["--no-audit".to_string(), "--no-fund".to_string()]));
        }
        assert_eq!(possible_strategies(false).len(), LADDER.len() - 1);
    }
}
