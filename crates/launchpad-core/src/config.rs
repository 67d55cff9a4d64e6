use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name of the optional per-project bootstrap configuration.
pub const CONFIG_FILE_NAME: &str = "launchpad.json";

/// Runtime configuration for the launchpad CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Current working directory.
    pub cwd: PathBuf,

    /// Whether to emit JSON logs.
    pub json_logs: bool,

    /// Verbosity level (0 = INFO, 1 = DEBUG, 2+ = TRACE).
    pub verbosity: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            json_logs: false,
            verbosity: 0,
        }
    }
}

impl Config {
    /// Create a new config with the given working directory.
    #[must_use]
    pub fn new(cwd: PathBuf) -> Self {
        Self {
            cwd,
            ..Default::default()
        }
    }

    /// Set verbosity level.
    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set JSON log output.
    #[must_use]
    pub fn with_json_logs(mut self, json: bool) -> Self {
        self.json_logs = json;
        self
    }
}

/// Timing and sizing knobs for one bootstrap run.
///
/// All durations are serialized as milliseconds so `launchpad.json` stays plain JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Per-attempt sandbox boot timeout.
    #[serde(rename = "boot_timeout_ms", with = "millis")]
    pub boot_timeout: Duration,
    /// Total boot attempts (only timeouts are retried).
    pub boot_attempts: u32,
    /// Fixed part of the mount timeout.
    #[serde(rename = "mount_base_timeout_ms", with = "millis")]
    pub mount_base_timeout: Duration,
    /// Additional mount time granted per MiB of repository content.
    #[serde(rename = "mount_per_mib_ms", with = "millis")]
    pub mount_per_mib: Duration,
    /// Upper bound for the mount timeout.
    #[serde(rename = "mount_max_timeout_ms", with = "millis")]
    pub mount_max_timeout: Duration,
    /// Timeout for a single install attempt.
    #[serde(rename = "install_attempt_timeout_ms", with = "millis")]
    pub install_attempt_timeout: Duration,
    /// Output coalescing window.
    #[serde(rename = "output_coalesce_ms", with = "millis")]
    pub output_coalesce: Duration,
    /// Silence at the start of an install attempt before the "still working" hint.
    #[serde(rename = "initial_silence_hint_ms", with = "millis")]
    pub initial_silence_hint: Duration,
    /// Recurring silence interval for stall hints.
    #[serde(rename = "stall_hint_interval_ms", with = "millis")]
    pub stall_hint_interval: Duration,
    /// Delay between an output-pattern match and the "no external URL yet" hint.
    #[serde(rename = "readiness_grace_ms", with = "millis")]
    pub readiness_grace: Duration,
    /// How long to wait for the readiness latch before troubleshooting hints.
    #[serde(rename = "readiness_timeout_ms", with = "millis")]
    pub readiness_timeout: Duration,
    /// Node major version provided by the sandbox runtime.
    pub runtime_node_major: u32,
    /// Command used for the interactive shell.
    pub shell_command: String,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            boot_timeout: Duration::from_secs(60),
            boot_attempts: 3,
            mount_base_timeout: Duration::from_secs(30),
            mount_per_mib: Duration::from_secs(2),
            mount_max_timeout: Duration::from_secs(300),
            install_attempt_timeout: Duration::from_secs(300),
            output_coalesce: Duration::from_millis(50),
            initial_silence_hint: Duration::from_secs(15),
            stall_hint_interval: Duration::from_secs(60),
            readiness_grace: Duration::from_secs(2),
            readiness_timeout: Duration::from_secs(45),
            runtime_node_major: 18,
            shell_command: "jsh".to_string(),
        }
    }
}

impl BootstrapConfig {
    /// Mount timeout for a repository of `total_bytes`.
    #[must_use]
    pub fn mount_timeout_for(&self, total_bytes: u64) -> Duration {
        const MIB: u64 = 1024 * 1024;
        let mib = u32::try_from(total_bytes.div_ceil(MIB)).unwrap_or(u32::MAX);
        let scaled = self.mount_base_timeout + self.mount_per_mib.saturating_mul(mib);
        scaled.min(self.mount_max_timeout)
    }

    /// Load `launchpad.json` from `dir`, falling back to defaults when absent.
    ///
    /// Missing fields take their default value.
    pub fn load(dir: &Path) -> Result<Self, Error> {
        let path = dir.join(CONFIG_FILE_NAME);
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path).map_err(|source| Error::ConfigRead {
            path: path.clone(),
            source,
        })?;

        serde_json::from_str(&content).map_err(|source| Error::ConfigParse { path, source })
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_match_documented_timings() {
        let cfg = BootstrapConfig::default();
        assert_eq!(cfg.boot_attempts, 3);
        assert_eq!(cfg.boot_timeout, Duration::from_secs(60));
        assert_eq!(cfg.readiness_timeout, Duration::from_secs(45));
        assert_eq!(cfg.runtime_node_major, 18);
    }

    #[test]
    fn test_mount_timeout_scales_and_caps() {
        let cfg = BootstrapConfig::default();
        assert_eq!(cfg.mount_timeout_for(0), Duration::from_secs(30));
        assert_eq!(cfg.mount_timeout_for(1), Duration::from_secs(32));
        assert_eq!(
            cfg.mount_timeout_for(10 * 1024 * 1024),
            Duration::from_secs(50)
        );
        assert_eq!(
            cfg.mount_timeout_for(10 * 1024 * 1024 * 1024),
            Duration::from_secs(300)
        );
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        assert_eq!(
            BootstrapConfig::load(dir.path()).unwrap(),
            BootstrapConfig::default()
        );
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"{ "readiness_timeout_ms": 5000, "boot_attempts": 1 }"#,
        )
        .unwrap();

        let cfg = BootstrapConfig::load(dir.path()).unwrap();
        assert_eq!(cfg.readiness_timeout, Duration::from_secs(5));
        assert_eq!(cfg.boot_attempts, 1);
        assert_eq!(cfg.boot_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_load_invalid_json() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "{ nope").unwrap();

        let err = BootstrapConfig::load(dir.path()).unwrap_err();
        assert!(matches!(err, Error::ConfigParse { .. }));
    }
}
