//! Dev-server readiness detection.
//!
//! Two channels feed one first-wins latch:
//!
//! - port-bound events from the sandbox, which are authoritative unless the
//!   URL is loopback-only (unreachable from outside the sandbox);
//! - textual output matched against [`READY_PATTERNS`], which is advisory. A
//!   match never latches; it only tells the orchestrator to arm the grace
//!   timer for the "appears ready" hint.

use crate::framework::DEFAULT_PORT;
use regex_lite::Regex;
use std::sync::OnceLock;

/// Output phrasings meaning "the server is up". Capture group 1, when present,
/// is the port.
pub const READY_PATTERNS: &[&str] = &[
    r"(?i)ready in \d+(?:\.\d+)?\s*m?s",
    r"(?i)listening (?:on|at)[^\d\n]*?(?:port\s*)?:?(\d{2,5})\b",
    r"(?i)Local:\s+https?://[^\s:/]+:(\d{2,5})",
    r"(?i)server (?:is )?(?:running|started|listening) (?:on|at)[^\n]*?:(\d{2,5})\b",
    r"(?i)server (?:is )?(?:running|started|listening)",
    r"(?i)started server on [^\n]*?:(\d{2,5})\b",
    r"(?i)on your network:?\s+https?://[^\s:/]+:(\d{2,5})",
    r"(?i)compiled successfully",
    r"(?i)webpack compiled",
    r"(?i)available on:?\s+https?://[^\s:/]+:(\d{2,5})",
    r"(?i)https?://(?:localhost|127\.0\.0\.1|0\.0\.0\.0|\[::\]):(\d{2,5})",
];

fn ready_res() -> &'static [Regex] {
    static RES: OnceLock<Vec<Regex>> = OnceLock::new();
    RES.get_or_init(|| {
        READY_PATTERNS
            .iter()
            .filter_map(|p| match Regex::new(p) {
                Ok(re) => Some(re),
                Err(e) => {
                    tracing::warn!(pattern = p, error = %e, "skipping invalid readiness pattern");
                    None
                }
            })
            .collect()
    })
}

fn ansi_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]").expect("valid regex"))
}

/// Remove terminal color and cursor escape sequences.
#[must_use]
pub fn strip_ansi(text: &str) -> String {
    ansi_re().replace_all(text, "").into_owned()
}

/// Port reported by the first pattern matching `text`.
///
/// `Some(DEFAULT_PORT)` when a pattern without a port group matches.
#[must_use]
pub fn match_ready_output(text: &str) -> Option<u16> {
    let clean = strip_ansi(text);
    ready_res().iter().find_map(|re| {
        let caps = re.captures(&clean)?;
        let port = caps
            .get(1)
            .and_then(|m| m.as_str().parse::<u16>().ok())
            .filter(|p| *p != 0)
            .unwrap_or(DEFAULT_PORT);
        Some(port)
    })
}

/// Whether `url` only addresses the sandbox's own loopback interface.
#[must_use]
pub fn is_loopback_url(url: &str) -> bool {
    let lower = url.trim().to_ascii_lowercase();
    ["http://localhost", "http://127.0.0.1", "https://localhost", "https://127.0.0.1"]
        .iter()
        .any(|prefix| lower.starts_with(prefix))
}

/// Result of feeding a port event to the detector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortDecision {
    /// Loopback URL; keep waiting.
    Rejected,
    /// This event fired the latch.
    Latched { port: u16, url: String },
    /// The latch already fired earlier.
    AlreadyLatched,
}

/// First-wins readiness latch for one run.
#[derive(Debug, Default)]
pub struct ReadinessDetector {
    latched: Option<(u16, String)>,
    output_port: Option<u16>,
}

impl ReadinessDetector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_latched(&self) -> bool {
        self.latched.is_some()
    }

    /// Port and URL that fired the latch.
    #[must_use]
    pub fn latched(&self) -> Option<(u16, &str)> {
        self.latched.as_ref().map(|(p, u)| (*p, u.as_str()))
    }

    /// Port extracted from the first output match, if any.
    #[must_use]
    pub fn output_port(&self) -> Option<u16> {
        self.output_port
    }

    /// Feed a port-bound notification.
    pub fn on_port_event(&mut self, port: u16, url: &str) -> PortDecision {
        if self.latched.is_some() {
            return PortDecision::AlreadyLatched;
        }
        if is_loopback_url(url) {
            tracing::debug!(port, url, "ignoring loopback port event");
            return PortDecision::Rejected;
        }
        self.latched = Some((port, url.to_string()));
        tracing::info!(port, url, "dev server reachable");
        PortDecision::Latched {
            port,
            url: url.to_string(),
        }
    }

    /// Feed an output chunk.
    ///
    /// Returns the extracted port only for the first matching chunk of the run,
    /// and never once the latch has fired.
    pub fn on_output(&mut self, chunk: &str) -> Option<u16> {
        if self.latched.is_some() || self.output_port.is_some() {
            return None;
        }
        let port = match_ready_output(chunk)?;
        tracing::debug!(port, "server output looks ready");
        self.output_port = Some(port);
        Some(port)
    }

    /// Forget everything; used when a run is torn down.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_patterns_compile() {
        assert_eq!(ready_res().len(), READY_PATTERNS.len());
    }

    #[test]
    fn test_tool_phrasings() {
        let cases = [
            ("  VITE v5.0.0  ready in 312 ms", Some(DEFAULT_PORT)),
            ("  ➜  Local:   http://localhost:5173/", Some(5173)),
            ("Server listening on port 8080", Some(8080)),
            ("Listening at http://0.0.0.0:4000", Some(4000)),
            ("Server running at http://localhost:8000", Some(8000)),
            ("ready - started server on 0.0.0.0:3000, url: http://localhost:3000", Some(3000)),
            ("Compiled successfully!", Some(DEFAULT_PORT)),
            ("added 120 packages in 3s", None),
            ("npm WARN deprecated", None),
        ];
        for (line, expected) in cases {
            assert_eq!(match_ready_output(line), expected, "line: {line}");
        }
    }

    #[test]
    fn test_ansi_is_stripped_before_matching() {
        let colored = "\x1b[32m  ➜  \x1b[39m\x1b[1mLocal\x1b[22m:   \x1b[36mhttp://localhost:\x1b[1m5174\x1b[22m/\x1b[39m";
        assert_eq!(strip_ansi("\x1b[1mbold\x1b[22m"), "bold");
        assert_eq!(match_ready_output(colored), Some(5174));
    }

    #[test]
    fn test_loopback_urls() {
        assert!(is_loopback_url("http://localhost:5173"));
        assert!(is_loopback_url("http://127.0.0.1:3000/"));
        assert!(!is_loopback_url("https://abc-5173.sandbox.example"));
        assert!(!is_loopback_url("http://0.0.0.0:5173"));
    }

    #[test]
    fn test_loopback_event_does_not_latch() {
        let mut detector = ReadinessDetector::new();
        assert_eq!(
            detector.on_port_event(5173, "http://localhost:5173"),
            PortDecision::Rejected
        );
        assert!(!detector.is_latched());
        assert_eq!(
            detector.on_port_event(5173, "https://abc-5173.sandbox.example"),
            PortDecision::Latched {
                port: 5173,
                url: "https://abc-5173.sandbox.example".to_string()
            }
        );
        assert_eq!(
            detector.latched(),
            Some((5173, "https://abc-5173.sandbox.example"))
        );
    }

    #[test]
    fn test_latch_fires_once() {
        let mut detector = ReadinessDetector::new();
        assert!(matches!(
            detector.on_port_event(3000, "https://a.example"),
            PortDecision::Latched { .. }
        ));
        assert_eq!(
            detector.on_port_event(3001, "https://b.example"),
            PortDecision::AlreadyLatched
        );
        assert_eq!(detector.on_output("ready in 20ms"), None);
    }

    #[test]
    fn test_output_match_reported_once() {
        let mut detector = ReadinessDetector::new();
        assert_eq!(detector.on_output("compiling..."), None);
        assert_eq!(detector.on_output("Server listening on port 8080"), Some(8080));
        assert_eq!(detector.on_output("Server listening on port 8080"), None);
        assert!(!detector.is_latched());
        assert_eq!(detector.output_port(), Some(8080));

        detector.reset();
        assert_eq!(detector.output_port(), None);
    }
}
