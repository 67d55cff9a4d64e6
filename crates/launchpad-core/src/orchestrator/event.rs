//! Outbound session notifications.

use super::status::ContainerStatus;
use crate::preflight::CompatibilityReport;
use serde::Serialize;
use tokio::sync::mpsc;

/// Everything a session tells its observer, in emission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    Status { status: ContainerStatus },
    /// Coalesced process output.
    Output { data: String },
    /// Interactive shell output.
    ShellOutput { data: String },
    /// Advisory message; never changes state.
    Hint { message: String },
    Preflight { report: CompatibilityReport },
    InstallAttempt { attempt: u32, command: String },
    PreviewReady { url: String, port: u16 },
    Error { code: String, message: String },
}

/// Sending half of the event stream. Sends after the observer hung up are dropped.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl EventSink {
    #[must_use]
    pub fn new(tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self { tx }
    }

    /// A sink plus the receiver observing it.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn emit(&self, event: SessionEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("session event dropped; observer gone");
        }
    }

    pub fn hint(&self, message: impl Into<String>) {
        self.emit(SessionEvent::Hint {
            message: message.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_value(SessionEvent::PreviewReady {
            url: "https://x.example".into(),
            port: 5173,
        })
        .unwrap();
        assert_eq!(json["type"], "preview_ready");
        assert_eq!(json["port"], 5173);

        let json = serde_json::to_value(SessionEvent::Status {
            status: ContainerStatus::Ready,
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({ "type": "status", "status": "ready" }));
    }

    #[test]
    fn test_emit_after_observer_dropped() {
        let (sink, rx) = EventSink::channel();
        drop(rx);
        sink.hint("nobody listens");
    }
}
