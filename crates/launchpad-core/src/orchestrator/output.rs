//! Process output plumbing.
//!
//! Every spawned process gets a pump task that drains its output channel as
//! fast as it is produced. The pump forwards each raw chunk to a tap the
//! orchestrator reads for classification, and batches chunks into one event
//! per coalescing window for the observer.

use super::event::{EventSink, SessionEvent};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

/// Drain `source`, emitting coalesced events built by `wrap`.
///
/// Returns the pump task and the raw-chunk tap. The tap closes once `source`
/// is exhausted; dropping it early is fine.
pub(crate) fn spawn_pump(
    mut source: mpsc::Receiver<String>,
    sink: EventSink,
    window: Duration,
    wrap: fn(String) -> SessionEvent,
) -> (JoinHandle<()>, mpsc::UnboundedReceiver<String>) {
    let (tap_tx, tap_rx) = mpsc::unbounded_channel();

    let handle = tokio::spawn(async move {
        let mut buffer = String::new();
        let mut flush_at: Option<Instant> = None;

        loop {
            tokio::select! {
                chunk = source.recv() => {
                    let Some(chunk) = chunk else { break };
                    let _ = tap_tx.send(chunk.clone());
                    if buffer.is_empty() {
                        flush_at = Some(Instant::now() + window);
                    }
                    buffer.push_str(&chunk);
                }
                () = sleep_until(flush_at.unwrap_or_else(Instant::now)), if flush_at.is_some() => {
                    flush_at = None;
                    sink.emit(wrap(std::mem::take(&mut buffer)));
                }
            }
        }

        if !buffer.is_empty() {
            sink.emit(wrap(buffer));
        }
    });

    (handle, tap_rx)
}

/// Schedules "still working" and stall hints for an install attempt.
#[derive(Debug, Clone)]
pub(crate) struct SilenceWatchdog {
    interval: Duration,
    last_activity: Instant,
    deadline: Instant,
    heard_output: bool,
    fired: u32,
}

impl SilenceWatchdog {
    pub(crate) fn new(start: Instant, initial: Duration, interval: Duration) -> Self {
        Self {
            interval,
            last_activity: start,
            deadline: start + initial,
            heard_output: false,
            fired: 0,
        }
    }

    pub(crate) fn deadline(&self) -> Instant {
        self.deadline
    }

    pub(crate) fn on_output(&mut self, now: Instant) {
        self.heard_output = true;
        self.last_activity = now;
        self.deadline = now + self.interval;
    }

    /// The deadline passed: produce the hint and schedule the next one.
    pub(crate) fn fire(&mut self, now: Instant) -> String {
        let message = if !self.heard_output && self.fired == 0 {
            "Still working: the package manager has not printed anything yet. Large dependency trees can take a few minutes."
                .to_string()
        } else {
            format!(
                "No install output for {}s. The install may be stalled; it will keep running until its timeout.",
                now.saturating_duration_since(self.last_activity).as_secs()
            )
        };
        self.fired += 1;
        self.deadline = now + self.interval;
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(data: String) -> SessionEvent {
        SessionEvent::Output { data }
    }

    #[tokio::test(start_paused = true)]
    async fn test_pump_coalesces_within_window() {
        let (sink, mut events) = EventSink::channel();
        let (tx, rx) = mpsc::channel(16);
        let (handle, mut tap) = spawn_pump(rx, sink, Duration::from_millis(50), output);

        tx.send("a".into()).await.unwrap();
        tx.send("b".into()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send("c".into()).await.unwrap();
        drop(tx);
        handle.await.unwrap();

        assert_eq!(events.recv().await, Some(output("ab".into())));
        assert_eq!(events.recv().await, Some(output("c".into())));
        let mut raw = Vec::new();
        while let Some(chunk) = tap.recv().await {
            raw.push(chunk);
        }
        assert_eq!(raw, ["a", "b", "c"]);
    }

    #[test]
    fn test_watchdog_initial_then_stall() {
        let start = Instant::now();
        let mut dog = SilenceWatchdog::new(start, Duration::from_secs(15), Duration::from_secs(60));
        assert_eq!(dog.deadline(), start + Duration::from_secs(15));

        let first = dog.fire(start + Duration::from_secs(15));
        assert!(first.starts_with("Still working"));
        assert_eq!(dog.deadline(), start + Duration::from_secs(75));

        let second = dog.fire(start + Duration::from_secs(75));
        assert!(second.contains("75s"));
    }

    #[test]
    fn test_watchdog_output_pushes_deadline() {
        let start = Instant::now();
        let mut dog = SilenceWatchdog::new(start, Duration::from_secs(15), Duration::from_secs(60));
        dog.on_output(start + Duration::from_secs(5));
        assert_eq!(dog.deadline(), start + Duration::from_secs(65));
        let hint = dog.fire(start + Duration::from_secs(65));
        assert!(hint.contains("60s"));
    }
}
