use super::event::EventSink;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Named one-shot hint timers owned by a session.
#[derive(Debug, Default)]
pub(crate) struct Timers {
    pending: Vec<(&'static str, JoinHandle<()>)>,
}

impl Timers {
    /// After `delay`, emit each message as a hint. Re-arming a name replaces it.
    pub(crate) fn schedule_hints(
        &mut self,
        name: &'static str,
        delay: Duration,
        sink: EventSink,
        messages: Vec<String>,
    ) {
        self.cancel(name);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            for message in messages {
                sink.hint(message);
            }
        });
        self.pending.push((name, handle));
    }

    pub(crate) fn cancel(&mut self, name: &str) {
        self.pending.retain(|(n, handle)| {
            if *n == name {
                handle.abort();
                false
            } else {
                true
            }
        });
    }

    pub(crate) fn cancel_all(&mut self) {
        for (name, handle) in self.pending.drain(..) {
            tracing::trace!(timer = name, "timer cancelled");
            handle.abort();
        }
    }

    /// Timers not yet fired or cancelled.
    pub(crate) fn live(&self) -> usize {
        self.pending.iter().filter(|(_, h)| !h.is_finished()).count()
    }
}

impl Drop for Timers {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
