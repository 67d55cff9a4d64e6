//! The `running` phase: launch the dev server and wait for the readiness latch.

use super::error::BootstrapError;
use super::event::SessionEvent;
use super::output::spawn_pump;
use super::status::ContainerStatus;
use super::Session;
use crate::framework::{self, FrameworkConfig};
use crate::readiness::PortDecision;
use crate::sandbox::Sandbox;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

const READINESS_TIMEOUT_TIMER: &str = "readiness-timeout";
const READINESS_GRACE_TIMER: &str = "readiness-grace";

impl Session {
    /// Spawn the dev server and block until it is reachable or dies.
    ///
    /// Returns the latched port and URL. The process keeps running afterwards;
    /// a monitor task drains its output until teardown.
    pub(crate) async fn launch_server(
        &mut self,
        sandbox: &Arc<dyn Sandbox>,
        config: &FrameworkConfig,
    ) -> Result<(u16, String), BootstrapError> {
        // Subscribe before spawning so an early bind is not missed.
        let mut ports = sandbox.subscribe_ports();

        let env = config.env.clone().unwrap_or_default();
        tracing::info!(
            framework = config.name.as_deref().unwrap_or("unknown"),
            command = %config.argv.join(" "),
            "starting dev server"
        );
        let process = sandbox
            .spawn(config.program(), config.args(), &env)
            .await
            .map_err(|e| BootstrapError::spawn(config.program(), e))?;
        self.process = Some(Arc::clone(&process.control));
        self.set_status(ContainerStatus::Running);

        let (pump, mut tap) = spawn_pump(
            process.output,
            self.events.clone(),
            self.config.output_coalesce,
            |data| SessionEvent::Output { data },
        );
        self.tasks.push(pump);
        // `None` once a launcher exited cleanly before the server bound.
        let mut exit = Some(process.exit);

        self.timers.schedule_hints(
            READINESS_TIMEOUT_TIMER,
            self.config.readiness_timeout,
            self.events.clone(),
            framework::troubleshooting_hints(config),
        );

        let mut ports_open = true;
        let mut tap_open = true;
        let mut warned_loopback = false;

        let (port, url) = loop {
            tokio::select! {
                event = ports.recv(), if ports_open => match event {
                    Ok(event) => match self.detector.on_port_event(event.port, &event.url) {
                        PortDecision::Latched { port, url } => break (port, url),
                        PortDecision::Rejected => {
                            if !warned_loopback {
                                warned_loopback = true;
                                self.events.hint(format!(
                                    "The server reported {}, which is only reachable inside the sandbox. Waiting for an external URL...",
                                    event.url
                                ));
                            }
                        }
                        PortDecision::AlreadyLatched => {}
                    },
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "port events lagged");
                    }
                    Err(RecvError::Closed) => ports_open = false,
                },
                chunk = tap.recv(), if tap_open => match chunk {
                    Some(chunk) => {
                        if let Some(port) = self.detector.on_output(&chunk) {
                            self.timers.schedule_hints(
                                READINESS_GRACE_TIMER,
                                self.config.readiness_grace,
                                self.events.clone(),
                                vec![format!(
                                    "The server appears to be running on port {port}, but no external URL has been reported yet. Still waiting for the preview..."
                                )],
                            );
                        }
                    }
                    None => tap_open = false,
                },
                code = async { exit.as_mut()?.await.ok() }, if exit.is_some() => {
                    exit = None;
                    match code {
                        Some(0) => {
                            // Daemonizing launchers exit cleanly and leave the server running.
                            tracing::info!("launcher exited 0 before readiness, still waiting");
                            self.events.hint(
                                "The start command exited with code 0 before the server became reachable. Still waiting for it to report a port...",
                            );
                        }
                        code => {
                            let code = code.unwrap_or(-1);
                            tracing::warn!(exit_code = code, "dev server exited before it became reachable");
                            self.process = None;
                            return Err(BootstrapError::ServerExited { code });
                        }
                    }
                }
                else => {
                    tracing::warn!("no readiness source left");
                    self.process = None;
                    return Err(BootstrapError::ServerExited { code: 0 });
                }
            }
        };

        self.timers.cancel_all();

        let events = self.events.clone();
        self.tasks.push(tokio::spawn(async move {
            let drain = async {
                while tap.recv().await.is_some() {}
            };
            let Some(exit) = exit else {
                drain.await;
                return;
            };
            let (_, code) = tokio::join!(drain, exit);
            let code = code.unwrap_or(-1);
            tracing::info!(exit_code = code, "dev server exited");
            events.hint(format!("The dev server exited with code {code}."));
        }));

        Ok((port, url))
    }
}
