//! The `installing` phase.

use super::error::BootstrapError;
use super::event::SessionEvent;
use super::output::{spawn_pump, SilenceWatchdog};
use super::Session;
use crate::install::{InstallLadder, InstallStrategy};
use crate::sandbox::Sandbox;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep_until, timeout, Instant};

/// How long to keep reading output after a process has exited.
pub(crate) const DRAIN_GRACE: Duration = Duration::from_secs(1);

struct AttemptResult {
    exit_code: i32,
    output: String,
}

impl Session {
    /// Walk the fallback ladder until one strategy exits zero.
    ///
    /// Returns the number of attempts made.
    pub(crate) async fn install_dependencies(
        &mut self,
        sandbox: &Arc<dyn Sandbox>,
        has_strict_lockfile: bool,
    ) -> Result<u32, BootstrapError> {
        let mut ladder = InstallLadder::new(has_strict_lockfile);
        let mut last_output: Option<String> = None;
        let mut last_exit = 0;

        while let Some(strategy) = ladder.next(last_output.as_deref()) {
            let attempt = ladder.attempts();
            tracing::info!(attempt, command = %strategy.command_line(), "installing dependencies");
            self.events.emit(SessionEvent::InstallAttempt {
                attempt,
                command: strategy.command_line(),
            });

            let result = self.install_attempt(sandbox, &strategy).await?;
            if result.exit_code == 0 {
                tracing::info!(attempt, "dependencies installed");
                return Ok(attempt);
            }

            tracing::warn!(attempt, exit_code = result.exit_code, step = %strategy.label, "install attempt failed");
            last_exit = result.exit_code;
            last_output = Some(result.output);
        }

        Err(BootstrapError::InstallFailed {
            exit_code: last_exit,
            attempts: ladder.attempts(),
        })
    }

    async fn install_attempt(
        &mut self,
        sandbox: &Arc<dyn Sandbox>,
        strategy: &InstallStrategy,
    ) -> Result<AttemptResult, BootstrapError> {
        let env = strategy.env.clone().unwrap_or_default();
        let process = sandbox
            .spawn(strategy.program(), strategy.args(), &env)
            .await
            .map_err(|e| BootstrapError::spawn(strategy.program(), e))?;

        let control = Arc::clone(&process.control);
        self.process = Some(Arc::clone(&control));

        let (pump, mut tap) = spawn_pump(
            process.output,
            self.events.clone(),
            self.config.output_coalesce,
            |data| SessionEvent::Output { data },
        );
        let mut exit = process.exit;

        let started = Instant::now();
        let give_up_at = started + self.config.install_attempt_timeout;
        let mut watchdog = SilenceWatchdog::new(
            started,
            self.config.initial_silence_hint,
            self.config.stall_hint_interval,
        );
        let mut captured = String::new();
        let mut tap_open = true;

        let exit_code = loop {
            tokio::select! {
                chunk = tap.recv(), if tap_open => match chunk {
                    Some(chunk) => {
                        watchdog.on_output(Instant::now());
                        captured.push_str(&chunk);
                    }
                    None => tap_open = false,
                },
                code = &mut exit => break code.unwrap_or(-1),
                () = sleep_until(watchdog.deadline()) => {
                    self.events.hint(watchdog.fire(Instant::now()));
                }
                () = sleep_until(give_up_at) => {
                    control.kill();
                    self.process = None;
                    pump.abort();
                    return Err(BootstrapError::InstallTimeout {
                        command: strategy.command_line(),
                        timeout: self.config.install_attempt_timeout,
                    });
                }
            }
        };

        // Output produced right before exit may still be in flight.
        let _ = timeout(DRAIN_GRACE, async {
            while let Some(chunk) = tap.recv().await {
                captured.push_str(&chunk);
            }
        })
        .await;
        let pump_abort = pump.abort_handle();
        if timeout(DRAIN_GRACE, pump).await.is_err() {
            pump_abort.abort();
        }

        self.process = None;
        Ok(AttemptResult {
            exit_code,
            output: captured,
        })
    }
}
