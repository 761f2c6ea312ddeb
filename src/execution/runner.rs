//! Command runner: drives one command from options to result.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::options::{ResolvedOptions, RunConfig, RunOptions, RunnerKind};
use super::result::{ExecutionFault, RunResult};
use super::state::RunState;
use super::strategy::{select_strategy, Strategy};
use crate::error::{Failure, RunError};
use crate::output::{self, Captured, OutputDevice, OutputSource, StreamReader};
use crate::signal::{ChildSignal, InterruptGuard, SignalTarget};
use crate::{pty, Result};

/// How often the wait loop checks for interrupts.
const INTERRUPT_POLL: Duration = Duration::from_millis(20);

/// Runs shell commands locally.
///
/// Holds the collaborator-supplied defaults, the devices echo goes to and
/// the check deciding whether a pty is usable. None of it changes between
/// calls, so repeated runs of a deterministic command give equal results.
#[derive(Debug, Clone)]
pub struct Runner {
    defaults: RunConfig,
    device: OutputDevice,
    pty_check: fn() -> bool,
}

impl Runner {
    /// Create a runner with default options, echoing to stdout/stderr.
    pub fn new() -> Self {
        Self::with_config(RunConfig::default())
    }

    /// Create a runner with the given default options.
    pub fn with_config(defaults: RunConfig) -> Self {
        Self {
            defaults,
            device: OutputDevice::stdio(),
            pty_check: pty::is_available,
        }
    }

    /// Echo to `device` instead of the process's own stdout/stderr.
    pub fn with_output(mut self, device: OutputDevice) -> Self {
        self.device = device;
        self
    }

    /// Replace the check deciding whether a pty is available.
    pub fn with_pty_check(mut self, check: fn() -> bool) -> Self {
        self.pty_check = check;
        self
    }

    /// The default options overrides are merged into.
    pub fn defaults(&self) -> &RunConfig {
        &self.defaults
    }

    /// Run a command, blocking until it exits and its output is drained.
    ///
    /// Must not be called from within a tokio runtime; use
    /// [`run_async`](Self::run_async) there.
    pub fn run(&self, command: &str, options: &RunOptions) -> Result<RunResult> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.run_async(command, options))
    }

    /// Run a command from async code.
    ///
    /// Returns the result when the command succeeded or `warn` is set,
    /// [`RunError::Failure`] otherwise. Invalid options are rejected with
    /// [`RunError::InvalidOption`] before anything is spawned.
    pub async fn run_async(&self, command: &str, options: &RunOptions) -> Result<RunResult> {
        let mut state = RunState::Idle;

        if command.trim().is_empty() {
            return Err(RunError::InvalidOption(
                "command: must not be empty".to_string(),
            ));
        }
        let resolved = self.defaults.merge(options).resolve()?;
        advance(&mut state, RunState::OptionsResolved);

        let kind = match resolved.runner {
            RunnerKind::Local => select_strategy(resolved.pty, resolved.fallback, self.pty_check),
        };
        if resolved.pty && !kind.uses_pty() {
            debug!("pty unavailable, falling back to pipes");
        }
        advance(&mut state, RunState::StrategySelected);

        let strategy = kind.build();
        let execution = self
            .execute(command, &resolved, strategy.as_ref(), &mut state)
            .await;
        let result = execution.result;

        let outcome = if execution.interrupted {
            advance(&mut state, RunState::Failed);
            Err(RunError::Interrupted(Box::new(result)))
        } else if result.ok() || resolved.warn {
            advance(&mut state, RunState::Returned);
            Ok(result)
        } else {
            advance(&mut state, RunState::Failed);
            Err(Failure::new(result).into())
        };
        debug_assert!(state.is_terminal(), "run ended in {state:?}");
        outcome
    }

    async fn execute(
        &self,
        command: &str,
        resolved: &ResolvedOptions,
        strategy: &dyn Strategy,
        state: &mut RunState,
    ) -> Execution {
        let uses_pty = strategy.kind().uses_pty();

        if resolved.echo {
            if let Err(e) = self.device.echo_command(command) {
                warn!("failed to echo command: {}", e);
            }
        }

        // Scoped to this run; dropping it restores the previous SIGINT disposition.
        let interrupts = match InterruptGuard::install() {
            Ok(guard) => Some(guard),
            Err(e) => {
                debug!("cannot listen for interrupts: {}", e);
                None
            }
        };

        info!(command, pty = uses_pty, "running command");
        advance(state, RunState::Running);

        let spawned = match strategy.spawn(command) {
            Ok(spawned) => spawned,
            Err(e) => {
                warn!("failed to spawn '{}': {}", command, e);
                advance(state, RunState::Draining);
                advance(state, RunState::Exited);
                let fault = ExecutionFault::new("failed to spawn command", &e);
                return Execution {
                    result: RunResult::new(
                        command,
                        String::new(),
                        String::new(),
                        None,
                        uses_pty,
                        Some(fault),
                    ),
                    interrupted: false,
                };
            }
        };

        let (streams, mut child, keepalive) = spawned.into_parts();
        let target = child.signal_target();

        let readers: Vec<(OutputSource, JoinHandle<Captured>)> = streams
            .into_iter()
            .map(|(source, stream)| {
                let mut reader = StreamReader::new(stream, source, resolved.encoding);
                if !resolved.hide.hides(source) {
                    reader = reader.echo_to(self.device.clone());
                }
                (source, reader.spawn())
            })
            .collect();
        advance(state, RunState::Draining);

        let mut wait = tokio::task::spawn_blocking(move || child.wait());
        let mut ticker = tokio::time::interval(INTERRUPT_POLL);
        let mut forwarded = 0;

        let status = loop {
            tokio::select! {
                status = &mut wait => break status,
                _ = ticker.tick(), if interrupts.is_some() => {
                    let received = interrupts.as_ref().map_or(0, InterruptGuard::received);
                    while forwarded < received && state.has_child() {
                        forwarded += 1;
                        // The first interrupt asks; any further one insists.
                        let signal = if forwarded == 1 {
                            ChildSignal::Interrupt
                        } else {
                            ChildSignal::Kill
                        };
                        warn!("interrupt received, sending {:?} to {:?}", signal, target);
                        forward(target, signal);
                    }
                }
            }
        };

        let (exited, mut fault) = match status {
            Ok(Ok(code)) => (Some(code), None),
            Ok(Err(e)) => (None, Some(ExecutionFault::new("failed to wait for child", &e))),
            Err(e) => (
                None,
                Some(ExecutionFault {
                    kind: std::io::ErrorKind::Other,
                    message: format!("wait task failed: {e}"),
                }),
            ),
        };
        if exited.is_none() {
            // Nothing reaped the child; make sure the readers can finish.
            forward(target, ChildSignal::Kill);
        }

        let mut stdout = String::new();
        let mut stderr = String::new();
        for (source, handle) in readers {
            let captured = output::join(handle, source).await;
            match source {
                OutputSource::Stdout => stdout = captured.text,
                OutputSource::Stderr => stderr = captured.text,
            }
            if fault.is_none() {
                fault = captured.fault;
            }
        }
        drop(keepalive);
        let interrupted = forwarded > 0
            || interrupts.as_ref().map_or(0, InterruptGuard::received) > 0;
        drop(interrupts);
        advance(state, RunState::Exited);

        if let Some(fault) = &fault {
            warn!("{}", fault);
        }
        debug!(command, exited = ?exited, "command finished");

        Execution {
            result: RunResult::new(command, stdout, stderr, exited, uses_pty, fault),
            interrupted,
        }
    }
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

/// What a single execution produced.
struct Execution {
    result: RunResult,
    interrupted: bool,
}

fn forward(target: Option<SignalTarget>, signal: ChildSignal) {
    let Some(target) = target else {
        return;
    };
    if let Err(e) = target.send(signal) {
        warn!("failed to signal child {}: {}", target.pid(), e);
    }
}

fn advance(state: &mut RunState, next: RunState) {
    debug_assert!(state.can_transition_to(next), "{state:?} -> {next:?}");
    match state.transition_to(next) {
        Ok(()) => debug!(state = ?next, "run state"),
        Err(e) => error!("{}", e),
    }
}

/// Run a command with default options, echoing to stdout/stderr.
pub fn run(command: &str, options: &RunOptions) -> Result<RunResult> {
    Runner::new().run(command, options)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet() -> Runner {
        let (device, _, _) = OutputDevice::capture();
        Runner::new().with_output(device).with_pty_check(|| false)
    }

    #[test]
    fn test_empty_command_rejected() {
        let err = quiet().run("   ", &RunOptions::new()).unwrap_err();
        assert!(matches!(err, RunError::InvalidOption(_)));
    }

    #[test]
    fn test_invalid_hide_rejected_before_spawn() {
        let (device, out, err) = OutputDevice::capture();
        let runner = Runner::new().with_output(device);
        let options = RunOptions::new().hide("not-a-real-value").echo(true);
        let error = runner.run("echo never", &options).unwrap_err();

        assert!(matches!(error, RunError::InvalidOption(_)));
        assert!(error.to_string().contains("not-a-real-value"));
        // Nothing was echoed, so nothing ran.
        assert!(out.contents().is_empty());
        assert!(err.contents().is_empty());
    }

    #[test]
    fn test_defaults_accessible() {
        let runner = Runner::with_config(RunConfig {
            warn: true,
            ..RunConfig::default()
        });
        assert!(runner.defaults().warn);
    }

    #[cfg(unix)]
    #[test]
    fn test_config_defaults_apply() {
        let (device, _, _) = OutputDevice::capture();
        let runner = Runner::with_config(RunConfig {
            warn: true,
            ..RunConfig::default()
        })
        .with_output(device);
        let result = runner.run("exit 5", &RunOptions::new()).unwrap();
        assert_eq!(result.exited(), Some(5));
    }

    #[cfg(unix)]
    #[test]
    fn test_override_beats_config() {
        let (device, _, _) = OutputDevice::capture();
        let runner = Runner::with_config(RunConfig {
            warn: true,
            ..RunConfig::default()
        })
        .with_output(device);
        let err = runner
            .run("exit 5", &RunOptions::new().warn(false))
            .unwrap_err();
        assert_eq!(err.result().and_then(RunResult::exited), Some(5));
    }

    #[cfg(unix)]
    #[test]
    fn test_config_echo_default() {
        let (device, out, _) = OutputDevice::capture();
        let runner = Runner::with_config(RunConfig {
            echo: true,
            ..RunConfig::default()
        })
        .with_output(device);
        runner.run("true", &RunOptions::new()).unwrap();
        assert!(out.contents().contains("true"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_async() {
        let result = quiet()
            .run_async("echo async", &RunOptions::new().hide(true))
            .await
            .unwrap();
        assert_eq!(result.stdout(), "async\n");
        assert!(!result.pty());
    }
}
