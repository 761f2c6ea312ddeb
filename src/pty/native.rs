//! Native PTY strategy using portable-pty.

use std::io;

use portable_pty::{native_pty_system, ChildKiller, CommandBuilder, PtySize as NativePtySize};
use tracing::debug;

use super::PtySize;
use crate::execution::strategy::shell_invocation;
use crate::execution::{ChildProcess, Spawned, Strategy, StrategyKind};
use crate::output::OutputSource;
use crate::signal::SignalTarget;

fn pty_error(e: impl std::fmt::Display) -> io::Error {
    io::Error::other(format!("PTY error: {e}"))
}

/// Runs commands attached to a freshly allocated pseudo-terminal.
///
/// The child becomes a session leader with the pty slave as its
/// controlling terminal; stdout and stderr arrive merged on the master.
#[derive(Debug, Clone, Copy)]
pub struct PtyStrategy {
    size: PtySize,
}

impl PtyStrategy {
    /// Create a strategy sized like the current terminal.
    pub fn new() -> Self {
        Self {
            size: PtySize::detect(),
        }
    }

    /// Use a fixed pty size.
    pub fn with_size(mut self, size: PtySize) -> Self {
        self.size = size;
        self
    }
}

impl Default for PtyStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for PtyStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::PseudoTerminal
    }

    fn spawn(&self, command: &str) -> io::Result<Spawned> {
        let native_size = NativePtySize {
            rows: self.size.rows,
            cols: self.size.cols,
            pixel_width: 0,
            pixel_height: 0,
        };

        let pair = native_pty_system().openpty(native_size).map_err(pty_error)?;

        let (shell, args) = shell_invocation(command);
        let mut cmd = CommandBuilder::new(shell);
        cmd.args(args);
        cmd.cwd(std::env::current_dir()?);

        let mut child = pair.slave.spawn_command(cmd).map_err(pty_error)?;
        // The slave must close on our side, or the master never reports EOF.
        drop(pair.slave);

        let reader = match pair.master.try_clone_reader() {
            Ok(reader) => reader,
            Err(e) => {
                abandon(child.as_mut());
                return Err(pty_error(e));
            }
        };
        debug!(
            "pty child spawned (pid {:?}, {}x{})",
            child.process_id(),
            self.size.cols,
            self.size.rows
        );

        Ok(
            Spawned::new(vec![(OutputSource::Stdout, reader)], Box::new(PtyChild { child }))
                .keep_alive(Box::new(pair.master)),
        )
    }
}

struct PtyChild {
    child: Box<dyn portable_pty::Child + Send + Sync>,
}

impl ChildProcess for PtyChild {
    fn pid(&self) -> Option<u32> {
        self.child.process_id()
    }

    fn signal_target(&self) -> Option<SignalTarget> {
        // The child is a session leader, so it leads its own group too.
        self.child.process_id().map(SignalTarget::Group)
    }

    fn wait(&mut self) -> io::Result<i32> {
        // portable-pty reports every signal death as exit code 1.
        #[cfg(unix)]
        if let Some(pid) = self.child.process_id() {
            return crate::execution::strategy::wait_pid(pid);
        }

        let status = self.child.wait()?;
        Ok(i32::try_from(status.exit_code()).unwrap_or(i32::MAX))
    }
}

/// Kill and reap a child whose output can no longer be read.
fn abandon(child: &mut (dyn portable_pty::Child + Send + Sync)) {
    if let Err(e) = child.kill() {
        debug!("failed to kill abandoned pty child: {}", e);
    }
    if let Err(e) = child.wait() {
        debug!("failed to reap abandoned pty child: {}", e);
    }
}
