//! Execution strategies: how a command is spawned and attached.
//!
//! A [`Strategy`] spawns the child and hands back its live output streams
//! and a [`ChildProcess`] handle to wait on. Which strategy runs is decided
//! by [`select_strategy`], which never touches a process itself.

use std::any::Any;
use std::io::{self, Read};
use std::process::{Command, ExitStatus, Stdio};

use crate::output::OutputSource;
use crate::pty::{self, PtyStrategy};
use crate::signal::SignalTarget;

/// The available execution strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    /// Independent stdout/stderr pipes.
    Direct,
    /// A single combined stream from a pseudo-terminal.
    PseudoTerminal,
}

impl StrategyKind {
    /// Whether this strategy runs the child on a pty.
    pub fn uses_pty(&self) -> bool {
        matches!(self, Self::PseudoTerminal)
    }

    /// Instantiate the strategy.
    pub fn build(&self) -> Box<dyn Strategy> {
        match self {
            Self::Direct => Box::new(DirectStrategy::new()),
            Self::PseudoTerminal => Box::new(PtyStrategy::new()),
        }
    }
}

/// Pick a strategy for one call.
///
/// `pty_available` is only consulted when a pty was requested. When it is
/// unavailable, `fallback` downgrades to pipes; without fallback the pty is
/// forced anyway.
pub fn select_strategy(
    pty: bool,
    fallback: bool,
    pty_available: impl FnOnce() -> bool,
) -> StrategyKind {
    if !pty {
        return StrategyKind::Direct;
    }
    if pty_available() || !fallback {
        StrategyKind::PseudoTerminal
    } else {
        StrategyKind::Direct
    }
}

/// A running child process.
pub trait ChildProcess: Send {
    /// OS process id.
    fn pid(&self) -> Option<u32>;

    /// Where forwarded signals go: the child's own process group when it
    /// leads one, the child alone otherwise.
    fn signal_target(&self) -> Option<SignalTarget>;

    /// Block until the child exits, returning its exit code.
    fn wait(&mut self) -> io::Result<i32>;
}

/// Live handles to a freshly spawned child.
pub struct Spawned {
    /// Output streams to drain, tagged by the stream they feed.
    pub streams: Vec<(OutputSource, Box<dyn Read + Send>)>,
    /// The child itself.
    pub child: Box<dyn ChildProcess>,
    /// Resources that must outlive the readers (e.g. a pty master).
    keepalive: Option<Box<dyn Any + Send>>,
}

impl Spawned {
    /// Bundle streams and child.
    pub fn new(
        streams: Vec<(OutputSource, Box<dyn Read + Send>)>,
        child: Box<dyn ChildProcess>,
    ) -> Self {
        Self {
            streams,
            child,
            keepalive: None,
        }
    }

    /// Keep `resource` alive until the spawned child is fully drained.
    pub fn keep_alive(mut self, resource: Box<dyn Any + Send>) -> Self {
        self.keepalive = Some(resource);
        self
    }

    /// Split into streams, child and keepalive guard.
    pub fn into_parts(
        self,
    ) -> (
        Vec<(OutputSource, Box<dyn Read + Send>)>,
        Box<dyn ChildProcess>,
        Option<Box<dyn Any + Send>>,
    ) {
        (self.streams, self.child, self.keepalive)
    }
}

/// Capability shared by all execution strategies.
pub trait Strategy: Send + Sync {
    /// Which strategy this is.
    fn kind(&self) -> StrategyKind;

    /// Spawn `command` through the platform shell.
    fn spawn(&self, command: &str) -> io::Result<Spawned>;
}

/// Program and arguments used to hand a command string to the shell.
pub(crate) fn shell_invocation(command: &str) -> (&'static str, [&str; 2]) {
    #[cfg(unix)]
    {
        ("/bin/sh", ["-c", command])
    }
    #[cfg(windows)]
    {
        ("cmd.exe", ["/C", command])
    }
}

/// Pipe-based execution.
///
/// The child gets a process group of its own, so a forwarded signal reaches
/// everything it starts. When we are the foreground job of a terminal it
/// stays in ours instead: a new group would be a background job, stopped the
/// moment it prompts on the terminal. The terminal's own Ctrl+C then
/// reaches the whole group directly.
#[derive(Debug, Clone, Copy)]
pub struct DirectStrategy {
    own_group: bool,
}

impl DirectStrategy {
    /// Decide the process group from the current terminal state.
    pub fn new() -> Self {
        Self {
            own_group: !pty::in_foreground(),
        }
    }

    /// Force whether the child leads its own process group.
    pub fn with_own_group(mut self, own_group: bool) -> Self {
        self.own_group = own_group;
        self
    }
}

impl Default for DirectStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for DirectStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Direct
    }

    fn spawn(&self, command: &str) -> io::Result<Spawned> {
        let (shell, args) = shell_invocation(command);
        let mut cmd = Command::new(shell);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        #[cfg(unix)]
        if self.own_group {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let mut child = cmd.spawn()?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("child stdout was not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| io::Error::other("child stderr was not captured"))?;

        let streams: Vec<(OutputSource, Box<dyn Read + Send>)> = vec![
            (OutputSource::Stdout, Box::new(stdout) as Box<dyn Read + Send>),
            (OutputSource::Stderr, Box::new(stderr) as Box<dyn Read + Send>),
        ];
        let child = DirectChild {
            child,
            own_group: self.own_group,
        };
        Ok(Spawned::new(streams, Box::new(child)))
    }
}

struct DirectChild {
    child: std::process::Child,
    own_group: bool,
}

impl ChildProcess for DirectChild {
    fn pid(&self) -> Option<u32> {
        Some(self.child.id())
    }

    fn signal_target(&self) -> Option<SignalTarget> {
        let pid = self.child.id();
        Some(if self.own_group {
            SignalTarget::Group(pid)
        } else {
            SignalTarget::Process(pid)
        })
    }

    fn wait(&mut self) -> io::Result<i32> {
        self.child.wait().map(exit_code)
    }
}

/// Exit code of a finished child; signal deaths map to `128 + signal`.
pub(crate) fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}

/// Reap `pid` directly, mapping its status like [`exit_code`].
#[cfg(unix)]
pub(crate) fn wait_pid(pid: u32) -> io::Result<i32> {
    use std::os::unix::process::ExitStatusExt;

    let pid = libc::pid_t::try_from(pid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
    let mut status: libc::c_int = 0;
    loop {
        // SAFETY: `status` is a valid out pointer for the duration of the call.
        if unsafe { libc::waitpid(pid, &mut status, 0) } != -1 {
            return Ok(exit_code(ExitStatus::from_raw(status)));
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}
