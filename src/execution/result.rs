//! Execution result types.

use std::fmt;
use std::io;

/// A low-level fault unrelated to the child's own exit status.
///
/// Captured into [`RunResult::exception`] instead of being thrown, so a
/// caller inspects it alongside exit-code failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionFault {
    /// Kind of the underlying I/O error.
    pub kind: io::ErrorKind,
    /// Human readable description.
    pub message: String,
}

impl ExecutionFault {
    /// Create a fault from a context string and the originating error.
    pub fn new(context: &str, err: &io::Error) -> Self {
        Self {
            kind: err.kind(),
            message: format!("{context}: {err}"),
        }
    }
}

impl From<io::Error> for ExecutionFault {
    fn from(err: io::Error) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl fmt::Display for ExecutionFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unexpected execution fault: {}", self.message)
    }
}

impl std::error::Error for ExecutionFault {}

/// Frozen record of one completed command.
///
/// Built once per call after the child has exited and every reader has
/// drained its stream; there is no way to mutate it afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    command: String,
    stdout: String,
    stderr: String,
    exited: Option<i32>,
    pty: bool,
    exception: Option<ExecutionFault>,
}

impl RunResult {
    pub(crate) fn new(
        command: impl Into<String>,
        stdout: String,
        stderr: String,
        exited: Option<i32>,
        pty: bool,
        exception: Option<ExecutionFault>,
    ) -> Self {
        Self {
            command: command.into(),
            stdout,
            stderr,
            exited,
            pty,
            exception,
        }
    }

    /// The command string that was executed.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Decoded standard output. Holds both streams under a pty.
    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    /// Decoded standard error. Always empty under a pty.
    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    /// Exit status, or `None` if a fault kept the child from producing one.
    pub fn exited(&self) -> Option<i32> {
        self.exited
    }

    /// Alias for [`exited`](Self::exited).
    pub fn return_code(&self) -> Option<i32> {
        self.exited
    }

    /// Whether a pseudo-terminal was actually used.
    pub fn pty(&self) -> bool {
        self.pty
    }

    /// Fault captured during execution, if any.
    pub fn exception(&self) -> Option<&ExecutionFault> {
        self.exception.as_ref()
    }

    /// True when the command exited with status 0.
    pub fn ok(&self) -> bool {
        self.exited == Some(0)
    }

    /// Inverse of [`ok`](Self::ok).
    pub fn failed(&self) -> bool {
        !self.ok()
    }
}

impl From<&RunResult> for bool {
    fn from(result: &RunResult) -> bool {
        result.ok()
    }
}

impl std::ops::Not for &RunResult {
    type Output = bool;

    fn not(self) -> bool {
        self.failed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(exited: Option<i32>) -> RunResult {
        RunResult::new("true", "foo\n".into(), String::new(), exited, false, None)
    }

    #[test]
    fn test_result_ok() {
        let r = result(Some(0));
        assert!(r.ok());
        assert!(!r.failed());
        assert!(bool::from(&r));
        assert_eq!(r.return_code(), Some(0));
    }

    #[test]
    fn test_result_failed() {
        let r = result(Some(1));
        assert!(!r.ok());
        assert!(r.failed());
        assert!(!&r);
    }

    #[test]
    fn test_non_one_codes_are_failures() {
        assert!(result(Some(127)).failed());
        assert!(result(Some(-1)).failed());
    }

    #[test]
    fn test_missing_exit_code_is_failure() {
        let fault = ExecutionFault::from(io::Error::new(io::ErrorKind::Other, "Input/output error"));
        let r = RunResult::new("true", String::new(), String::new(), None, false, Some(fault));
        assert!(r.failed());
        assert!(r.exited().is_none());
        assert!(r
            .exception()
            .is_some_and(|e| e.to_string().contains("Input/output error")));
    }

    #[test]
    fn test_no_exception_by_default() {
        assert!(result(Some(0)).exception().is_none());
    }

    #[test]
    fn test_fault_with_context() {
        let err = io::Error::new(io::ErrorKind::NotFound, "no such file");
        let fault = ExecutionFault::new("failed to spawn /bin/sh", &err);
        assert_eq!(fault.kind, io::ErrorKind::NotFound);
        assert!(fault.message.starts_with("failed to spawn /bin/sh"));
    }
}
