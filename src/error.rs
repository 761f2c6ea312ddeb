//! Error types for localrun.

use thiserror::Error;

use crate::execution::RunResult;

/// Result type alias using [`RunError`].
pub type Result<T> = std::result::Result<T, RunError>;

/// Number of trailing output lines quoted in a [`Failure`] message.
const FAILURE_EXCERPT_LINES: usize = 10;

/// Main error type for localrun operations.
#[derive(Error, Debug)]
pub enum RunError {
    /// Malformed option mapping, rejected before anything is spawned.
    #[error("invalid option: {0}")]
    InvalidOption(String),

    /// The command exited unsuccessfully and `warn` was not set.
    #[error(transparent)]
    Failure(Box<Failure>),

    /// An interrupt arrived while the command was running.
    #[error("interrupted while running '{}'", .0.command())]
    Interrupted(Box<RunResult>),

    /// I/O error outside of a command's lifetime.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid lifecycle transition attempted.
    #[error("invalid state transition from {from:?} to {to:?}")]
    InvalidStateTransition {
        from: crate::execution::RunState,
        to: crate::execution::RunState,
    },

    /// Configuration file could not be parsed.
    #[error("config error: {0}")]
    Config(String),

    /// Internal lock was poisoned.
    #[error("internal lock poisoned")]
    LockPoisoned,
}

impl RunError {
    /// The result carried by this error, if the command got to run.
    pub fn result(&self) -> Option<&RunResult> {
        match self {
            Self::Failure(failure) => Some(failure.result()),
            Self::Interrupted(result) => Some(result),
            _ => None,
        }
    }
}

impl From<Failure> for RunError {
    fn from(failure: Failure) -> Self {
        Self::Failure(Box::new(failure))
    }
}

/// A command that did not exit cleanly.
///
/// Wraps the complete, frozen [`RunResult`] so the caller can inspect the
/// captured output and retry or take another path.
#[derive(Error, Debug, Clone)]
#[error("{}", describe(.result))]
pub struct Failure {
    result: RunResult,
}

impl Failure {
    pub(crate) fn new(result: RunResult) -> Self {
        Self { result }
    }

    /// The result of the failed command.
    pub fn result(&self) -> &RunResult {
        &self.result
    }

    /// Consume the failure, returning the result.
    pub fn into_result(self) -> RunResult {
        self.result
    }
}

fn describe(result: &RunResult) -> String {
    let status = match (result.exited(), result.exception()) {
        (Some(code), _) => format!("exit code {code}"),
        (None, Some(fault)) => fault.to_string(),
        (None, None) => "no exit code".to_string(),
    };

    // A pty merges both streams into stdout.
    let (label, stream) = if result.pty() {
        ("stdout", result.stdout())
    } else {
        ("stderr", result.stderr())
    };

    let mut message = format!("command '{}' failed ({status})", result.command());
    let excerpt = tail_lines(stream, FAILURE_EXCERPT_LINES);
    if !excerpt.is_empty() {
        message.push_str(&format!("\n\n{label}:\n{excerpt}"));
    }
    message
}

fn tail_lines(text: &str, count: usize) -> String {
    let lines: Vec<&str> = text.trim_end().lines().collect();
    let start = lines.len().saturating_sub(count);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(stdout: &str, stderr: &str, pty: bool) -> RunResult {
        RunResult::new("make all", stdout.into(), stderr.into(), Some(2), pty, None)
    }

    #[test]
    fn test_failure_display_includes_stderr() {
        let failure = Failure::new(failed("", "ohnoz\n", false));
        let text = failure.to_string();
        assert!(text.contains("make all"));
        assert!(text.contains("exit code 2"));
        assert!(text.contains("ohnoz"));
    }

    #[test]
    fn test_failure_display_uses_stdout_under_pty() {
        let failure = Failure::new(failed("merged output\r\n", "", true));
        let text = failure.to_string();
        assert!(text.contains("stdout:"));
        assert!(text.contains("merged output"));
    }

    #[test]
    fn test_failure_excerpt_is_tail() {
        let stderr: String = (1..=30).map(|i| format!("line {i}\n")).collect();
        let failure = Failure::new(failed("", &stderr, false));
        let text = failure.to_string();
        assert!(text.contains("line 30"));
        assert!(text.contains("line 21"));
        assert!(!text.contains("line 20\n"));
    }

    #[test]
    fn test_failure_debug_includes_stderr() {
        let err: RunError = Failure::new(failed("", "sentinel\n", false)).into();
        assert!(format!("{err:?}").contains("sentinel"));
        assert!(err.result().is_some());
    }

    #[test]
    fn test_failure_into_result_keeps_exit_code() {
        let failure = Failure::new(failed("", "ohnoz\n", false));
        let result = failure.into_result();
        assert_eq!(result.exited(), Some(2));
        assert_eq!(result.stderr(), "ohnoz\n");
    }

    #[test]
    fn test_invalid_option_display() {
        let err = RunError::InvalidOption("hide: 'penguinmints'".into());
        assert!(err.to_string().contains("penguinmints"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: RunError = io_err.into();
        assert!(matches!(err, RunError::Io(_)));
        assert!(err.to_string().contains("I/O error"));
        assert!(err.result().is_none());
    }
}
