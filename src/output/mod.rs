//! Output handling for running commands.
//!
//! This module covers everything that happens to a child's bytes between the
//! pipe and the [`RunResult`](crate::execution::RunResult):
//! - incremental, lossy decoding ([`StreamDecoder`])
//! - concurrent draining with live echo ([`StreamReader`])
//! - the devices echo is written to ([`OutputDevice`])
//!
//! # Example
//!
//! ```
//! use localrun::output::{OutputDevice, OutputSource};
//!
//! // Capture echo in memory instead of writing to the terminal
//! let (device, out, err) = OutputDevice::capture();
//! device.write(OutputSource::Stdout, "hello\n").unwrap();
//! assert_eq!(out.contents(), "hello\n");
//! assert!(err.contents().is_empty());
//! ```

pub mod decoder;
mod multiplexer;

pub use decoder::StreamDecoder;
pub use multiplexer::{Captured, StreamReader};
pub(crate) use multiplexer::join;

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use crate::error::RunError;
use crate::Result;

/// Escape sequence opening an echoed command (bold white).
const ECHO_START: &str = "\x1b[1;37m";
/// Escape sequence resetting attributes.
const ECHO_END: &str = "\x1b[0m";

/// Logical stream a chunk of output belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputSource {
    /// Standard output. Under a pty this carries both streams.
    Stdout,
    /// Standard error.
    Stderr,
}

impl OutputSource {
    /// Short name used in log lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

type SharedWriter = Arc<Mutex<dyn Write + Send>>;

/// The pair of local devices echoed output is written to.
#[derive(Clone)]
pub struct OutputDevice {
    out: SharedWriter,
    err: SharedWriter,
}

impl OutputDevice {
    /// Echo to the process's own stdout and stderr.
    pub fn stdio() -> Self {
        Self {
            out: Arc::new(Mutex::new(io::stdout())),
            err: Arc::new(Mutex::new(io::stderr())),
        }
    }

    /// Echo to arbitrary writers.
    pub fn new(out: impl Write + Send + 'static, err: impl Write + Send + 'static) -> Self {
        Self {
            out: Arc::new(Mutex::new(out)),
            err: Arc::new(Mutex::new(err)),
        }
    }

    /// Echo into in-memory buffers, returned alongside the device.
    pub fn capture() -> (Self, CaptureBuffer, CaptureBuffer) {
        let out = CaptureBuffer::default();
        let err = CaptureBuffer::default();
        (Self::new(out.clone(), err.clone()), out, err)
    }

    /// Write text to one device and flush it immediately.
    pub fn write(&self, source: OutputSource, text: &str) -> Result<()> {
        let writer = match source {
            OutputSource::Stdout => &self.out,
            OutputSource::Stderr => &self.err,
        };
        let mut guard = writer.lock().map_err(|_| RunError::LockPoisoned)?;
        guard.write_all(text.as_bytes())?;
        guard.flush()?;
        Ok(())
    }

    /// Print a command in bold, followed by a newline, on stdout.
    pub fn echo_command(&self, command: &str) -> Result<()> {
        self.write(OutputSource::Stdout, &format_echo(command))
    }
}

impl Default for OutputDevice {
    fn default() -> Self {
        Self::stdio()
    }
}

impl std::fmt::Debug for OutputDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputDevice").finish_non_exhaustive()
    }
}

/// Render a command the way it is echoed before execution.
pub fn format_echo(command: &str) -> String {
    format!("{ECHO_START}{command}{ECHO_END}\n")
}

/// Cloneable in-memory writer.
#[derive(Debug, Clone, Default)]
pub struct CaptureBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl CaptureBuffer {
    /// Everything written so far, decoded lossily.
    pub fn contents(&self) -> String {
        match self.inner.lock() {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(poisoned) => String::from_utf8_lossy(&poisoned.into_inner()).into_owned(),
        }
    }
}

impl Write for CaptureBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner
            .lock()
            .map_err(|_| io::Error::other("capture buffer poisoned"))?
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
