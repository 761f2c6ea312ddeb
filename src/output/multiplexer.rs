//! Concurrent draining of child output streams.
//!
//! Each stream gets its own [`StreamReader`] running on tokio's blocking
//! pool, so a full pipe on one stream can never stall the child while the
//! other is being read. Readers own their buffers; the runner only sees
//! them once joined.

use std::io::{ErrorKind, Read};

use encoding_rs::Encoding;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use super::{OutputDevice, OutputSource, StreamDecoder};
use crate::execution::ExecutionFault;

/// Default buffer size for reading child output.
const READ_BUFFER_SIZE: usize = 4096;

/// Text captured from one stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Captured {
    /// Stream the text came from.
    pub source: OutputSource,
    /// Fully decoded text.
    pub text: String,
    /// Read fault that ended the stream early, if any.
    pub fault: Option<ExecutionFault>,
}

impl Captured {
    fn empty(source: OutputSource) -> Self {
        Self {
            source,
            text: String::new(),
            fault: None,
        }
    }
}

/// Drains one child stream, decoding and echoing as bytes arrive.
pub struct StreamReader<R: Read + Send + 'static> {
    reader: R,
    source: OutputSource,
    decoder: StreamDecoder,
    echo: Option<OutputDevice>,
    buffer_size: usize,
}

impl<R: Read + Send + 'static> StreamReader<R> {
    /// Create a reader that captures without echoing.
    pub fn new(reader: R, source: OutputSource, encoding: &'static Encoding) -> Self {
        Self {
            reader,
            source,
            decoder: StreamDecoder::new(encoding),
            echo: None,
            buffer_size: READ_BUFFER_SIZE,
        }
    }

    /// Echo decoded text to `device` as soon as it is read.
    pub fn echo_to(mut self, device: OutputDevice) -> Self {
        self.echo = Some(device);
        self
    }

    /// Create with custom buffer size.
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1);
        self
    }

    /// Start draining on a blocking thread.
    ///
    /// The returned handle resolves once the stream reached end-of-stream
    /// (EOF, or EIO from a pty master whose slave side closed).
    pub fn spawn(self) -> JoinHandle<Captured> {
        tokio::task::spawn_blocking(move || self.drain())
    }

    /// Drain the stream to completion on the current thread.
    pub fn drain(self) -> Captured {
        let Self {
            mut reader,
            source,
            mut decoder,
            mut echo,
            buffer_size,
        } = self;

        let mut captured = Captured::empty(source);
        let mut buf = vec![0u8; buffer_size];

        loop {
            match reader.read(&mut buf) {
                Ok(0) => {
                    debug!("{} reader: EOF", source.as_str());
                    break;
                }
                Ok(n) => {
                    trace!("{} reader: read {} bytes", source.as_str(), n);
                    let text = decoder.decode(&buf[..n]);
                    emit(&mut echo, source, &text);
                    captured.text.push_str(&text);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    // EIO on Unix means the pty slave was closed
                    #[cfg(unix)]
                    if e.raw_os_error() == Some(libc::EIO) {
                        debug!("{} reader: pty closed (EIO)", source.as_str());
                        break;
                    }

                    warn!("{} reader error: {}", source.as_str(), e);
                    captured.fault = Some(ExecutionFault::new(
                        &format!("failed to read {}", source.as_str()),
                        &e,
                    ));
                    break;
                }
            }
        }

        let tail = decoder.finish();
        emit(&mut echo, source, &tail);
        captured.text.push_str(&tail);
        captured
    }
}

/// Echo `text`; a broken echo device stops echoing but never stops draining.
fn emit(echo: &mut Option<OutputDevice>, source: OutputSource, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(device) = echo {
        if let Err(e) = device.write(source, text) {
            debug!("{} echo disabled: {}", source.as_str(), e);
            *echo = None;
        }
    }
}

/// Wait for a spawned reader, converting a panicked reader into a fault.
pub(crate) async fn join(handle: JoinHandle<Captured>, source: OutputSource) -> Captured {
    match handle.await {
        Ok(captured) => captured,
        Err(e) => {
            warn!("{} reader task failed: {}", source.as_str(), e);
            Captured {
                source,
                text: String::new(),
                fault: Some(ExecutionFault {
                    kind: ErrorKind::Other,
                    message: format!("{} reader task failed: {e}", source.as_str()),
                }),
            }
        }
    }
}
