//! # localrun
//!
//! Run shell commands on the local machine with a uniform execution policy.
//!
//! Each command runs through `/bin/sh -c` (or `cmd.exe /C` on Windows),
//! either over plain pipes or on a pseudo-terminal. Output is decoded,
//! echoed live unless hidden, and captured into a [`RunResult`]. A command
//! that exits non-zero raises [`Failure`] unless `warn` is set.
//!
//! ## Features
//!
//! - **Echo and capture**: stdout and stderr are drained concurrently,
//!   echoed as they arrive and kept in full
//! - **Pseudo-terminals**: request a pty, with automatic fallback to pipes
//!   when the controlling process has no terminal
//! - **Failure policy**: non-zero exits become errors carrying the result
//! - **Interrupts**: Ctrl-C is forwarded to the child's process group
//!
//! ## Quick Start
//!
//! ```no_run
//! use localrun::{run, RunError, RunOptions};
//!
//! fn main() -> localrun::Result<()> {
//!     localrun::logging::try_init().ok();
//!
//!     let result = run("echo hello", &RunOptions::new().hide("out"))?;
//!     assert_eq!(result.stdout(), "hello\n");
//!
//!     match run("false", &RunOptions::new()) {
//!         Err(RunError::Failure(failure)) => {
//!             println!("exit code {:?}", failure.result().exited());
//!         }
//!         other => println!("{:?}", other),
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod execution;
pub mod logging;
pub mod output;
pub mod pty;
pub mod signal;

// Re-export commonly used types
pub use config::Config;
pub use context::Context;
pub use error::{Failure, Result, RunError};
pub use execution::{
    run, ExecutionFault, Hide, HideSpec, RunConfig, RunOptions, RunResult, RunState, Runner,
    RunnerKind,
};
pub use output::{OutputDevice, OutputSource};
pub use pty::{PtySize, PtyStrategy};
