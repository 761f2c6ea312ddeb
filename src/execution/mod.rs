//! Command execution engine.
//!
//! This module provides the pieces behind a single `run` call:
//! - option merging and validation
//! - strategy selection (pipes vs. pseudo-terminal, with fallback)
//! - the runner that spawns, drains and judges the child
//!
//! # Example
//!
//! ```no_run
//! use localrun::execution::{Runner, RunOptions};
//!
//! // Capture quietly, tolerating failure
//! let result = Runner::new()
//!     .run("cargo build", &RunOptions::new().hide("both").warn(true))
//!     .unwrap();
//! if result.failed() {
//!     eprintln!("{}", result.stderr());
//! }
//! ```

pub mod options;
mod result;
mod runner;
mod state;
pub mod strategy;

pub use options::{Hide, HideSpec, ResolvedOptions, RunConfig, RunOptions, RunnerKind};
pub use result::{ExecutionFault, RunResult};
pub use runner::{run, Runner};
pub use state::RunState;
pub use strategy::{
    select_strategy, ChildProcess, DirectStrategy, Spawned, Strategy, StrategyKind,
};
