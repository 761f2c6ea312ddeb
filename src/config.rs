//! Configuration management for localrun.
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file (JSON)
//! 4. Default values
//!
//! Run defaults live under the `run` key and are handed to the runner as a
//! [`RunConfig`]; per-call overrides are layered on top of them later.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cli::Args;
use crate::error::RunError;
use crate::execution::{HideSpec, RunConfig, RunnerKind};

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default options for every run.
    pub run: RunConfig,
    /// Logging configuration.
    pub logging: LoggingSection,
}

/// Logging configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level (error, warn, info, debug, trace).
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        serde_json::from_str(&content).map_err(ConfigError::Json)
    }

    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_vars<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("LOCALRUN_WARN") {
            self.run.warn = parse_flag("LOCALRUN_WARN", &value)?;
        }

        if let Some(value) = lookup("LOCALRUN_HIDE") {
            self.run.hide = parse_hide(&value);
        }

        if let Some(value) = lookup("LOCALRUN_PTY") {
            self.run.pty = parse_flag("LOCALRUN_PTY", &value)?;
        }

        if let Some(value) = lookup("LOCALRUN_FALLBACK") {
            self.run.fallback = parse_flag("LOCALRUN_FALLBACK", &value)?;
        }

        if let Some(value) = lookup("LOCALRUN_ECHO") {
            self.run.echo = parse_flag("LOCALRUN_ECHO", &value)?;
        }

        if let Some(value) = lookup("LOCALRUN_ENCODING") {
            if !value.is_empty() {
                self.run.encoding = Some(value);
            }
        }

        if let Some(value) = lookup("LOCALRUN_RUNNER") {
            self.run.runner = value
                .parse::<RunnerKind>()
                .map_err(|_| ConfigError::InvalidValue("LOCALRUN_RUNNER", value))?;
        }

        if let Some(level) = lookup("LOCALRUN_LOG_LEVEL") {
            self.logging.level = level;
        } else if let Some(level) = lookup("RUST_LOG") {
            self.logging.level = level;
        }

        Ok(())
    }

    /// Apply CLI argument overrides.
    pub fn apply_args(&mut self, args: &Args) {
        if args.warn {
            self.run.warn = true;
        }

        if let Some(ref hide) = args.hide {
            self.run.hide = parse_hide(hide);
        }

        if args.pty {
            self.run.pty = true;
        }

        if args.no_fallback {
            self.run.fallback = false;
        }

        if args.echo {
            self.run.echo = true;
        }

        if let Some(ref encoding) = args.encoding {
            self.run.encoding = Some(encoding.clone());
        }

        if let Some(ref level) = args.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Load configuration with full priority chain.
    ///
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        // Start with defaults
        let mut config = Config::default();

        // Load from config file if specified
        if let Some(ref path) = args.config {
            config = Config::from_file(path)?;
        }

        // Apply environment variable overrides
        config.apply_env()?;

        // Apply CLI argument overrides (highest priority)
        config.apply_args(args);

        Ok(config)
    }

    /// Get the log level filter string.
    pub fn log_filter(&self) -> &str {
        &self.logging.level
    }
}

fn parse_flag(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue(name, value.to_string())),
    }
}

/// `true`/`false` style words become flags; anything else is a stream name,
/// validated when the options are resolved.
fn parse_hide(value: &str) -> HideSpec {
    match value.trim().to_ascii_lowercase().as_str() {
        "" | "none" | "false" | "0" => HideSpec::Flag(false),
        "true" | "1" => HideSpec::Flag(true),
        _ => HideSpec::Named(value.trim().to_string()),
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    Io(std::io::Error),
    /// JSON parsing error.
    Json(serde_json::Error),
    /// Invalid value in an environment variable.
    InvalidValue(&'static str, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read config file: {}", e),
            Self::Json(e) => write!(f, "failed to parse config file: {}", e),
            Self::InvalidValue(name, value) => write!(f, "invalid value for {}: '{}'", name, value),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for RunError {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::Io(e) => RunError::Io(e),
            other => RunError::Config(other.to_string()),
        }
    }
}
