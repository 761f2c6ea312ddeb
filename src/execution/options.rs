//! Run options: per-call overrides, collaborator defaults and normalization.
//!
//! Options arrive in two layers. [`RunConfig`] holds the fully populated
//! defaults handed over by the configuration layer (the `run` section of a
//! [`Config`](crate::config::Config)); [`RunOptions`] holds the call-site
//! overrides, every field optional. [`RunConfig::merge`] lets the call site
//! win, and [`RunConfig::resolve`] validates the merged set into
//! [`ResolvedOptions`] before anything is spawned.

use std::fmt;
use std::str::FromStr;

use encoding_rs::Encoding;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::RunError;
use crate::output::{decoder, OutputSource};
use crate::Result;

/// Canonical set of streams whose local echo is suppressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Hide {
    out: bool,
    err: bool,
}

impl Hide {
    /// Echo everything.
    pub const NONE: Hide = Hide {
        out: false,
        err: false,
    };
    /// Suppress stdout echo.
    pub const OUT: Hide = Hide {
        out: true,
        err: false,
    };
    /// Suppress stderr echo.
    pub const ERR: Hide = Hide {
        out: false,
        err: true,
    };
    /// Suppress both.
    pub const BOTH: Hide = Hide {
        out: true,
        err: true,
    };

    /// Parse a stream name, case-insensitively.
    ///
    /// Accepts `out`/`stdout`, `err`/`stderr` and `both`.
    pub fn parse(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "out" | "stdout" => Ok(Self::OUT),
            "err" | "stderr" => Ok(Self::ERR),
            "both" => Ok(Self::BOTH),
            _ => Err(RunError::InvalidOption(format!(
                "hide: '{value}' is not one of out, stdout, err, stderr, both"
            ))),
        }
    }

    /// Whether echo of the given stream is suppressed.
    pub fn hides(&self, source: OutputSource) -> bool {
        match source {
            OutputSource::Stdout => self.out,
            OutputSource::Stderr => self.err,
        }
    }

    /// Canonical names of the hidden streams.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names = Vec::with_capacity(2);
        if self.out {
            names.push("out");
        }
        if self.err {
            names.push("err");
        }
        names
    }
}

/// Raw `hide` value as supplied by a caller or a config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HideSpec {
    /// `true` hides both streams, `false` hides nothing.
    Flag(bool),
    /// A stream name, normalized by [`Hide::parse`].
    Named(String),
}

impl HideSpec {
    /// Collapse into the canonical [`Hide`] set.
    pub fn normalize(&self) -> Result<Hide> {
        match self {
            Self::Flag(false) => Ok(Hide::NONE),
            Self::Flag(true) => Ok(Hide::BOTH),
            Self::Named(name) => Hide::parse(name),
        }
    }
}

impl Default for HideSpec {
    fn default() -> Self {
        Self::Flag(false)
    }
}

impl From<bool> for HideSpec {
    fn from(flag: bool) -> Self {
        Self::Flag(flag)
    }
}

impl From<&str> for HideSpec {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

impl From<Option<&str>> for HideSpec {
    fn from(name: Option<&str>) -> Self {
        name.map_or(Self::Flag(false), Self::from)
    }
}

/// Which runner implementation executes the command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunnerKind {
    /// Local subprocess execution.
    #[default]
    Local,
}

impl FromStr for RunnerKind {
    type Err = RunError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            _ => Err(RunError::InvalidOption(format!("runner: unknown runner '{s}'"))),
        }
    }
}

impl fmt::Display for RunnerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
        }
    }
}

// A present-but-null `hide` means "hide nothing", unlike a missing key.
fn hide_or_nothing<'de, D>(deserializer: D) -> std::result::Result<HideSpec, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<HideSpec>::deserialize(deserializer)?.unwrap_or_default())
}

fn explicit_hide<'de, D>(deserializer: D) -> std::result::Result<Option<HideSpec>, D::Error>
where
    D: Deserializer<'de>,
{
    hide_or_nothing(deserializer).map(Some)
}

/// Default run options, as supplied by the configuration layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Return a result instead of failing on non-zero exit.
    pub warn: bool,
    /// Streams whose echo is suppressed.
    #[serde(deserialize_with = "hide_or_nothing")]
    pub hide: HideSpec,
    /// Request a pseudo-terminal.
    pub pty: bool,
    /// Fall back to pipes when a pty is unavailable.
    pub fallback: bool,
    /// Print the command before running it.
    pub echo: bool,
    /// Output encoding label; `None` derives it from the locale.
    pub encoding: Option<String>,
    /// Runner implementation.
    pub runner: RunnerKind,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            warn: false,
            hide: HideSpec::default(),
            pty: false,
            fallback: true,
            echo: false,
            encoding: None,
            runner: RunnerKind::Local,
        }
    }
}

impl RunConfig {
    /// Overlay call-site overrides on these defaults.
    pub fn merge(&self, overrides: &RunOptions) -> RunConfig {
        RunConfig {
            warn: overrides.warn.unwrap_or(self.warn),
            hide: overrides.hide.clone().unwrap_or_else(|| self.hide.clone()),
            pty: overrides.pty.unwrap_or(self.pty),
            fallback: overrides.fallback.unwrap_or(self.fallback),
            echo: overrides.echo.unwrap_or(self.echo),
            encoding: overrides
                .encoding
                .clone()
                .or_else(|| self.encoding.clone()),
            runner: overrides.runner.unwrap_or(self.runner),
        }
    }

    /// Validate into the option set the runner executes with.
    pub fn resolve(&self) -> Result<ResolvedOptions> {
        Ok(ResolvedOptions {
            warn: self.warn,
            hide: self.hide.normalize()?,
            pty: self.pty,
            fallback: self.fallback,
            echo: self.echo,
            encoding: decoder::resolve_encoding(self.encoding.as_deref())?,
            runner: self.runner,
        })
    }
}

/// Per-call overrides. Unset fields defer to the [`RunConfig`] defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunOptions {
    /// Override for [`RunConfig::warn`].
    pub warn: Option<bool>,
    /// Override for [`RunConfig::hide`].
    #[serde(default, deserialize_with = "explicit_hide")]
    pub hide: Option<HideSpec>,
    /// Override for [`RunConfig::pty`].
    pub pty: Option<bool>,
    /// Override for [`RunConfig::fallback`].
    pub fallback: Option<bool>,
    /// Override for [`RunConfig::echo`].
    pub echo: Option<bool>,
    /// Override for [`RunConfig::encoding`].
    pub encoding: Option<String>,
    /// Override for [`RunConfig::runner`].
    pub runner: Option<RunnerKind>,
}

impl RunOptions {
    /// Create an empty override set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate a dynamic option mapping.
    ///
    /// Unknown keys and type mismatches fail with [`RunError::InvalidOption`].
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| RunError::InvalidOption(e.to_string()))
    }

    /// Set whether non-zero exits are tolerated.
    pub fn warn(mut self, warn: bool) -> Self {
        self.warn = Some(warn);
        self
    }

    /// Set which streams are hidden.
    pub fn hide(mut self, hide: impl Into<HideSpec>) -> Self {
        self.hide = Some(hide.into());
        self
    }

    /// Request a pseudo-terminal.
    pub fn pty(mut self, pty: bool) -> Self {
        self.pty = Some(pty);
        self
    }

    /// Set whether an unavailable pty falls back to pipes.
    pub fn fallback(mut self, fallback: bool) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Set whether the command is echoed before it runs.
    pub fn echo(mut self, echo: bool) -> Self {
        self.echo = Some(echo);
        self
    }

    /// Set the output encoding label.
    pub fn encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = Some(encoding.into());
        self
    }

    /// Select the runner implementation.
    pub fn runner(mut self, runner: RunnerKind) -> Self {
        self.runner = Some(runner);
        self
    }
}

/// Merged and validated options for a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedOptions {
    /// Tolerate non-zero exit.
    pub warn: bool,
    /// Hidden streams.
    pub hide: Hide,
    /// Pseudo-terminal requested.
    pub pty: bool,
    /// Fallback allowed.
    pub fallback: bool,
    /// Echo the command.
    pub echo: bool,
    /// Decoder for captured output.
    pub encoding: &'static Encoding,
    /// Runner implementation.
    pub runner: RunnerKind,
}

impl Default for ResolvedOptions {
    fn default() -> Self {
        Self {
            warn: false,
            hide: Hide::NONE,
            pty: false,
            fallback: true,
            echo: false,
            encoding: encoding_rs::UTF_8,
            runner: RunnerKind::Local,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hide_aliases() {
        assert_eq!(Hide::parse("out").unwrap(), Hide::OUT);
        assert_eq!(Hide::parse("stdout").unwrap(), Hide::OUT);
        assert_eq!(Hide::parse("err").unwrap(), Hide::ERR);
        assert_eq!(Hide::parse("stderr").unwrap(), Hide::ERR);
        assert_eq!(Hide::parse("both").unwrap(), Hide::BOTH);
    }

    #[test]
    fn test_hide_case_insensitive() {
        assert_eq!(Hide::parse("STDERR").unwrap(), Hide::ERR);
        assert_eq!(Hide::parse("Both").unwrap(), Hide::BOTH);
    }

    #[test]
    fn test_hide_unknown_value_mentions_value() {
        let err = Hide::parse("penguinmints").unwrap_err();
        assert!(matches!(err, RunError::InvalidOption(_)));
        assert!(err.to_string().contains("penguinmints"));
    }

    #[test]
    fn test_hide_flags() {
        assert_eq!(HideSpec::Flag(true).normalize().unwrap(), Hide::BOTH);
        assert_eq!(HideSpec::Flag(false).normalize().unwrap(), Hide::NONE);
        assert_eq!(HideSpec::from(None).normalize().unwrap(), Hide::NONE);
    }

    #[test]
    fn test_hide_names() {
        assert_eq!(Hide::OUT.names(), vec!["out"]);
        assert_eq!(Hide::BOTH.names(), vec!["out", "err"]);
        assert!(Hide::NONE.names().is_empty());
    }

    #[test]
    fn test_hide_per_stream() {
        assert!(Hide::OUT.hides(OutputSource::Stdout));
        assert!(!Hide::OUT.hides(OutputSource::Stderr));
        assert!(Hide::BOTH.hides(OutputSource::Stderr));
    }

    #[test]
    fn test_defaults() {
        let config = RunConfig::default();
        assert!(!config.warn);
        assert!(!config.pty);
        assert!(config.fallback);
        assert!(!config.echo);
        assert_eq!(config.runner, RunnerKind::Local);
    }

    #[test]
    fn test_config_value_honored() {
        let config = RunConfig {
            hide: "stdout".into(),
            warn: true,
            ..RunConfig::default()
        };
        let resolved = config.merge(&RunOptions::new()).resolve().unwrap();
        assert_eq!(resolved.hide.names(), vec!["out"]);
        assert!(resolved.warn);
    }

    #[test]
    fn test_call_site_wins() {
        let config = RunConfig {
            hide: "stdout".into(),
            pty: true,
            fallback: true,
            encoding: Some("utf-8".into()),
            ..RunConfig::default()
        };
        let overrides = RunOptions::new()
            .hide("stderr")
            .pty(false)
            .fallback(false)
            .encoding("latin1");
        let merged = config.merge(&overrides);
        let resolved = merged.resolve().unwrap();

        assert_eq!(resolved.hide.names(), vec!["err"]);
        assert!(!resolved.pty);
        assert!(!resolved.fallback);
        assert_eq!(resolved.encoding, encoding_rs::WINDOWS_1252);
    }

    #[test]
    fn test_from_value() {
        let options = RunOptions::from_value(json!({"warn": true, "hide": "both"})).unwrap();
        assert_eq!(options.warn, Some(true));
        assert_eq!(options.hide, Some(HideSpec::Named("both".into())));
        assert!(options.pty.is_none());
    }

    #[test]
    fn test_from_value_null_hide_overrides() {
        let options = RunOptions::from_value(json!({"hide": null})).unwrap();
        assert_eq!(options.hide, Some(HideSpec::Flag(false)));

        let config = RunConfig {
            hide: HideSpec::Flag(true),
            ..RunConfig::default()
        };
        let resolved = config.merge(&options).resolve().unwrap();
        assert_eq!(resolved.hide, Hide::NONE);
    }

    #[test]
    fn test_from_value_unknown_key() {
        let err = RunOptions::from_value(json!({"colour": true})).unwrap_err();
        assert!(matches!(err, RunError::InvalidOption(_)));
        assert!(err.to_string().contains("colour"));
    }

    #[test]
    fn test_from_value_type_mismatch() {
        let err = RunOptions::from_value(json!({"pty": "yes"})).unwrap_err();
        assert!(matches!(err, RunError::InvalidOption(_)));
    }

    #[test]
    fn test_from_value_unknown_runner() {
        assert!(RunOptions::from_value(json!({"runner": "remote"})).is_err());
        assert_eq!(
            RunOptions::from_value(json!({"runner": "local"}))
                .unwrap()
                .runner,
            Some(RunnerKind::Local)
        );
    }

    #[test]
    fn test_invalid_hide_rejected_at_resolve() {
        let merged = RunConfig::default().merge(&RunOptions::new().hide("what"));
        let err = merged.resolve().unwrap_err();
        assert!(err.to_string().contains("what"));
    }

    #[test]
    fn test_unknown_encoding_rejected() {
        let merged = RunConfig::default().merge(&RunOptions::new().encoding("UTF-9"));
        let err = merged.resolve().unwrap_err();
        assert!(matches!(err, RunError::InvalidOption(_)));
        assert!(err.to_string().contains("UTF-9"));
    }

    #[test]
    fn test_runner_kind_parse() {
        assert_eq!("local".parse::<RunnerKind>().unwrap(), RunnerKind::Local);
        assert_eq!("LOCAL".parse::<RunnerKind>().unwrap(), RunnerKind::Local);
        assert!("ssh".parse::<RunnerKind>().is_err());
        assert_eq!(RunnerKind::Local.to_string(), "local");
    }

    #[test]
    fn test_run_config_from_json() {
        let config: RunConfig =
            serde_json::from_value(json!({"echo": true, "hide": true})).unwrap();
        assert!(config.echo);
        assert_eq!(config.hide, HideSpec::Flag(true));
        assert!(config.fallback);
    }

    #[test]
    fn test_run_config_rejects_unknown_keys() {
        let result: std::result::Result<RunConfig, _> =
            serde_json::from_value(json!({"shell": "/bin/zsh"}));
        assert!(result.is_err());
    }
}
