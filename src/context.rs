//! Configuration-aware entry point for running commands.

use crate::config::Config;
use crate::execution::{RunOptions, RunResult, Runner};
use crate::output::OutputDevice;
use crate::Result;

/// Shares resolved configuration with every command it runs.
///
/// The `run` section of the held [`Config`] supplies defaults; keyword-style
/// overrides passed to [`Context::run`] take precedence over them.
#[derive(Debug, Clone, Default)]
pub struct Context {
    config: Config,
    output: Option<OutputDevice>,
}

impl Context {
    /// Create a context around an already merged configuration.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            output: None,
        }
    }

    /// Echo to `device` instead of stdout/stderr.
    pub fn with_output(mut self, device: OutputDevice) -> Self {
        self.output = Some(device);
        self
    }

    /// The configuration this context was built from.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Build the runner selected by the configuration.
    pub fn runner(&self) -> Runner {
        let runner = Runner::with_config(self.config.run.clone());
        match &self.output {
            Some(device) => runner.with_output(device.clone()),
            None => runner,
        }
    }

    /// Run `command` with the configured defaults and the given overrides.
    pub fn run(&self, command: &str, overrides: &RunOptions) -> Result<RunResult> {
        self.runner().run(command, overrides)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::{HideSpec, RunConfig};

    #[test]
    fn test_runner_inherits_run_section() {
        let config = Config {
            run: RunConfig {
                warn: true,
                hide: HideSpec::Named("both".into()),
                ..RunConfig::default()
            },
            ..Config::default()
        };
        let context = Context::new(config);
        assert!(context.runner().defaults().warn);
        assert_eq!(context.config().run.hide, HideSpec::Named("both".into()));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_uses_config_and_overrides() {
        let (device, out, _) = OutputDevice::capture();
        let config = Config {
            run: RunConfig {
                echo: true,
                warn: true,
                ..RunConfig::default()
            },
            ..Config::default()
        };
        let context = Context::new(config).with_output(device);

        let result = context.run("exit 2", &RunOptions::new()).unwrap();
        assert_eq!(result.exited(), Some(2));
        assert!(out.contents().contains("exit 2"));

        let err = context.run("exit 2", &RunOptions::new().warn(false));
        assert!(err.is_err());
    }
}
