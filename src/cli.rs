//! Command-line interface for localrun.
//!
//! Uses lexopt for minimal binary size overhead (~34KB).

use std::ffi::OsString;
use std::path::PathBuf;

/// Command-line arguments.
#[derive(Debug, Clone, Default)]
pub struct Args {
    /// Tolerate a non-zero exit.
    pub warn: bool,
    /// Streams whose echo is suppressed.
    pub hide: Option<String>,
    /// Request a pseudo-terminal.
    pub pty: bool,
    /// Never fall back to pipes when a pty is requested.
    pub no_fallback: bool,
    /// Print the command before running it.
    pub echo: bool,
    /// Output encoding label.
    pub encoding: Option<String>,
    /// Path to configuration file.
    pub config: Option<PathBuf>,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
    /// Show version and exit.
    pub version: bool,
    /// Show help and exit.
    pub help: bool,
    /// The command words, joined with spaces before running.
    pub command: Vec<String>,
}

impl Args {
    /// The shell command line to run, if any was given.
    pub fn command_line(&self) -> Option<String> {
        (!self.command.is_empty()).then(|| self.command.join(" "))
    }
}

/// Parse command-line arguments.
pub fn parse_args() -> Result<Args, ArgsError> {
    parse_args_from(std::env::args_os())
}

/// Parse arguments from an iterator (for testing).
///
/// Everything from the first positional argument on belongs to the
/// command, so `localrun ls -l` runs `ls -l`.
pub fn parse_args_from<I>(args: I) -> Result<Args, ArgsError>
where
    I: IntoIterator<Item = OsString>,
{
    use lexopt::prelude::*;

    let mut result = Args::default();
    let mut parser = lexopt::Parser::from_iter(args);

    while let Some(arg) = parser.next()? {
        match arg {
            Short('h') | Long("help") => {
                result.help = true;
            }
            Short('V') | Long("version") => {
                result.version = true;
            }
            Short('w') | Long("warn") => {
                result.warn = true;
            }
            Long("hide") => {
                result.hide = Some(parser.value()?.parse()?);
            }
            Short('p') | Long("pty") => {
                result.pty = true;
            }
            Long("no-fallback") => {
                result.no_fallback = true;
            }
            Short('e') | Long("echo") => {
                result.echo = true;
            }
            Long("encoding") => {
                result.encoding = Some(parser.value()?.parse()?);
            }
            Short('c') | Long("config") => {
                result.config = Some(parser.value()?.parse()?);
            }
            Short('l') | Long("log-level") => {
                result.log_level = Some(parser.value()?.parse()?);
            }
            Value(val) => {
                result.command.push(into_word(val)?);
                for raw in parser.raw_args()? {
                    result.command.push(into_word(raw)?);
                }
            }
            _ => return Err(arg.unexpected().into()),
        }
    }

    Ok(result)
}

fn into_word(value: OsString) -> Result<String, ArgsError> {
    value
        .into_string()
        .map_err(|raw| ArgsError::InvalidValue("command", raw.to_string_lossy().into_owned()))
}

/// Print help message.
pub fn print_help() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        r#"localrun {version}
Run a local shell command with capture, echo and pseudo-terminal policy

USAGE:
    localrun [OPTIONS] [--] <COMMAND>...

OPTIONS:
    -w, --warn              Report a non-zero exit instead of failing
        --hide <STREAM>     Hide out|stdout, err|stderr or both
    -p, --pty               Run the command on a pseudo-terminal
        --no-fallback       Force the pty even when stdin is not a terminal
    -e, --echo              Print the command before running it
        --encoding <ENC>    Output encoding [default: from locale]
    -c, --config <FILE>     Path to configuration file (JSON)
    -l, --log-level <LVL>   Log level (error, warn, info, debug, trace)
    -h, --help              Print help
    -V, --version           Print version

ENVIRONMENT VARIABLES:
    LOCALRUN_WARN           Default for --warn (true/false)
    LOCALRUN_HIDE           Default for --hide
    LOCALRUN_PTY            Default for --pty (true/false)
    LOCALRUN_FALLBACK       Allow pty fallback (true/false)
    LOCALRUN_ECHO           Default for --echo (true/false)
    LOCALRUN_ENCODING       Default for --encoding
    LOCALRUN_LOG_LEVEL      Log level (overrides config)
    RUST_LOG                Alternative log level setting

EXAMPLES:
    # Run quietly, then print what was captured on failure
    localrun --hide both -- make test

    # Keep colors by running on a pty
    localrun --pty cargo build
"#
    );
}

/// Print version.
pub fn print_version() {
    println!("localrun {}", env!("CARGO_PKG_VERSION"));
}

/// Argument parsing errors.
#[derive(Debug)]
pub enum ArgsError {
    /// Lexopt parsing error.
    Lexopt(lexopt::Error),
    /// Invalid argument value.
    InvalidValue(&'static str, String),
}

impl std::fmt::Display for ArgsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lexopt(e) => write!(f, "{}", e),
            Self::InvalidValue(name, value) => {
                write!(f, "invalid value for {}: '{}'", name, value)
            }
        }
    }
}

impl std::error::Error for ArgsError {}

impl From<lexopt::Error> for ArgsError {
    fn from(e: lexopt::Error) -> Self {
        Self::Lexopt(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(args: &[&str]) -> Vec<OsString> {
        std::iter::once("localrun")
            .chain(args.iter().copied())
            .map(OsString::from)
            .collect()
    }

    #[test]
    fn test_default_args() {
        let result = parse_args_from(args(&[])).unwrap();
        assert!(!result.warn);
        assert!(!result.pty);
        assert!(result.command_line().is_none());
    }

    #[test]
    fn test_flags() {
        let result = parse_args_from(args(&["-w", "-p", "-e", "--no-fallback", "true"])).unwrap();
        assert!(result.warn);
        assert!(result.pty);
        assert!(result.echo);
        assert!(result.no_fallback);
        assert_eq!(result.command_line().as_deref(), Some("true"));
    }

    #[test]
    fn test_hide_and_encoding() {
        let result =
            parse_args_from(args(&["--hide", "stderr", "--encoding", "latin1", "ls"])).unwrap();
        assert_eq!(result.hide.as_deref(), Some("stderr"));
        assert_eq!(result.encoding.as_deref(), Some("latin1"));
    }

    #[test]
    fn test_command_options_not_parsed() {
        let result = parse_args_from(args(&["--warn", "ls", "-l", "--color"])).unwrap();
        assert!(result.warn);
        assert_eq!(result.command, vec!["ls", "-l", "--color"]);
        assert_eq!(result.command_line().as_deref(), Some("ls -l --color"));
    }

    #[test]
    fn test_double_dash() {
        let result = parse_args_from(args(&["--", "-w", "x"])).unwrap();
        assert!(!result.warn);
        assert_eq!(result.command_line().as_deref(), Some("-w x"));
    }

    #[test]
    fn test_config_file() {
        let result = parse_args_from(args(&["-c", "/etc/localrun.json", "true"])).unwrap();
        assert_eq!(result.config, Some(PathBuf::from("/etc/localrun.json")));
    }

    #[test]
    fn test_help_flag() {
        let result = parse_args_from(args(&["-h"])).unwrap();
        assert!(result.help);

        let result = parse_args_from(args(&["--help"])).unwrap();
        assert!(result.help);
    }

    #[test]
    fn test_version_flag() {
        let result = parse_args_from(args(&["-V"])).unwrap();
        assert!(result.version);
    }

    #[test]
    fn test_log_level() {
        let result = parse_args_from(args(&["-l", "debug", "true"])).unwrap();
        assert_eq!(result.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_missing_value() {
        assert!(parse_args_from(args(&["--hide"])).is_err());
    }

    #[test]
    fn test_unknown_option() {
        assert!(parse_args_from(args(&["--bogus", "true"])).is_err());
    }
}
