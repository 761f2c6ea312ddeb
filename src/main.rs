//! localrun binary entry point.

use std::process::ExitCode;

use localrun::cli::{self, Args};
use localrun::{logging, Config, Context, RunError, RunOptions};
use tracing::debug;

/// Exit code reported when the run was interrupted (128 + SIGINT).
const EXIT_INTERRUPTED: u8 = 130;
/// Exit code for bad arguments, configuration or options.
const EXIT_USAGE: u8 = 2;

fn main() -> ExitCode {
    let args = match cli::parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {}", e);
            eprintln!("Run 'localrun --help' for usage.");
            return ExitCode::from(EXIT_USAGE);
        }
    };

    if args.help {
        cli::print_help();
        return ExitCode::SUCCESS;
    }

    if args.version {
        cli::print_version();
        return ExitCode::SUCCESS;
    }

    let config = match Config::load(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::from(EXIT_USAGE);
        }
    };

    logging::try_init_with(Some(config.log_filter())).ok();

    execute(&args, config)
}

fn execute(args: &Args, config: Config) -> ExitCode {
    let Some(command) = args.command_line() else {
        eprintln!("error: no command given");
        eprintln!("Run 'localrun --help' for usage.");
        return ExitCode::from(EXIT_USAGE);
    };

    debug!(?config, "loaded configuration");

    match Context::new(config).run(&command, &RunOptions::new()) {
        Ok(result) => exit_code(result.exited()),
        Err(RunError::Failure(failure)) => {
            eprintln!("{}", failure);
            exit_code(failure.into_result().exited())
        }
        Err(RunError::Interrupted(_)) => ExitCode::from(EXIT_INTERRUPTED),
        Err(e @ (RunError::InvalidOption(_) | RunError::Config(_))) => {
            eprintln!("error: {}", e);
            ExitCode::from(EXIT_USAGE)
        }
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Map a child's exit code onto the process exit code.
///
/// Codes outside `0..=255` and missing codes (the command never ran to
/// completion) both become a generic failure.
fn exit_code(exited: Option<i32>) -> ExitCode {
    match exited.map(u8::try_from) {
        Some(Ok(code)) => ExitCode::from(code),
        _ => ExitCode::FAILURE,
    }
}
