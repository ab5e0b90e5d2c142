//! Command-line runtime for `casparctl`.
//!
//! Arguments are parsed and every command line is validated before the
//! configuration is resolved and a connection is opened, so typing mistakes
//! fail fast without touching the server. The runtime takes its output
//! streams as parameters so tests can capture them.

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;

use caspar_config::Config;
use clap::Parser;
use clap::error::ErrorKind;

mod cli;
mod errors;
mod session;
pub mod telemetry;

use cli::Cli;
use errors::AppError;
use session::Plan;

/// Runs the CLI with `args`, writing replies to `stdout` and diagnostics to
/// `stderr`.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) if matches!(error.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            return match write!(stdout, "{error}") {
                Ok(()) => ExitCode::SUCCESS,
                Err(_) => ExitCode::FAILURE,
            };
        }
        Err(error) => return report(stderr, &AppError::CliUsage(error)),
    };

    match run_cli(&cli, stdout) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => report(stderr, &error),
    }
}

fn run_cli<W: Write>(cli: &Cli, stdout: &mut W) -> Result<(), AppError> {
    if cli.is_empty() {
        return Err(AppError::NothingToDo);
    }
    let plan = Plan::parse(&cli.commands, cli.templates)?;
    let config = Config::resolve(cli.config.as_deref(), &cli.overrides())?;
    telemetry::initialise(&config)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(AppError::Runtime)?;
    runtime.block_on(session::execute(&config, &plan, stdout))
}

fn report<E: Write>(stderr: &mut E, error: &AppError) -> ExitCode {
    let _ignored = writeln!(stderr, "{error}");
    ExitCode::FAILURE
}

#[cfg(test)]
mod tests;
