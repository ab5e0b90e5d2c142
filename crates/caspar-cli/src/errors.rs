//! Error type for the CLI runtime.

use std::io;
use std::sync::Arc;

use caspar_config::ConfigError;
use caspar_protocol::{ExecutorError, SyntaxError, TransportError};
use thiserror::Error;

use crate::telemetry::TelemetryError;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("{0}")]
    CliUsage(clap::Error),
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ConfigError>),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error("nothing to do: pass at least one command or --templates")]
    NothingToDo,
    #[error("invalid command '{line}': {source}")]
    Syntax {
        line: String,
        #[source]
        source: SyntaxError,
    },
    #[error("failed to start the async runtime: {0}")]
    Runtime(io::Error),
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: TransportError,
    },
    #[error("command failed: {0}")]
    Executor(#[from] ExecutorError),
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}

impl From<ConfigError> for AppError {
    fn from(error: ConfigError) -> Self {
        Self::LoadConfiguration(Arc::new(error))
    }
}
