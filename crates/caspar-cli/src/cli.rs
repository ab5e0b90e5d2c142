//! Command-line argument definitions for `casparctl`.

use camino::Utf8PathBuf;
use caspar_config::{ConfigOverrides, LogFormat, ServerEndpoint};
use clap::Parser;

/// Sends protocol commands to a playout server and prints the replies.
#[derive(Parser, Debug)]
#[command(name = "casparctl", version)]
pub(crate) struct Cli {
    /// TOML configuration file.
    #[arg(long, value_name = "PATH")]
    pub(crate) config: Option<Utf8PathBuf>,
    /// Server endpoint as `tcp://host:port` or `host:port`.
    #[arg(long, value_name = "ENDPOINT")]
    pub(crate) server: Option<ServerEndpoint>,
    /// Server host name or address; replaces the host of `--server`.
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Server port; replaces the port of `--server`.
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Deadline for each response, in milliseconds.
    #[arg(long, value_name = "MS")]
    pub(crate) timeout_ms: Option<u64>,
    /// `tracing` filter expression, for example `caspar_protocol=debug`.
    #[arg(long, value_name = "FILTER")]
    pub(crate) log_filter: Option<String>,
    /// Log output format: `json` or `compact`.
    #[arg(long, value_name = "FORMAT")]
    pub(crate) log_format: Option<LogFormat>,
    /// Lists the server's templates after running the commands.
    #[arg(long)]
    pub(crate) templates: bool,
    /// Command lines to send, for example `"PLAY 1-10 AMB LOOP"`.
    #[arg(value_name = "COMMAND")]
    pub(crate) commands: Vec<String>,
}

impl Cli {
    /// Values given on the command line, layered over the configuration.
    pub(crate) fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            server: self.server.clone(),
            host: self.host.clone(),
            port: self.port,
            request_timeout_ms: self.timeout_ms,
            log_filter: self.log_filter.clone(),
            log_format: self.log_format,
        }
    }

    /// Returns `true` when there is nothing to send.
    pub(crate) const fn is_empty(&self) -> bool {
        self.commands.is_empty() && !self.templates
    }
}
