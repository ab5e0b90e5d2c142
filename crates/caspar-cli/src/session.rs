//! Connection to the server and execution of the requested commands.

use std::io::Write;
use std::sync::Arc;

use caspar_config::Config;
use caspar_protocol::{
    Command, CommandExecutor, ExecutorSettings, Response, TcpTransport, TemplateCache,
    TemplateInfo, pump,
};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::errors::AppError;

const SESSION_TARGET: &str = "caspar_cli::session";

/// Work requested on the command line, validated before connecting.
#[derive(Debug)]
pub(crate) struct Plan {
    pub(crate) commands: Vec<(String, Command)>,
    pub(crate) templates: bool,
}

impl Plan {
    /// Parses every command line.
    pub(crate) fn parse(lines: &[String], templates: bool) -> Result<Self, AppError> {
        let commands = lines
            .iter()
            .map(|line| {
                Command::parse(line)
                    .map(|command| (line.clone(), command))
                    .map_err(|source| AppError::Syntax {
                        line: line.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            commands,
            templates,
        })
    }
}

struct Session {
    executor: CommandExecutor,
    reader: JoinHandle<()>,
}

impl Session {
    async fn connect(config: &Config) -> Result<Self, AppError> {
        let (transport, inbound) =
            TcpTransport::connect(config.server())
                .await
                .map_err(|source| AppError::Connect {
                    endpoint: config.server().to_string(),
                    source,
                })?;
        let executor =
            CommandExecutor::new(Arc::new(transport), ExecutorSettings::from_config(config))?;
        let reader = tokio::spawn({
            let inbound_executor = executor.clone();
            async move { pump(&inbound_executor, inbound).await }
        });
        Ok(Self { executor, reader })
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Connects, runs `plan` in order, and writes each reply to `stdout`.
///
/// Stops at the first failure.
pub(crate) async fn execute<W: Write>(
    config: &Config,
    plan: &Plan,
    stdout: &mut W,
) -> Result<(), AppError> {
    let session = Session::connect(config).await?;
    info!(target: SESSION_TARGET, server = %config.server(), "session started");

    for (line, command) in &plan.commands {
        debug!(target: SESSION_TARGET, command = line.as_str(), "executing");
        for response in session.executor.call(command).await? {
            write_response(stdout, &response)?;
        }
    }

    if plan.templates {
        let cache = TemplateCache::for_executor(session.executor.clone(), config.template_refresh());
        for template in cache.templates(false).await?.iter() {
            write_template(stdout, template)?;
        }
    }
    stdout.flush()?;
    Ok(())
}

/// Writes `<code> <verb>` followed by the payload lines.
pub(crate) fn write_response<W: Write>(out: &mut W, response: &Response) -> std::io::Result<()> {
    write!(out, "{}", response.code)?;
    if let Some(verb) = &response.verb {
        write!(out, " {verb}")?;
    }
    writeln!(out)?;
    for line in &response.data {
        writeln!(out, "{line}")?;
    }
    Ok(())
}

/// Writes one template as `<id>\t<kind>\t<path>`.
pub(crate) fn write_template<W: Write>(out: &mut W, template: &TemplateInfo) -> std::io::Result<()> {
    writeln!(out, "{}\t{}\t{}", template.id, template.kind, template.path)
}
