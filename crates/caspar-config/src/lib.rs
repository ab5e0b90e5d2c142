//! Shared configuration for the playout control client.
//!
//! The CLI and the library crates agree on a single [`Config`] value. It is
//! assembled in layers: built-in defaults, then an optional TOML file, then
//! explicit overrides collected from the command line. Each layer only
//! replaces the fields it mentions, so a file that sets `request_timeout_ms`
//! keeps the default server endpoint.

mod defaults;
mod endpoint;
mod logging;

use std::fs;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use defaults::{
    DEFAULT_BASE_LAYER, DEFAULT_LOG_FILTER, DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_SERVER_HOST,
    DEFAULT_SERVER_PORT, DEFAULT_TEMPLATE_REFRESH_SECS, default_log_filter_string,
    default_log_format, default_request_timeout, default_server_endpoint,
};
pub use endpoint::{EndpointParseError, ServerEndpoint};
pub use logging::{LogFormat, LogFormatParseError};

/// Resolved client configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Playout server endpoint.
    pub server: ServerEndpoint,
    /// Deadline for a single response, in milliseconds.
    pub request_timeout_ms: u64,
    /// Freshness window of the template cache, in seconds.
    pub template_refresh_secs: u64,
    /// Lowest layer handed out by channel layer pools.
    pub base_layer: u32,
    /// `tracing` filter expression.
    pub log_filter: String,
    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: default_server_endpoint(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            template_refresh_secs: DEFAULT_TEMPLATE_REFRESH_SECS,
            base_layer: DEFAULT_BASE_LAYER,
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Parses a configuration from TOML text and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown keys and
    /// [`ConfigError::Invalid`] when a value is out of range.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: None,
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] when the file cannot be read, otherwise
    /// the same errors as [`Config::from_toml_str`] tagged with the path.
    pub fn load_file(path: &Utf8Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: Some(path.to_path_buf()),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Builds the effective configuration: defaults, then the optional file,
    /// then the overrides.
    ///
    /// # Errors
    ///
    /// Propagates file errors and validation failures of the merged result.
    pub fn resolve(
        file: Option<&Utf8Path>,
        overrides: &ConfigOverrides,
    ) -> Result<Self, ConfigError> {
        let mut config = match file {
            Some(path) => Self::load_file(path)?,
            None => Self::default(),
        };
        config.apply(overrides);
        config.validate()?;
        Ok(config)
    }

    /// Applies explicit overrides on top of the current values.
    ///
    /// A full `server` endpoint is applied first, so `host` and `port` can
    /// still adjust one half of it.
    pub fn apply(&mut self, overrides: &ConfigOverrides) {
        if let Some(server) = &overrides.server {
            self.server.clone_from(server);
        }
        if let Some(host) = &overrides.host {
            self.server.host.clone_from(host);
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(timeout) = overrides.request_timeout_ms {
            self.request_timeout_ms = timeout;
        }
        if let Some(filter) = &overrides.log_filter {
            self.log_filter.clone_from(filter);
        }
        if let Some(format) = overrides.log_format {
            self.log_format = format;
        }
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.host.is_empty() {
            return Err(ConfigError::invalid("server.host", "must not be empty"));
        }
        if self.server.port == 0 {
            return Err(ConfigError::invalid("server.port", "must be non-zero"));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "request_timeout_ms",
                "must be greater than zero",
            ));
        }
        if self.base_layer == 0 {
            return Err(ConfigError::invalid("base_layer", "layers are numbered from 1"));
        }
        Ok(())
    }

    /// Server endpoint.
    #[must_use]
    pub const fn server(&self) -> &ServerEndpoint {
        &self.server
    }

    /// Response deadline.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Template cache freshness window.
    #[must_use]
    pub const fn template_refresh(&self) -> Duration {
        Duration::from_secs(self.template_refresh_secs)
    }

    /// Log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }
}

/// Values supplied explicitly by the operator, typically from CLI flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    /// Replacement server endpoint.
    pub server: Option<ServerEndpoint>,
    /// Replacement server host.
    pub host: Option<String>,
    /// Replacement server port.
    pub port: Option<u16>,
    /// Replacement response deadline in milliseconds.
    pub request_timeout_ms: Option<u64>,
    /// Replacement log filter.
    pub log_filter: Option<String>,
    /// Replacement log format.
    pub log_format: Option<LogFormat>,
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration '{path}': {source}")]
    Read {
        /// File that was requested.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The TOML document was malformed.
    #[error("failed to parse configuration{}: {source}", describe_path(.path.as_deref()))]
    Parse {
        /// File the text came from, when loaded from disk.
        path: Option<Utf8PathBuf>,
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },
    /// A value was outside its permitted range.
    #[error("invalid configuration value for '{field}': {reason}")]
    Invalid {
        /// Offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: &'static str,
    },
}

fn describe_path(path: Option<&Utf8Path>) -> String {
    path.map(|value| format!(" '{value}'")).unwrap_or_default()
}

impl ConfigError {
    const fn invalid(field: &'static str, reason: &'static str) -> Self {
        Self::Invalid { field, reason }
    }
}
