use std::time::Duration;

use crate::endpoint::ServerEndpoint;
use crate::logging::LogFormat;

/// Default AMCP port exposed by the playout server.
pub const DEFAULT_SERVER_PORT: u16 = 5250;

/// Default host the client connects to.
pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";

/// Default per-request response deadline in milliseconds.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 1_000;

/// Default freshness window of the template cache in seconds.
pub const DEFAULT_TEMPLATE_REFRESH_SECS: u64 = 5 * 60;

/// Lowest layer handed out to effects by the channel layer pools.
pub const DEFAULT_BASE_LAYER: u32 = 10;

/// Default log filter expression. Only warnings and errors reach the
/// terminal unless the operator asks for more.
pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binaries.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Compact
}

/// Default server endpoint.
#[must_use]
pub fn default_server_endpoint() -> ServerEndpoint {
    ServerEndpoint::new(DEFAULT_SERVER_HOST, DEFAULT_SERVER_PORT)
}

/// Default response deadline as a [`Duration`].
#[must_use]
pub const fn default_request_timeout() -> Duration {
    Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS)
}
