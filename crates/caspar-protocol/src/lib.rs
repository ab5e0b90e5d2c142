//! Client side of the playout server's line protocol.
//!
//! Commands are typed values ([`Command`]) that serialise to CRLF-terminated
//! lines. A [`CommandExecutor`] sends them over a [`Transport`], frames the
//! responses that come back, and settles each request with the response for
//! its verb, oldest first. Requests that are never answered fail after a
//! timeout that pauses while the connection is down.
//!
//! ```text
//! client: PLAY 1-10 "my clip" LOOP\r\n
//! server: 202 PLAY OK\r\n
//! ```

mod allocation;
pub mod command;
mod error;
mod executor;
mod response;
mod templates;
pub mod transport;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use allocation::{Allocation, ChannelId, LayerId};
pub use command::{Command, Elementary, LINE_END, Swap, interpret, verbs};
pub use error::{ExecutorError, SyntaxError, TransportError};
pub use executor::{CommandExecutor, ExecutorSettings, PendingBatch, ServerEvent};
pub use response::{Response, ResponseFramer};
pub use templates::{ExecutorTemplateSource, TemplateCache, TemplateInfo, TemplateSource};
pub use transport::{TcpTransport, Transport, pump};
