//! Byte transports the executor writes commands to.
//!
//! The executor only needs two things from a connection: an ordered way to
//! hand over outbound text and a view of whether the link is currently up.
//! Inbound text is delivered separately through
//! [`CommandExecutor::receive`](crate::CommandExecutor::receive).

mod tcp;

pub use tcp::{TcpTransport, pump};

use crate::error::TransportError;

/// Outbound half of a connection to the playout server.
pub trait Transport: Send + Sync + 'static {
    /// Queues `payload` for transmission.
    ///
    /// Implementations must preserve call order on the wire.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] when the payload cannot be queued.
    fn send(&self, payload: &str) -> Result<(), TransportError>;

    /// Returns `true` while the connection is believed to be up.
    fn is_connected(&self) -> bool;
}
