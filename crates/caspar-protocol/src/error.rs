//! Error types raised while building, sending, and answering commands.
//!
//! Everything here is `Clone`: a single failure may be observed by several
//! callers at once (a shared template fetch, a batch and its sub-results), so
//! I/O errors are wrapped in `Arc`.

use std::io;
use std::sync::Arc;

use thiserror::Error;

/// Malformed command text. Raised at build or parse time, never on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyntaxError {
    /// The command text was empty or had no verb.
    #[error("command is empty")]
    EmptyCommand,

    /// The text embeds a line break, i.e. several commands were concatenated.
    #[error("command cannot contain line breaks")]
    LineBreak,

    /// The verb token begins with a quote.
    #[error("command cannot start with quotes")]
    QuotedVerb,

    /// The verb contains whitespace or is otherwise not a single token.
    #[error("invalid command verb '{verb}'")]
    InvalidVerb {
        /// Rejected verb text.
        verb: String,
    },

    /// A quoted argument was never closed.
    #[error("command contains unclosed quotes: {command}")]
    UnterminatedQuote {
        /// Offending command line.
        command: String,
    },

    /// An allocation string could not be understood.
    #[error("invalid allocation '{input}': {reason}")]
    InvalidAllocation {
        /// Rejected input.
        input: String,
        /// Why it was rejected.
        reason: &'static str,
    },
}

/// Transport-layer errors.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// I/O error while connecting, reading, or writing.
    #[error("I/O error: {0}")]
    Io(#[source] Arc<io::Error>),

    /// The connection is closed and can no longer carry data.
    #[error("connection closed")]
    Disconnected,
}

impl From<io::Error> for TransportError {
    fn from(error: io::Error) -> Self {
        Self::Io(Arc::new(error))
    }
}

/// Errors surfaced by the command executor.
#[derive(Debug, Clone, Error)]
pub enum ExecutorError {
    /// The server answered the request with a non-2xx status.
    #[error("{verb} failed with status {code}{}", describe_data(.data))]
    Protocol {
        /// Verb of the rejected command.
        verb: String,
        /// Status code reported by the server.
        code: u16,
        /// Payload lines that accompanied the status.
        data: Vec<String>,
    },

    /// The server never answered within the deadline.
    #[error("{verb} timed out after {timeout_ms}ms")]
    Timeout {
        /// Verb of the unanswered command.
        verb: String,
        /// Deadline that elapsed, in milliseconds.
        timeout_ms: u64,
    },

    /// The command text was malformed.
    #[error("syntax error: {0}")]
    Syntax(#[from] SyntaxError),

    /// The transport refused the payload.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The executor was constructed outside a Tokio runtime.
    #[error("command executor requires a Tokio runtime")]
    NoRuntime,

    /// The executor went away before the request was settled.
    #[error("{verb} was abandoned before a response arrived")]
    Closed {
        /// Verb of the abandoned command.
        verb: String,
    },
}

impl ExecutorError {
    /// Returns the server status code when the server refused the request.
    #[must_use]
    pub const fn status_code(&self) -> Option<u16> {
        match self {
            Self::Protocol { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Returns `true` when the request ran out of time rather than failing.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

fn describe_data(data: &[String]) -> String {
    if data.is_empty() {
        String::new()
    } else {
        format!(": {}", data.join(" | "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_error_lists_payload() {
        let error = ExecutorError::Protocol {
            verb: "PLAY".to_owned(),
            code: 404,
            data: vec!["file not found".to_owned()],
        };
        assert_eq!(
            error.to_string(),
            "PLAY failed with status 404: file not found"
        );
        assert_eq!(error.status_code(), Some(404));
        assert!(!error.is_timeout());
    }

    #[test]
    fn timeout_is_distinguished_from_refusal() {
        let error = ExecutorError::Timeout {
            verb: "INFO".to_owned(),
            timeout_ms: 1000,
        };
        assert!(error.is_timeout());
        assert_eq!(error.status_code(), None);
        assert_eq!(error.to_string(), "INFO timed out after 1000ms");
    }
}
