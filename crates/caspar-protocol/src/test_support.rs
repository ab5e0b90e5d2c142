//! In-memory transport for exercising the executor without a server.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::error::TransportError;
use crate::transport::Transport;

/// Records every payload instead of writing it anywhere.
#[derive(Debug)]
pub struct RecordingTransport {
    sent: Mutex<Vec<String>>,
    connected: AtomicBool,
    refuse_sends: AtomicBool,
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            connected: AtomicBool::new(true),
            refuse_sends: AtomicBool::new(false),
        }
    }
}

impl RecordingTransport {
    /// Creates a connected transport.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Payloads sent so far, in order.
    #[must_use]
    pub fn sent(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drains and returns the payloads sent so far.
    #[must_use]
    pub fn take_sent(&self) -> Vec<String> {
        std::mem::take(&mut *self.sent.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Changes the connectivity reported to the executor.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Makes subsequent sends fail with [`TransportError::Disconnected`].
    pub fn refuse_sends(&self, refuse: bool) {
        self.refuse_sends.store(refuse, Ordering::SeqCst);
    }
}

impl Transport for RecordingTransport {
    fn send(&self, payload: &str) -> Result<(), TransportError> {
        if self.refuse_sends.load(Ordering::SeqCst) {
            return Err(TransportError::Disconnected);
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(payload.to_owned());
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
