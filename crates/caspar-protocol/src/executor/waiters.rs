//! Per-verb FIFO queues of requests awaiting a response.

use std::collections::{HashMap, VecDeque};

use tokio::sync::oneshot;
use tokio::task::AbortHandle;

use crate::error::ExecutorError;
use crate::response::Response;

/// Result delivered to whoever is waiting on a request.
pub(super) type Outcome = Result<Response, ExecutorError>;

/// One outstanding request.
#[derive(Debug)]
pub(super) struct Waiter {
    pub(super) id: u64,
    pub(super) responder: oneshot::Sender<Outcome>,
    pub(super) watchdog: AbortHandle,
}

impl Waiter {
    /// Cancels the timeout and hands `outcome` to the caller.
    ///
    /// Returns `false` when the caller stopped waiting.
    pub(super) fn settle(self, outcome: Outcome) -> bool {
        self.watchdog.abort();
        self.responder.send(outcome).is_ok()
    }
}

/// Requests keyed by upper-cased verb, oldest first.
#[derive(Debug, Default)]
pub(super) struct WaitingSet {
    queues: HashMap<String, VecDeque<Waiter>>,
}

impl WaitingSet {
    pub(super) fn register(&mut self, key: String, waiter: Waiter) {
        self.queues.entry(key).or_default().push_back(waiter);
    }

    /// Removes the oldest request for `key`.
    pub(super) fn take_oldest(&mut self, key: &str) -> Option<Waiter> {
        let queue = self.queues.get_mut(key)?;
        let waiter = queue.pop_front();
        if queue.is_empty() {
            self.queues.remove(key);
        }
        waiter
    }

    /// Removes a specific request, wherever it sits in its queue.
    pub(super) fn remove(&mut self, key: &str, id: u64) -> Option<Waiter> {
        let queue = self.queues.get_mut(key)?;
        let position = queue.iter().position(|waiter| waiter.id == id)?;
        let waiter = queue.remove(position);
        if queue.is_empty() {
            self.queues.remove(key);
        }
        waiter
    }

    /// Removes every request, queue by queue.
    pub(super) fn drain(&mut self) -> Vec<Waiter> {
        self.queues.drain().flat_map(|(_, queue)| queue).collect()
    }

    pub(super) fn len(&self) -> usize {
        self.queues.values().map(VecDeque::len).sum()
    }
}
