//! Request transmission and response correlation.
//!
//! The executor owns one conversation with the server. A command is split
//! into elementaries, one waiter is registered per elementary under its verb,
//! and only then is the payload handed to the transport; registration and
//! transmission happen under the same lock so a fast reply can never overtake
//! its waiter. Inbound text is framed by [`ResponseFramer`] and each response
//! settles the oldest waiter for its verb.
//!
//! Every response is also published to subscribers as a [`ServerEvent`].
//! Responses that settle nothing (codes 400 and 500, informational codes,
//! and late replies to timed-out requests) arrive there with
//! `routed == false`.

mod waiters;

use std::fmt;
use std::future::IntoFuture;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use caspar_config::{Config, default_request_timeout};
use futures::FutureExt;
use futures::future::{BoxFuture, try_join_all};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use self::waiters::{Outcome, WaitingSet, Waiter};
use crate::command::{Command, interpret};
use crate::error::ExecutorError;
use crate::response::{Response, ResponseFramer};
use crate::transport::Transport;

pub(crate) const EXECUTOR_TARGET: &str = "caspar_protocol::executor";

/// Tunables for a [`CommandExecutor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorSettings {
    /// How long a request may wait for its response while connected.
    pub request_timeout: Duration,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            request_timeout: default_request_timeout(),
        }
    }
}

impl ExecutorSettings {
    /// Reads the executor settings from the shared configuration.
    #[must_use]
    pub const fn from_config(config: &Config) -> Self {
        Self {
            request_timeout: config.request_timeout(),
        }
    }
}

/// A response as seen by subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEvent {
    /// The decoded response.
    pub response: Response,
    /// Whether the response settled a pending request.
    pub routed: bool,
}

/// Drives the request/response conversation over one transport.
///
/// Cloning is cheap; clones share the same connection state.
#[derive(Clone)]
pub struct CommandExecutor {
    shared: Arc<Shared>,
}

struct Shared {
    transport: Arc<dyn Transport>,
    settings: ExecutorSettings,
    runtime: Handle,
    next_id: AtomicU64,
    state: Mutex<ExecutorState>,
}

#[derive(Default)]
struct ExecutorState {
    framer: ResponseFramer,
    waiting: WaitingSet,
    subscribers: Vec<mpsc::UnboundedSender<ServerEvent>>,
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, ExecutorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CommandExecutor {
    /// Creates an executor writing to `transport`.
    ///
    /// The current Tokio runtime is captured to drive request timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::NoRuntime`] when called outside a runtime.
    pub fn new<T: Transport>(
        transport: Arc<T>,
        settings: ExecutorSettings,
    ) -> Result<Self, ExecutorError> {
        let runtime = Handle::try_current().map_err(|_| ExecutorError::NoRuntime)?;
        Ok(Self {
            shared: Arc::new(Shared {
                transport,
                settings,
                runtime,
                next_id: AtomicU64::new(0),
                state: Mutex::new(ExecutorState::default()),
            }),
        })
    }

    /// Settings the executor was built with.
    #[must_use]
    pub fn settings(&self) -> ExecutorSettings {
        self.shared.settings
    }

    /// Sends `command` and tracks one response per elementary it contains.
    ///
    /// A command that serialises to nothing is a no-op and yields an empty
    /// batch. The returned batch resolves once every elementary has been
    /// answered, or fails with the first failure. Sub-commands the server
    /// already accepted are not undone when a later one fails.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::Syntax`] when the serialised command does not
    /// parse and [`ExecutorError::Transport`] when the payload cannot be
    /// queued. No waiters remain registered in either case.
    pub fn execute(&self, command: &Command) -> Result<PendingBatch, ExecutorError> {
        let Some(payload) = command.to_wire() else {
            debug!(target: EXECUTOR_TARGET, "command has no destination; skipping");
            return Ok(PendingBatch::default());
        };
        let elementaries = interpret(&payload)?;

        let mut state = self.shared.lock_state();
        let mut batch = PendingBatch::default();
        let mut registered = Vec::with_capacity(elementaries.len());
        for elementary in &elementaries {
            let key = elementary.verb_key();
            let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
            let (responder, receiver) = oneshot::channel();
            let watchdog = self
                .shared
                .runtime
                .spawn(watchdog(
                    Arc::downgrade(&self.shared),
                    key.clone(),
                    id,
                    self.shared.settings.request_timeout,
                ))
                .abort_handle();
            state.waiting.register(
                key.clone(),
                Waiter {
                    id,
                    responder,
                    watchdog,
                },
            );
            registered.push((key.clone(), id));
            batch.requests.push(PendingRequest { verb: key, receiver });
        }

        if let Err(error) = self.shared.transport.send(&payload) {
            for (key, id) in registered {
                if let Some(waiter) = state.waiting.remove(&key, id) {
                    waiter.watchdog.abort();
                }
            }
            warn!(target: EXECUTOR_TARGET, %error, "failed to transmit command");
            return Err(error.into());
        }
        drop(state);

        debug!(
            target: EXECUTOR_TARGET,
            elementaries = batch.len(),
            payload = payload.trim_end(),
            "command sent"
        );
        Ok(batch)
    }

    /// Sends `command` and waits for every response.
    ///
    /// # Errors
    ///
    /// Returns the error from [`CommandExecutor::execute`] or the first
    /// failure among the responses.
    pub async fn call(&self, command: &Command) -> Result<Vec<Response>, ExecutorError> {
        self.execute(command)?.await
    }

    /// Sends `command` without waiting; failures are logged.
    pub fn execute_detached(&self, command: &Command) {
        match self.execute(command) {
            Ok(batch) if batch.is_empty() => {}
            Ok(batch) => {
                self.shared.runtime.spawn(async move {
                    if let Err(error) = batch.wait().await {
                        warn!(target: EXECUTOR_TARGET, %error, "detached command failed");
                    }
                });
            }
            Err(error) => {
                warn!(target: EXECUTOR_TARGET, %error, "detached command was not sent");
            }
        }
    }

    /// Sends `command` without registering any waiter.
    ///
    /// Only use this for commands the server never answers individually.
    /// Mixing it with [`CommandExecutor::execute`] for a verb that has an
    /// outstanding request breaks correlation for that verb.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::Transport`] when the payload cannot be queued.
    pub fn execute_passive(&self, command: &Command) -> Result<(), ExecutorError> {
        let Some(payload) = command.to_wire() else {
            return Ok(());
        };
        self.shared.transport.send(&payload)?;
        debug!(target: EXECUTOR_TARGET, payload = payload.trim_end(), "passive command sent");
        Ok(())
    }

    /// Feeds inbound text from the transport.
    pub fn receive(&self, chunk: &str) {
        let mut state = self.shared.lock_state();
        let responses = state.framer.push(chunk);
        for response in responses {
            let routed = correlate(&mut state.waiting, &response);
            let event = ServerEvent { response, routed };
            state
                .subscribers
                .retain(|subscriber| subscriber.send(event.clone()).is_ok());
        }
    }

    /// Subscribes to every response the server sends.
    #[must_use]
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ServerEvent> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.shared.lock_state().subscribers.push(sender);
        receiver
    }

    /// Number of requests still waiting for a response.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.shared.lock_state().waiting.len()
    }

    /// Whether the transport reports an open connection.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.shared.transport.is_connected()
    }

    /// Settles every waiting request with `error` and returns how many there
    /// were.
    ///
    /// Call this once the connection is gone for good; otherwise requests
    /// keep waiting for it to come back.
    #[must_use = "the count tells whether anyone was still waiting"]
    pub fn fail_pending(&self, error: &ExecutorError) -> usize {
        let drained = self.shared.lock_state().waiting.drain();
        let count = drained.len();
        for waiter in drained {
            if !waiter.settle(Err(error.clone())) {
                debug!(target: EXECUTOR_TARGET, "caller stopped waiting");
            }
        }
        if count > 0 {
            warn!(target: EXECUTOR_TARGET, count, %error, "pending requests failed");
        }
        count
    }
}

impl fmt::Debug for CommandExecutor {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("CommandExecutor")
            .field("settings", &self.shared.settings)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

/// Settles the oldest waiter for the response's verb.
///
/// Returns `true` when a waiter was found.
fn correlate(waiting: &mut WaitingSet, response: &Response) -> bool {
    if response.is_informational() {
        return false;
    }
    let Some(key) = response.verb_key() else {
        warn!(
            target: EXECUTOR_TARGET,
            code = response.code,
            data = ?response.data,
            "unroutable response"
        );
        return false;
    };
    let Some(waiter) = waiting.take_oldest(&key) else {
        debug!(target: EXECUTOR_TARGET, code = response.code, verb = %key, "no request waiting");
        return false;
    };

    let outcome = if response.is_success() {
        Ok(response.clone())
    } else {
        Err(ExecutorError::Protocol {
            verb: key.clone(),
            code: response.code,
            data: response.data.clone(),
        })
    };
    if !waiter.settle(outcome) {
        debug!(target: EXECUTOR_TARGET, verb = %key, "caller stopped waiting");
    }
    true
}

/// Rejects a request once its deadline passes while connected.
///
/// While the transport reports the connection down, the deadline is rearmed
/// for another full interval instead of firing.
async fn watchdog(shared: Weak<Shared>, key: String, id: u64, timeout: Duration) {
    loop {
        tokio::time::sleep(timeout).await;
        let Some(executor) = shared.upgrade() else {
            return;
        };
        if !executor.transport.is_connected() {
            debug!(target: EXECUTOR_TARGET, verb = %key, "connection down; extending deadline");
            continue;
        }

        let expired = executor.lock_state().waiting.remove(&key, id);
        if let Some(waiter) = expired {
            warn!(target: EXECUTOR_TARGET, verb = %key, "request timed out");
            let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
            if waiter
                .responder
                .send(Err(ExecutorError::Timeout {
                    verb: key.clone(),
                    timeout_ms,
                }))
                .is_err()
            {
                debug!(target: EXECUTOR_TARGET, verb = %key, "caller stopped waiting");
            }
        }
        return;
    }
}

/// Responses owed for one executed command.
///
/// Await the batch (or call [`PendingBatch::wait`]) to collect them in send
/// order.
#[derive(Debug, Default)]
#[must_use = "a batch does nothing unless awaited"]
pub struct PendingBatch {
    requests: Vec<PendingRequest>,
}

#[derive(Debug)]
struct PendingRequest {
    verb: String,
    receiver: oneshot::Receiver<Outcome>,
}

impl PendingRequest {
    async fn wait(self) -> Outcome {
        match self.receiver.await {
            Ok(outcome) => outcome,
            Err(_) => Err(ExecutorError::Closed { verb: self.verb }),
        }
    }
}

impl PendingBatch {
    /// Number of responses the batch is waiting for.
    #[must_use]
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// Returns `true` for the batch of a no-op command.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Verbs of the outstanding requests, upper-cased, in send order.
    pub fn verbs(&self) -> impl Iterator<Item = &str> {
        self.requests.iter().map(|request| request.verb.as_str())
    }

    /// Waits for all responses.
    ///
    /// # Errors
    ///
    /// Returns the first failure: a non-2xx status, a timeout, or
    /// [`ExecutorError::Closed`] when the executor was dropped.
    pub async fn wait(self) -> Result<Vec<Response>, ExecutorError> {
        try_join_all(self.requests.into_iter().map(PendingRequest::wait)).await
    }
}

impl IntoFuture for PendingBatch {
    type Output = Result<Vec<Response>, ExecutorError>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        self.wait().boxed()
    }
}
