//! Cached template listing.
//!
//! The listing is fetched lazily and kept for a freshness window. Callers that
//! arrive while a fetch is running join it instead of starting another.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::{BoxFuture, Shared};
use futures::{FutureExt, TryFutureExt};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::command::{Command, Elementary, tokenize, verbs};
use crate::error::ExecutorError;
use crate::executor::CommandExecutor;

const TEMPLATES_TARGET: &str = "caspar_protocol::templates";
const DEFAULT_TEMPLATE_KIND: &str = "html";

/// One template known to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateInfo {
    /// Upper-cased path without extension, as used by `CG ADD`.
    pub id: String,
    /// Path relative to the template folder.
    pub path: String,
    /// Template kind, for example `html` or `flash`.
    pub kind: String,
}

impl TemplateInfo {
    /// Parses one line of a `TLS` listing.
    ///
    /// The first token is the template path; a trailing alphabetic token,
    /// when present, names the kind.
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        let tokens: Vec<String> = tokenize(line)
            .ok()?
            .into_iter()
            .filter(|token| !token.is_empty())
            .collect();
        let (path, rest) = tokens.split_first()?;
        let kind = rest
            .last()
            .filter(|token| token.chars().all(|c| c.is_ascii_alphabetic()))
            .map_or_else(|| DEFAULT_TEMPLATE_KIND.to_owned(), |token| token.to_ascii_lowercase());
        Some(Self {
            id: template_id(path),
            path: path.clone(),
            kind,
        })
    }
}

fn template_id(path: &str) -> String {
    let stem = match path.rsplit_once('.') {
        Some((stem, extension)) if !extension.contains(['/', '\\']) => stem,
        _ => path,
    };
    stem.replace('\\', "/").to_ascii_uppercase()
}

/// Something that can produce the template listing.
pub trait TemplateSource: Send + Sync + 'static {
    /// Fetches the full listing.
    fn fetch(&self) -> BoxFuture<'static, Result<Vec<TemplateInfo>, ExecutorError>>;
}

/// Fetches templates from the server with `TLS`.
#[derive(Debug, Clone)]
pub struct ExecutorTemplateSource {
    executor: CommandExecutor,
}

impl ExecutorTemplateSource {
    /// Wraps an executor.
    #[must_use]
    pub const fn new(executor: CommandExecutor) -> Self {
        Self { executor }
    }
}

impl TemplateSource for ExecutorTemplateSource {
    fn fetch(&self) -> BoxFuture<'static, Result<Vec<TemplateInfo>, ExecutorError>> {
        let executor = self.executor.clone();
        async move {
            let command = Command::from(Elementary::new(verbs::TLS, Vec::<String>::new())?);
            let responses = executor.call(&command).await?;
            Ok(responses
                .iter()
                .flat_map(|response| response.data.iter())
                .filter_map(|line| TemplateInfo::parse(line))
                .collect())
        }
        .boxed()
    }
}

type Listing = Arc<[TemplateInfo]>;
type SharedFetch = Shared<BoxFuture<'static, Result<Listing, ExecutorError>>>;

/// Template listing with a freshness window and fetch coalescing.
pub struct TemplateCache<S> {
    source: S,
    refresh: Duration,
    state: Mutex<CacheState>,
}

#[derive(Default)]
struct CacheState {
    templates: Listing,
    last_fetch: Option<Instant>,
    generation: u64,
    in_flight: Option<(u64, SharedFetch)>,
}

impl<S: TemplateSource> TemplateCache<S> {
    /// Creates an empty cache that considers a listing fresh for `refresh`.
    #[must_use]
    pub fn new(source: S, refresh: Duration) -> Self {
        Self {
            source,
            refresh,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Returns the listing, fetching it when stale or when `force` is set.
    ///
    /// Concurrent callers share a single fetch.
    ///
    /// # Errors
    ///
    /// Returns the fetch failure. A failed fetch leaves the previous listing
    /// and its age in place, so the next stale call retries.
    pub async fn templates(&self, force: bool) -> Result<Listing, ExecutorError> {
        let (generation, fetch) = {
            let mut state = self.lock_state();
            if let Some((generation, fetch)) = &state.in_flight {
                debug!(target: TEMPLATES_TARGET, "joining template fetch in progress");
                (*generation, fetch.clone())
            } else {
                let fresh = state
                    .last_fetch
                    .is_some_and(|fetched| fetched.elapsed() < self.refresh);
                if fresh && !force {
                    return Ok(Arc::clone(&state.templates));
                }
                state.generation += 1;
                let fetch = self
                    .source
                    .fetch()
                    .map_ok(Listing::from)
                    .boxed()
                    .shared();
                state.in_flight = Some((state.generation, fetch.clone()));
                (state.generation, fetch)
            }
        };

        let outcome = fetch.await;

        let mut state = self.lock_state();
        if state
            .in_flight
            .as_ref()
            .is_some_and(|(current, _)| *current == generation)
        {
            state.in_flight = None;
            match &outcome {
                Ok(templates) => {
                    state.templates = Arc::clone(templates);
                    state.last_fetch = Some(Instant::now());
                }
                Err(error) => {
                    warn!(target: TEMPLATES_TARGET, %error, "template fetch failed");
                }
            }
        }
        outcome
    }

    /// Returns the last fetched listing without fetching.
    #[must_use]
    pub fn cached(&self) -> Listing {
        Arc::clone(&self.lock_state().templates)
    }

    fn lock_state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TemplateCache<ExecutorTemplateSource> {
    /// Cache backed by `TLS` requests on `executor`.
    #[must_use]
    pub fn for_executor(executor: CommandExecutor, refresh: Duration) -> Self {
        Self::new(ExecutorTemplateSource::new(executor), refresh)
    }
}
