//! Crawl orchestrator for draining labeled job queues.
//!
//! This module provides the [`Orchestrator`], which dispatches labeled
//! requests to driver-supplied handlers across a bounded worker pool, with
//! retry for transient failures, per-run request pacing and per-queue mutual
//! exclusion for browser runs. A run ends when its queue is drained; failures
//! are per job and never abort the run.

use crate::engine::FetchEngine;
use crate::error::{CrawlError, Result};
use crate::job::{CrawlJob, EngineKind, QueueHandle, RequestLabel, SessionLock};
use crate::throttle::RequestThrottle;
use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use statute_core::CrawlerConfig;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Handler callback invoked once per job.
#[async_trait]
pub trait CrawlHandler<L: RequestLabel, P>: Send + Sync {
    /// Process one job; successors are queued through `ctx.enqueue`.
    async fn handle(&self, ctx: &HandlerContext<'_, L, P>) -> Result<()>;
}

/// What a handler sees for one job.
pub struct HandlerContext<'a, L, P> {
    /// The job being handled
    pub request: &'a CrawlJob<L>,
    /// The fetched page
    pub page: &'a P,
    /// Queue the job belongs to
    pub queue: &'a QueueHandle,
    successors: Mutex<Vec<CrawlJob<L>>>,
}

impl<'a, L: RequestLabel, P> HandlerContext<'a, L, P> {
    fn new(request: &'a CrawlJob<L>, page: &'a P, queue: &'a QueueHandle) -> Self {
        Self {
            request,
            page,
            queue,
            successors: Mutex::new(Vec::new()),
        }
    }

    /// Queue successor jobs. They are only committed if the handler succeeds.
    pub fn enqueue<I>(&self, jobs: I)
    where
        I: IntoIterator<Item = CrawlJob<L>>,
    {
        if let Ok(mut successors) = self.successors.lock() {
            successors.extend(jobs);
        }
    }

    fn into_successors(self) -> Vec<CrawlJob<L>> {
        self.successors.into_inner().unwrap_or_default()
    }
}

/// Retry behavior for transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before retry `n` is `base_delay * n`
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(2000),
        }
    }
}

/// Options for one run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Jobs in flight at once; `None` dispatches everything pending
    pub max_concurrency: Option<usize>,
    /// Start-rate cap
    pub max_requests_per_minute: Option<u32>,
    /// Run on a fresh isolated queue
    pub random_queue: bool,
    /// Explicit queue to run on; defaults to the engine's shared queue
    pub queue: Option<QueueHandle>,
    /// Driver-owned lock held for the duration of the run
    pub session: Option<SessionLock>,
    /// Upper bound on a single handler invocation
    pub handler_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            max_concurrency: None,
            max_requests_per_minute: None,
            random_queue: false,
            queue: None,
            session: None,
            handler_timeout: Duration::from_secs(3600),
            retry: RetryPolicy::default(),
        }
    }
}

impl RunOptions {
    /// Defaults for markup runs from configuration.
    pub fn markup(config: &CrawlerConfig) -> Self {
        Self {
            max_concurrency: config.max_concurrency.map(|max| max.max(1)),
            max_requests_per_minute: Some(config.max_requests_per_minute).filter(|r| *r > 0),
            handler_timeout: Duration::from_secs(config.handler_timeout_secs),
            retry: RetryPolicy {
                max_retries: config.max_retries,
                base_delay: Duration::from_millis(config.retry_delay_ms),
            },
            ..Self::default()
        }
    }

    /// Defaults for browser runs: one tab at a time.
    pub fn browser(config: &CrawlerConfig) -> Self {
        Self {
            max_concurrency: Some(1),
            max_requests_per_minute: None,
            ..Self::markup(config)
        }
    }

    #[must_use]
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = Some(max.max(1));
        self
    }

    #[must_use]
    pub fn with_max_requests_per_minute(mut self, rpm: u32) -> Self {
        self.max_requests_per_minute = Some(rpm);
        self
    }

    #[must_use]
    pub fn with_random_queue(mut self) -> Self {
        self.random_queue = true;
        self
    }

    #[must_use]
    pub fn with_queue(mut self, queue: QueueHandle) -> Self {
        self.queue = Some(queue);
        self
    }

    #[must_use]
    pub fn with_session(mut self, session: SessionLock) -> Self {
        self.session = Some(session);
        self
    }

    #[must_use]
    pub fn with_handler_timeout(mut self, timeout: Duration) -> Self {
        self.handler_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Counters for a drained run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub queue: QueueHandle,
    /// Handler invocations that succeeded
    pub handled: usize,
    /// Jobs that failed after exhausting retries
    pub failed: usize,
    /// Retry attempts made
    pub retried: usize,
}

struct JobOutcome<L> {
    job: CrawlJob<L>,
    attempts: u32,
    result: Result<Vec<CrawlJob<L>>>,
}

/// Dispatches labeled jobs to handlers until the queue drains.
#[derive(Default)]
pub struct Orchestrator {
    queue_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl Orchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    fn queue_lock(&self, queue: &QueueHandle) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .queue_locks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Arc::clone(locks.entry(queue.id().to_string()).or_default())
    }

    /// Run `handler` from a single seed URL labeled `L::start()`.
    pub async fn run<E, H, L>(
        &self,
        engine: &E,
        handler: &H,
        seed_url: &str,
        options: RunOptions,
    ) -> RunSummary
    where
        E: FetchEngine,
        H: CrawlHandler<L, E::Page>,
        L: RequestLabel,
    {
        self.run_jobs(engine, handler, vec![CrawlJob::seed(seed_url)], options)
            .await
    }

    /// Run `handler` from explicit seed jobs.
    pub async fn run_jobs<E, H, L>(
        &self,
        engine: &E,
        handler: &H,
        seeds: Vec<CrawlJob<L>>,
        options: RunOptions,
    ) -> RunSummary
    where
        E: FetchEngine,
        H: CrawlHandler<L, E::Page>,
        L: RequestLabel,
    {
        let kind = engine.kind();
        let queue = if options.random_queue {
            QueueHandle::isolated(kind)
        } else {
            options
                .queue
                .clone()
                .unwrap_or_else(|| QueueHandle::shared(kind))
        };

        // Held until the run returns.
        let _queue_guard = if kind == EngineKind::Browser && !queue.is_isolated() {
            Some(self.queue_lock(&queue).lock_owned().await)
        } else {
            None
        };
        let _session_guard = match &options.session {
            Some(lock) => Some(lock.acquire().await),
            None => None,
        };

        let throttle = RequestThrottle::new(options.max_requests_per_minute);
        let has_room = |in_flight: usize| {
            options
                .max_concurrency
                .map_or(true, |max| in_flight < max)
        };
        let mut pending: VecDeque<CrawlJob<L>> =
            seeds.into_iter().map(|job| job.stamped(kind)).collect();
        let mut in_flight = FuturesUnordered::new();
        let mut summary = RunSummary {
            queue: queue.clone(),
            handled: 0,
            failed: 0,
            retried: 0,
        };

        tracing::debug!(%queue, seeds = pending.len(), "Run started");

        loop {
            while has_room(in_flight.len()) {
                match pending.pop_front() {
                    Some(job) => in_flight.push(Self::process(
                        engine, handler, job, &queue, &options, &throttle,
                    )),
                    None => break,
                }
            }

            let Some(outcome) = in_flight.next().await else {
                break;
            };

            summary.retried += outcome.attempts.saturating_sub(1) as usize;
            match outcome.result {
                Ok(successors) => {
                    summary.handled += 1;
                    pending.extend(successors.into_iter().map(|job| job.stamped(kind)));
                }
                Err(e) => {
                    summary.failed += 1;
                    tracing::error!(
                        url = %outcome.job.url,
                        label = ?outcome.job.label,
                        attempts = outcome.attempts,
                        "Job failed: {}",
                        e
                    );
                }
            }
        }

        tracing::info!(
            %queue,
            handled = summary.handled,
            failed = summary.failed,
            retried = summary.retried,
            "Queue drained"
        );
        summary
    }

    /// Fetch and handle one job, retrying transient failures with backoff.
    async fn process<E, H, L>(
        engine: &E,
        handler: &H,
        job: CrawlJob<L>,
        queue: &QueueHandle,
        options: &RunOptions,
        throttle: &RequestThrottle,
    ) -> JobOutcome<L>
    where
        E: FetchEngine,
        H: CrawlHandler<L, E::Page>,
        L: RequestLabel,
    {
        let mut attempts = 0;
        loop {
            attempts += 1;
            throttle.acquire().await;

            let result = Self::attempt(engine, handler, &job, queue, options.handler_timeout).await;
            match result {
                Err(e) if e.is_transient() && attempts <= options.retry.max_retries => {
                    let delay = options.retry.base_delay * attempts;
                    tracing::warn!(
                        url = %job.url,
                        attempt = attempts,
                        max_retries = options.retry.max_retries,
                        "Transient failure, retrying in {:?}: {}",
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                }
                result => {
                    return JobOutcome {
                        job,
                        attempts,
                        result,
                    }
                }
            }
        }
    }

    async fn attempt<E, H, L>(
        engine: &E,
        handler: &H,
        job: &CrawlJob<L>,
        queue: &QueueHandle,
        handler_timeout: Duration,
    ) -> Result<Vec<CrawlJob<L>>>
    where
        E: FetchEngine,
        H: CrawlHandler<L, E::Page>,
        L: RequestLabel,
    {
        tracing::debug!(url = %job.url, label = ?job.label, "Handling job");
        let page = engine.open(&job.url).await?;

        let ctx = HandlerContext::new(job, &page, queue);
        let handled = tokio::time::timeout(handler_timeout, handler.handle(&ctx)).await;
        let successors = ctx.into_successors();
        engine.release(page).await;

        match handled {
            Ok(Ok(())) => Ok(successors),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(CrawlError::HandlerTimeout {
                url: job.url.clone(),
                timeout: handler_timeout,
            }),
        }
    }
}
