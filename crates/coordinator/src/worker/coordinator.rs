//! Fetch/write coordinator
//!
//! Runs a fixed pool of worker threads over two queues. Fetch items are gated
//! by the shared [`BackoffManager`]; successful responses become write items,
//! which always take priority over new fetches so completed responses cannot
//! pile up in memory.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use rand::Rng;
use tracing::{debug, error, info, info_span, warn};
use uuid::Uuid;

use super::item::{FetchItem, WorkItem, WriteItem};
use super::queue::WorkQueue;
use super::stats::{ProcessStats, ProcessSummary};
use crate::config::CoordinatorConfig;
use crate::error::CoordinatorError;
use crate::operation::OperationModel;
use crate::reliability::{AbortReason, BackoffManager};

type FetchQueue<M> = WorkQueue<FetchItem<<M as OperationModel>::RequestArg>>;
type WriteQueue<M> =
    WorkQueue<WriteItem<<M as OperationModel>::RequestArg, <M as OperationModel>::Response>>;

/// Outcome of waiting for the permission token
enum Gate {
    Granted,
    Aborted(AbortReason),
    Halted,
}

/// Keeps a claimed fetch item counted as active until it has finished,
/// including when a collaborator call unwinds.
struct ActiveFetch<'c> {
    counter: &'c AtomicUsize,
}

impl Drop for ActiveFetch<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Stops the other workers when this one unwinds.
struct WorkerGuard<'c> {
    index: usize,
    halted: &'c AtomicBool,
}

impl Drop for WorkerGuard<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.halted.store(true, Ordering::SeqCst);
            error!(worker = self.index, "Worker panicked, halting run");
        }
    }
}

/// Coordinates fetching and writing across a worker pool
///
/// # Example
///
/// ```ignore
/// use fetchwrite_coordinator::{CoordinatorConfig, FetchWriteCoordinator};
///
/// let operations = MyOperations::new();
/// let config = CoordinatorConfig::from_env().with_max_threads(8);
///
/// let mut coordinator = FetchWriteCoordinator::new(config, &operations)?;
/// let summary = coordinator.process()?;
/// println!("wrote {} of {} requests", summary.written, summary.requests);
/// ```
pub struct FetchWriteCoordinator<'a, M: OperationModel> {
    config: CoordinatorConfig,
    operations: &'a M,
    backoff: BackoffManager,
    fetch_queue: FetchQueue<M>,
    write_queue: WriteQueue<M>,
    /// Fetch items being executed right now, not merely queued
    active_fetch_tasks: AtomicUsize,
    halted: AtomicBool,
    stats: ProcessStats,
}

impl<'a, M: OperationModel> FetchWriteCoordinator<'a, M> {
    /// Create a coordinator over `operations`
    ///
    /// Fails if the configuration does not validate.
    pub fn new(config: CoordinatorConfig, operations: &'a M) -> Result<Self, CoordinatorError> {
        config.validate()?;
        Ok(Self {
            backoff: BackoffManager::new(config.backoff.clone()),
            config,
            operations,
            fetch_queue: WorkQueue::new(),
            write_queue: WorkQueue::new(),
            active_fetch_tasks: AtomicUsize::new(0),
            halted: AtomicBool::new(false),
            stats: ProcessStats::default(),
        })
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// The limiter shared by all workers
    pub fn backoff(&self) -> &BackoffManager {
        &self.backoff
    }

    /// Fetch items waiting in the queue
    pub fn pending_fetches(&self) -> usize {
        self.fetch_queue.len()
    }

    /// Successful responses waiting to be written
    pub fn pending_writes(&self) -> usize {
        self.write_queue.len()
    }

    pub fn active_fetch_tasks(&self) -> usize {
        self.active_fetch_tasks.load(Ordering::SeqCst)
    }

    /// Seed the queue and run the worker pool to completion
    ///
    /// Every call starts from a fresh limiter and empty queues. Returns once both queues are drained and no fetch is executing. If a
    /// worker panics the remaining workers stop at their next iteration and
    /// [`CoordinatorError::WorkerPanicked`] is returned.
    pub fn process(&mut self) -> Result<ProcessSummary, CoordinatorError> {
        // Limiter, queues and counters belong to a single run
        self.backoff = BackoffManager::new(self.config.backoff.clone());
        self.fetch_queue = WorkQueue::new();
        self.write_queue = WorkQueue::new();
        *self.active_fetch_tasks.get_mut() = 0;
        *self.halted.get_mut() = false;
        self.stats = ProcessStats::default();

        let run_id = Uuid::now_v7();
        let span = info_span!("process", %run_id);
        let _enter = span.enter();
        let started = Instant::now();

        let requests = self.initialize();
        info!(
            max_threads = self.config.max_threads,
            max_attempts_per_request = self.config.max_attempts_per_request,
            requests,
            "Starting fetch/write workers"
        );

        let this = &*self;
        let mut panicked = 0;
        let spawned = thread::scope(|scope| {
            let mut handles = Vec::with_capacity(this.config.max_threads);
            let mut spawn_error = None;

            for index in 0..this.config.max_threads {
                let parent = span.clone();
                let worker = thread::Builder::new()
                    .name(format!("fetchwrite-worker-{index}"))
                    .spawn_scoped(scope, move || {
                        let _span = info_span!(parent: &parent, "worker", index).entered();
                        this.worker_loop(index);
                    });
                match worker {
                    Ok(handle) => handles.push(handle),
                    Err(err) => {
                        this.halted.store(true, Ordering::SeqCst);
                        spawn_error = Some(err);
                        break;
                    }
                }
            }

            for handle in handles {
                if handle.join().is_err() {
                    panicked += 1;
                }
            }

            spawn_error.map_or(Ok(()), Err)
        });

        if let Err(err) = spawned {
            error!(error = %err, "Failed to start worker pool");
            return Err(CoordinatorError::Spawn(err));
        }
        if panicked > 0 {
            error!(
                workers = panicked,
                pending_fetches = self.pending_fetches(),
                pending_writes = self.pending_writes(),
                "Run aborted after worker panic"
            );
            return Err(CoordinatorError::WorkerPanicked { workers: panicked });
        }

        let summary = self
            .stats
            .summary(requests, started.elapsed(), self.backoff.snapshot());
        info!(
            requests = summary.requests,
            attempts = summary.attempts,
            written = summary.written,
            definitive_failures = summary.definitive_failures,
            aborted = summary.aborted,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "Fetch/write run finished"
        );
        Ok(summary)
    }

    /// Seed the fetch queue with first attempts
    fn initialize(&self) -> usize {
        let arguments = self.operations.initial_operation();
        let count = arguments.len();
        for argument in arguments {
            debug!(argument = ?argument, "Adding request to fetch queue");
            self.fetch_queue.push(FetchItem::initial(argument));
        }
        count
    }

    fn worker_loop(&self, index: usize) {
        let _guard = WorkerGuard {
            index,
            halted: &self.halted,
        };

        loop {
            if self.halted.load(Ordering::SeqCst) {
                debug!("Worker stopping, run halted");
                break;
            }

            match self.next_work_item() {
                Some(WorkItem::Write(item)) => self.run_write_item(item),
                Some(WorkItem::Fetch(item)) => {
                    let _active = ActiveFetch {
                        counter: &self.active_fetch_tasks,
                    };
                    self.run_fetch_item(item);
                }
                None if self.is_finished() => {
                    debug!("No work left, worker exiting");
                    break;
                }
                None => thread::sleep(self.config.thread_sleep_if_no_work),
            }
        }
    }

    /// Writes first, then fetches
    ///
    /// A fetch item is counted as active before the fetch queue lock is
    /// released; the caller owns the matching decrement.
    fn next_work_item(&self) -> Option<WorkItem<M::RequestArg, M::Response>> {
        if let Some(item) = self.write_queue.try_dequeue() {
            return Some(WorkItem::Write(item));
        }
        self.fetch_queue
            .try_dequeue_claimed(|_| {
                self.active_fetch_tasks.fetch_add(1, Ordering::SeqCst);
            })
            .map(WorkItem::Fetch)
    }

    /// Both queues empty and no fetch in flight
    ///
    /// An executing fetch queues its retry or write before it stops counting
    /// as active, so the write queue is checked last.
    fn is_finished(&self) -> bool {
        self.fetch_queue
            .is_empty_and(|| self.active_fetch_tasks.load(Ordering::SeqCst) == 0)
            && self.write_queue.is_empty()
    }

    fn run_fetch_item(&self, item: FetchItem<M::RequestArg>) {
        match self.acquire_permission(item.attempt) {
            Gate::Granted => {}
            Gate::Aborted(reason) => return self.abort(item.argument, reason),
            Gate::Halted => return,
        }

        debug!(argument = ?item.argument, attempt = item.attempt, "Fetching from API");
        self.stats.record_attempt();
        let response = self.operations.fetch_from_api(&item.argument);

        if self.operations.response_succeeded(&response) {
            info!(
                argument = ?item.argument,
                attempt = item.attempt,
                "Request succeeded"
            );
            self.backoff.reset_backoff();
            self.write_queue.push(WriteItem {
                argument: item.argument,
                response,
            });
            return;
        }

        self.backoff.increase_backoff();

        if item.attempt >= self.config.max_attempts_per_request {
            error!(
                argument = ?item.argument,
                response = ?response,
                attempts = item.attempt,
                "Request failed definitively"
            );
            self.stats.record_definitive_failure();
            self.operations
                .upon_definitive_request_failure(item.argument, response);
        } else if let Some(reason) = self.breaker_trip(item.attempt) {
            self.abort(item.argument, reason);
        } else {
            warn!(
                argument = ?item.argument,
                response = ?response,
                attempt = item.attempt,
                next_delay_ms = self.backoff.current_delay().as_millis() as u64,
                "Request failed, retrying"
            );
            self.stats.record_retry();
            self.fetch_queue.push(item.retry());
        }
    }

    fn run_write_item(&self, item: WriteItem<M::RequestArg, M::Response>) {
        debug!(argument = ?item.argument, "Writing fetched data");
        self.operations
            .write_fetched_data(item.argument, item.response);
        self.stats.record_written();
    }

    /// Wait for the permission token, re-checking the breaker on every pass
    fn acquire_permission(&self, attempt: u32) -> Gate {
        loop {
            if self.halted.load(Ordering::SeqCst) {
                return Gate::Halted;
            }
            if let Some(reason) = self.breaker_trip(attempt) {
                return Gate::Aborted(reason);
            }

            let wait = self.backoff.wait_time();
            if wait.is_zero() && self.backoff.acquire_api_call_permission() {
                return Gate::Granted;
            }

            let pause = wait.min(self.config.max_wait_slice) + self.jitter();
            if pause.is_zero() {
                thread::yield_now();
            } else {
                thread::sleep(pause);
            }
        }
    }

    fn breaker_trip(&self, attempt: u32) -> Option<AbortReason> {
        if !self.backoff.has_exceeded_max_time_in_subsequent_backoff() {
            return None;
        }
        Some(AbortReason::CircuitBreakerTripped {
            attempt,
            episode_elapsed: self.backoff.episode_elapsed().unwrap_or_default(),
            limit: self.config.backoff.max_time_in_subsequent_backoff,
        })
    }

    fn abort(&self, argument: M::RequestArg, reason: AbortReason) {
        warn!(argument = ?argument, reason = %reason, "Request aborted");
        self.stats.record_aborted();
        self.operations.upon_request_abortion(argument, reason);
    }

    fn jitter(&self) -> Duration {
        let max = self.config.max_wait_jitter.as_secs_f64();
        if max <= 0.0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(rand::thread_rng().gen_range(0.0..max))
    }
}
