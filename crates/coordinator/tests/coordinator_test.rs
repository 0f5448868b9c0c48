//! End-to-end tests for FetchWriteCoordinator
//!
//! Run with: cargo test -p fetchwrite-coordinator --test coordinator_test
//!
//! Delays are in milliseconds so the scenarios finish quickly; assertions on
//! timing only use lower bounds.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use fetchwrite_coordinator::{
    AbortReason, BackoffConfig, CoordinatorConfig, CoordinatorError, FetchWriteCoordinator,
    OperationModel,
};

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Fetched(&'static str, u32),
    Written(&'static str),
    Failed(&'static str),
    Aborted(&'static str),
}

/// Fake API: each argument fails a scripted number of times before succeeding
struct Scripted {
    arguments: Vec<&'static str>,
    /// Failures before the first success; `None` fails forever
    failures: HashMap<&'static str, Option<u32>>,
    panic_on_write: Option<&'static str>,
    calls: Mutex<HashMap<&'static str, u32>>,
    events: Mutex<Vec<Event>>,
    abort_reasons: Mutex<Vec<AbortReason>>,
}

impl Scripted {
    fn new(script: &[(&'static str, Option<u32>)]) -> Self {
        Self {
            arguments: script.iter().map(|(arg, _)| *arg).collect(),
            failures: script.iter().copied().collect(),
            panic_on_write: None,
            calls: Mutex::new(HashMap::new()),
            events: Mutex::new(Vec::new()),
            abort_reasons: Mutex::new(Vec::new()),
        }
    }

    fn panicking_on_write(mut self, argument: &'static str) -> Self {
        self.panic_on_write = Some(argument);
        self
    }

    fn calls(&self, argument: &str) -> u32 {
        self.calls.lock().get(argument).copied().unwrap_or(0)
    }

    fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    fn count(&self, wanted: impl Fn(&Event) -> bool) -> usize {
        self.events.lock().iter().filter(|e| wanted(e)).count()
    }
}

impl OperationModel for Scripted {
    type RequestArg = &'static str;
    type Response = Result<u32, String>;

    fn initial_operation(&self) -> Vec<&'static str> {
        self.arguments.clone()
    }

    fn fetch_from_api(&self, argument: &&'static str) -> Self::Response {
        let attempt = {
            let mut calls = self.calls.lock();
            let count = calls.entry(*argument).or_insert(0);
            *count += 1;
            *count
        };
        self.events.lock().push(Event::Fetched(*argument, attempt));

        match self.failures.get(argument).copied().flatten() {
            Some(failures) if attempt > failures => Ok(attempt),
            _ => Err(format!("{argument} unavailable")),
        }
    }

    fn response_succeeded(&self, response: &Self::Response) -> bool {
        response.is_ok()
    }

    fn write_fetched_data(&self, argument: &'static str, _response: Self::Response) {
        if self.panic_on_write == Some(argument) {
            panic!("disk full while writing {argument}");
        }
        self.events.lock().push(Event::Written(argument));
    }

    fn upon_definitive_request_failure(&self, argument: &'static str, _response: Self::Response) {
        self.events.lock().push(Event::Failed(argument));
    }

    fn upon_request_abortion(&self, argument: &'static str, reason: AbortReason) {
        self.events.lock().push(Event::Aborted(argument));
        self.abort_reasons.lock().push(reason);
    }
}

fn config(initial_ms: u64, max_ms: u64) -> CoordinatorConfig {
    CoordinatorConfig::new()
        .with_max_threads(4)
        .with_max_attempts_per_request(3)
        .with_thread_sleep_if_no_work(Duration::from_millis(1))
        .with_max_wait_jitter(Duration::from_millis(1))
        .with_max_wait_slice(Duration::from_millis(5))
        .with_backoff(
            BackoffConfig::new()
                .with_initial_delay(Duration::from_millis(initial_ms))
                .with_max_delay(Duration::from_millis(max_ms))
                .with_backoff_factor(2.0)
                .with_max_time_in_subsequent_backoff(Duration::from_secs(60)),
        )
}

#[test_log::test]
fn test_always_failing_request_exhausts_attempts() {
    let operations = Scripted::new(&[("x", None)]);
    let mut coordinator = FetchWriteCoordinator::new(config(10, 600), &operations).unwrap();

    let summary = coordinator.process().unwrap();

    assert_eq!(operations.calls("x"), 3);
    assert_eq!(operations.count(|e| *e == Event::Failed("x")), 1);
    assert_eq!(operations.count(|e| matches!(e, Event::Written(_))), 0);
    assert_eq!(summary.attempts, 3);
    assert_eq!(summary.retries, 2);
    assert_eq!(summary.definitive_failures, 1);

    // Attempts were spaced by 10ms then 20ms, leaving the delay at 80ms
    assert!(summary.elapsed >= Duration::from_millis(30));
    assert_eq!(coordinator.backoff().current_delay(), Duration::from_millis(80));
    assert!(!coordinator.backoff().is_reset());
}

#[test]
fn test_request_succeeding_on_later_attempt_is_written_once() {
    let operations = Scripted::new(&[("a", Some(0)), ("b", Some(1)), ("c", Some(2))]);
    let mut coordinator = FetchWriteCoordinator::new(config(1, 8), &operations).unwrap();

    let summary = coordinator.process().unwrap();

    for (argument, attempts) in [("a", 1), ("b", 2), ("c", 3)] {
        assert_eq!(operations.calls(argument), attempts);
        assert_eq!(operations.count(|e| *e == Event::Written(argument)), 1);
    }
    assert_eq!(operations.count(|e| matches!(e, Event::Failed(_))), 0);
    assert_eq!(summary.written, 3);
    assert_eq!(summary.attempts, 6);
    assert_eq!(summary.definitive_failures, 0);
}

#[test]
fn test_every_request_reaches_one_terminal_outcome() {
    const ARGS: [&str; 20] = [
        "r00", "r01", "r02", "r03", "r04", "r05", "r06", "r07", "r08", "r09", "r10", "r11",
        "r12", "r13", "r14", "r15", "r16", "r17", "r18", "r19",
    ];
    let script: Vec<_> = ARGS
        .iter()
        .enumerate()
        .map(|(i, arg)| (*arg, if i % 4 == 0 { None } else { Some((i % 3) as u32) }))
        .collect();
    let operations = Scripted::new(&script);
    let mut coordinator = FetchWriteCoordinator::new(config(1, 4), &operations).unwrap();

    let summary = coordinator.process().unwrap();

    for (i, &arg) in ARGS.iter().enumerate() {
        let written = operations.count(|e| *e == Event::Written(arg));
        let failed = operations.count(|e| *e == Event::Failed(arg));
        if i % 4 == 0 {
            assert_eq!((written, failed), (0, 1), "{arg}");
            assert_eq!(operations.calls(arg), 3, "{arg}");
        } else {
            assert_eq!((written, failed), (1, 0), "{arg}");
        }
    }
    assert_eq!(summary.requests, 20);
    assert_eq!(summary.completed(), 20);
    assert_eq!(summary.written, 15);
    assert_eq!(summary.definitive_failures, 5);

    assert_eq!(coordinator.pending_fetches(), 0);
    assert_eq!(coordinator.pending_writes(), 0);
    assert_eq!(coordinator.active_fetch_tasks(), 0);
}

#[test_log::test]
fn test_circuit_breaker_aborts_remaining_requests() {
    let operations = Scripted::new(&[("a", None), ("b", None), ("c", None)]);
    let config = config(2, 5)
        .with_max_attempts_per_request(1_000)
        .with_backoff(
            BackoffConfig::new()
                .with_initial_delay(Duration::from_millis(2))
                .with_max_delay(Duration::from_millis(5))
                .with_max_time_in_subsequent_backoff(Duration::from_millis(30)),
        );
    let mut coordinator = FetchWriteCoordinator::new(config, &operations).unwrap();

    let summary = coordinator.process().unwrap();

    assert_eq!(summary.aborted, 3);
    assert_eq!(summary.definitive_failures, 0);
    assert_eq!(summary.written, 0);
    for arg in ["a", "b", "c"] {
        assert_eq!(operations.count(|e| *e == Event::Aborted(arg)), 1, "{arg}");
        assert!(operations.calls(arg) < 1_000);
    }
    for reason in operations.abort_reasons.lock().iter() {
        let AbortReason::CircuitBreakerTripped {
            episode_elapsed,
            limit,
            ..
        } = reason;
        assert_eq!(*limit, Duration::from_millis(30));
        assert!(*episode_elapsed > Duration::from_millis(30));
    }
    assert!(coordinator.backoff().has_exceeded_max_time_in_subsequent_backoff());
}

#[test]
fn test_single_worker_writes_before_next_fetch() {
    let operations = Scripted::new(&[("a", Some(0)), ("b", Some(0)), ("c", Some(0))]);
    let mut coordinator =
        FetchWriteCoordinator::new(config(1, 4).with_max_threads(1), &operations).unwrap();

    coordinator.process().unwrap();

    assert_eq!(
        operations.events(),
        vec![
            Event::Fetched("a", 1),
            Event::Written("a"),
            Event::Fetched("b", 1),
            Event::Written("b"),
            Event::Fetched("c", 1),
            Event::Written("c"),
        ]
    );
}

#[test]
fn test_fetch_rate_independent_of_pool_size() {
    const ARGS: [&str; 10] = ["0", "1", "2", "3", "4", "5", "6", "7", "8", "9"];
    let script: Vec<_> = ARGS.iter().map(|arg| (*arg, Some(0))).collect();
    let operations = Scripted::new(&script);
    let mut coordinator =
        FetchWriteCoordinator::new(config(10, 10).with_max_threads(8), &operations).unwrap();

    let summary = coordinator.process().unwrap();

    assert_eq!(summary.written, 10);
    // Ten grants, each at least 10ms after the previous one
    assert!(summary.elapsed >= Duration::from_millis(90));
}

#[test]
fn test_worker_panic_aborts_run() {
    let operations = Scripted::new(&[("ok-1", Some(0)), ("boom", Some(0)), ("ok-2", Some(0))])
        .panicking_on_write("boom");
    let mut coordinator = FetchWriteCoordinator::new(config(1, 4), &operations).unwrap();

    let result = coordinator.process();

    assert!(matches!(
        result,
        Err(CoordinatorError::WorkerPanicked { workers: 1 })
    ));
    assert_eq!(coordinator.active_fetch_tasks(), 0);
}

#[test]
fn test_empty_initial_operation_returns_immediately() {
    let operations = Scripted::new(&[]);
    let mut coordinator = FetchWriteCoordinator::new(config(1, 4), &operations).unwrap();

    let summary = coordinator.process().unwrap();

    assert_eq!(summary.requests, 0);
    assert_eq!(summary.attempts, 0);
    assert_eq!(summary.completed(), 0);
    assert!(operations.events().is_empty());
}

/// API that fails every call until it is switched back on
struct Outage {
    healthy: AtomicBool,
}

impl OperationModel for Outage {
    type RequestArg = u32;
    type Response = bool;

    fn initial_operation(&self) -> Vec<u32> {
        vec![1, 2]
    }

    fn fetch_from_api(&self, _argument: &u32) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    fn response_succeeded(&self, response: &bool) -> bool {
        *response
    }

    fn write_fetched_data(&self, _argument: u32, _response: bool) {}
}

#[test_log::test]
fn test_tripped_breaker_does_not_carry_into_next_run() {
    let operations = Outage {
        healthy: AtomicBool::new(false),
    };
    let config = config(2, 5)
        .with_max_attempts_per_request(1_000)
        .with_backoff(
            BackoffConfig::new()
                .with_initial_delay(Duration::from_millis(2))
                .with_max_delay(Duration::from_millis(5))
                .with_max_time_in_subsequent_backoff(Duration::from_millis(20)),
        );
    let mut coordinator = FetchWriteCoordinator::new(config, &operations).unwrap();

    let first = coordinator.process().unwrap();
    assert_eq!((first.aborted, first.written), (2, 0));

    operations.healthy.store(true, Ordering::SeqCst);
    let second = coordinator.process().unwrap();

    assert_eq!(second.requests, 2);
    assert_eq!(second.attempts, 2);
    assert_eq!((second.written, second.aborted), (2, 0));
    assert!(coordinator.backoff().is_reset());
}
