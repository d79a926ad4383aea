use core::{
    sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering},
    time::Duration,
};
use std::{sync::Arc, time::Instant};

use anyhow::Error;
use serde::Serialize;

use crate::{
    cfg::Config,
    http::{Client, Request, Transport},
    pool::WorkerPool,
    quantile::Percentiles,
    stat::{Collector, Metrics},
};

/// How often the completion wait re-checks the stop predicate.
///
/// Completion itself is signalled by the pool's barrier; this only bounds how
/// late an explicit stop or the deadline is observed.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Aggregate result of one load run.
#[derive(Debug, Clone, Serialize)]
pub struct Results {
    pub metrics: Metrics,
    pub percentiles: Percentiles,
    /// Total wall-clock run duration.
    #[serde(serialize_with = "crate::stat::ser::duration_us")]
    pub duration: Duration,
    /// Throughput over the whole run, failed requests included.
    pub requests_per_second: f64,
}

/// Run lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum State {
    Idle = 0,
    Running = 1,
    Stopping = 2,
    Done = 3,
}

impl State {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Idle,
            1 => Self::Running,
            2 => Self::Stopping,
            _ => Self::Done,
        }
    }
}

/// Load-run orchestrator.
///
/// Turns a [`Config`] into a bounded concurrent run and produces [`Results`].
/// The submission strategy depends on which limits are set: a request target
/// yields one discrete task per request, a bare duration yields one
/// continuous task per worker. With both limits set the run ends on whichever
/// of {target reached, deadline reached, explicit stop} happens first.
pub struct Engine {
    shared: Arc<Shared>,
    state: AtomicU8,
}

struct Shared {
    cfg: Config,
    /// Prebuilt request, identical for every attempt.
    request: Request,
    transport: Box<dyn Transport>,
    collector: Collector,
    stop_requested: AtomicBool,
    /// Single source of truth for finished attempts, successful or not.
    completed: AtomicU64,
}

impl Engine {
    /// Constructs an engine over the default blocking transport.
    pub fn new(cfg: Config) -> Self {
        let transport = Box::new(Client::new(cfg.timeout));

        Self::with_transport(cfg, transport)
    }

    /// Constructs an engine over a caller-provided transport.
    pub fn with_transport(cfg: Config, transport: Box<dyn Transport>) -> Self {
        let request = Request::new(cfg.url.clone(), cfg.method.clone());

        let shared = Arc::new(Shared {
            cfg,
            request,
            transport,
            collector: Collector::new(),
            stop_requested: AtomicBool::new(false),
            completed: AtomicU64::new(0),
        });

        Self {
            shared,
            state: AtomicU8::new(State::Idle as u8),
        }
    }

    #[inline]
    pub fn state(&self) -> State {
        State::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Number of finished request attempts so far.
    #[inline]
    pub fn requests_completed(&self) -> u64 {
        self.shared.completed.load(Ordering::Relaxed)
    }

    /// Requests a cooperative stop.
    ///
    /// Callable from any thread and idempotent. An in-flight request is never
    /// interrupted; the run winds down once every worker observes the flag.
    pub fn stop(&self) {
        self.shared.stop_requested.store(true, Ordering::SeqCst);

        let _ = self.state.compare_exchange(
            State::Running as u8,
            State::Stopping as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    /// Runs the load test to completion, blocking the caller.
    ///
    /// Always produces [`Results`], even when every request fails or the run
    /// is stopped early; the only error path is worker-thread spawn failure.
    pub fn run(&self) -> Result<Results, Error> {
        let start = Instant::now();
        self.state.store(State::Running as u8, Ordering::SeqCst);

        let deadline = self.shared.cfg.duration.map(|d| start + d);

        let mut pool = WorkerPool::new(self.shared.cfg.concurrency)?;

        match self.shared.cfg.requests {
            Some(requests) => {
                // One discrete task per request. Each task re-checks the stop
                // predicate, so after a stop or an expired deadline the
                // remaining backlog drains without issuing requests.
                for _ in 0..requests {
                    let shared = self.shared.clone();
                    pool.submit(move || {
                        if shared.should_continue(deadline) {
                            shared.execute_request();
                        }
                    });
                }
            }
            None => {
                for _ in 0..self.shared.cfg.concurrency.get() {
                    let shared = self.shared.clone();
                    pool.submit(move || {
                        while shared.should_continue(deadline) {
                            shared.execute_request();
                        }
                    });
                }
            }
        }

        loop {
            if pool.wait_for_completion_timeout(POLL_INTERVAL) {
                break;
            }
            if !self.shared.should_continue(deadline) {
                break;
            }
        }

        self.state.store(State::Stopping as u8, Ordering::SeqCst);
        pool.shutdown();

        let duration = start.elapsed();
        self.shared.collector.set_duration(duration);

        let metrics = self.shared.collector.metrics();
        let percentiles = self.shared.collector.percentiles();

        let secs = duration.as_secs_f64();
        let requests_per_second = if secs > 0.0 {
            metrics.total_requests as f64 / secs
        } else {
            0.0
        };

        self.state.store(State::Done as u8, Ordering::SeqCst);

        let m = Results {
            metrics,
            percentiles,
            duration,
            requests_per_second,
        };

        Ok(m)
    }
}

impl Shared {
    /// Shared stop predicate consulted by continuous tasks, discrete tasks
    /// and the completion wait alike.
    fn should_continue(&self, deadline: Option<Instant>) -> bool {
        if self.stop_requested.load(Ordering::SeqCst) {
            return false;
        }
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                return false;
            }
        }
        if let Some(requests) = self.cfg.requests {
            if self.completed.load(Ordering::Relaxed) >= requests {
                return false;
            }
        }

        true
    }

    fn execute_request(&self) {
        let outcome = self.transport.execute(&self.request);
        self.collector.record(&outcome);
        self.completed.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod test {
    use core::num::NonZero;
    use std::thread;

    use super::*;
    use crate::http::Outcome;

    /// Transport stub answering every request with a fixed status after a
    /// fixed artificial delay.
    struct StubTransport {
        status: u16,
        latency: Duration,
    }

    impl StubTransport {
        fn ok() -> Self {
            Self {
                status: 200,
                latency: Duration::from_millis(1),
            }
        }
    }

    impl Transport for StubTransport {
        fn execute(&self, _request: &Request) -> Outcome {
            if !self.latency.is_zero() {
                thread::sleep(self.latency);
            }

            Outcome::response(self.status, Default::default(), self.latency)
        }
    }

    struct FailingTransport;

    impl Transport for FailingTransport {
        fn execute(&self, _request: &Request) -> Outcome {
            Outcome::failure("connection refused", Duration::from_micros(10))
        }
    }

    fn cfg(requests: Option<u64>, duration: Option<Duration>, concurrency: usize) -> Config {
        Config {
            url: "http://localhost:8080/".into(),
            method: "GET".into(),
            concurrency: NonZero::new(concurrency).unwrap(),
            requests,
            duration,
            timeout: None,
        }
    }

    #[test]
    fn test_count_mode() {
        let engine = Engine::with_transport(cfg(Some(5), None, 3), Box::new(StubTransport::ok()));
        let results = engine.run().unwrap();

        let m = &results.metrics;
        assert_eq!(m.total_requests, 5);
        assert_eq!(m.successful_requests, 5);
        assert_eq!(m.failed_requests, 0);
        assert_eq!(m.status_codes.get(&200), Some(&5));
        assert_eq!(engine.requests_completed(), 5);
        assert_eq!(engine.state(), State::Done);

        let expected = 5.0 / results.duration.as_secs_f64();
        assert!((results.requests_per_second - expected).abs() < 1e-6);
    }

    #[test]
    fn test_duration_mode() {
        let engine = Engine::with_transport(
            cfg(None, Some(Duration::from_secs(1)), 2),
            Box::new(StubTransport::ok()),
        );

        let now = Instant::now();
        let results = engine.run().unwrap();
        let elapsed = now.elapsed();

        assert!(results.metrics.total_requests > 0);
        assert!(engine.requests_completed() > 0);
        assert!(
            elapsed < Duration::from_millis(1500),
            "run took too long: {elapsed:?}"
        );
    }

    #[test]
    fn test_stop_mid_run() {
        let engine = Engine::with_transport(
            cfg(None, Some(Duration::from_secs(60)), 2),
            Box::new(StubTransport::ok()),
        );

        let results = thread::scope(|scope| {
            let run = scope.spawn(|| engine.run().unwrap());

            while engine.requests_completed() == 0 {
                thread::sleep(Duration::from_millis(5));
            }

            let now = Instant::now();
            engine.stop();
            let results = run.join().unwrap();

            assert!(
                now.elapsed() < Duration::from_millis(500),
                "stop was not observed promptly"
            );

            results
        });

        assert_eq!(engine.state(), State::Done);
        assert!(results.metrics.total_requests > 0);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let engine = Engine::with_transport(cfg(Some(1), None, 1), Box::new(StubTransport::ok()));
        engine.stop();
        engine.stop();

        // A stop before the run means no task passes the predicate.
        let results = engine.run().unwrap();
        assert_eq!(results.metrics.total_requests, 0);
    }

    #[test]
    fn test_combined_mode_deadline_first() {
        let engine = Engine::with_transport(
            cfg(Some(100_000), Some(Duration::from_millis(200)), 2),
            Box::new(StubTransport {
                status: 200,
                latency: Duration::from_millis(5),
            }),
        );

        let now = Instant::now();
        let results = engine.run().unwrap();

        assert!(results.metrics.total_requests < 100_000);
        assert!(now.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_combined_mode_count_first() {
        let engine = Engine::with_transport(
            cfg(Some(20), Some(Duration::from_secs(60)), 4),
            Box::new(StubTransport {
                status: 200,
                latency: Duration::ZERO,
            }),
        );

        let now = Instant::now();
        let results = engine.run().unwrap();

        assert_eq!(results.metrics.total_requests, 20);
        assert!(now.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_all_failures_still_produce_results() {
        let engine = Engine::with_transport(cfg(Some(10), None, 2), Box::new(FailingTransport));
        let results = engine.run().unwrap();

        let m = &results.metrics;
        assert_eq!(m.total_requests, 10);
        assert_eq!(m.failed_requests, 10);
        assert_eq!(m.successful_requests, 0);
        assert_eq!(results.percentiles, Percentiles::default());
    }

    #[test]
    fn test_fixed_latency_percentiles() {
        let engine = Engine::with_transport(cfg(Some(8), None, 2), Box::new(StubTransport::ok()));
        let results = engine.run().unwrap();

        // All samples equal, so every percentile matches the stub delay.
        assert_eq!(results.percentiles.p50, results.percentiles.p999);
        assert!(results.percentiles.p50 >= 1000);
    }
}
