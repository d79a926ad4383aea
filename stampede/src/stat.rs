use core::time::Duration;
use std::{collections::HashMap, sync::Mutex};

use serde::Serialize;

use crate::{http::Outcome, quantile::Percentiles};

/// Aggregated request counters and timings.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Metrics {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    /// Sum of latencies over all successful requests.
    #[serde(serialize_with = "ser::duration_us")]
    pub total_latency: Duration,
    /// Unset until the first successful request.
    #[serde(serialize_with = "ser::opt_duration_us")]
    pub min_latency: Option<Duration>,
    #[serde(serialize_with = "ser::opt_duration_us")]
    pub max_latency: Option<Duration>,
    /// Occurrences per status code.
    pub status_codes: HashMap<u16, u64>,
    /// Raw latency samples in microseconds, kept for percentile computation.
    #[serde(skip)]
    pub latencies_us: Vec<u64>,
    /// Total wall-clock run duration, set once at run end.
    #[serde(serialize_with = "ser::duration_us")]
    pub duration: Duration,
}

impl Metrics {
    /// Mean latency over successful requests.
    pub fn mean_latency(&self) -> Option<Duration> {
        if self.successful_requests == 0 {
            return None;
        }

        Some(self.total_latency / self.successful_requests as u32)
    }
}

/// Thread-safe sink for request outcomes.
///
/// Workers call [`record`][Collector::record] concurrently; the lock is held
/// only for the O(1) counter updates. Percentile computation takes a snapshot
/// and runs outside the lock so late recorders are never blocked behind the
/// sort.
#[derive(Debug, Default)]
pub struct Collector {
    metrics: Mutex<Metrics>,
}

impl Collector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds a single outcome into the metrics.
    ///
    /// Failed outcomes bump the failure counter only; no latency or status
    /// is recorded for them.
    pub fn record(&self, outcome: &Outcome) {
        let mut m = self.metrics.lock().unwrap();

        m.total_requests += 1;
        if outcome.success {
            m.successful_requests += 1;

            let latency = outcome.latency;
            m.total_latency += latency;
            m.min_latency = Some(m.min_latency.map_or(latency, |v| v.min(latency)));
            m.max_latency = Some(m.max_latency.map_or(latency, |v| v.max(latency)));
            m.latencies_us.push(latency.as_micros() as u64);

            *m.status_codes.entry(outcome.status).or_insert(0) += 1;
        } else {
            m.failed_requests += 1;
        }
    }

    /// Returns a consistent snapshot of the metrics.
    pub fn metrics(&self) -> Metrics {
        self.metrics.lock().unwrap().clone()
    }

    pub fn set_duration(&self, duration: Duration) {
        self.metrics.lock().unwrap().duration = duration;
    }

    /// Computes percentiles over the samples recorded so far.
    pub fn percentiles(&self) -> Percentiles {
        let samples = self.metrics.lock().unwrap().latencies_us.clone();

        Percentiles::from_unsorted(samples)
    }
}

pub(crate) mod ser {
    use core::time::Duration;

    use serde::Serializer;

    pub fn duration_us<S: Serializer>(v: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(v.as_micros() as u64)
    }

    pub fn opt_duration_us<S: Serializer>(v: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match v {
            Some(v) => s.serialize_some(&(v.as_micros() as u64)),
            None => s.serialize_none(),
        }
    }
}
