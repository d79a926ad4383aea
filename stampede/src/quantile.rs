use serde::Serialize;

/// Latency percentiles, in microseconds.
///
/// Derived once per run from the raw sample set; all-zero when the run
/// produced no successful requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Percentiles {
    pub p50: u64,
    pub p75: u64,
    pub p90: u64,
    pub p95: u64,
    pub p99: u64,
    pub p999: u64,
}

impl Percentiles {
    /// Computes percentiles from unsorted samples.
    ///
    /// Sorts ascending, then for each percentile takes the fractional rank
    /// `p * (n - 1)` and linearly interpolates between the two neighboring
    /// samples.
    pub fn from_unsorted(mut samples: Vec<u64>) -> Self {
        if samples.is_empty() {
            return Self::default();
        }

        samples.sort_unstable();

        Self {
            p50: value_at(&samples, 0.50),
            p75: value_at(&samples, 0.75),
            p90: value_at(&samples, 0.90),
            p95: value_at(&samples, 0.95),
            p99: value_at(&samples, 0.99),
            p999: value_at(&samples, 0.999),
        }
    }
}

fn value_at(sorted: &[u64], q: f64) -> u64 {
    let idx = q * (sorted.len() - 1) as f64;

    let lo = idx as usize;
    let hi = lo + 1;
    if hi >= sorted.len() {
        return sorted[lo];
    }

    let fraction = idx - lo as f64;

    (sorted[lo] as f64 + fraction * (sorted[hi] - sorted[lo]) as f64) as u64
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_empty() {
        assert_eq!(Percentiles::from_unsorted(Vec::new()), Percentiles::default());
    }

    #[test]
    fn test_single_sample() {
        let p = Percentiles::from_unsorted(vec![42]);

        assert_eq!(p.p50, 42);
        assert_eq!(p.p75, 42);
        assert_eq!(p.p90, 42);
        assert_eq!(p.p95, 42);
        assert_eq!(p.p99, 42);
        assert_eq!(p.p999, 42);
    }

    #[test]
    fn test_interpolation() {
        // Rank index for p50 is 0.5 * 3 = 1.5, halfway between 20 and 30.
        let p = Percentiles::from_unsorted(vec![40, 10, 30, 20]);

        assert_eq!(p.p50, 25);
        assert_eq!(p.p75, 32);
        assert_eq!(p.p999, 39);
    }

    #[test]
    fn test_monotonic() {
        let samples: Vec<u64> = (0..1000).map(|v| (v * 7919) % 100_000).collect();
        let p = Percentiles::from_unsorted(samples);

        assert!(p.p50 <= p.p75);
        assert!(p.p75 <= p.p90);
        assert!(p.p90 <= p.p95);
        assert!(p.p95 <= p.p99);
        assert!(p.p99 <= p.p999);
    }
}
