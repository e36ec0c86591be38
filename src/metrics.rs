use parking_lot::Mutex;
use rand::Rng;
use serde::Serialize;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use crate::check::Checks;

/// Counters shared by every virtual user for the lifetime of one run.
#[derive(Debug, Default)]
pub struct Metrics {
    pub checks: Checks,
    iterations: AtomicU64,
    failed_iterations: AtomicU64,
    interrupted_iterations: AtomicU64,
    requests: AtomicU64,
    peak_vus: AtomicU32,
    latencies: Mutex<LatencyReservoir>,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counters {
    pub iterations: u64,
    pub failed_iterations: u64,
    pub interrupted_iterations: u64,
    pub requests: u64,
    pub peak_vus: u32,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps at most `capacity` latency samples for percentiles.
    pub fn with_latency_capacity(capacity: usize) -> Self {
        Self {
            latencies: Mutex::new(LatencyReservoir::with_capacity(capacity)),
            ..Self::default()
        }
    }

    /// A finished iteration. `ok` is false when the iteration errored, not
    /// when a check failed.
    pub fn record_iteration(&self, ok: bool) {
        self.iterations.fetch_add(1, Ordering::Relaxed);
        if !ok {
            self.failed_iterations.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// An iteration cancelled after the graceful-stop window.
    pub fn record_interrupted(&self) {
        self.interrupted_iterations.fetch_add(1, Ordering::Relaxed);
    }

    /// A request that got a response back.
    pub fn record_request(&self, latency: Duration) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.latencies.lock().record(latency, &mut rand::thread_rng());
    }

    pub fn observe_vus(&self, vus: u32) {
        self.peak_vus.fetch_max(vus, Ordering::Relaxed);
    }

    pub fn counters(&self) -> Counters {
        Counters {
            iterations: self.iterations.load(Ordering::Relaxed),
            failed_iterations: self.failed_iterations.load(Ordering::Relaxed),
            interrupted_iterations: self.interrupted_iterations.load(Ordering::Relaxed),
            requests: self.requests.load(Ordering::Relaxed),
            peak_vus: self.peak_vus.load(Ordering::Relaxed),
        }
    }

    pub fn latency_stats(&self) -> LatencyStats {
        self.latencies.lock().stats()
    }
}

pub const LATENCY_RESERVOIR_CAPACITY: usize = 100_000;

/// Bounded latency store. Count, mean, min and max are exact; once more than
/// `capacity` samples arrive, percentiles come from a uniform random sample
/// (Algorithm R).
#[derive(Debug)]
pub struct LatencyReservoir {
    capacity: usize,
    seen: u64,
    sum: Duration,
    min: Duration,
    max: Duration,
    samples: Vec<Duration>,
}

impl Default for LatencyReservoir {
    fn default() -> Self {
        Self::with_capacity(LATENCY_RESERVOIR_CAPACITY)
    }
}

impl LatencyReservoir {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            seen: 0,
            sum: Duration::ZERO,
            min: Duration::MAX,
            max: Duration::ZERO,
            samples: Vec::new(),
        }
    }

    pub fn record<R: Rng + ?Sized>(&mut self, latency: Duration, rng: &mut R) {
        self.seen += 1;
        self.sum = self.sum.saturating_add(latency);
        self.min = self.min.min(latency);
        self.max = self.max.max(latency);
        if self.samples.len() < self.capacity {
            self.samples.push(latency);
        } else {
            let slot = rng.gen_range(0..self.seen);
            if slot < self.capacity as u64 {
                self.samples[slot as usize] = latency;
            }
        }
    }

    /// Samples currently held.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen == 0
    }

    pub fn stats(&self) -> LatencyStats {
        if self.seen == 0 {
            return LatencyStats::default();
        }
        let mut samples = self.samples.clone();
        let sampled = LatencyStats::from_samples(&mut samples);
        LatencyStats {
            count: self.seen as usize,
            min_ms: self.min.as_secs_f64() * 1000.0,
            avg_ms: self.sum.as_secs_f64() * 1000.0 / self.seen as f64,
            max_ms: self.max.as_secs_f64() * 1000.0,
            ..sampled
        }
    }
}

/// Request latency distribution in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LatencyStats {
    pub count: usize,
    pub min_ms: f64,
    pub avg_ms: f64,
    pub med_ms: f64,
    pub p90_ms: f64,
    pub p95_ms: f64,
    pub max_ms: f64,
}

impl LatencyStats {
    pub fn from_samples(samples: &mut [Duration]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        samples.sort_unstable();
        let ms: Vec<f64> = samples.iter().map(|d| d.as_secs_f64() * 1000.0).collect();
        let sum: f64 = ms.iter().sum();
        Self {
            count: ms.len(),
            min_ms: ms[0],
            avg_ms: sum / ms.len() as f64,
            med_ms: percentile(&ms, 50.0),
            p90_ms: percentile(&ms, 90.0),
            p95_ms: percentile(&ms, 95.0),
            max_ms: ms[ms.len() - 1],
        }
    }
}

// Linear interpolation between closest ranks; `sorted` must be non-empty.
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_track_iterations_and_peak_vus() {
        let metrics = Metrics::new();
        metrics.record_iteration(true);
        metrics.record_iteration(false);
        metrics.record_interrupted();
        metrics.observe_vus(5);
        metrics.observe_vus(3);

        let counters = metrics.counters();
        assert_eq!(counters.iterations, 2);
        assert_eq!(counters.failed_iterations, 1);
        assert_eq!(counters.interrupted_iterations, 1);
        assert_eq!(counters.peak_vus, 5);
        assert_eq!(counters.requests, 0);
    }

    #[test]
    fn test_latency_stats_percentiles() {
        let mut samples: Vec<Duration> = (1..=100).rev().map(Duration::from_millis).collect();
        let stats = LatencyStats::from_samples(&mut samples);
        assert_eq!(stats.count, 100);
        assert!((stats.min_ms - 1.0).abs() < 1e-9);
        assert!((stats.max_ms - 100.0).abs() < 1e-9);
        assert!((stats.avg_ms - 50.5).abs() < 1e-9);
        assert!((stats.med_ms - 50.5).abs() < 1e-9);
        assert!((stats.p90_ms - 90.1).abs() < 1e-9);
        assert!((stats.p95_ms - 95.05).abs() < 1e-9);
    }

    #[test]
    fn test_latency_stats_empty() {
        let metrics = Metrics::new();
        assert_eq!(metrics.latency_stats(), LatencyStats::default());
    }

    #[test]
    fn test_reservoir_stays_bounded_with_exact_extremes() {
        use rand::{rngs::StdRng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(7);
        let mut reservoir = LatencyReservoir::with_capacity(10);
        for ms in 1..=1000 {
            reservoir.record(Duration::from_millis(ms), &mut rng);
        }

        assert_eq!(reservoir.len(), 10);
        let stats = reservoir.stats();
        assert_eq!(stats.count, 1000);
        assert!((stats.min_ms - 1.0).abs() < 1e-9);
        assert!((stats.max_ms - 1000.0).abs() < 1e-9);
        assert!((stats.avg_ms - 500.5).abs() < 1e-9);
        assert!(stats.med_ms >= 1.0 && stats.med_ms <= 1000.0);
        assert!(stats.p90_ms >= stats.med_ms && stats.p95_ms >= stats.p90_ms);
    }

    #[test]
    fn test_metrics_latency_capacity_caps_samples() {
        let metrics = Metrics::with_latency_capacity(4);
        for ms in 1..=50 {
            metrics.record_request(Duration::from_millis(ms));
        }
        assert_eq!(metrics.latencies.lock().len(), 4);
        assert_eq!(metrics.latency_stats().count, 50);
        assert_eq!(metrics.counters().requests, 50);
    }

    #[test]
    fn test_record_request_feeds_latency() {
        let metrics = Metrics::new();
        metrics.record_request(Duration::from_millis(4));
        metrics.record_request(Duration::from_millis(2));
        let stats = metrics.latency_stats();
        assert_eq!(stats.count, 2);
        assert!((stats.med_ms - 3.0).abs() < 1e-9);
        assert_eq!(metrics.counters().requests, 2);
    }
}
