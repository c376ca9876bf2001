//! Scheduler metrics
//!
//! Counters and latency histograms updated by the scheduler, plus a
//! serialisable snapshot for export.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Histogram for tracking latency distributions (microseconds)
pub struct Histogram {
    /// Bucket upper bounds
    buckets: Vec<f64>,
    /// Counts per bucket, the last slot counts values above every bound
    counts: Vec<AtomicU64>,
    /// Sum of all values
    sum: AtomicU64,
    /// Total count
    count: AtomicU64,
    /// Largest value seen
    max: AtomicU64,
}

impl Histogram {
    /// Create histogram with default latency buckets
    pub fn new() -> Self {
        Self::with_buckets(vec![
            10.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0, 100000.0,
        ])
    }

    /// Create histogram with custom buckets
    pub fn with_buckets(buckets: Vec<f64>) -> Self {
        let counts = (0..=buckets.len()).map(|_| AtomicU64::new(0)).collect();
        Self {
            buckets,
            counts,
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
            max: AtomicU64::new(0),
        }
    }

    /// Record a value
    pub fn observe(&self, value: f64) {
        let v = value as u64;
        self.sum.fetch_add(v, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
        self.max.fetch_max(v, Ordering::Relaxed);

        let slot = self
            .buckets
            .iter()
            .position(|boundary| value <= *boundary)
            .unwrap_or(self.buckets.len());
        self.counts[slot].fetch_add(1, Ordering::Relaxed);
    }

    /// Record a duration in microseconds
    pub fn observe_duration(&self, elapsed: Duration) {
        self.observe(elapsed.as_micros() as f64);
    }

    /// Get mean value
    pub fn mean(&self) -> f64 {
        let count = self.count.load(Ordering::Relaxed);
        if count == 0 {
            return 0.0;
        }
        self.sum.load(Ordering::Relaxed) as f64 / count as f64
    }

    /// Get total count
    pub fn total_count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Get the largest observed value
    pub fn max(&self) -> u64 {
        self.max.load(Ordering::Relaxed)
    }

    /// Per-bucket counts, overflow bucket last
    pub fn bucket_counts(&self) -> Vec<u64> {
        self.counts.iter().map(|c| c.load(Ordering::Relaxed)).collect()
    }

    fn summary(&self) -> HistogramSummary {
        HistogramSummary {
            mean: self.mean(),
            count: self.total_count(),
            max: self.max(),
            buckets: self.bucket_counts(),
        }
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe scheduler metrics
#[derive(Default)]
pub struct SchedulerMetrics {
    batches: AtomicU64,
    failed_batches: AtomicU64,
    rounds: AtomicU64,
    executions: AtomicU64,
    aborts: AtomicU64,
    retries: AtomicU64,
    stale_results: AtomicU64,
    round_latency: Histogram,
    batch_latency: Histogram,
}

impl SchedulerMetrics {
    /// Create an empty metrics store
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_round(&self, executions: u64, aborts: u64, stale: u64, elapsed: Duration) {
        self.rounds.fetch_add(1, Ordering::Relaxed);
        self.executions.fetch_add(executions, Ordering::Relaxed);
        self.aborts.fetch_add(aborts, Ordering::Relaxed);
        self.stale_results.fetch_add(stale, Ordering::Relaxed);
        self.round_latency.observe_duration(elapsed);
    }

    pub(crate) fn record_retries(&self, retries: u64) {
        self.retries.fetch_add(retries, Ordering::Relaxed);
    }

    pub(crate) fn record_batch(&self, elapsed: Duration, ok: bool) {
        self.batches.fetch_add(1, Ordering::Relaxed);
        if !ok {
            self.failed_batches.fetch_add(1, Ordering::Relaxed);
        }
        self.batch_latency.observe_duration(elapsed);
    }

    /// Take a snapshot of all values
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            batches: self.batches.load(Ordering::Relaxed),
            failed_batches: self.failed_batches.load(Ordering::Relaxed),
            rounds: self.rounds.load(Ordering::Relaxed),
            executions: self.executions.load(Ordering::Relaxed),
            aborts: self.aborts.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            stale_results: self.stale_results.load(Ordering::Relaxed),
            round_latency_us: self.round_latency.summary(),
            batch_latency_us: self.batch_latency.summary(),
        }
    }
}

/// Snapshot of the scheduler metrics at a point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Batches processed
    pub batches: u64,
    /// Batches that returned an error
    pub failed_batches: u64,
    /// Execute/validate rounds
    pub rounds: u64,
    /// Completed execution calls
    pub executions: u64,
    /// Aborts signalled during execution
    pub aborts: u64,
    /// Re-executions scheduled after validation
    pub retries: u64,
    /// Results dropped for a superseded incarnation
    pub stale_results: u64,
    /// Round latency
    pub round_latency_us: HistogramSummary,
    /// Batch latency
    pub batch_latency_us: HistogramSummary,
}

/// Summary of a histogram
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramSummary {
    /// Mean value
    pub mean: f64,
    /// Total observation count
    pub count: u64,
    /// Largest observation
    pub max: u64,
    /// Per-bucket counts, overflow bucket last
    pub buckets: Vec<u64>,
}
