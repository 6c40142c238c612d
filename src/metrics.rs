use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;

/// Global runtime metrics for the collector.
///
/// Purpose:
/// - Track runs per source
/// - Track group / unit submissions to the task runner
/// - Track throughput (locations discovered / records fetched)
///
/// Design:
/// - Lock-free (Atomics)
/// - Non-authoritative: nothing reads these to make decisions
#[derive(Default)]
pub struct RuntimeMetrics {
    // Runs
    pub runs_started: AtomicUsize,
    pub runs_failed: AtomicUsize,

    // Task runner
    pub groups_submitted: AtomicUsize,
    pub units_submitted: AtomicUsize,
    pub units_failed: AtomicUsize,

    // Throughput
    pub locations_discovered: AtomicUsize,
    pub records_fetched: AtomicUsize,
}

impl RuntimeMetrics {
    /// One-line rendering used by the periodic reporter in `main`.
    pub fn summary(&self) -> String {
        format!(
            "runs={} runs_failed={} groups={} units={} units_failed={} locations={} records={}",
            self.runs_started.load(Ordering::Relaxed),
            self.runs_failed.load(Ordering::Relaxed),
            self.groups_submitted.load(Ordering::Relaxed),
            self.units_submitted.load(Ordering::Relaxed),
            self.units_failed.load(Ordering::Relaxed),
            self.locations_discovered.load(Ordering::Relaxed),
            self.records_fetched.load(Ordering::Relaxed),
        )
    }
}

/// Global metrics registry (singleton)
pub static METRICS: Lazy<Arc<RuntimeMetrics>> =
    Lazy::new(|| Arc::new(RuntimeMetrics::default()));
