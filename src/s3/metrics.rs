//! Range fetch accounting.
//!
//! Readers optionally report every window fetch here, which makes request
//! counts and fetched ranges observable without instrumenting the store.

use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// One completed range fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRecord {
    /// Inclusive byte range requested
    pub range: RangeInclusive<u64>,
    /// Number of bytes received
    pub bytes: u64,
    pub duration: Duration,
}

/// Thread-safe collector for range fetch metrics
#[derive(Debug, Default)]
pub struct FetchMetrics {
    total_bytes: AtomicU64,
    fetch_count: AtomicUsize,
    /// Total time spent in fetches (nanoseconds)
    total_fetch_time_ns: AtomicU64,
    fetches: RwLock<Vec<FetchRecord>>,
}

impl FetchMetrics {
    /// Create a new metrics collector wrapped in Arc for sharing
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Record one completed window fetch
    pub fn record_fetch(&self, range: RangeInclusive<u64>, bytes: u64, duration: Duration) {
        self.total_bytes.fetch_add(bytes, Ordering::Relaxed);
        self.fetch_count.fetch_add(1, Ordering::Relaxed);
        self.total_fetch_time_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);

        if let Ok(mut fetches) = self.fetches.write() {
            fetches.push(FetchRecord {
                range,
                bytes,
                duration,
            });
        }
    }

    /// Get the total number of bytes fetched
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes.load(Ordering::Relaxed)
    }

    /// Get the number of fetches recorded
    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::Relaxed)
    }

    pub fn total_fetch_time(&self) -> Duration {
        Duration::from_nanos(self.total_fetch_time_ns.load(Ordering::Relaxed))
    }

    /// Requested ranges, oldest first
    pub fn ranges(&self) -> Vec<RangeInclusive<u64>> {
        self.fetches()
            .into_iter()
            .map(|record| record.range)
            .collect()
    }

    pub fn fetches(&self) -> Vec<FetchRecord> {
        self.fetches
            .read()
            .map(|fetches| fetches.clone())
            .unwrap_or_default()
    }

    pub fn reset(&self) {
        self.total_bytes.store(0, Ordering::Relaxed);
        self.fetch_count.store(0, Ordering::Relaxed);
        self.total_fetch_time_ns.store(0, Ordering::Relaxed);
        if let Ok(mut fetches) = self.fetches.write() {
            fetches.clear();
        }
    }
}
