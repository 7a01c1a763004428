//! Heap statistics.
//!
//! Tracks allocation and collection activity for monitoring and tests.
//! All counters are atomic so mutator threads record without locking.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Statistics about heap activity.
#[derive(Debug, Default)]
pub struct HeapStats {
    /// Total payload bytes handed out since start.
    pub bytes_allocated: AtomicU64,
    /// Total blocks handed out since start.
    pub blocks_allocated: AtomicU64,
    /// Allocation calls that exhausted the retry + GC protocol.
    pub failed_allocations: AtomicU64,
    /// Completed stop-the-world collections.
    pub collections: AtomicU64,
    /// Total wall time spent collecting, in nanoseconds.
    pub gc_time_ns: AtomicU64,
}

impl HeapStats {
    /// Create zeroed statistics.
    pub const fn new() -> Self {
        Self {
            bytes_allocated: AtomicU64::new(0),
            blocks_allocated: AtomicU64::new(0),
            failed_allocations: AtomicU64::new(0),
            collections: AtomicU64::new(0),
            gc_time_ns: AtomicU64::new(0),
        }
    }

    /// Record a successful allocation of `size` payload bytes.
    #[inline]
    pub(crate) fn record_allocation(&self, size: u32) {
        self.bytes_allocated
            .fetch_add(u64::from(size), Ordering::Relaxed);
        self.blocks_allocated.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an allocation that returned nothing.
    #[inline]
    pub(crate) fn record_failure(&self) {
        self.failed_allocations.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed collection.
    pub(crate) fn record_collection(&self, duration: Duration) {
        self.collections.fetch_add(1, Ordering::Relaxed);
        self.gc_time_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
    }

    /// Number of completed collections.
    pub fn collections(&self) -> u64 {
        self.collections.load(Ordering::Relaxed)
    }

    /// Total time spent collecting.
    pub fn total_gc_time(&self) -> Duration {
        Duration::from_nanos(self.gc_time_ns.load(Ordering::Relaxed))
    }

    /// Average stop-the-world pause.
    pub fn avg_pause(&self) -> Duration {
        let count = self.collections.load(Ordering::Relaxed);
        if count == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(self.gc_time_ns.load(Ordering::Relaxed) / count)
    }
}

/// Timer for measuring collection phases.
pub struct GcTimer {
    start: Instant,
    label: &'static str,
}

impl GcTimer {
    /// Start a new timer with the given label.
    pub fn start(label: &'static str) -> Self {
        Self {
            start: Instant::now(),
            label,
        }
    }

    /// Stop the timer and return the elapsed duration.
    pub fn stop(self) -> Duration {
        let elapsed = self.start.elapsed();
        log::trace!("{}: {:?}", self.label, elapsed);
        elapsed
    }
}
