//! Output metrics for observability
//!
//! Counters for records written to an [`Output`](super::Output), failed
//! writes, and panics reported by a recoverer.

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for output observability
///
/// # Example
///
/// ```
/// use rust_jsonl_logger::OutputMetrics;
///
/// let metrics = OutputMetrics::new();
///
/// metrics.record_written(64);
/// metrics.record_failure();
///
/// assert_eq!(metrics.records_written(), 1);
/// assert_eq!(metrics.bytes_written(), 64);
/// assert_eq!(metrics.write_failures(), 1);
/// ```
#[derive(Debug)]
pub struct OutputMetrics {
    /// Number of records written in full
    records_written: AtomicU64,

    /// Bytes written, newlines included
    bytes_written: AtomicU64,

    /// Number of records that failed to serialize or write
    write_failures: AtomicU64,

    /// Number of panics reported by a recoverer
    panics_recovered: AtomicU64,
}

impl OutputMetrics {
    /// Create a new metrics instance with all counters at zero
    pub const fn new() -> Self {
        Self {
            records_written: AtomicU64::new(0),
            bytes_written: AtomicU64::new(0),
            write_failures: AtomicU64::new(0),
            panics_recovered: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn records_written(&self) -> u64 {
        self.records_written.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn write_failures(&self) -> u64 {
        self.write_failures.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn panics_recovered(&self) -> u64 {
        self.panics_recovered.load(Ordering::Relaxed)
    }

    /// Record a record of `bytes` length written in full
    #[inline]
    pub fn record_written(&self, bytes: usize) -> u64 {
        self.bytes_written.fetch_add(bytes as u64, Ordering::Relaxed);
        self.records_written.fetch_add(1, Ordering::Relaxed)
    }

    /// Record a serialization or write failure
    #[inline]
    pub fn record_failure(&self) -> u64 {
        self.write_failures.fetch_add(1, Ordering::Relaxed)
    }

    /// Record a panic reported by a recoverer
    #[inline]
    pub fn record_panic(&self) -> u64 {
        self.panics_recovered.fetch_add(1, Ordering::Relaxed)
    }

    /// Reset all metrics to zero
    pub fn reset(&self) {
        self.records_written.store(0, Ordering::Relaxed);
        self.bytes_written.store(0, Ordering::Relaxed);
        self.write_failures.store(0, Ordering::Relaxed);
        self.panics_recovered.store(0, Ordering::Relaxed);
    }
}

impl Default for OutputMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for OutputMetrics {
    /// Create a snapshot of the current metrics values
    fn clone(&self) -> Self {
        Self {
            records_written: AtomicU64::new(self.records_written()),
            bytes_written: AtomicU64::new(self.bytes_written()),
            write_failures: AtomicU64::new(self.write_failures()),
            panics_recovered: AtomicU64::new(self.panics_recovered()),
        }
    }
}
