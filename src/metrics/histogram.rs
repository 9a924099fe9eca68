//! Lock-free latency histogram with Prometheus output.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};

/// Number of finite buckets.
pub const BUCKET_COUNT: usize = 10;

/// Upper bounds of the finite buckets, in microseconds.
/// A submit is a few point reads plus one WAL write, optionally fsynced,
/// so the range runs from 25μs to 100ms.
pub const HISTOGRAM_BUCKETS: [u64; BUCKET_COUNT] = [
    25, 50, 100, 250, 500, 1_000, 5_000, 10_000, 50_000, 100_000,
];

/// Thread-safe histogram for latency distributions.
///
/// # Example
///
/// ```
/// use seqguard::metrics::Histogram;
///
/// let histogram = Histogram::new();
/// histogram.observe(150);
///
/// let snapshot = histogram.snapshot();
/// assert_eq!(snapshot.count, 1);
/// assert_eq!(snapshot.sum, 150);
/// ```
pub struct Histogram {
    sum: AtomicU64,
    count: AtomicU64,
    /// Cumulative: bucket i counts every observation <= HISTOGRAM_BUCKETS[i]
    buckets: [AtomicU64; BUCKET_COUNT],
}

/// Point-in-time copy of a histogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistogramSnapshot {
    pub sum: u64,
    pub count: u64,
    pub buckets: [u64; BUCKET_COUNT],
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    pub fn new() -> Self {
        Self {
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
            buckets: std::array::from_fn(|_| AtomicU64::new(0)),
        }
    }

    /// Records an observation in microseconds.
    #[inline]
    pub fn observe(&self, value_us: u64) {
        self.sum.fetch_add(value_us, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        for (bucket, &boundary) in self.buckets.iter().zip(HISTOGRAM_BUCKETS.iter()) {
            if value_us <= boundary {
                bucket.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn snapshot(&self) -> HistogramSnapshot {
        HistogramSnapshot {
            sum: self.sum.load(Ordering::Relaxed),
            count: self.count.load(Ordering::Relaxed),
            buckets: std::array::from_fn(|i| self.buckets[i].load(Ordering::Relaxed)),
        }
    }

    #[inline]
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Mean observation in microseconds, 0.0 when empty.
    pub fn mean(&self) -> f64 {
        let snapshot = self.snapshot();
        if snapshot.count == 0 {
            0.0
        } else {
            snapshot.sum as f64 / snapshot.count as f64
        }
    }

    /// Formats the histogram in Prometheus exposition format.
    pub fn format_prometheus(&self, name: &str, help: &str) -> String {
        let snapshot = self.snapshot();
        let mut output = String::with_capacity(768);

        let _ = writeln!(output, "# HELP {} {}", name, help);
        let _ = writeln!(output, "# TYPE {} histogram", name);
        for (count, boundary) in snapshot.buckets.iter().zip(HISTOGRAM_BUCKETS.iter()) {
            let _ = writeln!(output, "{}_bucket{{le=\"{}\"}} {}", name, boundary, count);
        }
        let _ = writeln!(output, "{}_bucket{{le=\"+Inf\"}} {}", name, snapshot.count);
        let _ = writeln!(output, "{}_sum {}", name, snapshot.sum);
        let _ = writeln!(output, "{}_count {}", name, snapshot.count);

        output
    }
}
