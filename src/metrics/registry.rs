//! Counters for the increment endpoint.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

use super::Histogram;
use crate::contracts::{Outcome, RejectionKind};

/// Per-outcome counters and submit latency.
#[derive(Default)]
pub struct SubmitMetrics {
    pub accepted_total: AtomicU64,
    pub duplicate_total: AtomicU64,
    pub sequence_violation_total: AtomicU64,
    /// Malformed request bodies refused before reaching the guard
    pub invalid_requests_total: AtomicU64,
    pub storage_errors_total: AtomicU64,
    pub latency: Histogram,
    start_time: OnceLock<Instant>,
}

impl SubmitMetrics {
    pub fn new() -> Self {
        let m = Self::default();
        let _ = m.start_time.set(Instant::now());
        m
    }

    pub fn record_outcome(&self, outcome: &Outcome, latency_us: u64) {
        let counter = match outcome.rejection() {
            None => &self.accepted_total,
            Some(RejectionKind::Duplicate) => &self.duplicate_total,
            Some(RejectionKind::SequenceViolation) => &self.sequence_violation_total,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.latency.observe(latency_us);
    }

    pub fn record_invalid_request(&self) {
        self.invalid_requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_storage_error(&self) {
        self.storage_errors_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime_secs(&self) -> f64 {
        self.start_time
            .get()
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    pub fn snapshot(&self) -> SubmitCounts {
        SubmitCounts {
            accepted: self.accepted_total.load(Ordering::Relaxed),
            duplicate: self.duplicate_total.load(Ordering::Relaxed),
            sequence_violation: self.sequence_violation_total.load(Ordering::Relaxed),
            invalid_requests: self.invalid_requests_total.load(Ordering::Relaxed),
            storage_errors: self.storage_errors_total.load(Ordering::Relaxed),
        }
    }

    /// Formats counters and the latency histogram in Prometheus exposition format.
    pub fn format_prometheus(&self) -> String {
        let counts = self.snapshot();
        let mut output = String::with_capacity(2048);

        let _ = writeln!(output, "# HELP seqguard_uptime_secs Server uptime in seconds");
        let _ = writeln!(output, "# TYPE seqguard_uptime_secs gauge");
        let _ = writeln!(output, "seqguard_uptime_secs {:.3}", self.uptime_secs());
        let _ = writeln!(output);

        let _ = writeln!(output, "# HELP seqguard_submissions_total Submissions by outcome");
        let _ = writeln!(output, "# TYPE seqguard_submissions_total counter");
        for (outcome, value) in [
            ("accepted", counts.accepted),
            ("duplicate", counts.duplicate),
            ("sequence_violation", counts.sequence_violation),
        ] {
            let _ = writeln!(
                output,
                "seqguard_submissions_total{{outcome=\"{}\"}} {}",
                outcome, value
            );
        }
        let _ = writeln!(output);

        let _ = writeln!(
            output,
            "# HELP seqguard_invalid_requests_total Malformed increment requests"
        );
        let _ = writeln!(output, "# TYPE seqguard_invalid_requests_total counter");
        let _ = writeln!(output, "seqguard_invalid_requests_total {}", counts.invalid_requests);
        let _ = writeln!(output);

        let _ = writeln!(output, "# HELP seqguard_storage_errors_total Failed submissions");
        let _ = writeln!(output, "# TYPE seqguard_storage_errors_total counter");
        let _ = writeln!(output, "seqguard_storage_errors_total {}", counts.storage_errors);
        let _ = writeln!(output);

        output.push_str(
            &self
                .latency
                .format_prometheus("seqguard_submit_latency_us", "Submit latency in microseconds"),
        );

        output
    }
}

/// Counter values at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubmitCounts {
    pub accepted: u64,
    pub duplicate: u64,
    pub sequence_violation: u64,
    pub invalid_requests: u64,
    pub storage_errors: u64,
}
