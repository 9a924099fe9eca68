//! Observability metrics for seqguard.
//!
//! Lock-free atomics only; nothing here touches the sequence store.

pub mod histogram;
pub mod registry;

pub use histogram::{Histogram, HistogramSnapshot};
pub use registry::{SubmitCounts, SubmitMetrics};
