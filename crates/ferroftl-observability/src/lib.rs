//! Observability infrastructure for the ferroftl GC core.
//!
//! - [`LatencyWindow`]: bounded sliding window of observed response times
//!   with percentile queries (position rule for reward thresholds, linear
//!   interpolation for reported tail latencies).
//! - [`GcStats`]: per-policy counters flushed to metrics files.
//! - [`MetricsSink`]: append-only plain-text metrics stream plus a free-form
//!   summary report. All file I/O is best-effort: a failure warns once and
//!   disables the stream; the policy continues.

pub mod sink;
pub mod stats;
pub mod window;

pub use sink::{MetricsSink, FLUSH_INTERVAL};
pub use stats::GcStats;
pub use window::LatencyWindow;
