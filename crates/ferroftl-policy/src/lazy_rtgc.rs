//! Lazy-RTGC: threshold-triggered partial GC with a fixed page-copy budget.
//!
//! No learning. The executor erases a victim only once its valid count
//! reaches zero, so a victim with `v` valid pages is reclaimed across
//! `⌈v / budget⌉ + 1` request arrivals, capping the per-request GC stall at
//! one copy batch plus at most one erase.

use ferroftl_observability::{GcStats, LatencyWindow};

/// Fixed-budget threshold policy.
#[derive(Debug)]
pub struct LazyRtgc {
    gc_threshold: u32,
    max_copies_per_step: u32,
    window: LatencyWindow,
    stats: GcStats,
    responses: u64,
}

impl LazyRtgc {
    #[must_use]
    pub fn new(gc_threshold: u32, max_copies_per_step: u32) -> Self {
        Self {
            gc_threshold,
            max_copies_per_step,
            window: LatencyWindow::default(),
            stats: GcStats::new(),
            responses: 0,
        }
    }

    /// Response times feed the metrics window only.
    pub fn observe_response(&mut self, response_ns: u64) {
        if self.window.push(response_ns) {
            self.responses += 1;
        }
    }

    /// Writes trigger at or below the threshold; reads never trigger.
    #[must_use]
    pub fn should_trigger(&self, free_blocks: u32, is_read: bool) -> bool {
        !is_read && free_blocks <= self.gc_threshold
    }

    /// Constant budget.
    pub fn action(&mut self) -> u32 {
        self.stats.record_invocation(self.max_copies_per_step);
        self.max_copies_per_step
    }

    pub fn note_executed(&mut self, copied: u32, erased: bool) {
        self.stats.record_valid_copies(copied);
        if erased {
            self.stats.record_erase();
        }
    }

    #[must_use]
    pub fn gc_threshold(&self) -> u32 {
        self.gc_threshold
    }

    #[must_use]
    pub fn max_copies_per_step(&self) -> u32 {
        self.max_copies_per_step
    }

    #[must_use]
    pub fn stats(&self) -> &GcStats {
        &self.stats
    }

    #[must_use]
    pub fn window(&self) -> &LatencyWindow {
        &self.window
    }

    #[must_use]
    pub fn responses_observed(&self) -> u64 {
        self.responses
    }
}
