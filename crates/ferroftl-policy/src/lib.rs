//! GC control policies for the ferroftl core.
//!
//! Three interchangeable policies behind one sum type:
//!
//! - [`LazyRtgc`]: bounded partial GC with a fixed page-copy budget.
//! - [`RlScheduler`]: tabular Q-learning scheduler choosing how many valid
//!   pages to copy per opportunity (baseline and intensive variants).
//! - [`RlAggressive`]: the same learner plus TAGC early triggering,
//!   max-limited early ops, and read-triggered GC.
//!
//! The dispatcher holds one [`GcPolicy`] value and drives it through a fixed
//! per-request protocol: observe the response time (which resolves any
//! pending Q-update), ask for a trigger decision, ask for a budget, execute,
//! then schedule the next pending update. Policies own their Q-table,
//! sliding window, and counters; swapping policies means constructing a
//! fresh value.

pub mod aggressive;
pub mod lazy_rtgc;
pub mod q_table;
pub mod scheduler;

use ferroftl_observability::{GcStats, LatencyWindow};
use ferroftl_types::Tick;

pub use aggressive::{AggressiveTuning, RlAggressive, EARLY_INVALID_FRACTION};
pub use lazy_rtgc::LazyRtgc;
pub use q_table::{QState, QTable, EPSILON_DECAY, EPSILON_FLOOR};
pub use scheduler::{bin_curr_interval, bin_prev_interval, RlScheduler, RlTuning};

/// The policy value the dispatcher holds.
#[derive(Debug)]
pub enum GcPolicy {
    LazyRtgc(LazyRtgc),
    RlBaseline(RlScheduler),
    RlAggressive(RlAggressive),
}

impl GcPolicy {
    /// Feed one observed response time; RL variants resolve a pending
    /// Q-update against it.
    pub fn observe_response(&mut self, response_ns: u64) {
        match self {
            Self::LazyRtgc(policy) => policy.observe_response(response_ns),
            Self::RlBaseline(policy) => policy.observe_response(response_ns),
            Self::RlAggressive(policy) => policy.observe_response(response_ns),
        }
    }

    /// Whether this request should trigger a GC step.
    pub fn should_trigger(&mut self, free_blocks: u32, tick: Tick, is_read: bool) -> bool {
        match self {
            Self::LazyRtgc(policy) => policy.should_trigger(free_blocks, is_read),
            Self::RlBaseline(policy) => policy.should_trigger(free_blocks, tick, is_read),
            Self::RlAggressive(policy) => policy.should_trigger(free_blocks, tick, is_read),
        }
    }

    /// Page-copy budget for a triggered step.
    pub fn action(&mut self, free_blocks: u32) -> u32 {
        match self {
            Self::LazyRtgc(policy) => policy.action(),
            Self::RlBaseline(policy) => policy.action(free_blocks),
            Self::RlAggressive(policy) => policy.action(free_blocks),
        }
    }

    /// Record the executed step's outcome.
    pub fn note_executed(&mut self, copied: u32, erased: bool) {
        match self {
            Self::LazyRtgc(policy) => policy.note_executed(copied, erased),
            Self::RlBaseline(policy) => policy.note_executed(copied, erased),
            Self::RlAggressive(policy) => policy.note_executed(copied, erased),
        }
    }

    /// Remember the state/action pair for the next response's reward.
    /// No-op for the non-learning policy.
    pub fn schedule_pending(&mut self) {
        match self {
            Self::LazyRtgc(_) => {}
            Self::RlBaseline(policy) => policy.schedule_pending(),
            Self::RlAggressive(policy) => policy.schedule_pending(),
        }
    }

    /// Whole-block drain fallback when the trigger declined but free space
    /// is critical (the `rl_intensive` variant only).
    pub fn wants_whole_block_fallback(&mut self, free_blocks: u32) -> bool {
        match self {
            Self::RlBaseline(policy) => policy.wants_whole_block_fallback(free_blocks),
            Self::LazyRtgc(_) | Self::RlAggressive(_) => false,
        }
    }

    /// Victim invalid-fraction gate for early (TAGC-zone) GC.
    #[must_use]
    pub fn early_victim_min_invalid(&self, free_blocks: u32) -> Option<f64> {
        match self {
            Self::RlAggressive(policy) => policy.early_victim_min_invalid(free_blocks),
            Self::LazyRtgc(_) | Self::RlBaseline(_) => None,
        }
    }

    #[must_use]
    pub fn has_pending(&self) -> bool {
        match self {
            Self::LazyRtgc(_) => false,
            Self::RlBaseline(policy) => policy.has_pending(),
            Self::RlAggressive(policy) => policy.has_pending(),
        }
    }

    #[must_use]
    pub fn stats(&self) -> &GcStats {
        match self {
            Self::LazyRtgc(policy) => policy.stats(),
            Self::RlBaseline(policy) => policy.stats(),
            Self::RlAggressive(policy) => policy.stats(),
        }
    }

    #[must_use]
    pub fn window(&self) -> &LatencyWindow {
        match self {
            Self::LazyRtgc(policy) => policy.window(),
            Self::RlBaseline(policy) => policy.window(),
            Self::RlAggressive(policy) => policy.window(),
        }
    }

    #[must_use]
    pub fn responses_observed(&self) -> u64 {
        match self {
            Self::LazyRtgc(policy) => policy.responses_observed(),
            Self::RlBaseline(policy) => policy.responses_observed(),
            Self::RlAggressive(policy) => policy.responses_observed(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::LazyRtgc(_) => "lazy_rtgc",
            Self::RlBaseline(policy) => {
                if policy.tuning().whole_block_fallback {
                    "rl_intensive"
                } else {
                    "rl_baseline"
                }
            }
            Self::RlAggressive(_) => "rl_aggressive",
        }
    }

    /// Free-form summary report body for the shutdown report.
    #[must_use]
    pub fn summary(&self) -> String {
        use std::fmt::Write as _;

        let stats = self.stats();
        let window = self.window();
        let mut body = String::new();
        let _ = writeln!(body, "{} GC policy summary", self.name());
        let _ = writeln!(body, "==============================");
        let _ = writeln!(body);
        let _ = writeln!(body, "GC statistics:");
        let _ = writeln!(body, "  invocations:        {}", stats.gc_invocations);
        let _ = writeln!(body, "  budgeted copies:    {}", stats.total_page_copies);
        let _ = writeln!(body, "  valid page copies:  {}", stats.valid_page_copies);
        let _ = writeln!(body, "  block erases:       {}", stats.erase_count);
        let _ = writeln!(body, "  intensive entries:  {}", stats.intensive_entries);
        let _ = writeln!(body, "  early GCs:          {}", stats.early_gc_count);
        let _ = writeln!(body, "  read-triggered GCs: {}", stats.read_triggered_count);
        let _ = writeln!(body);
        let _ = writeln!(body, "Performance:");
        let _ = writeln!(body, "  avg response time:  {:.2} ns", window.mean_ns());
        let _ = writeln!(body, "  p99 latency:        {} ns", window.percentile_ns(0.99));
        let _ = writeln!(body, "  p99.9 latency:      {} ns", window.percentile_ns(0.999));
        let _ = writeln!(body, "  p99.99 latency:     {} ns", window.percentile_ns(0.9999));
        if stats.reward_count > 0 {
            let _ = writeln!(body);
            let _ = writeln!(body, "Learning:");
            let _ = writeln!(body, "  rewards resolved:   {}", stats.reward_count);
            let _ = writeln!(body, "  average reward:     {:.4}", stats.avg_reward());
        }
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferroftl_types::MS;

    #[test]
    fn test_policy_names() {
        assert_eq!(GcPolicy::LazyRtgc(LazyRtgc::new(10, 3)).name(), "lazy_rtgc");
        assert_eq!(
            GcPolicy::RlBaseline(RlScheduler::new(RlTuning::baseline(1))).name(),
            "rl_baseline"
        );
        let mut tuning = RlTuning::baseline(1);
        tuning.whole_block_fallback = true;
        assert_eq!(
            GcPolicy::RlBaseline(RlScheduler::new(tuning)).name(),
            "rl_intensive"
        );
    }

    #[test]
    fn test_lazy_never_has_pending() {
        let mut policy = GcPolicy::LazyRtgc(LazyRtgc::new(10, 3));
        policy.schedule_pending();
        assert!(!policy.has_pending());
    }

    #[test]
    fn test_rl_pending_lifecycle_through_sum_type() {
        let mut policy = GcPolicy::RlBaseline(RlScheduler::new(RlTuning::baseline(7)));
        policy.should_trigger(8, MS, false);
        assert!(policy.should_trigger(8, 2 * MS, false));
        policy.action(8);
        policy.schedule_pending();
        assert!(policy.has_pending());
        policy.observe_response(200_000);
        assert!(!policy.has_pending());
    }

    #[test]
    fn test_summary_mentions_policy_and_counters() {
        let mut policy = GcPolicy::LazyRtgc(LazyRtgc::new(10, 3));
        policy.action(0);
        let summary = policy.summary();
        assert!(summary.contains("lazy_rtgc"));
        assert!(summary.contains("invocations:        1"));
    }
}
