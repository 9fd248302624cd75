//! Aggressive overlay on the RL scheduler: TAGC early triggering with a
//! max-limited budget, read-triggered GC gated on idle periods, and a
//! stricter intensive-mode exit.

use ferroftl_observability::{GcStats, LatencyWindow};
use ferroftl_types::Tick;

use crate::scheduler::{bin_curr_interval, RlScheduler, RlTuning};

/// Minimum invalid-page fraction a victim must reach to be worth an early
/// (TAGC-zone) reclaim.
pub const EARLY_INVALID_FRACTION: f64 = 0.6;

/// Extra free blocks required above TIGC before intensive mode unlatches.
const INTENSIVE_EXIT_MARGIN: u32 = 2;

/// Current-interval bin above which a gap counts as an idle period for
/// read-triggered GC.
const IDLE_PERIOD_BIN: u8 = 2;

/// Overlay knobs on top of [`RlTuning`].
#[derive(Debug, Clone, Copy)]
pub struct AggressiveTuning {
    /// Free-block count at or below which early GC triggers.
    pub tagc: u32,
    /// Budget cap in the early zone (`TGC < free ≤ TAGC`).
    pub max_early_ops: u32,
    /// Whether reads may trigger GC during idle periods.
    pub read_triggered: bool,
}

impl Default for AggressiveTuning {
    fn default() -> Self {
        Self {
            tagc: 100,
            max_early_ops: 2,
            read_triggered: true,
        }
    }
}

/// RL-Aggressive policy: the baseline scheduler plus early and
/// read-triggered GC.
#[derive(Debug)]
pub struct RlAggressive {
    core: RlScheduler,
    tuning: AggressiveTuning,
}

impl RlAggressive {
    /// The overlay always uses the maximum budget in intensive mode; the
    /// tail penalty stays whatever the tuning carries (−0.5 by convention
    /// for this policy).
    #[must_use]
    pub fn new(mut rl: RlTuning, tuning: AggressiveTuning) -> Self {
        rl.intensive_page_copies = rl.max_page_copies;
        Self {
            core: RlScheduler::new(rl),
            tuning,
        }
    }

    pub fn observe_response(&mut self, response_ns: u64) {
        self.core.observe_response(response_ns);
    }

    fn should_trigger_for_read(&mut self, free_blocks: u32, tick: Tick) -> bool {
        if !self.tuning.read_triggered {
            return false;
        }
        // The gap is probed without consuming it; only write-path triggers
        // advance the inter-request clock.
        let gap = if self.core.last_request() > 0 {
            tick.saturating_sub(self.core.last_request())
        } else {
            0
        };
        let is_idle_period = gap > 0 && bin_curr_interval(gap) > IDLE_PERIOD_BIN;
        let read_threshold = f64::from(self.core.tuning().tgc) * 1.5;
        if is_idle_period && f64::from(free_blocks) <= read_threshold {
            tracing::debug!(free_blocks, gap, "read-triggered GC in idle period");
            self.core.stats_mut().record_read_triggered();
            return true;
        }
        false
    }

    /// Trigger decision for the aggressive policy.
    pub fn should_trigger(&mut self, free_blocks: u32, tick: Tick, is_read: bool) -> bool {
        if is_read {
            return self.should_trigger_for_read(free_blocks, tick);
        }

        let tgc = self.core.tuning().tgc;
        let tigc = self.core.tuning().tigc;
        self.core
            .exit_intensive_above(free_blocks, tigc + INTENSIVE_EXIT_MARGIN);

        self.core.update_gaps(tick);
        if self.core.curr_gap() == 0 {
            return false;
        }

        if free_blocks <= tigc {
            self.core.set_intensive_entry();
            return true;
        }
        if free_blocks <= self.tuning.tagc {
            if free_blocks > tgc {
                self.core.stats_mut().record_early_gc();
            } else {
                self.core.refresh_state();
            }
            return true;
        }
        false
    }

    /// Budget for this opportunity: maximum while intensive mode is
    /// latched, max-limited in the early zone, and Q-selected with a floor
    /// of half the maximum in the normal and critical-near zones.
    pub fn action(&mut self, free_blocks: u32) -> u32 {
        let tgc = self.core.tuning().tgc;
        let max_copies = self.core.tuning().max_page_copies;

        let chosen = if self.core.in_intensive_mode() {
            max_copies
        } else if free_blocks > tgc && free_blocks <= self.tuning.tagc {
            let state = self.core.state();
            self.core
                .q_mut()
                .select_action(state)
                .min(self.tuning.max_early_ops)
        } else {
            let state = self.core.state();
            self.core
                .q_mut()
                .select_action(state)
                .max(max_copies / 2)
                .min(max_copies)
        };

        self.core.stats_mut().record_invocation(chosen);
        self.core.set_last_action(chosen);
        chosen
    }

    pub fn schedule_pending(&mut self) {
        self.core.schedule_pending();
    }

    pub fn note_executed(&mut self, copied: u32, erased: bool) {
        self.core.note_executed(copied, erased);
    }

    /// In the early zone a victim must be mostly invalid to be worth the
    /// erase cycle.
    #[must_use]
    pub fn early_victim_min_invalid(&self, free_blocks: u32) -> Option<f64> {
        let tgc = self.core.tuning().tgc;
        if free_blocks > tgc && free_blocks <= self.tuning.tagc {
            Some(EARLY_INVALID_FRACTION)
        } else {
            None
        }
    }

    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.core.has_pending()
    }

    #[must_use]
    pub fn in_intensive_mode(&self) -> bool {
        self.core.in_intensive_mode()
    }

    #[must_use]
    pub fn stats(&self) -> &GcStats {
        self.core.stats()
    }

    #[must_use]
    pub fn window(&self) -> &LatencyWindow {
        self.core.window()
    }

    #[must_use]
    pub fn responses_observed(&self) -> u64 {
        self.core.responses_observed()
    }

    #[must_use]
    pub fn core(&self) -> &RlScheduler {
        &self.core
    }

    #[must_use]
    pub fn overlay_tuning(&self) -> &AggressiveTuning {
        &self.tuning
    }
}
