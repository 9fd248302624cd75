//! RL GC scheduler: interval binning, percentile-based rewards, pending
//! Q-update bookkeeping, and the intensive-mode latch.
//!
//! All decisions are a pure function of the current tick, the free-block
//! count, the last observed response time, and the scheduler's own state;
//! the dispatcher calls in a fixed order per request (observe → trigger →
//! action → schedule pending).

use ferroftl_observability::{GcStats, LatencyWindow};
use ferroftl_types::{Tick, MS, SEC, US};

use crate::q_table::{QState, QTable};

/// Bin boundaries for the current-interval dimension (bin 0 is a zero gap,
/// bin 17 is ≥ 1 s).
const CURR_INTERVAL_THRESHOLDS_NS: [u64; 16] = [
    10 * US,
    20 * US,
    50 * US,
    100 * US,
    200 * US,
    500 * US,
    MS,
    2 * MS,
    5 * MS,
    10 * MS,
    20 * MS,
    50 * MS,
    100 * MS,
    200 * MS,
    500 * MS,
    SEC,
];

/// Previous-interval split: short below 100 µs, long otherwise.
const PREV_INTERVAL_SHORT_NS: u64 = 100 * US;

/// Current-interval bin: 0 for a zero gap, otherwise 1 + the index of the
/// first threshold exceeding the gap, saturating at 17.
#[must_use]
pub fn bin_curr_interval(gap_ns: u64) -> u8 {
    if gap_ns == 0 {
        return 0;
    }
    for (index, &threshold) in CURR_INTERVAL_THRESHOLDS_NS.iter().enumerate() {
        if gap_ns < threshold {
            return (index + 1) as u8;
        }
    }
    17
}

/// Previous-interval bin: 0 below 100 µs, 1 otherwise.
#[must_use]
pub fn bin_prev_interval(gap_ns: u64) -> u8 {
    u8::from(gap_ns >= PREV_INTERVAL_SHORT_NS)
}

/// Tuning knobs for the RL scheduler, filled in from the configuration
/// surface by the dispatcher.
#[derive(Debug, Clone, Copy)]
pub struct RlTuning {
    /// Free-block count at or below which standard GC triggers.
    pub tgc: u32,
    /// Free-block count at or below which intensive mode latches.
    pub tigc: u32,
    /// Upper bound on the page-copy budget an action may request.
    pub max_page_copies: u32,
    /// Budget returned while intensive mode is latched.
    pub intensive_page_copies: u32,
    /// Reward for a response time above the t3 threshold.
    pub tail_penalty: f64,
    /// Q-learning rate α.
    pub learning_rate: f64,
    /// Q discount factor γ.
    pub discount_factor: f64,
    /// Initial exploration rate ε₀.
    pub init_epsilon: f64,
    /// Action-space size.
    pub num_actions: u32,
    /// Seed for exploration randomness.
    pub seed: u64,
    /// Fall back to a whole-block drain when free ≤ TIGC and no idle gap is
    /// available for a budgeted step (the `rl_intensive` variant).
    pub whole_block_fallback: bool,
}

impl RlTuning {
    /// Baseline defaults: TGC 10, TIGC 3, two-page budget, seven actions,
    /// intensive budget 7, tail penalty −1.0.
    #[must_use]
    pub fn baseline(seed: u64) -> Self {
        Self {
            tgc: 10,
            tigc: 3,
            max_page_copies: 2,
            intensive_page_copies: 7,
            tail_penalty: -1.0,
            learning_rate: 0.3,
            discount_factor: 0.8,
            init_epsilon: 0.8,
            num_actions: 7,
            seed,
            whole_block_fallback: false,
        }
    }
}

/// One scheduled `(state, action)` pair awaiting its reward.
#[derive(Debug, Clone, Copy)]
struct PendingUpdate {
    state: QState,
    action: u32,
}

/// Q-learning GC scheduler (RL-Baseline / RL-Intensive).
#[derive(Debug)]
pub struct RlScheduler {
    q: QTable,
    window: LatencyWindow,
    thresholds: Option<(u64, u64, u64)>,
    last_request: Tick,
    prev_gap: u64,
    curr_gap: u64,
    last_action: u32,
    state: QState,
    pending: Option<PendingUpdate>,
    intensive: bool,
    tuning: RlTuning,
    stats: GcStats,
    responses: u64,
}

impl RlScheduler {
    #[must_use]
    pub fn new(tuning: RlTuning) -> Self {
        Self {
            q: QTable::new(
                tuning.learning_rate,
                tuning.discount_factor,
                tuning.init_epsilon,
                tuning.num_actions,
                tuning.seed,
            ),
            window: LatencyWindow::default(),
            thresholds: None,
            last_request: 0,
            prev_gap: 0,
            curr_gap: 0,
            last_action: 0,
            state: QState::default(),
            pending: None,
            intensive: false,
            tuning,
            stats: GcStats::new(),
            responses: 0,
        }
    }

    /// Record a response time, refresh percentile thresholds, and resolve
    /// any pending Q-update against it.
    pub fn observe_response(&mut self, response_ns: u64) {
        if self.window.push(response_ns) {
            self.responses += 1;
            if self.window.is_warm() {
                self.thresholds = Some((
                    self.window.threshold_at(70).unwrap_or(0),
                    self.window.threshold_at(90).unwrap_or(0),
                    self.window.threshold_at(99).unwrap_or(0),
                ));
            }
        }
        self.resolve_pending(response_ns);
    }

    fn resolve_pending(&mut self, response_ns: u64) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        let reward = self.reward(response_ns);
        let next_state = QState::new(
            bin_prev_interval(self.prev_gap),
            bin_curr_interval(self.curr_gap),
            self.bin_action(pending.action),
        );
        tracing::debug!(
            state = ?pending.state,
            action = pending.action,
            reward,
            next = ?next_state,
            "resolving pending Q-update"
        );
        self.q
            .update(pending.state, pending.action, reward, next_state);
        self.stats.record_reward(reward);
        self.q.decay_epsilon();
    }

    /// Reward scale: percentile thresholds once the window is warm, a fixed
    /// absolute scale during warmup.
    #[must_use]
    pub fn reward(&self, response_ns: u64) -> f64 {
        match self.thresholds {
            Some((t1, t2, t3)) if self.window.is_warm() => {
                if response_ns <= t1 {
                    1.0
                } else if response_ns <= t2 {
                    0.5
                } else if response_ns <= t3 {
                    -0.5
                } else {
                    self.tuning.tail_penalty
                }
            }
            _ => {
                if response_ns < 100 * US {
                    1.0
                } else if response_ns < MS {
                    0.5
                } else if response_ns < 10 * MS {
                    0.0
                } else {
                    -0.5
                }
            }
        }
    }

    pub(crate) fn update_gaps(&mut self, tick: Tick) {
        if self.last_request > 0 {
            self.prev_gap = self.curr_gap;
            self.curr_gap = tick.saturating_sub(self.last_request);
        } else {
            self.prev_gap = 0;
            self.curr_gap = 0;
        }
        self.last_request = tick;
    }

    pub(crate) fn refresh_state(&mut self) {
        self.state = QState::new(
            bin_prev_interval(self.prev_gap),
            bin_curr_interval(self.curr_gap),
            self.bin_action(self.last_action),
        );
    }

    fn bin_action(&self, action: u32) -> u8 {
        u8::from(action > self.tuning.max_page_copies / 2)
    }

    fn enter_intensive(&mut self) {
        if !self.intensive {
            tracing::debug!(tigc = self.tuning.tigc, "entering intensive GC mode");
            self.intensive = true;
            self.stats.record_intensive_entry();
        }
    }

    fn maybe_exit_intensive(&mut self, free_blocks: u32, exit_above: u32) {
        if self.intensive && free_blocks > exit_above {
            tracing::debug!(free_blocks, "exiting intensive GC mode");
            self.intensive = false;
        }
    }

    /// Trigger decision for the baseline scheduler. Reads never trigger.
    pub fn should_trigger(&mut self, free_blocks: u32, tick: Tick, is_read: bool) -> bool {
        if is_read {
            return false;
        }
        self.maybe_exit_intensive(free_blocks, self.tuning.tigc);
        if free_blocks > self.tuning.tgc {
            return false;
        }
        self.update_gaps(tick);
        if self.curr_gap == 0 {
            return false;
        }
        if free_blocks <= self.tuning.tigc {
            self.enter_intensive();
            return true;
        }
        self.refresh_state();
        true
    }

    /// Page-copy budget for this opportunity.
    pub fn action(&mut self, free_blocks: u32) -> u32 {
        let chosen = if self.intensive {
            self.tuning.intensive_page_copies
        } else if free_blocks <= self.tuning.tigc + 2 {
            self.tuning.max_page_copies
        } else {
            self.q
                .select_action(self.state)
                .min(self.tuning.max_page_copies)
        };
        self.stats.record_invocation(chosen);
        self.last_action = chosen;
        chosen
    }

    /// Remember `(state, action)` until the next response time resolves it.
    pub fn schedule_pending(&mut self) {
        self.pending = Some(PendingUpdate {
            state: self.state,
            action: self.last_action,
        });
    }

    /// Whole-block drain fallback for the `rl_intensive` variant: taken when
    /// the trigger declined (no idle gap) but free blocks are critically low.
    pub fn wants_whole_block_fallback(&mut self, free_blocks: u32) -> bool {
        if self.tuning.whole_block_fallback && free_blocks <= self.tuning.tigc {
            self.enter_intensive();
            true
        } else {
            false
        }
    }

    pub fn note_executed(&mut self, copied: u32, erased: bool) {
        self.stats.record_valid_copies(copied);
        if erased {
            self.stats.record_erase();
        }
    }

    // --- accessors used by the overlay, the dispatcher, and tests ---

    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    #[must_use]
    pub fn in_intensive_mode(&self) -> bool {
        self.intensive
    }

    #[must_use]
    pub fn stats(&self) -> &GcStats {
        &self.stats
    }

    pub(crate) fn stats_mut(&mut self) -> &mut GcStats {
        &mut self.stats
    }

    #[must_use]
    pub fn window(&self) -> &LatencyWindow {
        &self.window
    }

    #[must_use]
    pub fn responses_observed(&self) -> u64 {
        self.responses
    }

    #[must_use]
    pub fn epsilon(&self) -> f64 {
        self.q.epsilon()
    }

    #[must_use]
    pub fn tuning(&self) -> &RlTuning {
        &self.tuning
    }

    #[must_use]
    pub(crate) fn last_request(&self) -> Tick {
        self.last_request
    }

    #[must_use]
    pub(crate) fn state(&self) -> QState {
        self.state
    }

    pub(crate) fn q_mut(&mut self) -> &mut QTable {
        &mut self.q
    }

    pub(crate) fn set_last_action(&mut self, action: u32) {
        self.last_action = action;
    }

    pub(crate) fn set_intensive_entry(&mut self) {
        self.enter_intensive();
    }

    pub(crate) fn exit_intensive_above(&mut self, free_blocks: u32, exit_above: u32) {
        self.maybe_exit_intensive(free_blocks, exit_above);
    }

    pub(crate) fn curr_gap(&self) -> u64 {
        self.curr_gap
    }
}
