//! Per-request policy dispatch.
//!
//! The dispatcher owns the policy value and the victim selector and runs
//! the same protocol for every host request: hand the observed response
//! time to the policy (which resolves any pending Q-update), ask whether to
//! trigger, ask for a budget, run the executor, then let the policy
//! schedule the next pending update. Writes execute their plan before the
//! host sees completion; reads after, so read latency is never charged for
//! the GC they triggered.

use ferroftl_error::Result;
use ferroftl_observability::{MetricsSink, FLUSH_INTERVAL};
use ferroftl_policy::GcPolicy;
use ferroftl_types::{Lpn, Tick};

use crate::ftl::Ftl;
use crate::victim::VictimSelector;

/// A decided GC step: which block to reclaim and how many pages to copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartialGcPlan {
    pub victim_block: u32,
    pub pages_to_copy: u32,
}

/// Drives one [`GcPolicy`] against the FTL core.
#[derive(Debug)]
pub struct GcDispatcher {
    policy: GcPolicy,
    selector: VictimSelector,
    sink: MetricsSink,
}

impl GcDispatcher {
    #[must_use]
    pub fn new(policy: GcPolicy, selector: VictimSelector, sink: MetricsSink) -> Self {
        Self {
            policy,
            selector,
            sink,
        }
    }

    /// Write-path entry point, called before completion is acknowledged.
    pub fn on_write(
        &mut self,
        ftl: &mut Ftl,
        start_tick: Tick,
        end_tick: Tick,
    ) -> Result<Option<PartialGcPlan>> {
        self.handle(ftl, start_tick, end_tick, false)
    }

    /// Read-path entry point, called after completion.
    pub fn on_read(
        &mut self,
        ftl: &mut Ftl,
        start_tick: Tick,
        end_tick: Tick,
    ) -> Result<Option<PartialGcPlan>> {
        self.handle(ftl, start_tick, end_tick, true)
    }

    /// Trim invalidates mapping state but is a policy no-op.
    pub fn on_trim(&mut self, ftl: &mut Ftl, lpn: Lpn, _tick: Tick) -> Result<()> {
        ftl.trim(lpn);
        Ok(())
    }

    fn handle(
        &mut self,
        ftl: &mut Ftl,
        start_tick: Tick,
        end_tick: Tick,
        is_read: bool,
    ) -> Result<Option<PartialGcPlan>> {
        let response = end_tick.saturating_sub(start_tick);
        self.policy.observe_response(response);
        let observed = self.policy.responses_observed();
        if observed > 0 && observed % FLUSH_INTERVAL == 0 {
            self.sink
                .flush_line(end_tick, self.policy.stats(), self.policy.window());
        }

        let free_blocks = ftl.free_blocks();
        if !self.policy.should_trigger(free_blocks, end_tick, is_read) {
            if !is_read && self.policy.wants_whole_block_fallback(free_blocks) {
                return self.execute_whole_block_drain(ftl, end_tick);
            }
            return Ok(None);
        }

        let budget = self.policy.action(free_blocks);
        if budget == 0 {
            return Ok(None);
        }

        let min_invalid = self.policy.early_victim_min_invalid(free_blocks);
        let victims = self.selector.select(ftl, end_tick, 1, min_invalid);
        let Some(&victim) = victims.first() else {
            tracing::debug!(free_blocks, "GC triggered but no eligible victim");
            return Ok(None);
        };

        let outcome = ftl.partial_gc(victim, budget, end_tick)?;
        self.policy
            .note_executed(outcome.pages_copied, outcome.erased);
        self.policy.schedule_pending();
        Ok(Some(PartialGcPlan {
            victim_block: victim.get(),
            pages_to_copy: budget,
        }))
    }

    /// Intensive fallback for the `rl_intensive` variant: drain whole
    /// victims without a budget cap, reclaiming extra blocks when a write
    /// front recently sealed.
    fn execute_whole_block_drain(
        &mut self,
        ftl: &mut Ftl,
        tick: Tick,
    ) -> Result<Option<PartialGcPlan>> {
        let pages_per_block = ftl.geometry().pages_per_block;
        let extra = if ftl.take_reclaim_more() {
            ftl.geometry().write_fronts as usize
        } else {
            0
        };
        let victims = self.selector.select(ftl, tick, 1 + extra, None);
        let Some(&first) = victims.first() else {
            return Ok(None);
        };
        let mut drained = 0_u32;
        for &victim in &victims {
            let outcome = ftl.partial_gc(victim, pages_per_block, tick)?;
            drained += outcome.pages_copied;
            self.policy
                .note_executed(outcome.pages_copied, outcome.erased);
        }
        tracing::debug!(victims = victims.len(), drained, "whole-block intensive drain");
        Ok(Some(PartialGcPlan {
            victim_block: first.get(),
            pages_to_copy: pages_per_block,
        }))
    }

    #[must_use]
    pub fn policy(&self) -> &GcPolicy {
        &self.policy
    }

    #[must_use]
    pub fn sink(&self) -> &MetricsSink {
        &self.sink
    }

    /// Final metrics flush plus the free-form summary report.
    pub fn shutdown(&mut self, tick: Tick) {
        self.sink
            .flush_line(tick, self.policy.stats(), self.policy.window());
        self.sink.write_summary(&self.policy.summary());
    }
}
