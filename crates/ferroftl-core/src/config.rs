//! Typed configuration surface.
//!
//! All recognized options with their defaults; unknown keys are rejected so
//! a typoed knob fails loudly at load time instead of silently running the
//! default. `validate` enforces cross-field consistency and maps failures
//! to exit code 2 through [`FtlError::InvalidConfig`].

use std::fs;
use std::path::{Path, PathBuf};

use ferroftl_error::{FtlError, Result};
use ferroftl_observability::MetricsSink;
use ferroftl_policy::{
    AggressiveTuning, GcPolicy, LazyRtgc, RlAggressive, RlScheduler, RlTuning,
};
use ferroftl_types::{DeviceGeometry, EvictPolicyKind, GcPolicyKind};
use serde::{Deserialize, Serialize};

use crate::victim::VictimSelector;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FtlConfig {
    /// Active GC control policy.
    pub policy: GcPolicyKind,

    // --- device geometry ---
    pub total_blocks: u32,
    pub pages_per_block: u32,
    pub io_units_per_page: u32,
    pub write_fronts: u32,
    /// Logical capacity is `physical · (1 − overprovision_ratio)`.
    pub overprovision_ratio: f64,

    // --- trigger thresholds ---
    /// Free-block *ratio* below which the default policy reclaims.
    pub gc_threshold_ratio: f64,
    /// Free-block counts for normal / intensive / aggressive-early triggers.
    pub tgc: u32,
    pub tigc: u32,
    pub tagc: u32,

    // --- budgets ---
    pub max_page_copies: u32,
    /// Early-zone cap for the aggressive policy.
    pub max_gc_ops: u32,
    /// Budget while intensive mode is latched (baseline variants).
    pub intensive_page_copies: u32,

    // --- Q-learning ---
    pub learning_rate: f64,
    pub discount_factor: f64,
    pub init_epsilon: f64,
    pub num_actions: u32,
    /// Reward for response times above the t3 threshold; unset picks the
    /// per-policy convention (−1.0 baseline, −0.5 aggressive).
    pub tail_penalty: Option<f64>,

    // --- aggressive overlay ---
    pub read_triggered_gc: bool,

    // --- victim selection ---
    pub evict_policy: EvictPolicyKind,
    pub d_choice_param: u32,

    // --- run control ---
    pub seed: u64,
    pub metrics_enabled: bool,
    pub output_dir: PathBuf,
}

impl Default for FtlConfig {
    fn default() -> Self {
        Self {
            policy: GcPolicyKind::RlBaseline,
            total_blocks: 128,
            pages_per_block: 64,
            io_units_per_page: 1,
            write_fronts: 1,
            overprovision_ratio: 0.25,
            gc_threshold_ratio: 0.05,
            tgc: 10,
            tigc: 3,
            tagc: 100,
            max_page_copies: 2,
            max_gc_ops: 2,
            intensive_page_copies: 7,
            learning_rate: 0.3,
            discount_factor: 0.8,
            init_epsilon: 0.8,
            num_actions: 7,
            tail_penalty: None,
            read_triggered_gc: true,
            evict_policy: EvictPolicyKind::Greedy,
            d_choice_param: 3,
            seed: 42,
            metrics_enabled: true,
            output_dir: PathBuf::from("output"),
        }
    }
}

impl FtlConfig {
    /// Read and validate a JSON configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| FtlError::ConfigUnreadable {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|error| FtlError::InvalidConfig {
            detail: format!("{}: {error}", path.display()),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Cross-field consistency checks.
    pub fn validate(&self) -> Result<()> {
        let fail = |detail: String| Err(FtlError::InvalidConfig { detail });

        if self.total_blocks <= self.write_fronts.max(1) {
            return fail(format!(
                "total_blocks {} must exceed write_fronts {}",
                self.total_blocks, self.write_fronts
            ));
        }
        if self.pages_per_block == 0 {
            return fail("pages_per_block must be positive".to_owned());
        }
        if self.io_units_per_page == 0 || self.io_units_per_page > 32 {
            return fail(format!(
                "io_units_per_page {} outside [1, 32]",
                self.io_units_per_page
            ));
        }
        if !(0.0..1.0).contains(&self.overprovision_ratio) {
            return fail(format!(
                "overprovision_ratio {} outside [0, 1)",
                self.overprovision_ratio
            ));
        }
        if !(0.0..1.0).contains(&self.gc_threshold_ratio) {
            return fail(format!(
                "gc_threshold_ratio {} outside [0, 1)",
                self.gc_threshold_ratio
            ));
        }
        if self.tigc > self.tgc {
            return fail(format!("tigc {} must not exceed tgc {}", self.tigc, self.tgc));
        }
        if self.policy == GcPolicyKind::RlAggressive && self.tagc < self.tgc {
            return fail(format!("tagc {} must not undercut tgc {}", self.tagc, self.tgc));
        }
        if self.tgc >= self.total_blocks {
            return fail(format!(
                "tgc {} must be below total_blocks {}",
                self.tgc, self.total_blocks
            ));
        }
        if self.max_page_copies == 0 {
            return fail("max_page_copies must be positive".to_owned());
        }
        if self.num_actions == 0 {
            return fail("num_actions must be positive".to_owned());
        }
        if !(0.0..=1.0).contains(&self.learning_rate)
            || !(0.0..=1.0).contains(&self.discount_factor)
            || !(0.0..=1.0).contains(&self.init_epsilon)
        {
            return fail("learning_rate, discount_factor, init_epsilon must be in [0, 1]".to_owned());
        }
        if self.d_choice_param == 0 {
            return fail("d_choice_param must be positive".to_owned());
        }
        Ok(())
    }

    #[must_use]
    pub fn geometry(&self) -> DeviceGeometry {
        DeviceGeometry {
            total_blocks: self.total_blocks,
            pages_per_block: self.pages_per_block,
            io_units_per_page: self.io_units_per_page,
            write_fronts: self.write_fronts.max(1),
        }
    }

    #[must_use]
    fn rl_tuning(&self, whole_block_fallback: bool, default_tail: f64) -> RlTuning {
        RlTuning {
            tgc: self.tgc,
            tigc: self.tigc,
            max_page_copies: self.max_page_copies,
            intensive_page_copies: self.intensive_page_copies,
            tail_penalty: self.tail_penalty.unwrap_or(default_tail),
            learning_rate: self.learning_rate,
            discount_factor: self.discount_factor,
            init_epsilon: self.init_epsilon,
            num_actions: self.num_actions,
            seed: self.seed,
            whole_block_fallback,
        }
    }

    /// Construct the configured policy value.
    #[must_use]
    pub fn build_policy(&self) -> GcPolicy {
        match self.policy {
            GcPolicyKind::Default => {
                // The default policy reclaims whole blocks once the free
                // ratio collapses: a threshold policy with an uncapped
                // (block-sized) budget.
                let threshold =
                    (f64::from(self.total_blocks) * self.gc_threshold_ratio).ceil() as u32;
                GcPolicy::LazyRtgc(LazyRtgc::new(threshold.max(1), self.pages_per_block))
            }
            GcPolicyKind::LazyRtgc => {
                GcPolicy::LazyRtgc(LazyRtgc::new(self.tgc, self.max_page_copies))
            }
            GcPolicyKind::RlBaseline => {
                GcPolicy::RlBaseline(RlScheduler::new(self.rl_tuning(false, -1.0)))
            }
            GcPolicyKind::RlIntensive => {
                GcPolicy::RlBaseline(RlScheduler::new(self.rl_tuning(true, -1.0)))
            }
            GcPolicyKind::RlAggressive => GcPolicy::RlAggressive(RlAggressive::new(
                self.rl_tuning(false, -0.5),
                AggressiveTuning {
                    tagc: self.tagc,
                    max_early_ops: self.max_gc_ops,
                    read_triggered: self.read_triggered_gc,
                },
            )),
        }
    }

    #[must_use]
    pub fn build_selector(&self) -> VictimSelector {
        VictimSelector::new(
            self.evict_policy,
            self.d_choice_param,
            self.seed.wrapping_add(1),
        )
    }

    #[must_use]
    pub fn build_sink(&self) -> MetricsSink {
        if self.metrics_enabled {
            let prefix = match self.policy {
                GcPolicyKind::Default => "default_gc",
                GcPolicyKind::LazyRtgc => "lazy_rtgc",
                GcPolicyKind::RlBaseline => "rl_baseline",
                GcPolicyKind::RlIntensive => "rl_intensive",
                GcPolicyKind::RlAggressive => "rl_aggressive",
            };
            MetricsSink::new(self.output_dir.clone(), prefix)
        } else {
            MetricsSink::disabled()
        }
    }
}
