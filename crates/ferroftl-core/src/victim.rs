//! Victim selection over sealed blocks.
//!
//! Four weighting policies share one pipeline: gather eligible blocks,
//! weight them, then take the `n` lowest with ties broken toward the lower
//! block index so identical devices pick identical victims.

use ferroftl_types::{BlockId, EvictPolicyKind, Tick};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::block::Block;
use crate::ftl::Ftl;

/// Stateful victim selector (the RNG drives random and d-choices sampling).
#[derive(Debug)]
pub struct VictimSelector {
    policy: EvictPolicyKind,
    d_choice_param: u32,
    rng: StdRng,
}

impl VictimSelector {
    #[must_use]
    pub fn new(policy: EvictPolicyKind, d_choice_param: u32, seed: u64) -> Self {
        Self {
            policy,
            d_choice_param: d_choice_param.max(1),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    #[must_use]
    pub fn policy(&self) -> EvictPolicyKind {
        self.policy
    }

    /// Pick at most `want` victims. Only sealed non-front blocks are
    /// eligible; `min_invalid` additionally gates on the block's
    /// invalid-page fraction (the aggressive policy's early-GC filter).
    pub fn select(
        &mut self,
        ftl: &Ftl,
        tick: Tick,
        want: usize,
        min_invalid: Option<f64>,
    ) -> Vec<BlockId> {
        let pages_per_block = f64::from(ftl.geometry().pages_per_block);
        let eligible: Vec<&Block> = ftl
            .gc_candidates()
            .filter(|block| {
                min_invalid.map_or(true, |threshold| block.invalid_fraction() > threshold)
            })
            .collect();
        if eligible.is_empty() || want == 0 {
            return Vec::new();
        }

        let mut weighted: Vec<(BlockId, f64)> = match self.policy {
            EvictPolicyKind::Greedy | EvictPolicyKind::Random | EvictPolicyKind::DChoice => {
                eligible
                    .iter()
                    .map(|block| (block.id(), f64::from(block.valid_count())))
                    .collect()
            }
            EvictPolicyKind::CostBenefit => eligible
                .iter()
                .map(|block| {
                    let utilization = f64::from(block.valid_count()) / pages_per_block;
                    let age = tick.saturating_sub(block.last_accessed()).max(1) as f64;
                    let weight = if utilization >= 1.0 {
                        f64::INFINITY
                    } else {
                        utilization / ((1.0 - utilization) * age)
                    };
                    (block.id(), weight)
                })
                .collect(),
        };

        // Random and d-choices restrict the sorted pool to a uniform sample.
        if matches!(
            self.policy,
            EvictPolicyKind::Random | EvictPolicyKind::DChoice
        ) {
            let sample_size = match self.policy {
                EvictPolicyKind::Random => want,
                _ => self.d_choice_param as usize * want,
            }
            .min(weighted.len());
            let chosen =
                rand::seq::index::sample(&mut self.rng, weighted.len(), sample_size).into_vec();
            let mut sampled: Vec<(BlockId, f64)> =
                chosen.into_iter().map(|index| weighted[index]).collect();
            if self.policy == EvictPolicyKind::Random {
                // Random takes the sample as-is; order by index for
                // determinism of the returned list.
                sampled.sort_by_key(|(id, _)| *id);
                return sampled.into_iter().map(|(id, _)| id).collect();
            }
            weighted = sampled;
        }

        weighted.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        weighted
            .into_iter()
            .take(want)
            .map(|(id, _)| id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferroftl_error::Result;
    use ferroftl_types::{DeviceGeometry, IoUnitMask, Lpn};

    /// Build a device with four sealed blocks of the given valid counts
    /// (the rest of each block trimmed away) plus one open front.
    fn device_with_valid_counts(counts: &[u32]) -> Result<Ftl> {
        let pages = 64;
        let geometry = DeviceGeometry {
            total_blocks: counts.len() as u32 + 4,
            pages_per_block: pages,
            io_units_per_page: 1,
            write_fronts: 1,
        };
        let mut ftl = Ftl::new(geometry)?;
        let mut lpn = 0_u64;
        for &valid in counts {
            let mut block_lpns = Vec::new();
            for _ in 0..pages {
                ftl.write(Lpn::new(lpn), IoUnitMask::full(1), lpn)?;
                block_lpns.push(Lpn::new(lpn));
                lpn += 1;
            }
            // Trim down to the requested valid count.
            for trim in block_lpns.iter().take((pages - valid) as usize) {
                ftl.trim(*trim);
            }
        }
        // One more write rotates the last sealed block out of the front.
        ftl.write(Lpn::new(lpn), IoUnitMask::full(1), lpn)?;
        ftl.verify_invariants()?;
        Ok(ftl)
    }

    #[test]
    fn test_greedy_picks_fewest_valid_lowest_index() {
        let ftl = device_with_valid_counts(&[32, 8, 40, 8]).expect("device");
        let mut selector = VictimSelector::new(EvictPolicyKind::Greedy, 3, 1);
        let victims = selector.select(&ftl, 10_000, 1, None);
        // Blocks 1 and 3 tie at 8 valid pages; the lower index wins.
        assert_eq!(victims, vec![BlockId::new(1)]);
    }

    #[test]
    fn test_greedy_returns_at_most_want() {
        let ftl = device_with_valid_counts(&[32, 8, 40, 8]).expect("device");
        let mut selector = VictimSelector::new(EvictPolicyKind::Greedy, 3, 1);
        let victims = selector.select(&ftl, 10_000, 2, None);
        assert_eq!(victims, vec![BlockId::new(1), BlockId::new(3)]);
        assert_eq!(selector.select(&ftl, 10_000, 10, None).len(), 4);
    }

    #[test]
    fn test_cost_benefit_prefers_cold_sparse_blocks() {
        // Equal valid counts: the older (smaller last-accessed) block wins
        // because age divides the weight.
        let ftl = device_with_valid_counts(&[16, 16]).expect("device");
        let mut selector = VictimSelector::new(EvictPolicyKind::CostBenefit, 3, 1);
        let victims = selector.select(&ftl, 1_000_000, 1, None);
        assert_eq!(victims, vec![BlockId::new(0)]);
    }

    #[test]
    fn test_random_is_deterministic_under_seed() {
        let ftl = device_with_valid_counts(&[8, 8, 8, 8]).expect("device");
        let mut a = VictimSelector::new(EvictPolicyKind::Random, 3, 77);
        let mut b = VictimSelector::new(EvictPolicyKind::Random, 3, 77);
        assert_eq!(
            a.select(&ftl, 10_000, 2, None),
            b.select(&ftl, 10_000, 2, None)
        );
    }

    #[test]
    fn test_d_choice_takes_greedy_minimum_of_sample() {
        let ftl = device_with_valid_counts(&[8, 60, 60, 60]).expect("device");
        // d = 4 with one victim wanted samples every block, so the greedy
        // minimum must win.
        let mut selector = VictimSelector::new(EvictPolicyKind::DChoice, 4, 5);
        let victims = selector.select(&ftl, 10_000, 1, None);
        assert_eq!(victims, vec![BlockId::new(0)]);
    }

    #[test]
    fn test_min_invalid_filter_gates_eligibility() {
        // 8/64 valid = 56/64 invalid ≈ 0.875; 40/64 valid = 0.375 invalid.
        let ftl = device_with_valid_counts(&[40, 8]).expect("device");
        let mut selector = VictimSelector::new(EvictPolicyKind::Greedy, 3, 1);
        let victims = selector.select(&ftl, 10_000, 2, Some(0.6));
        assert_eq!(victims, vec![BlockId::new(1)]);
    }

    #[test]
    fn test_empty_universe_returns_empty() {
        let geometry = DeviceGeometry {
            total_blocks: 4,
            pages_per_block: 16,
            io_units_per_page: 1,
            write_fronts: 1,
        };
        let ftl = Ftl::new(geometry).expect("ftl");
        let mut selector = VictimSelector::new(EvictPolicyKind::Greedy, 3, 1);
        assert!(selector.select(&ftl, 0, 1, None).is_empty());
    }
}
