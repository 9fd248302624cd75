//! Property test: the cross-structure invariants survive arbitrary
//! interleavings of writes, trims, and partial-GC steps.

use ferroftl_core::{Ftl, VictimSelector};
use ferroftl_types::{DeviceGeometry, EvictPolicyKind, IoUnitMask, Lpn};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Write(u64),
    Trim(u64),
    Gc { budget: u32 },
}

fn op_strategy(logical_pages: u64) -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..logical_pages).prop_map(Op::Write),
        1 => (0..logical_pages).prop_map(Op::Trim),
        1 => (1_u32..8).prop_map(|budget| Op::Gc { budget }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_invariants_hold_under_random_ops(
        ops in proptest::collection::vec(op_strategy(48), 1..250),
        seed in 0_u64..1_000,
    ) {
        let geometry = DeviceGeometry {
            total_blocks: 16,
            pages_per_block: 8,
            io_units_per_page: 1,
            write_fronts: 1,
        };
        let mut ftl = Ftl::new(geometry).expect("ftl");
        let mut selector = VictimSelector::new(EvictPolicyKind::Greedy, 3, seed);
        let mut tick = 0_u64;

        for op in ops {
            tick += 100;
            match op {
                Op::Write(lpn) => {
                    ftl.write(Lpn::new(lpn), IoUnitMask::full(1), tick).expect("write");
                }
                Op::Trim(lpn) => ftl.trim(Lpn::new(lpn)),
                Op::Gc { budget } => {
                    if let Some(&victim) = selector.select(&ftl, tick, 1, None).first() {
                        ftl.partial_gc(victim, budget, tick).expect("gc");
                    }
                }
            }

            // The harness plays the overprovisioning contract: reclaim
            // whole victims whenever free space runs low.
            while ftl.free_blocks() <= 2 {
                let Some(&victim) = selector.select(&ftl, tick, 1, None).first() else {
                    break;
                };
                ftl.partial_gc(victim, geometry.pages_per_block, tick).expect("drain");
            }

            ftl.verify_invariants().expect("invariants");
        }
    }

    #[test]
    fn prop_valid_pages_never_increase_across_gc(
        writes in proptest::collection::vec(0_u64..32, 20..120),
        budget in 1_u32..6,
    ) {
        let geometry = DeviceGeometry {
            total_blocks: 12,
            pages_per_block: 8,
            io_units_per_page: 1,
            write_fronts: 1,
        };
        let mut ftl = Ftl::new(geometry).expect("ftl");
        let mut selector = VictimSelector::new(EvictPolicyKind::Greedy, 3, 9);
        let mut tick = 0_u64;

        for lpn in writes {
            tick += 100;
            ftl.write(Lpn::new(lpn), IoUnitMask::full(1), tick).expect("write");
            while ftl.free_blocks() <= 2 {
                let Some(&victim) = selector.select(&ftl, tick, 1, None).first() else {
                    break;
                };
                ftl.partial_gc(victim, geometry.pages_per_block, tick).expect("drain");
            }
        }

        // GC steps only ever move or retire valid pages, never mint them.
        for _ in 0..60 {
            let Some(&victim) = selector.select(&ftl, tick, 1, None).first() else {
                break;
            };
            let before = ftl.valid_pages_total();
            ftl.partial_gc(victim, budget, tick).expect("gc");
            prop_assert!(ftl.valid_pages_total() <= before);
            ftl.verify_invariants().expect("invariants");
        }
    }
}
