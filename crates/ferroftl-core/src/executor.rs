//! Partial-GC executor: copy up to a budget of valid pages out of a victim
//! block, then erase it once drained.
//!
//! The copy loop walks the victim's pages in ascending order. Each valid
//! page is read, rewritten through the normal write-front path, its mapping
//! entry relocated, and the source io-units invalidated. Free-list
//! exhaustion mid-copy is fatal: overprovisioning must guarantee enough
//! headroom, and a step that cannot finish leaves no safe state to resume
//! from.

use ferroftl_error::{FtlError, Result};
use ferroftl_types::{BlockId, PageIndex, Tick};

use crate::ftl::Ftl;

/// What one partial-GC step accomplished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GcStepOutcome {
    pub pages_copied: u32,
    pub erased: bool,
}

impl Ftl {
    /// Copy up to `budget` valid pages from `victim` into freshly allocated
    /// space, erase the victim if that drained it, and return the counts.
    pub fn partial_gc(&mut self, victim: BlockId, budget: u32, tick: Tick) -> Result<GcStepOutcome> {
        if budget == 0 {
            return Ok(GcStepOutcome {
                pages_copied: 0,
                erased: false,
            });
        }
        let pages_per_block = self.block(victim)?.pages_per_block();

        let mut copied = 0_u32;
        for page in 0..pages_per_block {
            if copied >= budget || self.block(victim)?.valid_count() == 0 {
                break;
            }
            let source = PageIndex::new(page);
            let (page_lpn, valid) = self.block(victim)?.page_info(source);
            if !valid.any() {
                continue;
            }
            let lpn = page_lpn.ok_or_else(|| FtlError::CorruptMapping {
                lpn: ferroftl_types::Lpn::new(0),
                block: victim,
                page: source,
                detail: "valid page without a logical tag".to_owned(),
            })?;

            // The mapping must agree with the page being moved.
            match self.mapping().lookup(lpn) {
                Some(entry) if entry.block == victim && entry.page == source => {}
                other => {
                    return Err(FtlError::CorruptMapping {
                        lpn,
                        block: victim,
                        page: source,
                        detail: format!("stale GC source, mapping says {other:?}"),
                    });
                }
            }

            let dest = self.open_front(valid)?;
            let dest_page = self
                .block_mut(dest)?
                .write_page(lpn, valid, tick)
                .map_err(|_| FtlError::DestinationOverrun { block: dest })?;
            self.mapping_mut().relocate(lpn, dest, dest_page);
            self.block_mut(victim)?.invalidate_mask(source, valid);
            copied += 1;
        }

        let erased = self.block(victim)?.valid_count() == 0;
        if erased {
            self.erase_block(victim)?;
        }
        tracing::debug!(victim = %victim, copied, erased, "partial GC step");
        Ok(GcStepOutcome {
            pages_copied: copied,
            erased,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferroftl_types::{DeviceGeometry, IoUnitMask, Lpn};

    /// One sealed block with `valid` valid pages out of 8, plus an open
    /// front, on a device with `total` blocks.
    fn device(total: u32, valid: u32) -> Ftl {
        let geometry = DeviceGeometry {
            total_blocks: total,
            pages_per_block: 8,
            io_units_per_page: 1,
            write_fronts: 1,
        };
        let mut ftl = Ftl::new(geometry).expect("ftl");
        for lpn in 0..8_u64 {
            ftl.write(Lpn::new(lpn), IoUnitMask::full(1), lpn).expect("write");
        }
        for lpn in 0..u64::from(8 - valid) {
            ftl.trim(Lpn::new(lpn));
        }
        // Rotate the sealed block out of the write front.
        ftl.write(Lpn::new(100), IoUnitMask::full(1), 100).expect("write");
        ftl
    }

    fn sealed_victim(ftl: &Ftl) -> BlockId {
        ftl.gc_candidates().next().expect("victim").id()
    }

    #[test]
    fn test_budget_caps_copies() {
        let mut ftl = device(8, 5);
        let victim = sealed_victim(&ftl);
        let outcome = ftl.partial_gc(victim, 2, 1_000).expect("gc");
        assert_eq!(outcome, GcStepOutcome { pages_copied: 2, erased: false });
        assert_eq!(ftl.block(victim).expect("live").valid_count(), 3);
        ftl.verify_invariants().expect("invariants");
    }

    #[test]
    fn test_drain_erases_and_frees() {
        let mut ftl = device(8, 2);
        let victim = sealed_victim(&ftl);
        let free_before = ftl.free_blocks();
        let outcome = ftl.partial_gc(victim, 8, 1_000).expect("gc");
        assert_eq!(outcome, GcStepOutcome { pages_copied: 2, erased: true });
        assert_eq!(ftl.free_blocks(), free_before + 1);
        assert!(ftl.block(victim).is_err());
        ftl.verify_invariants().expect("invariants");
    }

    #[test]
    fn test_copied_pages_stay_readable() {
        let mut ftl = device(8, 3);
        let victim = sealed_victim(&ftl);
        ftl.partial_gc(victim, 8, 1_000).expect("gc");
        // LPNs 5..8 survived the trim and must still resolve.
        for lpn in 5..8_u64 {
            let entry = ftl.read(Lpn::new(lpn), 2_000).expect("mapped");
            assert_ne!(entry.block, victim);
        }
        ftl.verify_invariants().expect("invariants");
    }

    #[test]
    fn test_valid_total_non_increasing_across_steps() {
        let mut ftl = device(8, 6);
        let victim = sealed_victim(&ftl);
        let before = ftl.valid_pages_total();
        for _ in 0..3 {
            let outcome = ftl.partial_gc(victim, 2, 1_000).expect("gc");
            assert!(ftl.valid_pages_total() <= before);
            if outcome.erased {
                break;
            }
        }
        assert_eq!(ftl.valid_pages_total(), before);
        ftl.verify_invariants().expect("invariants");
    }

    #[test]
    fn test_already_empty_victim_just_erases() {
        let mut ftl = device(8, 0);
        let victim = sealed_victim(&ftl);
        let outcome = ftl.partial_gc(victim, 4, 1_000).expect("gc");
        assert_eq!(outcome, GcStepOutcome { pages_copied: 0, erased: true });
    }

    #[test]
    fn test_zero_budget_is_a_no_op() {
        let mut ftl = device(8, 4);
        let victim = sealed_victim(&ftl);
        let outcome = ftl.partial_gc(victim, 0, 1_000).expect("gc");
        assert_eq!(outcome, GcStepOutcome { pages_copied: 0, erased: false });
        assert!(ftl.block(victim).is_ok());
    }

    #[test]
    fn test_free_list_exhaustion_is_fatal() {
        // Two blocks: one sealed full of valid pages, one open front, zero
        // free. The first copy cannot allocate.
        let geometry = DeviceGeometry {
            total_blocks: 2,
            pages_per_block: 8,
            io_units_per_page: 1,
            write_fronts: 1,
        };
        let mut ftl = Ftl::new(geometry).expect("ftl");
        for lpn in 0..9_u64 {
            ftl.write(Lpn::new(lpn), IoUnitMask::full(1), lpn).expect("write");
        }
        assert_eq!(ftl.free_blocks(), 0);
        let victim = sealed_victim(&ftl);
        // The open front has 7 pages left; drain more than that.
        let result = ftl.partial_gc(victim, 8, 1_000);
        assert!(matches!(result, Err(FtlError::FreeListExhausted)));
    }

    #[test]
    fn test_gc_on_non_live_block_is_fatal() {
        let mut ftl = device(8, 0);
        let victim = sealed_victim(&ftl);
        ftl.partial_gc(victim, 1, 500).expect("gc");
        assert!(matches!(
            ftl.partial_gc(victim, 1, 600),
            Err(FtlError::NoSuchBlock { .. })
        ));
    }
}
