//! The FTL core: a fixed arena of erase-blocks with the live set and the
//! free list as two disjoint index collections over it, the mapping table,
//! and the slot-hinted write fronts that writes and GC copies allocate
//! through.
//!
//! Host-visible operations are `write`, `read`, and `trim`; the partial-GC
//! executor lives in [`crate::executor`] and mutates the same state through
//! the methods here.

use std::collections::BTreeSet;

use ferroftl_error::{FtlError, Result};
use ferroftl_types::{BlockId, DeviceGeometry, IoUnitMask, Lpn, PageIndex, Tick};

use crate::block::Block;
use crate::free_list::FreeBlockList;
use crate::mapping::{MapEntry, MappingTable};

/// The FTL's exclusive mutable state.
#[derive(Debug)]
pub struct Ftl {
    geometry: DeviceGeometry,
    arena: Vec<Block>,
    live: BTreeSet<BlockId>,
    free: FreeBlockList,
    mapping: MappingTable,
    /// Currently open block per write front.
    fronts: Vec<BlockId>,
    front_cursor: usize,
    front_iomap: IoUnitMask,
    /// Set when a front sealed and was replaced; GC may reclaim extra
    /// blocks to compensate.
    reclaim_more: bool,
}

impl Ftl {
    /// Build the device: the full block population enters the free list,
    /// then one block per write front is opened.
    pub fn new(geometry: DeviceGeometry) -> Result<Self> {
        let fronts = geometry.write_fronts.max(1);
        if geometry.total_blocks <= fronts {
            return Err(FtlError::InvalidConfig {
                detail: format!(
                    "total_blocks {} must exceed write_fronts {}",
                    geometry.total_blocks, fronts
                ),
            });
        }

        let arena: Vec<Block> = (0..geometry.total_blocks)
            .map(|index| Block::new(BlockId::new(index), geometry.pages_per_block))
            .collect();
        let mut free = FreeBlockList::new();
        free.seed(arena.iter().map(Block::id));

        let mut ftl = Self {
            geometry,
            arena,
            live: BTreeSet::new(),
            free,
            mapping: MappingTable::new(),
            fronts: Vec::with_capacity(fronts as usize),
            front_cursor: 0,
            front_iomap: IoUnitMask::EMPTY,
            reclaim_more: false,
        };
        for slot in 0..fronts {
            let id = ftl.take_free_block(slot)?;
            ftl.fronts.push(id);
        }
        Ok(ftl)
    }

    #[must_use]
    pub fn geometry(&self) -> DeviceGeometry {
        self.geometry
    }

    /// Blocks currently available for allocation.
    #[must_use]
    pub fn free_blocks(&self) -> u32 {
        self.free.len() as u32
    }

    #[must_use]
    pub fn mapping(&self) -> &MappingTable {
        &self.mapping
    }

    pub(crate) fn mapping_mut(&mut self) -> &mut MappingTable {
        &mut self.mapping
    }

    /// A live block by id.
    pub fn block(&self, id: BlockId) -> Result<&Block> {
        if !self.live.contains(&id) {
            return Err(FtlError::NoSuchBlock { block: id });
        }
        Ok(&self.arena[id.index()])
    }

    pub(crate) fn block_mut(&mut self, id: BlockId) -> Result<&mut Block> {
        if !self.live.contains(&id) {
            return Err(FtlError::NoSuchBlock { block: id });
        }
        Ok(&mut self.arena[id.index()])
    }

    /// Whether the block is one of the open write fronts.
    #[must_use]
    pub fn is_front(&self, id: BlockId) -> bool {
        self.fronts.contains(&id)
    }

    /// Live, sealed, non-front blocks: the victim-selection universe.
    pub fn gc_candidates(&self) -> impl Iterator<Item = &Block> + '_ {
        self.live
            .iter()
            .map(|id| &self.arena[id.index()])
            .filter(|block| block.is_sealed())
            .filter(|block| !self.is_front(block.id()))
    }

    /// Consume the reclaim-more flag set when a write front sealed.
    pub fn take_reclaim_more(&mut self) -> bool {
        std::mem::take(&mut self.reclaim_more)
    }

    fn take_free_block(&mut self, slot: u32) -> Result<BlockId> {
        let id = self
            .free
            .pop_for_slot(slot, self.geometry.write_fronts.max(1))
            .ok_or(FtlError::FreeListExhausted)?;
        if !self.live.insert(id) {
            return Err(FtlError::DoubleFree { block: id });
        }
        Ok(id)
    }

    /// Pick the destination block for a write or GC copy, rotating across
    /// write fronts when the request's io-units collide with the units
    /// already directed at the current front.
    pub(crate) fn open_front(&mut self, units: IoUnitMask) -> Result<BlockId> {
        if self.front_iomap.intersect(units).any() {
            self.front_cursor = (self.front_cursor + 1) % self.fronts.len();
            self.front_iomap = units;
        } else {
            self.front_iomap = self.front_iomap.union(units);
        }

        let current = self.fronts[self.front_cursor];
        if self.arena[current.index()].is_sealed() {
            let replacement = self.take_free_block(self.front_cursor as u32)?;
            tracing::debug!(
                sealed = %current,
                replacement = %replacement,
                "write front sealed, opened replacement block"
            );
            self.fronts[self.front_cursor] = replacement;
            self.reclaim_more = true;
        }
        Ok(self.fronts[self.front_cursor])
    }

    /// Host write: invalidate any prior location, then append to a write
    /// front and update the mapping.
    ///
    /// A write whose mask covers only part of the currently-valid units
    /// relocates the surviving units together with the new ones, so a
    /// physical page always holds exactly one logical page.
    pub fn write(&mut self, lpn: Lpn, units: IoUnitMask, tick: Tick) -> Result<MapEntry> {
        debug_assert!(units.any(), "write with empty io-unit mask");

        let mut total_units = units;
        if let Some(previous) = self.mapping.lookup(lpn) {
            total_units = total_units.union(previous.units);
            self.arena[previous.block.index()].invalidate_mask(previous.page, previous.units);
        }

        let dest = self.open_front(total_units)?;
        let page = self.arena[dest.index()].write_page(lpn, total_units, tick)?;
        let entry = MapEntry {
            block: dest,
            page,
            units: total_units,
        };
        self.mapping.upsert(lpn, entry);
        Ok(entry)
    }

    /// Host read: resolve the mapping and touch the block's access time.
    /// Unmapped LPNs read as `None`.
    pub fn read(&mut self, lpn: Lpn, tick: Tick) -> Option<MapEntry> {
        let entry = self.mapping.lookup(lpn)?;
        self.arena[entry.block.index()].read_page(entry.page, tick);
        Some(entry)
    }

    /// Host trim: drop the mapping and invalidate the physical page in one
    /// step. Trimming an unmapped LPN is a no-op.
    pub fn trim(&mut self, lpn: Lpn) {
        if let Some(entry) = self.mapping.remove(lpn) {
            self.arena[entry.block.index()].invalidate_mask(entry.page, entry.units);
        }
    }

    /// Trim a contiguous LPN range (host TRIM commands cover ranges).
    pub fn trim_range(&mut self, start: Lpn, pages: u64) {
        for offset in 0..pages {
            self.trim(Lpn::new(start.get() + offset));
        }
    }

    /// Erase a drained block and return it to the free list.
    pub fn erase_block(&mut self, id: BlockId) -> Result<()> {
        if !self.live.contains(&id) {
            return Err(FtlError::NoSuchBlock { block: id });
        }
        self.arena[id.index()].erase()?;
        self.live.remove(&id);
        if self.free.contains(id) {
            return Err(FtlError::DoubleFree { block: id });
        }
        let arena = &self.arena;
        self.free.reinsert(id, |block| arena[block.index()].erase_count());
        Ok(())
    }

    /// Total valid pages across live blocks.
    #[must_use]
    pub fn valid_pages_total(&self) -> u64 {
        self.live
            .iter()
            .map(|id| u64::from(self.arena[id.index()].valid_count()))
            .sum()
    }

    /// Total written-and-invalid pages across live blocks.
    #[must_use]
    pub fn dirty_pages_total(&self) -> u64 {
        self.live
            .iter()
            .map(|id| u64::from(self.arena[id.index()].dirty_count()))
            .sum()
    }

    /// Check every cross-structure invariant; returns the first violation.
    pub fn verify_invariants(&self) -> Result<()> {
        // Disjointness and full coverage of the arena.
        for id in &self.live {
            if self.free.contains(*id) {
                return Err(FtlError::DoubleFree { block: *id });
            }
        }
        if self.live.len() + self.free.len() != self.arena.len() {
            return Err(FtlError::CorruptMapping {
                lpn: Lpn::new(0),
                block: BlockId::new(0),
                page: PageIndex::new(0),
                detail: format!(
                    "live {} + free {} != total {}",
                    self.live.len(),
                    self.free.len(),
                    self.arena.len()
                ),
            });
        }

        // Per-block counters.
        for id in &self.live {
            self.arena[id.index()].check_invariants()?;
        }

        // Free list stays sorted by erase count.
        let mut previous = 0;
        for id in self.free.iter() {
            let count = self.arena[id.index()].erase_count();
            if count < previous {
                return Err(FtlError::CorruptMapping {
                    lpn: Lpn::new(0),
                    block: id,
                    page: PageIndex::new(0),
                    detail: "free list not sorted by erase count".to_owned(),
                });
            }
            previous = count;
        }

        // Mapping entries point at matching valid pages.
        for (lpn, entry) in self.mapping.iter() {
            if !self.live.contains(&entry.block) {
                return Err(FtlError::CorruptMapping {
                    lpn,
                    block: entry.block,
                    page: entry.page,
                    detail: "mapping references a non-live block".to_owned(),
                });
            }
            let (page_lpn, valid) = self.arena[entry.block.index()].page_info(entry.page);
            if page_lpn != Some(lpn) || !valid.contains(entry.units) {
                return Err(FtlError::CorruptMapping {
                    lpn,
                    block: entry.block,
                    page: entry.page,
                    detail: "mapping disagrees with page state".to_owned(),
                });
            }
        }

        // Every valid page is mapped back, exactly once by key uniqueness.
        for id in &self.live {
            let block = &self.arena[id.index()];
            for page in 0..block.next_write_index() {
                let (page_lpn, valid) = block.page_info(PageIndex::new(page));
                if !valid.any() {
                    continue;
                }
                let Some(lpn) = page_lpn else {
                    return Err(FtlError::CorruptMapping {
                        lpn: Lpn::new(0),
                        block: *id,
                        page: PageIndex::new(page),
                        detail: "valid page without a logical tag".to_owned(),
                    });
                };
                match self.mapping.lookup(lpn) {
                    Some(entry) if entry.block == *id && entry.page == PageIndex::new(page) => {}
                    _ => {
                        return Err(FtlError::CorruptMapping {
                            lpn,
                            block: *id,
                            page: PageIndex::new(page),
                            detail: "valid page not referenced by the mapping".to_owned(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}
