//! Physical erase-block state: per-page validity, logical-page tags, the
//! write cursor, and erase bookkeeping.
//!
//! A block walks a strict lifecycle: pages are written in ascending order
//! through `next_write`, individually invalidated by overwrite/trim/GC, and
//! the whole block is erased only once no valid page remains. Position
//! `next_write == pages_per_block` seals the block, making it eligible for
//! victim selection.

use ferroftl_error::{FtlError, Result};
use ferroftl_types::{BlockId, IoUnitMask, Lpn, PageIndex, Tick};

/// One physical page: the logical page stored in it and which io-units of
/// it are still valid.
#[derive(Debug, Clone, Default)]
pub struct PageState {
    lpn: Option<Lpn>,
    valid: IoUnitMask,
}

impl PageState {
    #[must_use]
    pub fn lpn(&self) -> Option<Lpn> {
        self.lpn
    }

    #[must_use]
    pub fn valid(&self) -> IoUnitMask {
        self.valid
    }

    fn reset(&mut self) {
        self.lpn = None;
        self.valid = IoUnitMask::EMPTY;
    }
}

/// A physical erase-block in the arena.
#[derive(Debug, Clone)]
pub struct Block {
    id: BlockId,
    pages: Vec<PageState>,
    next_write: u32,
    erase_count: u32,
    last_accessed: Tick,
    valid_count: u32,
    dirty_count: u32,
}

impl Block {
    #[must_use]
    pub fn new(id: BlockId, pages_per_block: u32) -> Self {
        Self {
            id,
            pages: vec![PageState::default(); pages_per_block as usize],
            next_write: 0,
            erase_count: 0,
            last_accessed: 0,
            valid_count: 0,
            dirty_count: 0,
        }
    }

    #[must_use]
    pub fn id(&self) -> BlockId {
        self.id
    }

    #[must_use]
    pub fn pages_per_block(&self) -> u32 {
        self.pages.len() as u32
    }

    /// Pages that still hold at least one valid io-unit.
    #[must_use]
    pub fn valid_count(&self) -> u32 {
        self.valid_count
    }

    /// Pages written and since fully invalidated.
    #[must_use]
    pub fn dirty_count(&self) -> u32 {
        self.dirty_count
    }

    #[must_use]
    pub fn next_write_index(&self) -> u32 {
        self.next_write
    }

    #[must_use]
    pub fn erase_count(&self) -> u32 {
        self.erase_count
    }

    #[must_use]
    pub fn last_accessed(&self) -> Tick {
        self.last_accessed
    }

    /// Sealed blocks accept no further writes and are eligible victims.
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.next_write as usize == self.pages.len()
    }

    /// Fraction of the block's pages that are written-and-invalid.
    #[must_use]
    pub fn invalid_fraction(&self) -> f64 {
        f64::from(self.dirty_count) / self.pages.len() as f64
    }

    /// Append a page at the write cursor. Fails once the block is sealed.
    pub fn write_page(&mut self, lpn: Lpn, units: IoUnitMask, tick: Tick) -> Result<PageIndex> {
        if self.is_sealed() {
            return Err(FtlError::BlockSealed { block: self.id });
        }
        let index = self.next_write;
        let page = &mut self.pages[index as usize];
        page.lpn = Some(lpn);
        page.valid = units;
        self.next_write += 1;
        self.valid_count += 1;
        self.last_accessed = tick;
        Ok(PageIndex::new(index))
    }

    /// Invalidate one io-unit of a page. Idempotent on already-invalid
    /// units; out-of-range pages are ignored.
    pub fn invalidate(&mut self, page: PageIndex, unit: u32) {
        let Some(state) = self.pages.get_mut(page.index()) else {
            return;
        };
        if !state.valid.test(unit) {
            return;
        }
        state.valid = state.valid.without(unit);
        if state.valid.is_empty() {
            self.valid_count -= 1;
            self.dirty_count += 1;
        }
    }

    /// Invalidate every io-unit in `mask` on the given page.
    pub fn invalidate_mask(&mut self, page: PageIndex, mask: IoUnitMask) {
        for unit in mask.iter_set() {
            self.invalidate(page, unit);
        }
    }

    /// Read a page's logical tag and valid mask, touching the access time.
    pub fn read_page(&mut self, page: PageIndex, tick: Tick) -> (Option<Lpn>, IoUnitMask) {
        self.last_accessed = tick;
        self.page_info(page)
    }

    /// Non-mutating page inspection for GC scans.
    #[must_use]
    pub fn page_info(&self, page: PageIndex) -> (Option<Lpn>, IoUnitMask) {
        self.pages
            .get(page.index())
            .map_or((None, IoUnitMask::EMPTY), |state| (state.lpn, state.valid))
    }

    /// Erase the block: fails while valid pages remain, otherwise resets all
    /// per-page state, rewinds the write cursor, and bumps the erase count.
    pub fn erase(&mut self) -> Result<()> {
        if self.valid_count != 0 {
            return Err(FtlError::EraseWithValidPages {
                block: self.id,
                valid: self.valid_count,
            });
        }
        for page in &mut self.pages {
            page.reset();
        }
        self.next_write = 0;
        self.dirty_count = 0;
        self.erase_count += 1;
        Ok(())
    }

    /// Per-block structural invariant:
    /// `valid_count + dirty_count ≤ next_write ≤ pages_per_block`.
    pub fn check_invariants(&self) -> Result<()> {
        let written = self.valid_count + self.dirty_count;
        if written > self.next_write || self.next_write as usize > self.pages.len() {
            return Err(FtlError::CorruptMapping {
                lpn: Lpn::new(0),
                block: self.id,
                page: PageIndex::new(self.next_write),
                detail: format!(
                    "block counters out of range: valid {} + dirty {} > next-write {}",
                    self.valid_count, self.dirty_count, self.next_write
                ),
            });
        }
        // Pages at or past the cursor must be unwritten.
        for index in self.next_write as usize..self.pages.len() {
            if self.pages[index].lpn.is_some() || self.pages[index].valid.any() {
                return Err(FtlError::CorruptMapping {
                    lpn: self.pages[index].lpn.unwrap_or(Lpn::new(0)),
                    block: self.id,
                    page: PageIndex::new(index as u32),
                    detail: "written page beyond next-write cursor".to_owned(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block() -> Block {
        Block::new(BlockId::new(0), 4)
    }

    #[test]
    fn test_write_advances_cursor_and_counts() {
        let mut b = block();
        let page = b
            .write_page(Lpn::new(7), IoUnitMask::full(1), 100)
            .expect("write");
        assert_eq!(page, PageIndex::new(0));
        assert_eq!(b.next_write_index(), 1);
        assert_eq!(b.valid_count(), 1);
        assert_eq!(b.last_accessed(), 100);
        b.check_invariants().expect("invariants");
    }

    #[test]
    fn test_write_to_sealed_block_fails() {
        let mut b = block();
        for i in 0..4 {
            b.write_page(Lpn::new(i), IoUnitMask::full(1), 0)
                .expect("write");
        }
        assert!(b.is_sealed());
        assert!(matches!(
            b.write_page(Lpn::new(9), IoUnitMask::full(1), 0),
            Err(FtlError::BlockSealed { .. })
        ));
    }

    #[test]
    fn test_invalidate_idempotent() {
        let mut b = block();
        b.write_page(Lpn::new(1), IoUnitMask::full(2), 0)
            .expect("write");
        b.invalidate(PageIndex::new(0), 0);
        assert_eq!(b.valid_count(), 1);
        b.invalidate(PageIndex::new(0), 0);
        assert_eq!(b.valid_count(), 1);
        b.invalidate(PageIndex::new(0), 1);
        assert_eq!(b.valid_count(), 0);
        assert_eq!(b.dirty_count(), 1);
        b.check_invariants().expect("invariants");
    }

    #[test]
    fn test_erase_requires_no_valid_pages() {
        let mut b = block();
        b.write_page(Lpn::new(1), IoUnitMask::full(1), 0)
            .expect("write");
        assert!(matches!(
            b.erase(),
            Err(FtlError::EraseWithValidPages { valid: 1, .. })
        ));
        b.invalidate(PageIndex::new(0), 0);
        b.erase().expect("erase");
        assert_eq!(b.erase_count(), 1);
        assert_eq!(b.next_write_index(), 0);
        assert_eq!(b.dirty_count(), 0);
        assert_eq!(b.page_info(PageIndex::new(0)).0, None);
    }

    #[test]
    fn test_invalid_fraction() {
        let mut b = block();
        for i in 0..4 {
            b.write_page(Lpn::new(i), IoUnitMask::full(1), 0)
                .expect("write");
        }
        for page in 0..3 {
            b.invalidate(PageIndex::new(page), 0);
        }
        assert!((b.invalid_fraction() - 0.75).abs() < f64::EPSILON);
    }
}
