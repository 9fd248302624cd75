//! Free-block list ordered by erase count.
//!
//! Erased blocks re-enter by a reverse scan from the tail so the list stays
//! sorted ascending by erase count with ties keeping insertion order, which
//! biases allocation toward the least-worn blocks. Allocation takes a slot
//! hint so parallel write fronts spread across block indices.

use ferroftl_types::BlockId;

/// Ordered free-block indices over the arena.
#[derive(Debug, Default)]
pub struct FreeBlockList {
    order: Vec<BlockId>,
}

impl FreeBlockList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the list in the given order (erase counts are all equal at
    /// init, so arrival order is the tie order).
    pub fn seed(&mut self, blocks: impl IntoIterator<Item = BlockId>) {
        self.order.extend(blocks);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: BlockId) -> bool {
        self.order.contains(&id)
    }

    #[must_use]
    pub fn head(&self) -> Option<BlockId> {
        self.order.first().copied()
    }

    /// Remove and return the first block whose index lands on the requested
    /// write front (`index mod fronts == slot`); if none matches, the head.
    /// `None` only when the list is empty.
    pub fn pop_for_slot(&mut self, slot: u32, fronts: u32) -> Option<BlockId> {
        if self.order.is_empty() {
            return None;
        }
        let fronts = fronts.max(1);
        let position = self
            .order
            .iter()
            .position(|id| id.get() % fronts == slot % fronts)
            .unwrap_or(0);
        Some(self.order.remove(position))
    }

    /// Insert keeping erase-count order, scanning from the tail: the block
    /// lands after the last member with an erase count not exceeding its
    /// own.
    pub fn reinsert(&mut self, id: BlockId, erase_count_of: impl Fn(BlockId) -> u32) {
        let erase_count = erase_count_of(id);
        let mut insert_at = 0;
        for position in (0..self.order.len()).rev() {
            if erase_count_of(self.order[position]) <= erase_count {
                insert_at = position + 1;
                break;
            }
        }
        self.order.insert(insert_at, id);
    }

    pub fn iter(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.order.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[u32]) -> Vec<BlockId> {
        raw.iter().copied().map(BlockId::new).collect()
    }

    #[test]
    fn test_pop_for_slot_prefers_matching_front() {
        let mut list = FreeBlockList::new();
        list.seed(ids(&[0, 1, 2, 3, 4, 5]));
        // fronts = 2, slot = 1: first odd index.
        assert_eq!(list.pop_for_slot(1, 2), Some(BlockId::new(1)));
        assert_eq!(list.pop_for_slot(1, 2), Some(BlockId::new(3)));
    }

    #[test]
    fn test_pop_for_slot_falls_back_to_head() {
        let mut list = FreeBlockList::new();
        list.seed(ids(&[0, 2, 4]));
        assert_eq!(list.pop_for_slot(1, 2), Some(BlockId::new(0)));
    }

    #[test]
    fn test_pop_empty_is_none() {
        let mut list = FreeBlockList::new();
        assert_eq!(list.pop_for_slot(0, 1), None);
    }

    #[test]
    fn test_reinsert_keeps_erase_count_order() {
        // Erase counts: block 0 -> 1, block 1 -> 3, block 2 -> 2.
        let counts = [1_u32, 3, 2];
        let count_of = |id: BlockId| counts[id.index()];

        let mut list = FreeBlockList::new();
        list.reinsert(BlockId::new(1), count_of);
        list.reinsert(BlockId::new(0), count_of);
        list.reinsert(BlockId::new(2), count_of);

        let order: Vec<u32> = list.iter().map(BlockId::get).collect();
        assert_eq!(order, vec![0, 2, 1]);
    }

    #[test]
    fn test_reinsert_tie_goes_after_existing() {
        let count_of = |_: BlockId| 5_u32;
        let mut list = FreeBlockList::new();
        list.reinsert(BlockId::new(9), count_of);
        list.reinsert(BlockId::new(4), count_of);
        let order: Vec<u32> = list.iter().map(BlockId::get).collect();
        assert_eq!(order, vec![9, 4]);
    }
}
