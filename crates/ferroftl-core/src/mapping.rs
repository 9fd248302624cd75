//! Logical-to-physical mapping table.
//!
//! A partial function from LPN to one `(block, page, io-unit-mask)` triple.
//! Entries are created on first write, relocated by overwrite and GC copy,
//! and destroyed by trim. Invalidation of the prior physical page is the
//! caller's job (the table has no view of the block arena); [`upsert`]
//! returns the displaced entry so the caller can do it atomically.
//!
//! [`upsert`]: MappingTable::upsert

use std::collections::HashMap;

use ferroftl_types::{BlockId, IoUnitMask, Lpn, PageIndex};

/// Physical location of a logical page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapEntry {
    pub block: BlockId,
    pub page: PageIndex,
    pub units: IoUnitMask,
}

/// The page-level mapping table.
#[derive(Debug, Default)]
pub struct MappingTable {
    entries: HashMap<Lpn, MapEntry>,
}

impl MappingTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` means unmapped, which is not an error.
    #[must_use]
    pub fn lookup(&self, lpn: Lpn) -> Option<MapEntry> {
        self.entries.get(&lpn).copied()
    }

    /// Insert or replace, returning the displaced entry if any.
    pub fn upsert(&mut self, lpn: Lpn, entry: MapEntry) -> Option<MapEntry> {
        self.entries.insert(lpn, entry)
    }

    /// Remove on trim, returning the entry that must be invalidated.
    pub fn remove(&mut self, lpn: Lpn) -> Option<MapEntry> {
        self.entries.remove(&lpn)
    }

    /// Move an entry to a new physical location, keeping its unit mask.
    /// Returns the previous location, or `None` if the LPN was unmapped.
    pub fn relocate(&mut self, lpn: Lpn, block: BlockId, page: PageIndex) -> Option<MapEntry> {
        let entry = self.entries.get_mut(&lpn)?;
        let previous = *entry;
        entry.block = block;
        entry.page = page;
        Some(previous)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Lpn, MapEntry)> + '_ {
        self.entries.iter().map(|(&lpn, &entry)| (lpn, entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(block: u32, page: u32) -> MapEntry {
        MapEntry {
            block: BlockId::new(block),
            page: PageIndex::new(page),
            units: IoUnitMask::full(1),
        }
    }

    #[test]
    fn test_lookup_unmapped_is_none() {
        let table = MappingTable::new();
        assert_eq!(table.lookup(Lpn::new(5)), None);
    }

    #[test]
    fn test_upsert_returns_displaced() {
        let mut table = MappingTable::new();
        assert_eq!(table.upsert(Lpn::new(1), entry(0, 0)), None);
        let displaced = table.upsert(Lpn::new(1), entry(2, 7));
        assert_eq!(displaced, Some(entry(0, 0)));
        assert_eq!(table.lookup(Lpn::new(1)), Some(entry(2, 7)));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_remove_twice_is_idempotent() {
        let mut table = MappingTable::new();
        table.upsert(Lpn::new(1), entry(0, 0));
        assert!(table.remove(Lpn::new(1)).is_some());
        assert!(table.remove(Lpn::new(1)).is_none());
    }

    #[test]
    fn test_relocate_keeps_units() {
        let mut table = MappingTable::new();
        let original = MapEntry {
            units: IoUnitMask::from_bits(0b101),
            ..entry(0, 0)
        };
        table.upsert(Lpn::new(9), original);
        let previous = table.relocate(Lpn::new(9), BlockId::new(4), PageIndex::new(2));
        assert_eq!(previous, Some(original));
        let moved = table.lookup(Lpn::new(9)).expect("entry");
        assert_eq!(moved.block, BlockId::new(4));
        assert_eq!(moved.units, IoUnitMask::from_bits(0b101));
        assert_eq!(table.relocate(Lpn::new(42), BlockId::new(0), PageIndex::new(0)), None);
    }
}
