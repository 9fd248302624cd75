//! Shared vocabulary for the ferroftl workspace.
//!
//! Small copyable newtypes for the identifiers that flow between the block
//! store, the mapping table, and the GC policies, plus the device geometry
//! every component is parameterized by. Keeping these in a leaf crate lets
//! the policy crate avoid depending on the core.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Simulated time in integer nanoseconds. Monotonically non-decreasing.
pub type Tick = u64;

/// One microsecond in ticks.
pub const US: Tick = 1_000;
/// One millisecond in ticks.
pub const MS: Tick = 1_000 * US;
/// One second in ticks.
pub const SEC: Tick = 1_000 * MS;

/// A logical page number, the host-visible address unit.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[repr(transparent)]
pub struct Lpn(u64);

impl Lpn {
    #[inline]
    #[must_use]
    pub const fn new(n: u64) -> Self {
        Self(n)
    }

    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Lpn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Lpn {
    fn from(n: u64) -> Self {
        Self(n)
    }
}

/// Index of a physical erase-block in the arena. Dense in
/// `[0, total_blocks)` for the lifetime of the device.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[repr(transparent)]
pub struct BlockId(u32);

impl BlockId {
    #[inline]
    #[must_use]
    pub const fn new(n: u32) -> Self {
        Self(n)
    }

    #[inline]
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index of a physical page within an erase-block, in `[0, pages_per_block)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct PageIndex(u32);

impl PageIndex {
    #[inline]
    #[must_use]
    pub const fn new(n: u32) -> Self {
        Self(n)
    }

    #[inline]
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PageIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bitmask over the io-units of one physical page.
///
/// A physical page is subdivided into `io_units_per_page` independently
/// addressable units (at most 32). The mask tracks which units of a page
/// carry live data, and which units of a request are being transferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct IoUnitMask(u32);

impl IoUnitMask {
    /// Maximum supported io-units per page.
    pub const MAX_UNITS: u32 = 32;

    /// The empty mask.
    pub const EMPTY: Self = Self(0);

    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Mask with the low `units` bits set.
    #[inline]
    #[must_use]
    pub const fn full(units: u32) -> Self {
        if units >= Self::MAX_UNITS {
            Self(u32::MAX)
        } else {
            Self((1_u32 << units) - 1)
        }
    }

    #[inline]
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn any(self) -> bool {
        self.0 != 0
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline]
    #[must_use]
    pub const fn test(self, unit: u32) -> bool {
        self.0 & (1 << unit) != 0
    }

    #[inline]
    #[must_use]
    pub const fn count(self) -> u32 {
        self.0.count_ones()
    }

    #[inline]
    #[must_use]
    pub const fn with(self, unit: u32) -> Self {
        Self(self.0 | (1 << unit))
    }

    #[inline]
    #[must_use]
    pub const fn without(self, unit: u32) -> Self {
        Self(self.0 & !(1 << unit))
    }

    #[inline]
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[inline]
    #[must_use]
    pub const fn intersect(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    #[inline]
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Iterate over the set unit indices in ascending order.
    pub fn iter_set(self) -> impl Iterator<Item = u32> {
        let bits = self.0;
        (0..Self::MAX_UNITS).filter(move |unit| bits & (1 << unit) != 0)
    }
}

impl fmt::Display for IoUnitMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

/// Physical layout of the simulated device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceGeometry {
    /// Total physical erase-blocks (fixed population, created at init).
    pub total_blocks: u32,
    /// Pages per erase-block.
    pub pages_per_block: u32,
    /// Io-units per physical page (superpage width), at most 32.
    pub io_units_per_page: u32,
    /// Parallel write fronts used for slot-hinted free-block allocation.
    pub write_fronts: u32,
}

impl DeviceGeometry {
    /// Logical page capacity after reserving `overprovision_ratio` of the
    /// physical space, i.e. `logical ≤ physical · (1 − opr)`.
    #[must_use]
    pub fn logical_pages(&self, overprovision_ratio: f64) -> u64 {
        let physical = u64::from(self.total_blocks) * u64::from(self.pages_per_block);
        let usable = (physical as f64) * (1.0 - overprovision_ratio);
        usable.max(0.0) as u64
    }

    /// Full io-unit mask for this geometry.
    #[inline]
    #[must_use]
    pub fn full_mask(&self) -> IoUnitMask {
        IoUnitMask::full(self.io_units_per_page)
    }
}

/// Victim-selection policy for the GC executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictPolicyKind {
    /// Fewest valid pages wins.
    Greedy,
    /// `u / ((1 − u) · age)` where `u` is the valid-page fraction.
    CostBenefit,
    /// Uniform over eligible blocks.
    Random,
    /// Sample `k·n` blocks uniformly, take the `n` greedy-lowest.
    DChoice,
}

/// Which GC control policy drives trigger and budget decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GcPolicyKind {
    /// Threshold-triggered whole-block reclamation, no budget cap.
    Default,
    /// Fixed page-copy budget per step, no learning.
    LazyRtgc,
    /// Tabular Q-learning scheduler.
    RlBaseline,
    /// Q-learning plus latched intensive mode and whole-block fallback.
    RlIntensive,
    /// Q-learning plus TAGC early triggering and read-triggered GC.
    RlAggressive,
}

impl GcPolicyKind {
    #[must_use]
    pub const fn is_learning(self) -> bool {
        matches!(self, Self::RlBaseline | Self::RlIntensive | Self::RlAggressive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_unit_mask_full_width() {
        assert_eq!(IoUnitMask::full(1).bits(), 0b1);
        assert_eq!(IoUnitMask::full(4).bits(), 0b1111);
        assert_eq!(IoUnitMask::full(32).bits(), u32::MAX);
    }

    #[test]
    fn test_io_unit_mask_set_and_clear() {
        let mask = IoUnitMask::EMPTY.with(0).with(3);
        assert!(mask.test(0));
        assert!(!mask.test(1));
        assert!(mask.test(3));
        assert_eq!(mask.count(), 2);
        assert!(!mask.without(0).test(0));
    }

    #[test]
    fn test_io_unit_mask_iter_set_ascending() {
        let mask = IoUnitMask::from_bits(0b1010);
        let set: Vec<u32> = mask.iter_set().collect();
        assert_eq!(set, vec![1, 3]);
    }

    #[test]
    fn test_geometry_logical_pages_overprovision() {
        let geometry = DeviceGeometry {
            total_blocks: 100,
            pages_per_block: 64,
            io_units_per_page: 1,
            write_fronts: 1,
        };
        assert_eq!(geometry.logical_pages(0.25), 4800);
        assert_eq!(geometry.logical_pages(0.0), 6400);
    }

    #[test]
    fn test_policy_kind_learning_split() {
        assert!(!GcPolicyKind::LazyRtgc.is_learning());
        assert!(!GcPolicyKind::Default.is_learning());
        assert!(GcPolicyKind::RlBaseline.is_learning());
        assert!(GcPolicyKind::RlAggressive.is_learning());
    }

    #[test]
    fn test_policy_kind_snake_case_serde() {
        let parsed: GcPolicyKind =
            serde_json::from_str("\"rl_aggressive\"").expect("parse policy kind");
        assert_eq!(parsed, GcPolicyKind::RlAggressive);
    }
}
