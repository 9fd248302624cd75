//! Primary error type for ferroftl operations.
//!
//! Three failure classes with different handling contracts:
//!
//! - **fatal-invariant**: the mutable data model was caught in a state it
//!   must never reach (double-free, erase with valid pages, free-list
//!   exhaustion, corrupt mapping). The process aborts with exit code 1.
//! - **configuration**: the run cannot start. Exit code 2.
//! - **best-effort I/O**: metrics/debug streams; callers warn once and
//!   disable the stream, these variants never cross the dispatcher boundary.

use std::path::PathBuf;

use ferroftl_types::{BlockId, Lpn, PageIndex};
use thiserror::Error;

/// Convenience alias used by every fallible ferroftl operation.
pub type Result<T> = std::result::Result<T, FtlError>;

#[derive(Error, Debug)]
pub enum FtlError {
    // === Fatal invariant breaches ===
    /// The free list ran dry while a GC copy was in flight. The
    /// overprovisioning guarantee is part of the policy contract, so this is
    /// unrecoverable.
    #[error("free-block list exhausted during garbage collection")]
    FreeListExhausted,

    /// A write was issued to a block whose write cursor already reached the
    /// page count.
    #[error("write to sealed block {block} (next-write index at page count)")]
    BlockSealed { block: BlockId },

    /// Erase was requested while the block still holds valid pages.
    #[error("erase of block {block} with {valid} valid pages")]
    EraseWithValidPages { block: BlockId, valid: u32 },

    /// A block index was found in both the live set and the free list, or
    /// reinserted while already free.
    #[error("block {block} freed twice")]
    DoubleFree { block: BlockId },

    /// A block index outside the arena, or absent from the live set where a
    /// live block was required.
    #[error("no such live block: {block}")]
    NoSuchBlock { block: BlockId },

    /// The mapping table referenced a physical page that does not hold the
    /// expected logical page.
    #[error("corrupt mapping for LPN {lpn}: block {block} page {page} ({detail})")]
    CorruptMapping {
        lpn: Lpn,
        block: BlockId,
        page: PageIndex,
        detail: String,
    },

    /// A GC destination write walked past the end of the block.
    #[error("GC destination cursor overran block {block}")]
    DestinationOverrun { block: BlockId },

    // === Configuration ===
    /// The configuration file could not be read.
    #[error("cannot read configuration '{path}': {source}")]
    ConfigUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration parsed but is inconsistent.
    #[error("invalid configuration: {detail}")]
    InvalidConfig { detail: String },

    // === Best-effort I/O ===
    /// Metrics or summary stream failure. Warn once, disable the stream,
    /// keep going.
    #[error("metrics stream error: {0}")]
    Metrics(#[from] std::io::Error),
}

impl FtlError {
    /// Whether this error is a fatal invariant breach that must abort the
    /// process.
    #[must_use]
    pub const fn is_fatal_invariant(&self) -> bool {
        matches!(
            self,
            Self::FreeListExhausted
                | Self::BlockSealed { .. }
                | Self::EraseWithValidPages { .. }
                | Self::DoubleFree { .. }
                | Self::NoSuchBlock { .. }
                | Self::CorruptMapping { .. }
                | Self::DestinationOverrun { .. }
        )
    }

    /// Process exit code: 0 normal, 1 fatal invariant breach, 2 unreadable
    /// or invalid configuration. Best-effort I/O never reaches the exit
    /// path, but maps to 1 defensively if it somehow does.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::ConfigUnreadable { .. } | Self::InvalidConfig { .. } => 2,
            _ => 1,
        }
    }
}
