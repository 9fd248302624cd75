//! ferroftl core: the garbage-collection control core of a page-mapping
//! NAND-flash FTL.
//!
//! The [`Ftl`] owns the block arena, mapping table, and free list; the
//! [`GcDispatcher`] drives one [`ferroftl_policy::GcPolicy`] through a fixed
//! per-request protocol and executes the resulting partial-GC plans. All of
//! it runs single-threaded on the host's event loop: no locks, no
//! suspension mid-step.
//!
//! ```no_run
//! use ferroftl_core::{FtlConfig, Ftl, GcDispatcher};
//!
//! let config = FtlConfig::default();
//! let mut ftl = Ftl::new(config.geometry()).unwrap();
//! let mut dispatcher = GcDispatcher::new(
//!     config.build_policy(),
//!     config.build_selector(),
//!     config.build_sink(),
//! );
//! let entry = ftl.write(1_u64.into(), config.geometry().full_mask(), 1_000).unwrap();
//! dispatcher.on_write(&mut ftl, 1_000, 250_000).unwrap();
//! # let _ = entry;
//! ```

pub mod block;
pub mod config;
pub mod dispatcher;
pub mod executor;
pub mod free_list;
pub mod ftl;
pub mod mapping;
pub mod victim;

pub use block::{Block, PageState};
pub use config::FtlConfig;
pub use dispatcher::{GcDispatcher, PartialGcPlan};
pub use executor::GcStepOutcome;
pub use free_list::FreeBlockList;
pub use ftl::Ftl;
pub use mapping::{MapEntry, MappingTable};
pub use victim::VictimSelector;
