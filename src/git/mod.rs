//! Git backend access
//!
//! Everything the engine needs from git goes through this module:
//! - `GitRepository`: narrow wrapper around git2 (refs, merge-base, rebase,
//!   squash-apply, fetch, checkout, resets)
//! - `Freezer`: reversible snapshot/restore of uncommitted work

pub mod freeze;
pub mod repository;

pub use freeze::{FreezeOutcome, Freezer, FREEZE_INDEXED, FREEZE_UNINDEXED};
pub use repository::{GitRepository, RebaseOutcome, SquashOutcome};
