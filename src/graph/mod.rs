//! Branch dependency graph
//!
//! Tracks which local branch depends on which upstream, the cached
//! merge-base marker of each branch, and the dormant flag. Persisted in the
//! repository's git configuration so that interrupted sessions can be
//! resumed by a fresh process.

pub mod branch;
pub mod store;
pub mod tracker;

pub use branch::{Branch, BranchGraph};
pub use store::BranchGraphStore;
pub use tracker::MergeBaseTracker;
