//! Branch-stack operations
//!
//! The engine proper:
//! - branch creation under the four upstream policies
//! - the topological scheduler
//! - the rebase pass with squash-fallback and resumable session state
//! - pruning of emptied branches and reparenting of their children
//! - squashing a single branch in place

pub mod cleanup;
pub mod new_branch;
pub mod scheduler;
pub mod session;
pub mod squash;
pub mod update;

pub use cleanup::PrunedBranch;
pub use new_branch::{create_branch, CreatedBranch, NewBranchRequest, UpstreamPolicy};
pub use session::RebaseSession;
pub use squash::squash_current_branch;
pub use update::{UpdateOptions, UpdateResult, UpdateRunner};
