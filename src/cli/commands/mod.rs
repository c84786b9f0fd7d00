pub mod completions;
pub mod freeze;
pub mod new_branch;
pub mod rebase_update;
pub mod squash;
pub mod status;
