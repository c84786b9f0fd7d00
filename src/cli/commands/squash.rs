use crate::cli::output::Output;
use crate::errors::Result;
use crate::git::GitRepository;
use crate::graph::BranchGraphStore;
use crate::stack::squash_current_branch;

/// Collapse the current branch's own commits into one
pub fn run(message: Option<String>) -> Result<()> {
    let repo = GitRepository::open_cwd()?;
    let mut store = BranchGraphStore::open(&repo)?;

    let summary = squash_current_branch(&repo, &mut store, message)?;
    match &summary.commit {
        Some(commit) => Output::success(format!(
            "Squashed {} commits of '{}' into {}",
            summary.collapsed,
            summary.branch,
            &commit[..8]
        )),
        None if summary.collapsed > 1 => Output::success(format!(
            "Squashed '{}': the range nets out to nothing; branch is now empty",
            summary.branch
        )),
        None => Output::info(format!(
            "'{}' has {} commit(s); nothing to squash.",
            summary.branch, summary.collapsed
        )),
    }
    Ok(())
}
