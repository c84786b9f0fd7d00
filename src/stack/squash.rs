use crate::errors::{BraidError, Result};
use crate::git::GitRepository;
use crate::graph::{BranchGraphStore, MergeBaseTracker};
use git2::Oid;
use tracing::info;

/// What `squash_current_branch` did
#[derive(Debug, Clone)]
pub struct SquashSummary {
    pub branch: String,
    /// The replacement commit; None when there was nothing to squash
    pub commit: Option<String>,
    /// How many commits the range held before squashing
    pub collapsed: usize,
}

/// Collapse the current branch's own commits (the range above its base
/// marker) into a single commit with the same content.
///
/// The base marker does not move: the branch still attaches to its upstream
/// at the same point, it just carries one commit instead of many.
pub fn squash_current_branch(
    repo: &GitRepository,
    store: &mut BranchGraphStore,
    message: Option<String>,
) -> Result<SquashSummary> {
    if repo.is_mid_rebase() {
        return Err(BraidError::validation(
            "A rebase is in progress; finish or abort it before squashing",
        ));
    }
    if repo.is_dirty()? {
        return Err(BraidError::validation(
            "Cannot squash with uncommitted changes; commit them or run `braid freeze` first",
        ));
    }

    let name = repo.current_branch()?;
    let tracker = MergeBaseTracker::new(repo);
    let base_str = tracker.get_or_create(store, &name)?;
    let base = Oid::from_str(&base_str)
        .map_err(|e| BraidError::config(format!("Corrupt base marker for '{}': {}", name, e)))?;
    let tip = repo.branch_tip(&name)?;

    let commits = repo.commits_between(base, tip)?;
    if commits.len() <= 1 {
        return Ok(SquashSummary {
            branch: name,
            commit: None,
            collapsed: commits.len(),
        });
    }

    if repo.commit_tree_id(base)? == repo.commit_tree_id(tip)? {
        // The range nets out to nothing; drop it instead of writing an
        // empty commit.
        repo.reset_hard(base)?;
        info!("Squashed '{}' to an empty range", name);
        return Ok(SquashSummary {
            branch: name,
            commit: None,
            collapsed: commits.len(),
        });
    }

    let message = message.unwrap_or_else(|| default_squash_message(&name, &commits));
    let new_tip = repo.commit_squashed(base, tip, &message)?;
    repo.reset_hard(new_tip)?;

    info!("Squashed {} commits of '{}' into {}", commits.len(), name, new_tip);
    Ok(SquashSummary {
        branch: name,
        commit: Some(new_tip.to_string()),
        collapsed: commits.len(),
    })
}

/// Default message for a squash commit: a header plus the subjects of the
/// collapsed range, oldest first.
pub fn default_squash_message(branch: &str, commits: &[(Oid, String)]) -> String {
    let mut message = format!("Squashed commits of '{}'.\n\n", branch);
    for (oid, summary) in commits {
        message.push_str(&format!("{} {}\n", &oid.to_string()[..8], summary));
    }
    message
}
