use crate::config::Settings;
use crate::errors::{BraidError, Result};
use crate::git::GitRepository;
use crate::graph::{Branch, BranchGraphStore, MergeBaseTracker};
use tracing::info;

/// Upstream selection policy for branch creation.
///
/// Resolved to one concrete upstream reference before any backend or store
/// mutation happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamPolicy {
    /// Track the configured root reference (remote default branch)
    Root,
    /// Track the given reference verbatim: local branch, remote branch, or tag
    Explicit(String),
    /// Track whichever branch is currently checked out
    Current,
    /// Track the current branch's own upstream, then rewrite the current
    /// branch to track the new branch: `current → new → old upstream`
    InjectCurrent,
}

/// A validated branch-creation request
#[derive(Debug, Clone)]
pub struct NewBranchRequest {
    pub name: String,
    pub policy: UpstreamPolicy,
}

/// What `create_branch` did
#[derive(Debug, Clone)]
pub struct CreatedBranch {
    pub name: String,
    pub upstream: String,
    pub base: String,
    /// Branch whose upstream was rewritten onto the new branch (inject only)
    pub spliced_below: Option<String>,
}

/// Create a new tracked branch, checked out, registered in the graph store
/// with a fresh base marker.
///
/// All validation (name collisions, resolvable upstream, acyclicity) runs
/// before the first mutation; a rejected request leaves no side effects.
pub fn create_branch(
    repo: &GitRepository,
    store: &mut BranchGraphStore,
    settings: &Settings,
    request: &NewBranchRequest,
) -> Result<CreatedBranch> {
    let name = request.name.as_str();

    if repo.branch_exists(name) {
        return Err(BraidError::validation(format!(
            "Branch '{}' already exists",
            name
        )));
    }

    // Resolve the policy to (upstream, start point, branch to resplice).
    let (upstream, start_point, splice_below) = match &request.policy {
        UpstreamPolicy::Root => {
            let root = settings.resolve_root(repo)?;
            (root.clone(), root, None)
        }
        UpstreamPolicy::Explicit(reference) => {
            (reference.clone(), reference.clone(), None)
        }
        UpstreamPolicy::Current => {
            let current = repo.current_branch()?;
            // New branch starts at HEAD, stacked on the current branch.
            (current.clone(), current, None)
        }
        UpstreamPolicy::InjectCurrent => {
            let below = repo.current_branch()?;
            let below_meta = store.get(&below)?.ok_or_else(|| {
                BraidError::validation(format!(
                    "Cannot inject above '{}': it has no tracked upstream",
                    below
                ))
            })?;
            (below_meta.upstream.clone(), below_meta.upstream, Some(below))
        }
    };

    let graph = store.list_all()?;
    if graph.contains(name) {
        return Err(BraidError::validation(format!(
            "Branch '{}' is already tracked",
            name
        )));
    }
    if graph.would_create_cycle(name, &upstream) {
        return Err(BraidError::cycle(format!(
            "'{}' would (transitively) become its own upstream via '{}'",
            name, upstream
        )));
    }

    // The upstream must resolve before we touch anything.
    repo.resolve_commit(&upstream).map_err(|_| {
        BraidError::validation(format!(
            "Upstream '{}' does not resolve to a commit",
            upstream
        ))
    })?;

    repo.create_branch(name, Some(&start_point))?;
    repo.checkout_branch(name)?;

    let tracker = MergeBaseTracker::new(repo);
    let base = tracker.initial_base(name, &upstream)?;
    store.set(&Branch::new(name, upstream.clone()).with_base(base.clone()))?;

    // Splice: the previously-current branch now stacks on the new one. Its
    // own base marker is still an ancestor of the new upstream's tip, so it
    // stays put.
    if let Some(below) = &splice_below {
        store.set_upstream(below, name)?;
        info!("Respliced '{}' to track '{}'", below, name);
    }

    info!("Created branch '{}' tracking '{}'", name, upstream);
    Ok(CreatedBranch {
        name: name.to_string(),
        upstream,
        base,
        spliced_below: splice_below,
    })
}
