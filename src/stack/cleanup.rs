use crate::errors::Result;
use crate::git::GitRepository;
use crate::graph::{BranchGraphStore, MergeBaseTracker};
use crate::stack::scheduler;
use tracing::{debug, info};

/// Record of one pruned branch
#[derive(Debug, Clone)]
pub struct PrunedBranch {
    /// The deleted branch
    pub name: String,
    /// Its upstream at deletion time, where its children went
    pub upstream: String,
    /// Children whose upstream was rewritten
    pub reparented: Vec<String>,
}

/// Remove branches left with zero own commits and relink their children.
///
/// Only called after a pass completed with no unresolved conflicts, so every
/// branch here is either freshly rebased or untouched-and-current. A branch
/// whose tip equals its upstream's tip has nothing of its own left: delete
/// it, point its children at its upstream, and give them fresh base markers.
pub fn prune_empty(
    repo: &GitRepository,
    store: &mut BranchGraphStore,
) -> Result<Vec<PrunedBranch>> {
    let graph = store.list_all()?;
    let order = scheduler::schedule(&graph)?;

    let mut pruned = Vec::new();
    // Root-to-leaf order: a parent is pruned before its children are
    // examined, so children are compared against their final upstream.
    for name in order {
        let Some(branch) = store.get(&name)? else {
            continue;
        };
        if !repo.branch_exists(&name) {
            continue;
        }
        let tip = repo.branch_tip(&name)?;
        let Ok(parent_tip) = repo.resolve_commit(&branch.upstream) else {
            debug!(
                "Upstream '{}' of '{}' does not resolve; leaving the branch alone",
                branch.upstream, name
            );
            continue;
        };
        if tip != parent_tip {
            continue;
        }

        let children: Vec<String> = store
            .list_all()?
            .children(&name)
            .iter()
            .map(|c| c.name.clone())
            .collect();

        // git refuses to delete the checked-out branch; step off it first.
        if repo.current_branch().ok().as_deref() == Some(name.as_str()) {
            repo.checkout_detached(tip)?;
        }
        repo.delete_branch(&name)?;
        store.delete(&name)?;
        info!("Pruned empty branch '{}'", name);

        let tracker = MergeBaseTracker::new(repo);
        for child in &children {
            store.set_upstream(child, &branch.upstream)?;
            let base = tracker.initial_base(child, &branch.upstream)?;
            store.set_base(child, &base)?;
            debug!(
                "Reparented '{}' onto '{}' (base {})",
                child,
                branch.upstream,
                &base[..8]
            );
        }

        pruned.push(PrunedBranch {
            name,
            upstream: branch.upstream,
            reparented: children,
        });
    }

    Ok(pruned)
}
