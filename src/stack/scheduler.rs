use crate::errors::{BraidError, Result};
use crate::graph::BranchGraph;
use std::collections::{BTreeSet, HashMap, HashSet};

/// Compute the root-to-leaf rebase order over all non-dormant branches.
///
/// Every branch appears after its upstream (when the upstream is itself a
/// scheduled branch) and before all of its descendants. Root references
/// are starting points, not entries. Siblings are ordered lexically by
/// name, so the schedule is deterministic for a given graph.
pub fn schedule(graph: &BranchGraph) -> Result<Vec<String>> {
    let tracked: HashSet<&str> = graph
        .branches()
        .filter(|b| !b.dormant)
        .map(|b| b.name.as_str())
        .collect();

    // Kahn's algorithm over the upstream edges, with a lexically ordered
    // ready set as the sibling tie-break.
    let mut pending_parent: HashMap<&str, &str> = HashMap::new();
    let mut ready: BTreeSet<&str> = BTreeSet::new();
    for branch in graph.branches().filter(|b| !b.dormant) {
        if tracked.contains(branch.upstream.as_str()) {
            pending_parent.insert(branch.name.as_str(), branch.upstream.as_str());
        } else {
            ready.insert(branch.name.as_str());
        }
    }

    let mut order = Vec::with_capacity(tracked.len());
    while let Some(name) = ready.iter().next().copied() {
        ready.remove(name);
        order.push(name.to_string());
        pending_parent.retain(|&child, &mut parent| {
            if parent == name {
                ready.insert(child);
                return false;
            }
            true
        });
    }

    if !pending_parent.is_empty() {
        // Only reachable through a hand-edited store; writers reject cycles.
        let mut stuck: Vec<&str> = pending_parent.keys().copied().collect();
        stuck.sort_unstable();
        return Err(BraidError::config(format!(
            "Branch graph contains an upstream cycle involving: {}",
            stuck.join(", ")
        )));
    }

    Ok(order)
}

/// Restrict a schedule to `selected` branches, optionally widened to every
/// descendant of each selection, preserving relative order.
pub fn restrict(
    order: Vec<String>,
    graph: &BranchGraph,
    selected: &[String],
    tree: bool,
) -> Vec<String> {
    let mut wanted: HashSet<String> = selected.iter().cloned().collect();
    if tree {
        for name in selected {
            wanted.extend(graph.descendants(name));
        }
    }
    order.into_iter().filter(|b| wanted.contains(b)).collect()
}
