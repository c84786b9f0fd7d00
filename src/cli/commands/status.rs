use crate::cli::output::Output;
use crate::errors::Result;
use crate::git::GitRepository;
use crate::graph::{BranchGraph, BranchGraphStore};
use console::style;
use git2::Oid;
use std::collections::BTreeSet;

/// Render the tracked branch DAG, root references first
pub fn run() -> Result<()> {
    let repo = GitRepository::open_cwd()?;
    let store = BranchGraphStore::open(&repo)?;
    let graph = store.list_all()?;

    if graph.is_empty() {
        Output::info("No branches are tracked. Create one with `braid new-branch`.");
        return Ok(());
    }

    let current = repo.current_branch().ok();

    // Roots are the upstream references that are not tracked branches.
    let roots: BTreeSet<&str> = graph
        .branches()
        .filter(|b| !graph.contains(&b.upstream))
        .map(|b| b.upstream.as_str())
        .collect();

    for root in roots {
        println!("{}", style(root).bold());
        for child in graph.children(root) {
            print_subtree(&repo, &graph, &child.name, 1, current.as_deref());
        }
    }
    Ok(())
}

fn print_subtree(
    repo: &GitRepository,
    graph: &BranchGraph,
    name: &str,
    depth: usize,
    current: Option<&str>,
) {
    let indent = "  ".repeat(depth);
    let branch = match graph.get(name) {
        Some(branch) => branch,
        None => return,
    };

    let mut line = format!("{}{}", indent, name);
    if let Some(ahead) = own_commits(repo, branch.base.as_deref(), name) {
        line.push_str(&format!(
            " [{} commit{}]",
            ahead,
            if ahead == 1 { "" } else { "s" }
        ));
    }
    if branch.dormant {
        line.push_str(&format!(" {}", style("[dormant]").dim()));
    }
    if current == Some(name) {
        line.push_str(&format!(" {}", style("*").green()));
    }
    println!("{}", line);

    for child in graph.children(name) {
        print_subtree(repo, graph, &child.name, depth + 1, current);
    }
}

fn own_commits(repo: &GitRepository, base: Option<&str>, name: &str) -> Option<usize> {
    let base = Oid::from_str(base?).ok()?;
    let tip = repo.branch_tip(name).ok()?;
    Some(repo.commits_between(base, tip).ok()?.len())
}
