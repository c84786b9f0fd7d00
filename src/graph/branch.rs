use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet, VecDeque};

/// A tracked branch and its dependency metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    /// Branch name (unique key)
    pub name: String,
    /// The reference this branch is rebased onto: another tracked branch,
    /// a remote-tracking ref, or a tag
    pub upstream: String,
    /// Cached commit id marking where this branch's own commits begin.
    /// Deliberately sticky: only creation, reparenting, and a successful
    /// rebase may move it.
    pub base: Option<String>,
    /// Excluded from automated passes while remaining in the graph
    pub dormant: bool,
}

impl Branch {
    pub fn new(name: impl Into<String>, upstream: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            upstream: upstream.into(),
            base: None,
            dormant: false,
        }
    }

    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }
}

/// The set of all tracked branches plus the derived parent→children
/// adjacency. Keyed by name; iteration order is lexical, which is also the
/// sibling tie-break used by the scheduler.
#[derive(Debug, Default, Clone)]
pub struct BranchGraph {
    branches: BTreeMap<String, Branch>,
}

impl BranchGraph {
    pub fn from_branches(branches: impl IntoIterator<Item = Branch>) -> Self {
        Self {
            branches: branches
                .into_iter()
                .map(|b| (b.name.clone(), b))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Branch> {
        self.branches.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.branches.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.branches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }

    /// All branches, in lexical name order
    pub fn branches(&self) -> impl Iterator<Item = &Branch> {
        self.branches.values()
    }

    /// Branches whose upstream is `name`, in lexical order
    pub fn children(&self, name: &str) -> Vec<&Branch> {
        self.branches
            .values()
            .filter(|b| b.upstream == name)
            .collect()
    }

    /// All branches below `name` in the stack, breadth-first
    pub fn descendants(&self, name: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        queue.push_back(name);
        while let Some(cur) = queue.pop_front() {
            for child in self.children(cur) {
                out.push(child.name.clone());
                queue.push_back(&child.name);
            }
        }
        out
    }

    /// Would pointing `branch` at `upstream` make `branch` its own
    /// (transitive) upstream?
    ///
    /// Walks the tracked upstream chain from `upstream` toward the root.
    /// A chain that revisits a node is also reported as a cycle so a
    /// corrupted store cannot loop the walk forever.
    pub fn would_create_cycle(&self, branch: &str, upstream: &str) -> bool {
        if branch == upstream {
            return true;
        }
        let mut seen: HashSet<&str> = HashSet::new();
        let mut cursor = upstream;
        while let Some(node) = self.branches.get(cursor) {
            if node.name == branch {
                return true;
            }
            if !seen.insert(node.name.as_str()) {
                return true;
            }
            cursor = node.upstream.as_str();
        }
        false
    }
}
