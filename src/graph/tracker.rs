use crate::errors::Result;
use crate::git::GitRepository;
use crate::graph::BranchGraphStore;
use git2::Oid;
use tracing::debug;

/// Maintains each branch's cached merge-base marker.
///
/// The marker records where a branch's own commits begin. It is computed
/// once at creation (and again at reparent time) and only ever advanced by
/// a successful rebase, never recomputed via live ancestor search on
/// ordinary reads. That stickiness is what keeps an upstream history
/// rewrite from retroactively changing what counts as "this branch's own
/// work".
pub struct MergeBaseTracker<'a> {
    repo: &'a GitRepository,
}

impl<'a> MergeBaseTracker<'a> {
    pub fn new(repo: &'a GitRepository) -> Self {
        Self { repo }
    }

    /// Lowest common ancestor of a branch and its upstream, as a marker
    /// value. Used at creation time and when a branch is reparented.
    pub fn initial_base(&self, branch_rev: &str, upstream_rev: &str) -> Result<String> {
        let branch = self.repo.resolve_commit(branch_rev)?;
        let upstream = self.repo.resolve_commit(upstream_rev)?;
        let base = self.repo.merge_base(branch, upstream)?;
        Ok(base.to_string())
    }

    /// Return the cached marker, computing and persisting the initial value
    /// for branches adopted into the graph without one.
    pub fn get_or_create(&self, store: &mut BranchGraphStore, name: &str) -> Result<String> {
        let branch = store.require(name)?;
        if let Some(base) = branch.base {
            return Ok(base);
        }
        let base = self.initial_base(name, &branch.upstream)?;
        debug!("Computed initial base {} for '{}'", &base[..8], name);
        store.set_base(name, &base)?;
        Ok(base)
    }

    /// Advance the marker after a successful rebase to the new attachment
    /// point (the upstream tip the branch's commits now sit on).
    pub fn refresh(
        &self,
        store: &mut BranchGraphStore,
        name: &str,
        new_attachment_point: Oid,
    ) -> Result<()> {
        debug!(
            "Refreshing base of '{}' to {}",
            name,
            &new_attachment_point.to_string()[..8]
        );
        store.set_base(name, &new_attachment_point.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Branch;
    use git2::Repository;
    use std::path::Path;
    use std::process::Command;
    use tempfile::TempDir;

    fn git(repo_path: &Path, args: &[&str]) {
        let out = Command::new("git")
            .args(args)
            .current_dir(repo_path)
            .output()
            .unwrap();
        assert!(out.status.success(), "git {:?} failed", args);
    }

    fn create_test_repo() -> (TempDir, GitRepository) {
        let temp_dir = TempDir::new().unwrap();
        let repo_path = temp_dir.path();

        Repository::init(repo_path).unwrap();
        git(repo_path, &["config", "user.name", "Test User"]);
        git(repo_path, &["config", "user.email", "test@example.com"]);
        std::fs::write(repo_path.join("README.md"), "# Test").unwrap();
        git(repo_path, &["add", "."]);
        git(repo_path, &["commit", "-m", "Initial commit"]);

        let repo = GitRepository::open(repo_path).unwrap();
        (temp_dir, repo)
    }

    #[test]
    fn test_get_or_create_computes_once_then_sticks() {
        let (temp, repo) = create_test_repo();
        let root = repo.current_branch().unwrap();
        let fork_point = repo.branch_tip(&root).unwrap();

        git(temp.path(), &["checkout", "-b", "feature"]);
        std::fs::write(temp.path().join("f.txt"), "f").unwrap();
        git(temp.path(), &["add", "."]);
        git(temp.path(), &["commit", "-m", "feature work"]);

        let mut store = BranchGraphStore::open(&repo).unwrap();
        store.set(&Branch::new("feature", root.clone())).unwrap();

        let tracker = MergeBaseTracker::new(&repo);
        let base = tracker.get_or_create(&mut store, "feature").unwrap();
        assert_eq!(base, fork_point.to_string());

        // Root advances; the cached marker must not follow it.
        git(temp.path(), &["checkout", &root]);
        std::fs::write(temp.path().join("r.txt"), "r").unwrap();
        git(temp.path(), &["add", "."]);
        git(temp.path(), &["commit", "-m", "root work"]);

        let again = tracker.get_or_create(&mut store, "feature").unwrap();
        assert_eq!(again, base);
    }

    #[test]
    fn test_refresh_moves_marker() {
        let (temp, repo) = create_test_repo();
        let root = repo.current_branch().unwrap();

        git(temp.path(), &["checkout", "-b", "feature"]);
        let mut store = BranchGraphStore::open(&repo).unwrap();
        store.set(&Branch::new("feature", root)).unwrap();

        let tip = repo.head_commit().unwrap().id();
        let tracker = MergeBaseTracker::new(&repo);
        tracker.refresh(&mut store, "feature", tip).unwrap();

        assert_eq!(
            store.get("feature").unwrap().unwrap().base.unwrap(),
            tip.to_string()
        );
    }
}
