use crate::errors::{BraidError, Result};
use crate::git::GitRepository;
use tracing::{debug, warn};

/// Marker message of the synthetic commit capturing staged changes.
pub const FREEZE_INDEXED: &str = "FREEZE.indexed";
/// Marker message of the synthetic commit capturing everything else.
pub const FREEZE_UNINDEXED: &str = "FREEZE.unindexed";

/// Default ceiling for untracked data captured by a freeze, in megabytes.
pub const DEFAULT_FREEZE_LIMIT_MB: u64 = 100;

/// Outcome of a freeze attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FreezeOutcome {
    /// Working tree and index were already clean; nothing was committed.
    Clean,
    /// Uncommitted work was captured in `commits` synthetic commits.
    Frozen { commits: usize },
}

/// Reversibly snapshots uncommitted work into synthetic commits at the tip
/// of the current branch, and restores it afterwards.
///
/// Freeze writes at most two commits: `FREEZE.indexed` for the staged half,
/// then `FREEZE.unindexed` for unstaged and untracked changes. Thaw pops
/// them back off, restoring the exact staged/unstaged split.
pub struct Freezer<'a> {
    repo: &'a GitRepository,
    limit_mb: u64,
}

impl<'a> Freezer<'a> {
    pub fn new(repo: &'a GitRepository, limit_mb: u64) -> Self {
        Self { repo, limit_mb }
    }

    /// Snapshot uncommitted work. No-op on a clean tree.
    ///
    /// Untracked files above the size ceiling are left out with a warning;
    /// changes to tracked files are always captured.
    pub fn freeze(&self) -> Result<FreezeOutcome> {
        if !self.repo.is_dirty()? {
            debug!("Working tree clean; nothing to freeze");
            return Ok(FreezeOutcome::Clean);
        }

        let mut commits = 0;

        if self.repo.index_differs_from_head()? {
            self.repo.commit_index(FREEZE_INDEXED)?;
            commits += 1;
        }

        let untracked = self.repo.untracked_bytes()?;
        let limit = self.limit_mb.saturating_mul(1024 * 1024);
        if untracked > limit {
            warn!(
                "Untracked files total {} MB, over the {} MB freeze limit; \
                 leaving untracked files out of the snapshot",
                untracked / (1024 * 1024),
                self.limit_mb
            );
            self.repo.stage_tracked()?;
        } else {
            self.repo.stage_all()?;
        }

        if self.repo.index_differs_from_head()? {
            self.repo.commit_index(FREEZE_UNINDEXED)?;
            commits += 1;
        }

        if commits == 0 {
            // Everything dirty was over-limit untracked content.
            return Ok(FreezeOutcome::Clean);
        }

        debug!("Froze working tree into {} commit(s)", commits);
        Ok(FreezeOutcome::Frozen { commits })
    }

    /// Whether the tip of HEAD is a freeze snapshot commit.
    pub fn is_frozen(&self) -> Result<bool> {
        let tip = self.repo.head_commit()?;
        Ok(is_freeze_message(tip.message().unwrap_or("")))
    }

    /// Restore the pre-freeze state and drop the synthetic commits.
    ///
    /// Refuses to touch anything unless the expected freeze commits sit
    /// exactly at the tip.
    pub fn thaw(&self) -> Result<()> {
        let tip = self.repo.head_commit()?;
        let message = tip.message().unwrap_or("").to_string();

        if message.starts_with(FREEZE_UNINDEXED) {
            let parent = tip.parent(0).map_err(|_| {
                BraidError::thaw("freeze commit has no parent; refusing to guess")
            })?;
            let parent_id = parent.id();
            let parent_is_indexed = parent
                .message()
                .unwrap_or("")
                .starts_with(FREEZE_INDEXED);

            // Unstaged half first: mixed reset leaves its content unstaged.
            self.repo.reset_mixed(parent_id)?;
            if parent_is_indexed {
                self.pop_indexed()?;
            }
        } else if message.starts_with(FREEZE_INDEXED) {
            self.pop_indexed()?;
        } else {
            return Err(BraidError::thaw(format!(
                "tip commit is not a freeze snapshot (found: {:?})",
                message.lines().next().unwrap_or("")
            )));
        }

        debug!("Thawed working tree");
        Ok(())
    }

    /// Pop the `FREEZE.indexed` commit at the tip, leaving its content staged.
    fn pop_indexed(&self) -> Result<()> {
        let commit = self.repo.head_commit()?;
        let parent = commit
            .parent(0)
            .map_err(|_| BraidError::thaw("freeze commit has no parent; refusing to guess"))?;
        self.repo.reset_soft(parent.id())?;
        Ok(())
    }
}

fn is_freeze_message(message: &str) -> bool {
    message.starts_with(FREEZE_INDEXED) || message.starts_with(FREEZE_UNINDEXED)
}

#[cfg(test)]
mod tests {
    use super::*;
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

        std::fs::write(repo_path.join("tracked.txt"), "original").unwrap();
        git(repo_path, &["add", "."]);
        git(repo_path, &["commit", "-m", "Initial commit"]);

        let repo = GitRepository::open(repo_path).unwrap();
        (temp_dir, repo)
    }

    #[test]
    fn test_freeze_clean_tree_is_noop() {
        let (_temp, repo) = create_test_repo();
        let freezer = Freezer::new(&repo, DEFAULT_FREEZE_LIMIT_MB);
        assert_eq!(freezer.freeze().unwrap(), FreezeOutcome::Clean);
    }

    #[test]
    fn test_freeze_thaw_round_trip_preserves_split() {
        let (temp, repo) = create_test_repo();

        // One staged modification, one unstaged file, one untracked file.
        std::fs::write(temp.path().join("tracked.txt"), "staged edit").unwrap();
        git(temp.path(), &["add", "tracked.txt"]);
        std::fs::write(temp.path().join("untracked.txt"), "untracked").unwrap();

        let head_before = repo.head_commit().unwrap().id();

        let freezer = Freezer::new(&repo, DEFAULT_FREEZE_LIMIT_MB);
        match freezer.freeze().unwrap() {
            FreezeOutcome::Frozen { commits } => assert_eq!(commits, 2),
            FreezeOutcome::Clean => panic!("expected a frozen tree"),
        }
        assert!(!repo.is_dirty().unwrap());
        assert!(freezer.is_frozen().unwrap());

        freezer.thaw().unwrap();

        assert_eq!(repo.head_commit().unwrap().id(), head_before);
        assert!(repo.index_differs_from_head().unwrap(), "staged edit lost");
        assert_eq!(
            std::fs::read_to_string(temp.path().join("untracked.txt")).unwrap(),
            "untracked"
        );
        assert_eq!(
            std::fs::read_to_string(temp.path().join("tracked.txt")).unwrap(),
            "staged edit"
        );
    }

    #[test]
    fn test_freeze_skips_oversized_untracked() {
        let (temp, repo) = create_test_repo();

        std::fs::write(temp.path().join("tracked.txt"), "edited").unwrap();
        std::fs::write(temp.path().join("huge.bin"), vec![0u8; 2048]).unwrap();

        // 0 MB ceiling: every untracked byte is over the limit.
        let freezer = Freezer::new(&repo, 0);
        match freezer.freeze().unwrap() {
            FreezeOutcome::Frozen { commits } => assert_eq!(commits, 1),
            FreezeOutcome::Clean => panic!("tracked change should still freeze"),
        }

        // The untracked file stayed in the working tree, not the snapshot.
        assert!(temp.path().join("huge.bin").exists());
        assert!(repo.untracked_bytes().unwrap() > 0);

        freezer.thaw().unwrap();
        assert_eq!(
            std::fs::read_to_string(temp.path().join("tracked.txt")).unwrap(),
            "edited"
        );
    }

    #[test]
    fn test_thaw_refuses_non_freeze_tip() {
        let (_temp, repo) = create_test_repo();
        let freezer = Freezer::new(&repo, DEFAULT_FREEZE_LIMIT_MB);
        let err = freezer.thaw().unwrap_err();
        assert!(matches!(err, BraidError::Thaw(_)));
    }
}
