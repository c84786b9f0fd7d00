use crate::errors::{BraidError, Result};
use git2::{BranchType, Oid, Repository, Signature};
use std::path::{Path, PathBuf};

/// Outcome of a structured rebase attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebaseOutcome {
    /// All commits replayed without conflict; branch now sits at `new_tip`.
    Clean { new_tip: Oid },
    /// A commit conflicted. The rebase is left open in the repository so the
    /// caller can either abort it or hand it to the user for resolution.
    Conflict,
}

/// Outcome of applying a squashed branch range onto a new parent tip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SquashOutcome {
    /// The collapsed diff applied cleanly; a single new commit was written.
    Applied(Oid),
    /// The collapsed diff is empty against the new parent tip: everything
    /// in the range already landed upstream.
    Empty,
    /// The collapsed diff does not apply either.
    Conflict,
}

/// Wrapper around git2::Repository with the operations the engine needs.
///
/// The repository (refs, index, working tree) is externally mutable shared
/// state; nothing here is cached across calls; every query goes back to git.
pub struct GitRepository {
    repo: Repository,
    path: PathBuf,
}

impl GitRepository {
    /// Open a Git repository at or above the given path
    pub fn open(path: &Path) -> Result<Self> {
        let repo = Repository::discover(path)
            .map_err(|e| BraidError::config(format!("Not a git repository: {}", e)))?;

        let workdir = repo
            .workdir()
            .ok_or_else(|| BraidError::config("Repository has no working directory"))?
            .to_path_buf();

        Ok(Self {
            repo,
            path: workdir,
        })
    }

    /// Open the repository containing the current working directory
    pub fn open_cwd() -> Result<Self> {
        let cwd = std::env::current_dir()
            .map_err(|e| BraidError::config(format!("Failed to get current directory: {e}")))?;
        Self::open(&cwd)
    }

    /// Get repository working-tree path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The repository-scoped git configuration (writes land in .git/config)
    pub fn config(&self) -> Result<git2::Config> {
        Ok(self.repo.config()?)
    }

    /// Get the current branch name
    pub fn current_branch(&self) -> Result<String> {
        let head = self
            .repo
            .head()
            .map_err(|e| BraidError::branch(format!("Could not get HEAD: {}", e)))?;

        if head.is_branch() {
            if let Some(name) = head.shorthand() {
                return Ok(name.to_string());
            }
        }
        Err(BraidError::branch(
            "HEAD is detached; check out a branch first",
        ))
    }

    /// Get the HEAD commit
    pub fn head_commit(&self) -> Result<git2::Commit<'_>> {
        let head = self
            .repo
            .head()
            .map_err(|e| BraidError::branch(format!("Could not get HEAD: {}", e)))?;
        head.peel_to_commit()
            .map_err(|e| BraidError::branch(format!("Could not get HEAD commit: {}", e)))
    }

    /// Resolve any revision (branch name, remote ref, tag, hash) to a commit id
    pub fn resolve_commit(&self, rev: &str) -> Result<Oid> {
        let obj = self
            .repo
            .revparse_single(rev)
            .map_err(|e| BraidError::branch(format!("Could not resolve '{}': {}", rev, e)))?;
        let commit = obj
            .peel(git2::ObjectType::Commit)
            .map_err(|e| BraidError::branch(format!("'{}' is not a commit: {}", rev, e)))?;
        Ok(commit.id())
    }

    /// Tip commit of a local branch
    pub fn branch_tip(&self, name: &str) -> Result<Oid> {
        let branch = self
            .repo
            .find_branch(name, BranchType::Local)
            .map_err(|e| BraidError::branch(format!("Could not find branch '{}': {}", name, e)))?;
        let commit = branch.get().peel_to_commit().map_err(|e| {
            BraidError::branch(format!("Could not get commit for branch '{}': {}", name, e))
        })?;
        Ok(commit.id())
    }

    /// Check if a local branch exists
    pub fn branch_exists(&self, name: &str) -> bool {
        self.repo.find_branch(name, BranchType::Local).is_ok()
    }

    /// List all local branches
    pub fn list_branches(&self) -> Result<Vec<String>> {
        let branches = self.repo.branches(Some(BranchType::Local))?;

        let mut branch_names = Vec::new();
        for branch in branches {
            let (branch, _) = branch?;
            if let Some(name) = branch.name()? {
                branch_names.push(name.to_string());
            }
        }

        Ok(branch_names)
    }

    /// Create a new branch at the given revision (or HEAD when None)
    pub fn create_branch(&self, name: &str, target: Option<&str>) -> Result<()> {
        let target_commit = if let Some(target) = target {
            let oid = self.resolve_commit(target)?;
            self.repo.find_commit(oid)?
        } else {
            self.head_commit()?
        };

        self.repo.branch(name, &target_commit, false).map_err(|e| {
            BraidError::branch(format!("Could not create branch '{}': {}", name, e))
        })?;

        tracing::info!("Created branch '{}'", name);
        Ok(())
    }

    /// Switch to a branch
    pub fn checkout_branch(&self, name: &str) -> Result<()> {
        let branch = self
            .repo
            .find_branch(name, BranchType::Local)
            .map_err(|e| BraidError::branch(format!("Could not find branch '{}': {}", name, e)))?;

        let tree = branch.get().peel_to_tree().map_err(|e| {
            BraidError::branch(format!("Could not get tree for branch '{}': {}", name, e))
        })?;

        self.repo
            .checkout_tree(tree.as_object(), None)
            .map_err(|e| {
                BraidError::branch(format!("Could not checkout branch '{}': {}", name, e))
            })?;

        self.repo
            .set_head(&format!("refs/heads/{}", name))
            .map_err(|e| {
                BraidError::branch(format!("Could not update HEAD to '{}': {}", name, e))
            })?;

        tracing::debug!("Switched to branch '{}'", name);
        Ok(())
    }

    /// Check out a commit directly (detached HEAD)
    pub fn checkout_detached(&self, commit: Oid) -> Result<()> {
        let commit = self.repo.find_commit(commit)?;
        let tree = commit.tree()?;
        self.repo.checkout_tree(tree.as_object(), None)?;
        self.repo.set_head_detached(commit.id())?;
        tracing::debug!("Checked out {} (detached)", commit.id());
        Ok(())
    }

    /// Delete a local branch
    pub fn delete_branch(&self, name: &str) -> Result<()> {
        let mut branch = self
            .repo
            .find_branch(name, BranchType::Local)
            .map_err(|e| BraidError::branch(format!("Could not find branch '{}': {}", name, e)))?;

        branch.delete().map_err(|e| {
            BraidError::branch(format!("Could not delete branch '{}': {}", name, e))
        })?;

        tracing::info!("Deleted branch '{}'", name);
        Ok(())
    }

    /// Check if the working directory or index has uncommitted changes
    pub fn is_dirty(&self) -> Result<bool> {
        let statuses = self.statuses()?;

        for status in statuses.iter() {
            let flags = status.status();
            if flags.intersects(
                git2::Status::INDEX_MODIFIED
                    | git2::Status::INDEX_NEW
                    | git2::Status::INDEX_DELETED
                    | git2::Status::INDEX_RENAMED
                    | git2::Status::INDEX_TYPECHANGE
                    | git2::Status::WT_MODIFIED
                    | git2::Status::WT_NEW
                    | git2::Status::WT_DELETED
                    | git2::Status::WT_RENAMED
                    | git2::Status::WT_TYPECHANGE,
            ) {
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// Total size in bytes of untracked files in the working tree
    pub fn untracked_bytes(&self) -> Result<u64> {
        let statuses = self.statuses()?;

        let mut total = 0u64;
        for status in statuses.iter() {
            if status.status().contains(git2::Status::WT_NEW) {
                if let Some(path) = status.path() {
                    if let Ok(meta) = std::fs::metadata(self.path.join(path)) {
                        total += meta.len();
                    }
                }
            }
        }

        Ok(total)
    }

    fn statuses(&self) -> Result<git2::Statuses<'_>> {
        let mut opts = git2::StatusOptions::new();
        opts.include_untracked(true).recurse_untracked_dirs(true);
        Ok(self.repo.statuses(Some(&mut opts))?)
    }

    /// Whether the index tree differs from the HEAD tree (staged changes)
    pub fn index_differs_from_head(&self) -> Result<bool> {
        let mut index = self.repo.index()?;
        let index_tree = index.write_tree()?;
        let head_tree = self.head_commit()?.tree()?.id();
        Ok(index_tree != head_tree)
    }

    /// Stage every change in the working tree, untracked files included
    pub fn stage_all(&self) -> Result<()> {
        let mut index = self.repo.index()?;
        index.add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)?;
        index.write()?;
        tracing::debug!("Staged all changes");
        Ok(())
    }

    /// Stage changes to already-tracked files only
    pub fn stage_tracked(&self) -> Result<()> {
        let mut index = self.repo.index()?;
        index.update_all(["*"].iter(), None)?;
        index.write()?;
        tracing::debug!("Staged tracked changes");
        Ok(())
    }

    /// Commit the current index on top of HEAD, leaving the working tree alone
    pub fn commit_index(&self, message: &str) -> Result<Oid> {
        let signature = self.signature()?;
        let mut index = self.repo.index()?;
        let tree_id = index.write_tree()?;
        let tree = self.repo.find_tree(tree_id)?;
        let parent = self.head_commit()?;

        let commit_id = self
            .repo
            .commit(Some("HEAD"), &signature, &signature, message, &tree, &[&parent])?;

        tracing::debug!("Created commit {} - {}", commit_id, message);
        Ok(commit_id)
    }

    /// Build one commit carrying the tree of `tip` with `base` as sole parent
    pub fn commit_squashed(&self, base: Oid, tip: Oid, message: &str) -> Result<Oid> {
        let signature = self.signature()?;
        let tree = self.repo.find_commit(tip)?.tree()?;
        let parent = self.repo.find_commit(base)?;

        let commit_id =
            self.repo
                .commit(None, &signature, &signature, message, &tree, &[&parent])?;
        Ok(commit_id)
    }

    /// Tree id carried by a commit
    pub fn commit_tree_id(&self, commit: Oid) -> Result<Oid> {
        Ok(self.repo.find_commit(commit)?.tree_id())
    }

    /// Soft reset: move the current branch, keep index and working tree
    pub fn reset_soft(&self, target: Oid) -> Result<()> {
        let obj = self.repo.find_object(target, None)?;
        self.repo.reset(&obj, git2::ResetType::Soft, None)?;
        Ok(())
    }

    /// Mixed reset: move the current branch and index, keep the working tree
    pub fn reset_mixed(&self, target: Oid) -> Result<()> {
        let obj = self.repo.find_object(target, None)?;
        self.repo.reset(&obj, git2::ResetType::Mixed, None)?;
        Ok(())
    }

    /// Hard reset: move the current branch, index, and working tree
    pub fn reset_hard(&self, target: Oid) -> Result<()> {
        let obj = self.repo.find_object(target, None)?;
        self.repo.reset(&obj, git2::ResetType::Hard, None)?;
        Ok(())
    }

    /// Lowest common ancestor of two commits
    pub fn merge_base(&self, a: Oid, b: Oid) -> Result<Oid> {
        Ok(self.repo.merge_base(a, b)?)
    }

    /// Whether `commit` is `ancestor` itself or a descendant of it
    pub fn is_descendant_of(&self, commit: Oid, ancestor: Oid) -> Result<bool> {
        if commit == ancestor {
            return Ok(true);
        }
        Ok(self.repo.graph_descendant_of(commit, ancestor)?)
    }

    /// Commits reachable from `tip` but not from `base`, oldest first
    pub fn commits_between(&self, base: Oid, tip: Oid) -> Result<Vec<(Oid, String)>> {
        let mut revwalk = self.repo.revwalk()?;
        revwalk.push(tip)?;
        revwalk.hide(base)?;
        revwalk.set_sorting(git2::Sort::TOPOLOGICAL | git2::Sort::REVERSE)?;

        let mut commits = Vec::new();
        for oid in revwalk {
            let oid = oid?;
            let commit = self.repo.find_commit(oid)?;
            let summary = commit.summary().unwrap_or("<no message>").to_string();
            commits.push((oid, summary));
        }
        Ok(commits)
    }

    /// Rebase the commits of `branch` spanning (`from_base`, tip] onto `onto`.
    ///
    /// On conflict the rebase is left open on disk; `git rebase --continue`
    /// and `abort_open_rebase` both work on it afterwards.
    pub fn rebase_onto(&self, branch: &str, from_base: Oid, onto: Oid) -> Result<RebaseOutcome> {
        tracing::debug!(
            "Rebasing '{}' [{}..] onto {}",
            branch,
            &from_base.to_string()[..8],
            &onto.to_string()[..8]
        );

        let branch_ref = self
            .repo
            .find_branch(branch, BranchType::Local)
            .map_err(|e| BraidError::branch(format!("Could not find branch '{}': {}", branch, e)))?
            .into_reference();
        let branch_commit = self.repo.reference_to_annotated_commit(&branch_ref)?;
        let upstream_commit = self.repo.find_annotated_commit(from_base)?;
        let onto_commit = self.repo.find_annotated_commit(onto)?;

        let mut opts = git2::RebaseOptions::new();
        let mut rebase = self.repo.rebase(
            Some(&branch_commit),
            Some(&upstream_commit),
            Some(&onto_commit),
            Some(&mut opts),
        )?;

        let committer = self.signature()?;
        while let Some(op) = rebase.next() {
            op?;

            if self.repo.index()?.has_conflicts() {
                // Leave the rebase open; its on-disk state survives this call.
                return Ok(RebaseOutcome::Conflict);
            }

            match rebase.commit(None, &committer, None) {
                Ok(_) => {}
                // Patch already present upstream; nothing to commit for this op.
                Err(e) if e.code() == git2::ErrorCode::Applied => {}
                Err(e) => return Err(e.into()),
            }
        }

        rebase.finish(None)?;
        let new_tip = self.branch_tip(branch)?;
        tracing::debug!("Rebase of '{}' finished at {}", branch, new_tip);
        Ok(RebaseOutcome::Clean { new_tip })
    }

    /// Whether a rebase is currently in progress
    pub fn is_mid_rebase(&self) -> bool {
        matches!(
            self.repo.state(),
            git2::RepositoryState::Rebase
                | git2::RepositoryState::RebaseInteractive
                | git2::RepositoryState::RebaseMerge
        )
    }

    /// Abort the rebase left open by a conflicted `rebase_onto`
    pub fn abort_open_rebase(&self) -> Result<()> {
        let mut rebase = self.repo.open_rebase(None)?;
        rebase.abort()?;
        tracing::debug!("Aborted open rebase");
        Ok(())
    }

    /// Collapse (`base`, `tip`] into a single squashed change and try
    /// applying it onto `onto`, as a three-way tree merge with `base` as the
    /// ancestor. Content that already landed upstream (e.g. through a
    /// squash-merge) resolves trivially instead of conflicting.
    ///
    /// Writes a commit object on success but moves no refs; the caller
    /// decides what to do with the resulting id.
    pub fn squash_range(
        &self,
        base: Oid,
        tip: Oid,
        onto: Oid,
        message: &str,
    ) -> Result<SquashOutcome> {
        let base_tree = self.repo.find_commit(base)?.tree()?;
        let tip_tree = self.repo.find_commit(tip)?.tree()?;
        let onto_commit = self.repo.find_commit(onto)?;
        let onto_tree = onto_commit.tree()?;

        let mut index = self
            .repo
            .merge_trees(&base_tree, &onto_tree, &tip_tree, None)?;
        if index.has_conflicts() {
            return Ok(SquashOutcome::Conflict);
        }

        let tree_id = index.write_tree_to(&self.repo)?;
        if tree_id == onto_tree.id() {
            return Ok(SquashOutcome::Empty);
        }

        let tree = self.repo.find_tree(tree_id)?;
        let signature = self.signature()?;
        let commit_id =
            self.repo
                .commit(None, &signature, &signature, message, &tree, &[&onto_commit])?;
        Ok(SquashOutcome::Applied(commit_id))
    }

    /// Default branch of a remote as a remote-tracking name (e.g.
    /// `origin/main`), from its HEAD symref if known locally
    pub fn default_remote_branch(&self, remote: &str) -> Result<Option<String>> {
        let refname = format!("refs/remotes/{}/HEAD", remote);
        let head = match self.repo.find_reference(&refname) {
            Ok(reference) => reference,
            Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(head
            .symbolic_target()
            .and_then(|target| target.strip_prefix("refs/remotes/"))
            .map(|name| name.to_string()))
    }

    /// Names of all configured remotes
    pub fn remote_names(&self) -> Result<Vec<String>> {
        let remotes = self.repo.remotes()?;
        Ok(remotes.iter().flatten().map(|s| s.to_string()).collect())
    }

    /// Fetch the given remotes with their configured refspecs
    pub fn fetch_remotes(&self, remotes: &[String]) -> Result<()> {
        for name in remotes {
            tracing::info!("Fetching from {}", name);
            let mut remote = self
                .repo
                .find_remote(name)
                .map_err(|e| BraidError::branch(format!("No remote '{}' found: {}", name, e)))?;
            remote.fetch::<&str>(&[], None, None)?;
        }
        tracing::debug!("Fetch completed");
        Ok(())
    }

    /// Get a signature for commits
    pub fn signature(&self) -> Result<Signature<'_>> {
        if let Ok(config) = self.repo.config() {
            if let (Ok(name), Ok(email)) = (
                config.get_string("user.name"),
                config.get_string("user.email"),
            ) {
                return Ok(Signature::now(&name, &email)?);
            }
        }
        Ok(Signature::now("braid", "braid@localhost")?)
    }
}
