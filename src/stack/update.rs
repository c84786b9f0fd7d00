use crate::cli::output::Output;
use crate::config::Settings;
use crate::errors::{BraidError, Result};
use crate::git::{FreezeOutcome, Freezer, GitRepository, RebaseOutcome, SquashOutcome};
use crate::graph::{Branch, BranchGraph, BranchGraphStore, MergeBaseTracker};
use crate::stack::squash::default_squash_message;
use crate::stack::{cleanup, scheduler, PrunedBranch, RebaseSession};
use crate::utils::spinner::Spinner;
use git2::Oid;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Options for a rebase pass
#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    /// Skip the remote-fetch step; operate on currently-known remote state
    pub no_fetch: bool,
    /// On conflict, skip the branch (and its dependents) instead of stopping
    pub keep_going: bool,
    /// Disable the squash fallback; any conflict is an immediate stop
    pub no_squash: bool,
    /// Restrict the pass to the currently checked-out branch
    pub current_only: bool,
    /// Widen the selection to every descendant of the selected branches
    pub tree: bool,
    /// Explicit branch selection; empty means the whole graph
    pub branches: Vec<String>,
}

/// What a pass did
#[derive(Debug, Default)]
pub struct UpdateResult {
    /// Branches rebased onto a moved upstream
    pub rebased: Vec<String>,
    /// Branches that were already in place
    pub up_to_date: Vec<String>,
    /// Branches salvaged by the squash fallback
    pub squashed: Vec<String>,
    /// Branches skipped under --keep-going (conflict, or failed upstream)
    pub failed: Vec<String>,
    /// Branches pruned (and where their children went)
    pub pruned: Vec<PrunedBranch>,
}

impl UpdateResult {
    pub fn is_noop(&self) -> bool {
        self.rebased.is_empty() && self.squashed.is_empty() && self.pruned.is_empty()
    }
}

/// Runs one rebase pass over the branch graph.
///
/// The pass is resumable: its work queue lives in the persisted
/// `RebaseSession`, updated after every branch, so a conflict (or a kill)
/// never loses track of which branches already succeeded.
pub struct UpdateRunner<'a> {
    repo: &'a GitRepository,
    store: BranchGraphStore,
    settings: Settings,
    options: UpdateOptions,
    /// Branches that conflicted (or sat below one) under --keep-going
    failed: HashSet<String>,
}

impl<'a> UpdateRunner<'a> {
    pub fn new(
        repo: &'a GitRepository,
        store: BranchGraphStore,
        settings: Settings,
        options: UpdateOptions,
    ) -> Self {
        Self {
            repo,
            store,
            settings,
            options,
            failed: HashSet::new(),
        }
    }

    /// Run the pass to completion, to the first halting conflict, or to
    /// nothing-to-do.
    pub fn run(&mut self) -> Result<UpdateResult> {
        if self.repo.is_mid_rebase() {
            return Err(BraidError::validation(
                "A rebase is already in progress. Resolve its conflicts and run \
                 `git rebase --continue` (or `git rebase --abort`), then rerun \
                 `braid rebase-update` to pick up where the pass stopped.",
            ));
        }

        let graph = self.store.list_all()?;
        if graph.is_empty() {
            Output::info("No branches are tracked; nothing to do.");
            return Ok(UpdateResult::default());
        }

        let mut session = match RebaseSession::load(&self.store)? {
            Some(session) => {
                Output::info(format!(
                    "Resuming interrupted pass ({} branches left)",
                    session.queue.len()
                ));
                session
            }
            None => self.begin_pass(&graph)?,
        };

        let mut result = UpdateResult::default();
        while let Some(name) = session.queue.first().cloned() {
            match self.process_branch(&name, &mut result) {
                Ok(()) => {
                    session.queue.remove(0);
                    session.stalled = None;
                    session.save(&mut self.store)?;
                }
                Err(e) if e.is_resumable() => {
                    session.stalled = Some(name);
                    session.save(&mut self.store)?;
                    return Err(e);
                }
                Err(e) => return Err(e),
            }
        }

        if self.failed.is_empty() {
            // Full success: prune emptied branches, then put the user back.
            result.pruned = cleanup::prune_empty(self.repo, &mut self.store)?;
        } else {
            warn!(
                "{} branch(es) failed; skipping cleanup for this pass",
                self.failed.len()
            );
        }

        self.finish_pass(&session, &result)?;
        RebaseSession::clear(&mut self.store)?;
        Ok(result)
    }

    /// Record the starting branch, freeze, fetch, and schedule a new pass
    fn begin_pass(&mut self, graph: &BranchGraph) -> Result<RebaseSession> {
        let starting_branch = self.repo.current_branch()?;

        // Selection is caller input; validate it before the first mutation.
        let order = scheduler::schedule(graph)?;
        let order = self.select(order, graph, &starting_branch)?;
        debug!("Scheduled {} branch(es): {:?}", order.len(), order);

        let freezer = Freezer::new(self.repo, self.settings.freeze_limit_mb);
        if let FreezeOutcome::Frozen { commits } = freezer.freeze()? {
            Output::info(format!(
                "Froze uncommitted work into {} snapshot commit(s)",
                commits
            ));
        }

        if !self.options.no_fetch {
            let remotes = self.remotes_in_use(graph)?;
            if !remotes.is_empty() {
                let spinner = Spinner::new(format!("Fetching {}", remotes.join(", ")));
                let fetched = self.repo.fetch_remotes(&remotes);
                spinner.stop();
                fetched?;
            }
        }

        let session = RebaseSession::new(starting_branch, order);
        session.save(&mut self.store)?;
        Ok(session)
    }

    /// Apply --current / --tree / explicit branch selection to the schedule
    fn select(
        &self,
        order: Vec<String>,
        graph: &BranchGraph,
        starting_branch: &str,
    ) -> Result<Vec<String>> {
        let mut selected = self.options.branches.clone();
        if self.options.current_only {
            selected.push(starting_branch.to_string());
        }
        if selected.is_empty() {
            return Ok(order);
        }

        for name in &selected {
            match graph.get(name) {
                None => {
                    return Err(BraidError::validation(format!(
                        "Branch '{}' is not tracked",
                        name
                    )))
                }
                Some(branch) if branch.dormant => {
                    Output::warning(format!("'{}' is dormant; leaving it alone", name));
                }
                Some(_) => {}
            }
        }

        Ok(scheduler::restrict(order, graph, &selected, self.options.tree))
    }

    /// Remotes referenced by any upstream edge in the graph
    fn remotes_in_use(&self, graph: &BranchGraph) -> Result<Vec<String>> {
        let known = self.repo.remote_names()?;
        let mut used: Vec<String> = graph
            .branches()
            .filter_map(|b| b.upstream.split('/').next())
            .filter(|prefix| known.iter().any(|r| r == prefix))
            .map(|prefix| prefix.to_string())
            .collect();
        used.sort_unstable();
        used.dedup();
        Ok(used)
    }

    /// Bring one branch up to date. `Ok(())` means the queue may advance,
    /// including keep-going skips; resumable errors halt the pass.
    fn process_branch(&mut self, name: &str, result: &mut UpdateResult) -> Result<()> {
        let branch = match self.store.get(name)? {
            Some(branch) => branch,
            None => {
                Output::warning(format!("'{}' is no longer tracked; skipping", name));
                return Ok(());
            }
        };
        if !self.repo.branch_exists(name) {
            Output::warning(format!("'{}' no longer exists; skipping", name));
            return Ok(());
        }

        // A failed upstream taints everything stacked on it. Skips are
        // recorded as failed themselves, so checking one hop is enough.
        if self.failed.contains(&branch.upstream) {
            Output::warning(format!(
                "Skipping '{}': its upstream '{}' failed earlier in this pass",
                name, branch.upstream
            ));
            self.mark_failed(name, result);
            return Ok(());
        }

        let parent_tip = self.repo.resolve_commit(&branch.upstream)?;
        let tracker = MergeBaseTracker::new(self.repo);
        let base_str = tracker.get_or_create(&mut self.store, name)?;
        let base = Oid::from_str(&base_str).map_err(|e| {
            BraidError::config(format!("Corrupt base marker for '{}': {}", name, e))
        })?;
        let tip = self.repo.branch_tip(name)?;

        if self.repo.is_descendant_of(tip, parent_tip)? {
            // Already attached to the current upstream tip (covers branches
            // the user rebased by hand after a conflict halt).
            if base != parent_tip {
                tracker.refresh(&mut self.store, name, parent_tip)?;
            }
            Output::sub_item(format!("{} is up to date", name));
            result.up_to_date.push(name.to_string());
            return Ok(());
        }

        Output::progress(format!("Rebasing {} onto {}", name, branch.upstream));
        self.repo.checkout_branch(name)?;

        match self.repo.rebase_onto(name, base, parent_tip)? {
            RebaseOutcome::Clean { new_tip } => {
                debug!("'{}' rebased cleanly to {}", name, new_tip);
                tracker.refresh(&mut self.store, name, parent_tip)?;
                result.rebased.push(name.to_string());
                Ok(())
            }
            RebaseOutcome::Conflict => {
                self.handle_conflict(&branch, base, tip, parent_tip, result)
            }
        }
    }

    /// Conflict path: squash fallback, keep-going bookkeeping, or halt
    fn handle_conflict(
        &mut self,
        branch: &Branch,
        base: Oid,
        tip: Oid,
        parent_tip: Oid,
        result: &mut UpdateResult,
    ) -> Result<()> {
        let name = branch.name.as_str();

        if self.options.no_squash {
            if self.options.keep_going {
                self.repo.abort_open_rebase()?;
                Output::warning(format!("'{}' conflicts; skipping (--keep-going)", name));
                self.mark_failed(name, result);
                return Ok(());
            }
            return Err(BraidError::conflict(name, resolve_instructions(name)));
        }

        // The branch's content may already have landed upstream in squashed
        // form; collapsing the range to one commit and re-applying it tells
        // us, and usually applies cleanly in that case.
        self.repo.abort_open_rebase()?;
        let commits = self.repo.commits_between(base, tip)?;
        let message = default_squash_message(name, &commits);

        match self.repo.squash_range(base, tip, parent_tip, &message)? {
            SquashOutcome::Applied(new_tip) => {
                self.repo.reset_hard(new_tip)?;
                MergeBaseTracker::new(self.repo).refresh(&mut self.store, name, parent_tip)?;
                Output::sub_item(format!(
                    "{} conflicted; squash fallback applied as a single commit",
                    name
                ));
                result.squashed.push(name.to_string());
                Ok(())
            }
            SquashOutcome::Empty => {
                // Everything already landed upstream; the branch is now empty
                // and the cleanup phase will offer it for pruning.
                self.repo.reset_hard(parent_tip)?;
                MergeBaseTracker::new(self.repo).refresh(&mut self.store, name, parent_tip)?;
                Output::sub_item(format!(
                    "{} already landed upstream; branch is now empty",
                    name
                ));
                result.squashed.push(name.to_string());
                Ok(())
            }
            SquashOutcome::Conflict => {
                if self.options.keep_going {
                    Output::warning(format!(
                        "'{}' conflicts even when squashed; skipping (--keep-going)",
                        name
                    ));
                    self.mark_failed(name, result);
                    return Ok(());
                }

                // Hand the user the original, structured rebase; commit by
                // commit is far easier to resolve than one collapsed diff.
                match self.repo.rebase_onto(name, base, parent_tip)? {
                    RebaseOutcome::Conflict => Err(BraidError::squash_fallback(
                        name,
                        format!(
                            "the squash fallback conflicts too. {}",
                            resolve_instructions(name)
                        ),
                    )),
                    RebaseOutcome::Clean { .. } => {
                        // Surprising but possible if the first attempt hit
                        // transient local state; take the win.
                        MergeBaseTracker::new(self.repo).refresh(
                            &mut self.store,
                            name,
                            parent_tip,
                        )?;
                        result.rebased.push(name.to_string());
                        Ok(())
                    }
                }
            }
        }
    }

    fn mark_failed(&mut self, name: &str, result: &mut UpdateResult) {
        self.failed.insert(name.to_string());
        result.failed.push(name.to_string());
    }

    /// Put the user back where they started and thaw their work
    fn finish_pass(&mut self, session: &RebaseSession, result: &UpdateResult) -> Result<()> {
        let reparented: HashMap<&str, &str> = result
            .pruned
            .iter()
            .map(|p| (p.name.as_str(), p.upstream.as_str()))
            .collect();

        // The starting branch itself may have been pruned; follow the
        // reparent chain to the nearest survivor.
        let mut target = session.starting_branch.clone();
        while !self.repo.branch_exists(&target) {
            match reparented.get(target.as_str()) {
                Some(upstream) => target = upstream.to_string(),
                None => break,
            }
        }

        if self.repo.branch_exists(&target) {
            self.repo.checkout_branch(&target)?;
            if target != session.starting_branch {
                Output::info(format!(
                    "'{}' was pruned; you are now on '{}'",
                    session.starting_branch, target
                ));
            }
        } else {
            // The whole stack above a root reference dissolved.
            let oid = self.repo.resolve_commit(&target)?;
            self.repo.checkout_detached(oid)?;
            Output::info(format!(
                "'{}' was pruned; checked out '{}' (detached)",
                session.starting_branch, target
            ));
        }

        let freezer = Freezer::new(self.repo, self.settings.freeze_limit_mb);
        if freezer.is_frozen()? {
            freezer.thaw()?;
            Output::info("Restored uncommitted work");
        }
        Ok(())
    }
}

fn resolve_instructions(name: &str) -> String {
    format!(
        "resolve the conflicts in '{}', run `git rebase --continue`, then rerun \
         `braid rebase-update` to finish the pass (or `git rebase --abort` to \
         leave this branch as it was)",
        name
    )
}
