/// End-to-end rebase pass tests over throwaway repositories with a real
/// (local, bare) remote.
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

use braid_cli::config::Settings;
use braid_cli::errors::BraidError;
use braid_cli::git::GitRepository;
use braid_cli::graph::BranchGraphStore;
use braid_cli::stack::{
    create_branch, NewBranchRequest, UpdateOptions, UpdateRunner, UpstreamPolicy,
};

fn git(repo_path: &Path, args: &[&str]) {
    let out = Command::new("git")
        .args(args)
        .current_dir(repo_path)
        .output()
        .unwrap();
    assert!(
        out.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&out.stderr)
    );
}

fn commit_file(repo_path: &Path, file: &str, content: &str, message: &str) {
    std::fs::write(repo_path.join(file), content).unwrap();
    git(repo_path, &["add", "."]);
    git(repo_path, &["commit", "-m", message]);
}

/// Work repo on branch `main` with a bare `origin` already fetched.
fn create_repo_with_remote() -> (TempDir, GitRepository, PathBuf) {
    let temp = TempDir::new().unwrap();
    let work = temp.path().join("work");
    std::fs::create_dir(&work).unwrap();

    git(&work, &["init"]);
    git(&work, &["config", "user.name", "Test User"]);
    git(&work, &["config", "user.email", "test@example.com"]);
    commit_file(&work, "README.md", "# Test", "Initial commit");
    std::fs::write(work.join("shared.txt"), "base\n").unwrap();
    git(&work, &["add", "."]);
    git(&work, &["commit", "-m", "Add shared file"]);
    git(&work, &["branch", "-M", "main"]);

    let remote = temp.path().join("remote.git");
    git(temp.path(), &["init", "--bare", "remote.git"]);
    git(&work, &["remote", "add", "origin", remote.to_str().unwrap()]);
    git(&work, &["push", "origin", "main"]);
    git(&work, &["fetch", "origin"]);

    let repo = GitRepository::open(&work).unwrap();
    (temp, repo, work)
}

/// Commit to `main` and push, so the next fetch moves `origin/main`.
fn advance_remote(work: &Path, file: &str, content: &str, message: &str) {
    let previous = current_branch(work);
    git(work, &["checkout", "main"]);
    commit_file(work, file, content, message);
    git(work, &["push", "origin", "main"]);
    git(work, &["checkout", &previous]);
}

fn current_branch(work: &Path) -> String {
    let out = Command::new("git")
        .args(["rev-parse", "--abbrev-ref", "HEAD"])
        .current_dir(work)
        .output()
        .unwrap();
    String::from_utf8_lossy(&out.stdout).trim().to_string()
}

fn track_new_branch(repo: &GitRepository, name: &str, policy: UpstreamPolicy) {
    let mut store = BranchGraphStore::open(repo).unwrap();
    let settings = Settings::load(repo).unwrap();
    create_branch(
        repo,
        &mut store,
        &settings,
        &NewBranchRequest {
            name: name.to_string(),
            policy,
        },
    )
    .unwrap();
}

fn run_pass(
    repo: &GitRepository,
    options: UpdateOptions,
) -> braid_cli::errors::Result<braid_cli::stack::UpdateResult> {
    let store = BranchGraphStore::open(repo).unwrap();
    let settings = Settings::load(repo).unwrap();
    UpdateRunner::new(repo, store, settings, options).run()
}

#[test]
fn test_stack_rebases_root_to_leaf_after_remote_advance() {
    let (_temp, repo, work) = create_repo_with_remote();

    track_new_branch(&repo, "a", UpstreamPolicy::Explicit("origin/main".into()));
    commit_file(&work, "a.txt", "a", "A work");
    track_new_branch(&repo, "b", UpstreamPolicy::Current);
    commit_file(&work, "b.txt", "b", "B work");

    advance_remote(&work, "root.txt", "root", "Remote advance");

    let result = run_pass(&repo, UpdateOptions::default()).unwrap();
    assert_eq!(result.rebased, ["a", "b"]);
    assert!(result.failed.is_empty());

    let origin_tip = repo.resolve_commit("origin/main").unwrap();
    let a_tip = repo.branch_tip("a").unwrap();
    let b_tip = repo.branch_tip("b").unwrap();
    assert!(repo.is_descendant_of(a_tip, origin_tip).unwrap());
    assert!(repo.is_descendant_of(b_tip, a_tip).unwrap());

    // Base markers moved to the new attachment points.
    let store = BranchGraphStore::open(&repo).unwrap();
    assert_eq!(
        store.get("a").unwrap().unwrap().base.unwrap(),
        origin_tip.to_string()
    );
    assert_eq!(
        store.get("b").unwrap().unwrap().base.unwrap(),
        a_tip.to_string()
    );

    // The pass put us back where we started.
    assert_eq!(repo.current_branch().unwrap(), "b");
}

#[test]
fn test_second_pass_is_idempotent() {
    let (_temp, repo, work) = create_repo_with_remote();

    track_new_branch(&repo, "a", UpstreamPolicy::Explicit("origin/main".into()));
    commit_file(&work, "a.txt", "a", "A work");
    advance_remote(&work, "root.txt", "root", "Remote advance");

    run_pass(&repo, UpdateOptions::default()).unwrap();
    let tip_after_first = repo.branch_tip("a").unwrap();

    let result = run_pass(&repo, UpdateOptions::default()).unwrap();
    assert!(result.is_noop());
    assert_eq!(result.up_to_date, ["a"]);
    assert_eq!(repo.branch_tip("a").unwrap(), tip_after_first);
}

#[test]
fn test_dormant_branch_left_alone() {
    let (_temp, repo, work) = create_repo_with_remote();

    track_new_branch(&repo, "a", UpstreamPolicy::Explicit("origin/main".into()));
    commit_file(&work, "a.txt", "a", "A work");
    track_new_branch(&repo, "c", UpstreamPolicy::Explicit("origin/main".into()));
    commit_file(&work, "c.txt", "c", "C work");
    git(&work, &["checkout", "a"]);

    let mut store = BranchGraphStore::open(&repo).unwrap();
    store.set_dormant("c", true).unwrap();
    let c_entry_before = store.get("c").unwrap().unwrap();
    let c_tip_before = repo.branch_tip("c").unwrap();

    advance_remote(&work, "root.txt", "root", "Remote advance");

    let result = run_pass(&repo, UpdateOptions::default()).unwrap();
    assert_eq!(result.rebased, ["a"]);
    assert!(!result.up_to_date.contains(&"c".to_string()));

    // Untouched in both the backend and the store.
    assert_eq!(repo.branch_tip("c").unwrap(), c_tip_before);
    let store = BranchGraphStore::open(&repo).unwrap();
    assert_eq!(store.get("c").unwrap().unwrap(), c_entry_before);
}

#[test]
fn test_conflict_halts_then_resumes_without_reattempting() {
    let (_temp, repo, work) = create_repo_with_remote();

    // early: clean. mid: conflicts on shared.txt. late: stacked on mid.
    track_new_branch(&repo, "early", UpstreamPolicy::Explicit("origin/main".into()));
    commit_file(&work, "early.txt", "e", "Early work");
    track_new_branch(&repo, "mid", UpstreamPolicy::Explicit("origin/main".into()));
    commit_file(&work, "shared.txt", "mid version\n", "Mid edits shared");
    track_new_branch(&repo, "late", UpstreamPolicy::Current);
    commit_file(&work, "late.txt", "l", "Late work");
    git(&work, &["checkout", "early"]);

    advance_remote(&work, "shared.txt", "remote version\n", "Remote edits shared");

    let err = run_pass(&repo, UpdateOptions::default()).unwrap_err();
    assert!(matches!(err, BraidError::SquashFallback { .. }));
    // The original structured rebase is left open for the user.
    assert!(repo.is_mid_rebase());

    let early_tip = repo.branch_tip("early").unwrap();
    assert!(repo
        .is_descendant_of(early_tip, repo.resolve_commit("origin/main").unwrap())
        .unwrap());

    // The user resolves by hand: abort, then rebuild mid on the new root.
    repo.abort_open_rebase().unwrap();
    git(&work, &["checkout", "mid"]);
    git(&work, &["reset", "--hard", "origin/main"]);
    commit_file(&work, "shared.txt", "merged version\n", "Mid edits shared");

    // Rerun: early is not revisited, mid is recognized as resolved, late
    // still gets its rebase.
    let result = run_pass(&repo, UpdateOptions { no_fetch: true, ..Default::default() }).unwrap();
    assert_eq!(result.up_to_date, ["mid"]);
    assert_eq!(result.rebased, ["late"]);
    assert!(!result.up_to_date.contains(&"early".to_string()));
    assert_eq!(repo.branch_tip("early").unwrap(), early_tip);

    // Session is gone after the completed pass.
    let store = BranchGraphStore::open(&repo).unwrap();
    assert!(store.read_session().unwrap().is_none());
}

#[test]
fn test_squash_merged_branch_empties_and_prunes() {
    let (_temp, repo, work) = create_repo_with_remote();

    // a: two commits that will land upstream as one squashed commit.
    track_new_branch(&repo, "a", UpstreamPolicy::Explicit("origin/main".into()));
    commit_file(&work, "f.txt", "X\n", "Add f");
    std::fs::write(work.join("f.txt"), "Y\n").unwrap();
    std::fs::write(work.join("g.txt"), "g\n").unwrap();
    git(&work, &["add", "."]);
    git(&work, &["commit", "-m", "Rework f, add g"]);

    track_new_branch(&repo, "child", UpstreamPolicy::Current);
    commit_file(&work, "child.txt", "c", "Child work");

    // Squash-merge a's final content into the remote root as one commit.
    git(&work, &["checkout", "main"]);
    std::fs::write(work.join("f.txt"), "Y\n").unwrap();
    std::fs::write(work.join("g.txt"), "g\n").unwrap();
    git(&work, &["add", "."]);
    git(&work, &["commit", "-m", "Squash-merge a"]);
    git(&work, &["push", "origin", "main"]);
    git(&work, &["checkout", "child"]);

    let result = run_pass(&repo, UpdateOptions::default()).unwrap();

    // a conflicted structurally, then emptied out through the fallback.
    assert_eq!(result.squashed, ["a"]);
    assert_eq!(result.pruned.len(), 1);
    assert_eq!(result.pruned[0].name, "a");
    assert_eq!(result.pruned[0].reparented, ["child"]);

    assert!(!repo.branch_exists("a"));
    let store = BranchGraphStore::open(&repo).unwrap();
    assert!(store.get("a").unwrap().is_none());

    let origin_tip = repo.resolve_commit("origin/main").unwrap();
    let child = store.get("child").unwrap().unwrap();
    assert_eq!(child.upstream, "origin/main");
    assert_eq!(child.base.unwrap(), origin_tip.to_string());
    let child_tip = repo.branch_tip("child").unwrap();
    assert!(repo.is_descendant_of(child_tip, origin_tip).unwrap());

    assert_eq!(repo.current_branch().unwrap(), "child");
}

#[test]
fn test_keep_going_skips_conflicted_branch_and_dependents() {
    let (_temp, repo, work) = create_repo_with_remote();

    track_new_branch(&repo, "bad", UpstreamPolicy::Explicit("origin/main".into()));
    commit_file(&work, "shared.txt", "bad version\n", "Bad edits shared");
    track_new_branch(&repo, "dep", UpstreamPolicy::Current);
    commit_file(&work, "dep.txt", "d", "Dep work");
    track_new_branch(&repo, "good", UpstreamPolicy::Explicit("origin/main".into()));
    commit_file(&work, "good.txt", "g", "Good work");

    advance_remote(&work, "shared.txt", "remote version\n", "Remote edits shared");

    let bad_tip = repo.branch_tip("bad").unwrap();
    let result = run_pass(
        &repo,
        UpdateOptions {
            keep_going: true,
            ..Default::default()
        },
    )
    .unwrap();

    assert_eq!(result.failed, ["bad", "dep"]);
    assert_eq!(result.rebased, ["good"]);
    // Skipped branches are left exactly as they were, and the repository
    // is clean for the next attempt.
    assert_eq!(repo.branch_tip("bad").unwrap(), bad_tip);
    assert!(!repo.is_mid_rebase());

    let store = BranchGraphStore::open(&repo).unwrap();
    assert!(store.read_session().unwrap().is_none());
    // No pruning after a pass with failures.
    assert!(result.pruned.is_empty());
}

#[test]
fn test_current_and_tree_selection() {
    let (_temp, repo, work) = create_repo_with_remote();

    track_new_branch(&repo, "a", UpstreamPolicy::Explicit("origin/main".into()));
    commit_file(&work, "a.txt", "a", "A work");
    track_new_branch(&repo, "b", UpstreamPolicy::Current);
    commit_file(&work, "b.txt", "b", "B work");
    git(&work, &["checkout", "a"]);

    advance_remote(&work, "root.txt", "root", "Remote advance");

    // --current: only a moves; b stays behind.
    let result = run_pass(
        &repo,
        UpdateOptions {
            current_only: true,
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(result.rebased, ["a"]);
    let a_tip = repo.branch_tip("a").unwrap();
    let b_tip = repo.branch_tip("b").unwrap();
    assert!(!repo.is_descendant_of(b_tip, a_tip).unwrap());

    // --current --tree: a is current, b follows.
    let result = run_pass(
        &repo,
        UpdateOptions {
            current_only: true,
            tree: true,
            no_fetch: true,
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(result.up_to_date, ["a"]);
    assert_eq!(result.rebased, ["b"]);
    assert!(repo
        .is_descendant_of(repo.branch_tip("b").unwrap(), a_tip)
        .unwrap());
}

#[test]
fn test_pass_preserves_uncommitted_work() {
    let (_temp, repo, work) = create_repo_with_remote();

    track_new_branch(&repo, "a", UpstreamPolicy::Explicit("origin/main".into()));
    commit_file(&work, "a.txt", "a", "A work");

    advance_remote(&work, "root.txt", "root", "Remote advance");

    // One staged new file, one unstaged edit to a tracked file.
    std::fs::write(work.join("staged.txt"), "staged").unwrap();
    git(&work, &["add", "staged.txt"]);
    std::fs::write(work.join("a.txt"), "edited").unwrap();

    let result = run_pass(&repo, UpdateOptions::default()).unwrap();
    assert_eq!(result.rebased, ["a"]);

    // Back on a with the same staged/unstaged split.
    assert_eq!(repo.current_branch().unwrap(), "a");
    assert!(repo.index_differs_from_head().unwrap());
    assert_eq!(
        std::fs::read_to_string(work.join("a.txt")).unwrap(),
        "edited"
    );
    assert_eq!(
        std::fs::read_to_string(work.join("staged.txt")).unwrap(),
        "staged"
    );
}

#[test]
fn test_selecting_untracked_branch_is_rejected_before_rebasing() {
    let (_temp, repo, work) = create_repo_with_remote();

    track_new_branch(&repo, "a", UpstreamPolicy::Explicit("origin/main".into()));
    commit_file(&work, "a.txt", "a", "A work");
    let a_tip = repo.branch_tip("a").unwrap();

    advance_remote(&work, "root.txt", "root", "Remote advance");

    let err = run_pass(
        &repo,
        UpdateOptions {
            no_fetch: true,
            branches: vec!["nonexistent".to_string()],
            ..Default::default()
        },
    )
    .unwrap_err();
    assert!(matches!(err, BraidError::Validation(_)));
    assert_eq!(repo.branch_tip("a").unwrap(), a_tip);
}
