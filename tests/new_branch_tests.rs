/// Branch-creation policy tests: flag exclusivity, root resolution, tag
/// upstreams, and the inject splice.
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

use braid_cli::cli::commands::new_branch;
use braid_cli::config::Settings;
use braid_cli::errors::BraidError;
use braid_cli::git::GitRepository;
use braid_cli::graph::BranchGraphStore;
use braid_cli::stack::{create_branch, NewBranchRequest, UpstreamPolicy};

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

fn create_test_repo() -> (TempDir, GitRepository) {
    let temp = TempDir::new().unwrap();
    let repo_path = temp.path();

    git(repo_path, &["init"]);
    git(repo_path, &["config", "user.name", "Test User"]);
    git(repo_path, &["config", "user.email", "test@example.com"]);
    std::fs::write(repo_path.join("README.md"), "# Test").unwrap();
    git(repo_path, &["add", "."]);
    git(repo_path, &["commit", "-m", "Initial commit"]);
    git(repo_path, &["branch", "-M", "main"]);

    let repo = GitRepository::open(repo_path).unwrap();
    (temp, repo)
}

fn request(name: &str, policy: UpstreamPolicy) -> NewBranchRequest {
    NewBranchRequest {
        name: name.to_string(),
        policy,
    }
}

#[test]
fn test_conflicting_creation_flags_rejected_before_any_mutation() {
    // Flag validation happens before the repository is even opened, so this
    // needs no git setup at all.
    let err = new_branch::run(
        "x".to_string(),
        Some("origin/main".to_string()),
        true,
        false,
        false,
    )
    .unwrap_err();
    assert!(matches!(err, BraidError::Validation(_)));

    let err = new_branch::run("x".to_string(), None, false, true, true).unwrap_err();
    assert!(matches!(err, BraidError::Validation(_)));
}

#[test]
fn test_configured_root_is_used_for_default_policy() {
    let (temp, repo) = create_test_repo();
    git(temp.path(), &["branch", "trunk"]);
    git(temp.path(), &["config", "braid.root", "trunk"]);

    let mut store = BranchGraphStore::open(&repo).unwrap();
    let settings = Settings::load(&repo).unwrap();

    let created = create_branch(
        &repo,
        &mut store,
        &settings,
        &request("feature", UpstreamPolicy::Root),
    )
    .unwrap();

    assert_eq!(created.upstream, "trunk");
    assert_eq!(store.get("feature").unwrap().unwrap().upstream, "trunk");
    assert_eq!(repo.current_branch().unwrap(), "feature");
}

#[test]
fn test_tag_upstream_is_tracked_verbatim() {
    let (temp, repo) = create_test_repo();
    git(temp.path(), &["tag", "lkgr"]);

    let mut store = BranchGraphStore::open(&repo).unwrap();
    let settings = Settings::load(&repo).unwrap();

    let created = create_branch(
        &repo,
        &mut store,
        &settings,
        &request("pinned", UpstreamPolicy::Explicit("lkgr".to_string())),
    )
    .unwrap();

    assert_eq!(created.upstream, "lkgr");
    assert_eq!(
        repo.branch_tip("pinned").unwrap(),
        repo.resolve_commit("lkgr").unwrap()
    );
    assert_eq!(created.base, repo.resolve_commit("lkgr").unwrap().to_string());
}

#[test]
fn test_inject_current_rewrites_the_stack_shape() {
    let (temp, repo) = create_test_repo();

    let mut store = BranchGraphStore::open(&repo).unwrap();
    let settings = Settings::load(&repo).unwrap();

    // d tracks main; then inject z directly above d.
    create_branch(
        &repo,
        &mut store,
        &settings,
        &request("d", UpstreamPolicy::Explicit("main".to_string())),
    )
    .unwrap();
    std::fs::write(temp.path().join("d.txt"), "d").unwrap();
    git(temp.path(), &["add", "."]);
    git(temp.path(), &["commit", "-m", "D work"]);

    let created = create_branch(
        &repo,
        &mut store,
        &settings,
        &request("z", UpstreamPolicy::InjectCurrent),
    )
    .unwrap();

    // Before: d -> main. After: d -> z -> main.
    assert_eq!(created.upstream, "main");
    assert_eq!(store.get("z").unwrap().unwrap().upstream, "main");
    assert_eq!(store.get("d").unwrap().unwrap().upstream, "z");
    // z starts at the old upstream tip, so d's commits stay its own.
    assert_eq!(
        repo.branch_tip("z").unwrap(),
        repo.resolve_commit("main").unwrap()
    );
}

#[test]
fn test_cyclic_upstream_rejected_without_side_effects() {
    let (_temp, repo) = create_test_repo();

    let mut store = BranchGraphStore::open(&repo).unwrap();
    let settings = Settings::load(&repo).unwrap();

    create_branch(
        &repo,
        &mut store,
        &settings,
        &request("a", UpstreamPolicy::Explicit("main".to_string())),
    )
    .unwrap();
    create_branch(
        &repo,
        &mut store,
        &settings,
        &request("b", UpstreamPolicy::Current),
    )
    .unwrap();

    // c -> c is a direct cycle; a -> ... -> b -> a would be transitive, but
    // both must die before any branch is created.
    let err = create_branch(
        &repo,
        &mut store,
        &settings,
        &request("c", UpstreamPolicy::Explicit("c".to_string())),
    )
    .unwrap_err();
    assert!(matches!(err, BraidError::Cycle(_)));
    assert!(!repo.branch_exists("c"));
    assert!(store.get("c").unwrap().is_none());
}
