//! Integration tests for the Git interface.
//!
//! These tests use real git repositories created via tempfile to verify
//! that the Git interface works correctly with actual git operations.

mod support;

use std::fs;

use tempfile::TempDir;

use reposync::core::types::{BranchName, Oid, RefName};
use reposync::git::{Git, GitError};
use reposync::sync::Cancellation;

use support::{git_output, run_git, Upstream};

fn main_branch() -> BranchName {
    BranchName::new("main").unwrap()
}

/// Init a repository at `dir` with origin pointing at `upstream` and fetch.
fn fetched(dir: &std::path::Path, upstream: &Upstream) -> (Git, Oid) {
    let git = Git::init(dir).unwrap();
    git.ensure_remote("origin", &upstream.url()).unwrap();
    let tip = git
        .fetch_branch("origin", &main_branch(), &Cancellation::new())
        .unwrap()
        .expect("branch exists upstream");
    (git, tip)
}

// =============================================================================
// Repository Opening Tests
// =============================================================================

#[test]
fn open_non_repository_fails() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(Git::open(dir.path()), Err(GitError::NotARepo { .. })));
}

#[test]
fn open_does_not_search_parents() {
    let dir = TempDir::new().unwrap();
    run_git(dir.path(), &["init"]);
    let nested = dir.path().join("nested");
    fs::create_dir(&nested).unwrap();

    assert!(matches!(Git::open(&nested), Err(GitError::NotARepo { .. })));
}

#[test]
fn open_bare_repository_is_rejected() {
    let upstream = Upstream::new("main");
    assert!(matches!(
        Git::open(&upstream.remote_path()),
        Err(GitError::BareRepo { .. })
    ));
}

// =============================================================================
// Transfer Tests
// =============================================================================

#[test]
fn fetch_branch_returns_remote_tip() {
    let upstream = Upstream::new("main");
    let dir = TempDir::new().unwrap();

    let (_git, tip) = fetched(dir.path(), &upstream);
    assert_eq!(tip.as_str(), upstream.tip());
}

#[test]
fn remote_tip_reads_advertisement_without_writing() {
    let upstream = Upstream::new("main");
    let dir = TempDir::new().unwrap();
    let git = Git::init(dir.path()).unwrap();
    git.ensure_remote("origin", &upstream.url()).unwrap();

    let tip = git
        .remote_tip("origin", &main_branch(), &Cancellation::new())
        .unwrap()
        .expect("branch exists upstream");

    assert_eq!(tip.as_str(), upstream.tip());
    assert!(!git.git_dir().join("FETCH_HEAD").exists());
    let tracking = RefName::for_remote_branch("origin", &main_branch());
    assert!(git.try_resolve_ref(&tracking).unwrap().is_none());
}

#[test]
fn remote_tip_missing_branch_is_none() {
    let upstream = Upstream::new("main");
    let dir = TempDir::new().unwrap();
    let git = Git::init(dir.path()).unwrap();
    git.ensure_remote("origin", &upstream.url()).unwrap();

    let tip = git
        .remote_tip(
            "origin",
            &BranchName::new("does-not-exist").unwrap(),
            &Cancellation::new(),
        )
        .unwrap();
    assert!(tip.is_none());
}

#[test]
fn remote_tip_honours_cancellation() {
    let upstream = Upstream::new("main");
    let dir = TempDir::new().unwrap();
    let git = Git::init(dir.path()).unwrap();
    git.ensure_remote("origin", &upstream.url()).unwrap();

    let cancel = Cancellation::new();
    cancel.cancel();
    assert!(matches!(
        git.remote_tip("origin", &main_branch(), &cancel),
        Err(GitError::Cancelled)
    ));
}

#[test]
fn fetch_prunes_branch_deleted_upstream() {
    let upstream = Upstream::new("main");
    let dir = TempDir::new().unwrap();
    let (git, _) = fetched(dir.path(), &upstream);

    run_git(&upstream.remote_path(), &["update-ref", "-d", "refs/heads/main"]);

    let tip = git
        .fetch_branch("origin", &main_branch(), &Cancellation::new())
        .unwrap();
    assert!(tip.is_none());
}

#[test]
fn fetch_missing_branch_is_none() {
    let upstream = Upstream::new("main");
    let dir = TempDir::new().unwrap();
    let git = Git::init(dir.path()).unwrap();
    git.ensure_remote("origin", &upstream.url()).unwrap();

    let tip = git
        .fetch_branch(
            "origin",
            &BranchName::new("does-not-exist").unwrap(),
            &Cancellation::new(),
        )
        .unwrap();
    assert!(tip.is_none());
}

#[test]
fn fetch_unreachable_remote_is_transient() {
    let dir = TempDir::new().unwrap();
    let git = Git::init(&dir.path().join("repo")).unwrap();
    let url = format!("file://{}/missing.git", dir.path().display());
    git.ensure_remote("origin", &url).unwrap();

    let err = git
        .fetch_branch("origin", &main_branch(), &Cancellation::new())
        .unwrap_err();
    assert!(err.is_transient(), "expected transient error, got {err:?}");
}

#[test]
fn fetch_with_cancelled_handle_does_nothing() {
    let upstream = Upstream::new("main");
    let dir = TempDir::new().unwrap();
    let git = Git::init(dir.path()).unwrap();
    git.ensure_remote("origin", &upstream.url()).unwrap();

    let cancel = Cancellation::new();
    cancel.cancel();
    assert!(matches!(
        git.fetch_branch("origin", &main_branch(), &cancel),
        Err(GitError::Cancelled)
    ));
}

#[test]
fn ensure_remote_reports_changes() {
    let upstream = Upstream::new("main");
    let dir = TempDir::new().unwrap();
    let git = Git::init(dir.path()).unwrap();

    assert!(git.ensure_remote("origin", &upstream.url()).unwrap());
    assert!(!git.ensure_remote("origin", &upstream.url()).unwrap());
    assert!(git.ensure_remote("origin", "file:///elsewhere.git").unwrap());
    assert_eq!(
        git.remote_url("origin").unwrap().as_deref(),
        Some("file:///elsewhere.git")
    );
}

// =============================================================================
// Branch and Working Tree Tests
// =============================================================================

#[test]
fn tracking_branch_checkout() {
    let upstream = Upstream::new("main");
    let dir = TempDir::new().unwrap();
    let (git, tip) = fetched(dir.path(), &upstream);

    git.create_tracking_branch("origin", &main_branch(), &tip).unwrap();
    git.checkout_branch(&main_branch()).unwrap();

    assert_eq!(git.head_oid().unwrap(), tip);
    assert_eq!(git.current_branch().unwrap(), Some(main_branch()));
    assert!(dir.path().join("README.md").exists());
    assert_eq!(
        git_output(dir.path(), &["rev-parse", "--abbrev-ref", "main@{upstream}"]),
        "origin/main"
    );
    assert!(git.worktree_status().unwrap().is_clean());
}

#[test]
fn fast_forward_moves_branch_and_tree() {
    let upstream = Upstream::new("main");
    let dir = TempDir::new().unwrap();
    let (git, tip) = fetched(dir.path(), &upstream);
    git.create_tracking_branch("origin", &main_branch(), &tip).unwrap();
    git.checkout_branch(&main_branch()).unwrap();

    upstream.commit("new.txt", "hello\n", "Add new file");
    let new_tip = git
        .fetch_branch("origin", &main_branch(), &Cancellation::new())
        .unwrap()
        .unwrap();
    assert!(git.is_ancestor(&tip, &new_tip).unwrap());
    assert!(!git.is_ancestor(&new_tip, &tip).unwrap());

    git.fast_forward(&main_branch(), &new_tip).unwrap();
    assert_eq!(git.head_oid().unwrap(), new_tip);
    assert_eq!(
        fs::read_to_string(dir.path().join("new.txt")).unwrap(),
        "hello\n"
    );
    assert!(git.worktree_status().unwrap().is_clean());
}

#[test]
fn worktree_status_sees_tracked_changes_only() {
    let upstream = Upstream::new("main");
    let dir = TempDir::new().unwrap();
    let (git, tip) = fetched(dir.path(), &upstream);
    git.create_tracking_branch("origin", &main_branch(), &tip).unwrap();
    git.checkout_branch(&main_branch()).unwrap();

    fs::write(dir.path().join("untracked.txt"), "x").unwrap();
    assert!(git.worktree_status().unwrap().is_clean());

    fs::write(dir.path().join("README.md"), "changed\n").unwrap();
    let status = git.worktree_status().unwrap();
    assert_eq!(status.unstaged, 1);
    assert!(!status.is_clean());
}

#[test]
fn force_checkout_head_discards_changes() {
    let upstream = Upstream::new("main");
    let dir = TempDir::new().unwrap();
    let (git, tip) = fetched(dir.path(), &upstream);
    git.create_tracking_branch("origin", &main_branch(), &tip).unwrap();
    git.checkout_branch(&main_branch()).unwrap();

    fs::write(dir.path().join("README.md"), "scribbled\n").unwrap();
    git.force_checkout_head().unwrap();

    assert_eq!(
        fs::read_to_string(dir.path().join("README.md")).unwrap(),
        "# Test Repo\n"
    );
}
