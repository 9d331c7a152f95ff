//! Shared fixtures for integration tests.
//!
//! Repositories are built with the `git` CLI in temp directories and served
//! to reposync over `file://` URLs.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use tempfile::TempDir;

use reposync::core::paths::WorkspacePaths;
use reposync::sync::{RepositoryEntry, RepositorySpec, RepositorySyncer, RetryPolicy, SyncOptions};

/// A bare "remote" repository plus an authoring clone used to push to it.
pub struct Upstream {
    dir: TempDir,
    branch: String,
}

impl Upstream {
    /// Create a remote whose `branch` has one commit.
    pub fn new(branch: &str) -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");

        run_git(dir.path(), &["init", "--bare", "remote.git"]);

        let author = dir.path().join("author");
        std::fs::create_dir(&author).unwrap();
        run_git(&author, &["init"]);
        run_git(
            &author,
            &["symbolic-ref", "HEAD", &format!("refs/heads/{branch}")],
        );
        run_git(&author, &["remote", "add", "origin", "../remote.git"]);

        let upstream = Self {
            dir,
            branch: branch.to_string(),
        };
        upstream.commit("README.md", "# Test Repo\n", "Initial commit");
        upstream
    }

    /// `file://` URL of the bare remote.
    pub fn url(&self) -> String {
        format!("file://{}", self.remote_path().display())
    }

    pub fn remote_path(&self) -> PathBuf {
        self.dir.path().join("remote.git")
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    fn author(&self) -> PathBuf {
        self.dir.path().join("author")
    }

    /// Commit a file on the authoring clone and push it. Returns the new tip.
    pub fn commit(&self, file: &str, content: &str, message: &str) -> String {
        let author = self.author();
        std::fs::write(author.join(file), content).unwrap();
        run_git(&author, &["add", file]);
        run_git(&author, &["commit", "-m", message]);
        run_git(&author, &["push", "origin", &self.branch]);
        self.tip()
    }

    /// Rewrite the last commit and force-push it. Returns the new tip.
    pub fn force_rewrite(&self, message: &str) -> String {
        let author = self.author();
        run_git(&author, &["commit", "--amend", "-m", message]);
        run_git(&author, &["push", "--force", "origin", &self.branch]);
        self.tip()
    }

    /// Current tip of the branch on the remote.
    pub fn tip(&self) -> String {
        git_output(
            &self.remote_path(),
            &["rev-parse", &format!("refs/heads/{}", self.branch)],
        )
    }

    /// A byte-for-byte copy of the remote at another path.
    pub fn mirror(&self, name: &str) -> PathBuf {
        let target = self.dir.path().join(name);
        run_git(
            self.dir.path(),
            &[
                "clone",
                "--bare",
                &self.remote_path().display().to_string(),
                &target.display().to_string(),
            ],
        );
        target
    }
}

/// A workspace root in a temp directory.
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn paths(&self) -> WorkspacePaths {
        WorkspacePaths::new(self.root())
    }

    pub fn entry(&self, name: &str, upstream: &Upstream) -> RepositoryEntry {
        entry(name, &upstream.url(), upstream.branch())
    }

    pub fn spec(&self, name: &str, upstream: &Upstream) -> RepositorySpec {
        self.entry(name, upstream)
            .resolve(&self.paths())
            .expect("valid spec")
    }
}

pub fn entry(name: &str, url: &str, branch: &str) -> RepositoryEntry {
    RepositoryEntry {
        name: name.into(),
        remote_url: url.into(),
        branch: branch.into(),
        path: None,
    }
}

/// A syncer with no backoff delay and short lock waits.
pub fn fast_syncer() -> RepositorySyncer {
    RepositorySyncer::new(SyncOptions {
        retry: RetryPolicy::new(2, Duration::ZERO),
        lock_timeout: Duration::from_secs(30),
        lock_poll_interval: Duration::from_millis(10),
    })
}

/// Run a git command in the given directory, panicking on failure.
pub fn run_git(dir: &Path, args: &[&str]) {
    let output = git(dir, args);
    if !output.status.success() {
        panic!(
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }
}

/// Run a git command and return trimmed stdout.
pub fn git_output(dir: &Path, args: &[&str]) -> String {
    let output = git(dir, args);
    if !output.status.success() {
        panic!(
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }
    String::from_utf8(output.stdout).unwrap().trim().to_string()
}

fn git(dir: &Path, args: &[&str]) -> std::process::Output {
    Command::new("git")
        .args(["-c", "commit.gpgsign=false", "-c", "init.defaultBranch=main"])
        .args(args)
        .current_dir(dir)
        .env("GIT_AUTHOR_NAME", "Test User")
        .env("GIT_AUTHOR_EMAIL", "test@example.com")
        .env("GIT_COMMITTER_NAME", "Test User")
        .env("GIT_COMMITTER_EMAIL", "test@example.com")
        .output()
        .expect("failed to run git")
}
