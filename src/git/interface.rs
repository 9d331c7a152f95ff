//! git::interface
//!
//! Git interface implementation using git2.
//!
//! This module provides the **single doorway** to all Git operations in
//! reposync. All repository interactions flow through this interface, which
//! provides structured results and normalizes errors into typed failure
//! categories.
//!
//! # Architecture
//!
//! The `Git` struct is the only way to interact with a Git repository.
//! No other module should import `git2` directly. This ensures:
//!
//! - Consistent error handling across all Git operations
//! - Strong type guarantees at the boundary (`Oid`, `BranchName`, `RefName`)
//! - Transfer errors are classified once, here, as transient or permanent
//!
//! # Error Handling
//!
//! Git errors are categorized into typed variants:
//! - [`GitError::NotARepo`]: No repository metadata at the given path
//! - [`GitError::RefNotFound`]: Requested ref does not exist
//! - [`GitError::Transfer`]: Network transfer failed (with transient flag)
//! - [`GitError::Cancelled`]: A transfer was aborted by cancellation
//! - [`GitError::Checkout`]: Working tree update failed
//!
//! # Example
//!
//! ```ignore
//! use reposync::git::Git;
//! use std::path::Path;
//!
//! let git = Git::open(Path::new("/workspace/app"))?;
//! let head = git.head_oid()?;
//! println!("app is at {}", head.short(7));
//! ```

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::core::types::{BranchName, Oid, RefName, TypeError};
use crate::sync::Cancellation;

/// Errors from Git operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// No repository metadata at the path.
    #[error("not a git repository: {}", path.display())]
    NotARepo {
        /// The path that was opened
        path: PathBuf,
    },

    /// Repository is bare (no working directory).
    #[error("bare repository where a checkout was expected: {}", path.display())]
    BareRepo {
        /// The path that was opened
        path: PathBuf,
    },

    /// Requested ref does not exist.
    #[error("ref not found: {refname}")]
    RefNotFound {
        /// The ref that was not found
        refname: String,
    },

    /// Object not found in repository.
    #[error("object not found: {oid}")]
    ObjectNotFound {
        /// The OID that was not found
        oid: String,
    },

    /// Invalid object id format.
    #[error("invalid object id: {oid}")]
    InvalidOid {
        /// The invalid OID string
        oid: String,
    },

    /// Fetching from the remote failed.
    #[error("transfer failed: {message}")]
    Transfer {
        /// The underlying error message
        message: String,
        /// Whether retrying may help (false for auth/certificate failures)
        transient: bool,
    },

    /// A transfer was aborted because cancellation was requested.
    #[error("transfer cancelled")]
    Cancelled,

    /// Updating the working tree failed.
    #[error("checkout failed: {message}")]
    Checkout {
        /// Description of the error
        message: String,
    },

    /// Internal git2 error.
    #[error("git error: {message}")]
    Internal {
        /// The error message
        message: String,
    },
}

impl GitError {
    /// Create a GitError from a git2::Error with richer context.
    fn from_git2(err: git2::Error, context: &str) -> Self {
        match err.code() {
            git2::ErrorCode::NotFound => {
                if context.starts_with("refs/") || context == "HEAD" {
                    GitError::RefNotFound {
                        refname: context.to_string(),
                    }
                } else {
                    GitError::ObjectNotFound {
                        oid: context.to_string(),
                    }
                }
            }
            git2::ErrorCode::UnbornBranch => GitError::RefNotFound {
                refname: context.to_string(),
            },
            git2::ErrorCode::InvalidSpec => GitError::InvalidOid {
                oid: context.to_string(),
            },
            _ => GitError::Internal {
                message: format!("{}: {}", context, err.message()),
            },
        }
    }

    /// Classify an error returned by a network transfer.
    ///
    /// `cancel_requested` is sampled right after the failure: a callback
    /// that returned `false` surfaces as a generic user error, so the flag
    /// is what tells a cancellation apart from a real failure.
    fn from_transfer(err: git2::Error, cancel_requested: bool) -> Self {
        if cancel_requested || err.code() == git2::ErrorCode::User {
            return GitError::Cancelled;
        }
        let transient = !matches!(
            err.code(),
            git2::ErrorCode::Auth | git2::ErrorCode::Certificate
        );
        GitError::Transfer {
            message: err.message().to_string(),
            transient,
        }
    }

    /// Whether the operation may succeed if retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GitError::Transfer {
                transient: true,
                ..
            }
        )
    }
}

impl From<git2::Error> for GitError {
    fn from(err: git2::Error) -> Self {
        match err.code() {
            git2::ErrorCode::NotFound => GitError::RefNotFound {
                refname: err.message().to_string(),
            },
            git2::ErrorCode::InvalidSpec => GitError::InvalidOid {
                oid: err.message().to_string(),
            },
            _ => GitError::Internal {
                message: err.message().to_string(),
            },
        }
    }
}

impl From<TypeError> for GitError {
    fn from(err: TypeError) -> Self {
        match err {
            TypeError::InvalidOid(msg) => GitError::InvalidOid { oid: msg },
            other => GitError::Internal {
                message: other.to_string(),
            },
        }
    }
}

/// Summary of working tree status.
///
/// Untracked files are not counted: they never block a fast-forward unless
/// they collide with incoming paths, which the safe checkout reports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorktreeStatus {
    /// Number of staged changes
    pub staged: usize,
    /// Number of unstaged changes to tracked files
    pub unstaged: usize,
    /// Whether there are unresolved conflicts
    pub has_conflicts: bool,
}

impl WorktreeStatus {
    /// Check if the worktree has no local modifications to tracked files.
    pub fn is_clean(&self) -> bool {
        self.staged == 0 && self.unstaged == 0 && !self.has_conflicts
    }
}

/// The Git interface.
///
/// This is the **single point of interaction** with Git. All repository
/// reads and writes flow through this interface. No other module should
/// import `git2` directly.
pub struct Git {
    /// The underlying git2 repository
    repo: git2::Repository,
}

impl std::fmt::Debug for Git {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Git")
            .field("path", &self.repo.path())
            .finish()
    }
}

impl Git {
    // =========================================================================
    // Repository Opening
    // =========================================================================

    /// Open the checkout rooted exactly at `path`.
    ///
    /// Unlike discovery, this never searches parent directories: a
    /// directory beneath the workspace root must carry its own metadata to
    /// count as a checkout.
    ///
    /// # Errors
    ///
    /// - [`GitError::NotARepo`] if `path` has no repository metadata
    /// - [`GitError::BareRepo`] if the repository has no working directory
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let repo = git2::Repository::open_ext(
            path,
            git2::RepositoryOpenFlags::NO_SEARCH,
            std::iter::empty::<&OsStr>(),
        )
        .map_err(|_| GitError::NotARepo {
            path: path.to_path_buf(),
        })?;

        if repo.is_bare() {
            return Err(GitError::BareRepo {
                path: path.to_path_buf(),
            });
        }

        Ok(Self { repo })
    }

    /// Initialize a new, empty repository with a working directory at `path`.
    pub fn init(path: &Path) -> Result<Self, GitError> {
        let repo = git2::Repository::init(path)
            .map_err(|e| GitError::from_git2(e, &path.display().to_string()))?;
        Ok(Self { repo })
    }

    /// Path to the `.git` directory.
    pub fn git_dir(&self) -> &Path {
        self.repo.path()
    }

    // =========================================================================
    // Ref Resolution
    // =========================================================================

    /// Get HEAD commit OID.
    ///
    /// # Errors
    ///
    /// - [`GitError::RefNotFound`] if HEAD is unborn or dangling
    pub fn head_oid(&self) -> Result<Oid, GitError> {
        let head = self
            .repo
            .head()
            .map_err(|e| GitError::from_git2(e, "HEAD"))?;

        let oid = head
            .peel_to_commit()
            .map_err(|e| GitError::from_git2(e, "HEAD"))?
            .id();

        Ok(Oid::new(oid.to_string())?)
    }

    /// Get the current branch name, if on a branch.
    ///
    /// Returns `None` if HEAD is detached or unborn.
    pub fn current_branch(&self) -> Result<Option<BranchName>, GitError> {
        let head = match self.repo.head() {
            Ok(h) => h,
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => return Ok(None),
            Err(e) => return Err(GitError::from_git2(e, "HEAD")),
        };

        if head.is_branch() {
            if let Some(name) = head.shorthand() {
                return Ok(BranchName::new(name).ok());
            }
        }

        Ok(None)
    }

    /// Resolve a ref to its commit, returning None if it doesn't exist.
    pub fn try_resolve_ref(&self, refname: &RefName) -> Result<Option<Oid>, GitError> {
        let reference = match self.repo.find_reference(refname.as_str()) {
            Ok(r) => r,
            Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(GitError::from_git2(e, refname.as_str())),
        };

        let oid = reference
            .peel_to_commit()
            .map_err(|e| GitError::from_git2(e, refname.as_str()))?
            .id();

        Ok(Some(Oid::new(oid.to_string())?))
    }

    // =========================================================================
    // Ancestry
    // =========================================================================

    /// Check if `ancestor` is an ancestor of `descendant`.
    ///
    /// Returns true if ancestor == descendant (a commit is its own ancestor).
    pub fn is_ancestor(&self, ancestor: &Oid, descendant: &Oid) -> Result<bool, GitError> {
        if ancestor == descendant {
            return Ok(true);
        }

        let ancestor_oid = Self::to_git2(ancestor)?;
        let descendant_oid = Self::to_git2(descendant)?;

        self.repo
            .graph_descendant_of(descendant_oid, ancestor_oid)
            .map_err(|e| GitError::Internal {
                message: e.message().to_string(),
            })
    }

    // =========================================================================
    // Working Tree Status
    // =========================================================================

    /// Get working tree status summary for tracked files.
    pub fn worktree_status(&self) -> Result<WorktreeStatus, GitError> {
        let mut opts = git2::StatusOptions::new();
        opts.include_untracked(false).include_ignored(false);

        let statuses = self
            .repo
            .statuses(Some(&mut opts))
            .map_err(|e| GitError::Internal {
                message: e.message().to_string(),
            })?;

        let mut result = WorktreeStatus::default();

        for entry in statuses.iter() {
            let status = entry.status();

            if status.is_conflicted() {
                result.has_conflicts = true;
            }

            if status.intersects(
                git2::Status::INDEX_NEW
                    | git2::Status::INDEX_MODIFIED
                    | git2::Status::INDEX_DELETED
                    | git2::Status::INDEX_RENAMED
                    | git2::Status::INDEX_TYPECHANGE,
            ) {
                result.staged += 1;
            }

            if status.intersects(
                git2::Status::WT_MODIFIED
                    | git2::Status::WT_DELETED
                    | git2::Status::WT_RENAMED
                    | git2::Status::WT_TYPECHANGE,
            ) {
                result.unstaged += 1;
            }
        }

        Ok(result)
    }

    // =========================================================================
    // Remotes and Transfer
    // =========================================================================

    /// Get the URL of a remote, if the remote exists.
    pub fn remote_url(&self, name: &str) -> Result<Option<String>, GitError> {
        match self.repo.find_remote(name) {
            Ok(remote) => Ok(remote.url().map(str::to_string)),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(GitError::from_git2(e, name)),
        }
    }

    /// Make remote `name` point at `url`, creating it if needed.
    ///
    /// Returns `true` if the remote was created or its URL changed.
    pub fn ensure_remote(&self, name: &str, url: &str) -> Result<bool, GitError> {
        match self.remote_url(name)? {
            Some(current) if current == url => Ok(false),
            Some(_) => {
                self.repo
                    .remote_set_url(name, url)
                    .map_err(|e| GitError::from_git2(e, name))?;
                Ok(true)
            }
            None => {
                self.repo
                    .remote(name, url)
                    .map_err(|e| GitError::from_git2(e, name))?;
                Ok(true)
            }
        }
    }

    /// Tip of `branch` as advertised by `remote`, without fetching.
    ///
    /// Only connects and reads the ref advertisement: nothing under `.git`
    /// is written. Returns `None` if the remote has no such branch.
    pub fn remote_tip(
        &self,
        remote_name: &str,
        branch: &BranchName,
        cancel: &Cancellation,
    ) -> Result<Option<Oid>, GitError> {
        if cancel.is_cancelled() {
            return Err(GitError::Cancelled);
        }

        let mut remote = self
            .repo
            .find_remote(remote_name)
            .map_err(|e| GitError::from_git2(e, remote_name))?;

        let mut callbacks = git2::RemoteCallbacks::new();
        callbacks.sideband_progress(|_| !cancel.is_cancelled());

        let wanted = RefName::for_branch(branch);
        let connection = remote
            .connect_auth(git2::Direction::Fetch, Some(callbacks), None)
            .map_err(|e| GitError::from_transfer(e, cancel.is_cancelled()))?;
        let tip = connection
            .list()
            .map_err(|e| GitError::from_transfer(e, cancel.is_cancelled()))?
            .iter()
            .find(|head| head.name() == wanted.as_str())
            .map(|head| head.oid());

        match tip {
            Some(oid) => Ok(Some(Oid::new(oid.to_string())?)),
            None => Ok(None),
        }
    }

    /// Fetch `branch` from `remote` into its remote-tracking ref.
    ///
    /// Tags are not followed, and a remote-tracking ref whose branch is gone
    /// upstream is pruned. libgit2 still truncates `FETCH_HEAD` on every
    /// fetch, so callers that must not touch metadata check
    /// [`Git::remote_tip`] first. The transfer aborts as soon as `cancel`
    /// fires.
    ///
    /// Returns the remote-tracking tip, or `None` if the remote has no such
    /// branch.
    pub fn fetch_branch(
        &self,
        remote_name: &str,
        branch: &BranchName,
        cancel: &Cancellation,
    ) -> Result<Option<Oid>, GitError> {
        if cancel.is_cancelled() {
            return Err(GitError::Cancelled);
        }

        let mut remote = self
            .repo
            .find_remote(remote_name)
            .map_err(|e| GitError::from_git2(e, remote_name))?;

        let mut callbacks = git2::RemoteCallbacks::new();
        callbacks.transfer_progress(|stats| {
            if cancel.is_cancelled() {
                return false;
            }
            if stats.total_objects() > 0 && stats.received_objects() == stats.total_objects() {
                debug!(
                    indexed_deltas = stats.indexed_deltas(),
                    total_deltas = stats.total_deltas(),
                    "resolving deltas"
                );
            }
            true
        });
        callbacks.sideband_progress(|_| !cancel.is_cancelled());

        let mut fetch_options = git2::FetchOptions::new();
        fetch_options
            .remote_callbacks(callbacks)
            .update_fetchhead(false)
            .prune(git2::FetchPrune::On)
            .download_tags(git2::AutotagOption::None);

        let refspec = RefName::fetch_refspec(remote_name, branch);
        remote
            .fetch(&[refspec.as_str()], Some(&mut fetch_options), None)
            .map_err(|e| GitError::from_transfer(e, cancel.is_cancelled()))?;

        self.try_resolve_ref(&RefName::for_remote_branch(remote_name, branch))
    }

    // =========================================================================
    // Branch and Working Tree Mutation
    // =========================================================================

    /// Create local `branch` at `at`, tracking `<remote>/<branch>`.
    pub fn create_tracking_branch(
        &self,
        remote_name: &str,
        branch: &BranchName,
        at: &Oid,
    ) -> Result<(), GitError> {
        let commit = self
            .repo
            .find_commit(Self::to_git2(at)?)
            .map_err(|e| GitError::from_git2(e, at.as_str()))?;

        let mut local = self
            .repo
            .branch(branch.as_str(), &commit, true)
            .map_err(|e| GitError::from_git2(e, branch.as_str()))?;

        local
            .set_upstream(Some(&format!("{}/{}", remote_name, branch)))
            .map_err(|e| GitError::from_git2(e, branch.as_str()))?;

        Ok(())
    }

    /// Point HEAD at `branch` and force the working tree to match it.
    ///
    /// Only used on freshly initialized checkouts, where there is nothing
    /// local to overwrite.
    pub fn checkout_branch(&self, branch: &BranchName) -> Result<(), GitError> {
        let refname = RefName::for_branch(branch);
        self.repo
            .set_head(refname.as_str())
            .map_err(|e| GitError::from_git2(e, refname.as_str()))?;
        self.force_checkout_head()
    }

    /// Force the index and working tree to match HEAD.
    pub fn force_checkout_head(&self) -> Result<(), GitError> {
        let mut builder = git2::build::CheckoutBuilder::new();
        builder.force();
        self.repo
            .checkout_head(Some(&mut builder))
            .map_err(|e| GitError::Checkout {
                message: e.message().to_string(),
            })
    }

    /// Fast-forward `branch` (the checked-out branch) to `target`.
    ///
    /// The working tree is updated with a safe checkout first, then the
    /// branch ref is moved. Callers must have verified that `target`
    /// descends from the current tip and that the tree is clean.
    pub fn fast_forward(&self, branch: &BranchName, target: &Oid) -> Result<(), GitError> {
        let target_oid = Self::to_git2(target)?;
        let commit = self
            .repo
            .find_commit(target_oid)
            .map_err(|e| GitError::from_git2(e, target.as_str()))?;

        let mut builder = git2::build::CheckoutBuilder::new();
        builder.safe();
        self.repo
            .checkout_tree(commit.as_object(), Some(&mut builder))
            .map_err(|e| GitError::Checkout {
                message: e.message().to_string(),
            })?;

        let refname = RefName::for_branch(branch);
        let mut reference = self
            .repo
            .find_reference(refname.as_str())
            .map_err(|e| GitError::from_git2(e, refname.as_str()))?;
        reference
            .set_target(target_oid, &format!("reposync: fast-forward to {}", target))
            .map_err(|e| GitError::from_git2(e, refname.as_str()))?;

        Ok(())
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn to_git2(oid: &Oid) -> Result<git2::Oid, GitError> {
        git2::Oid::from_str(oid.as_str()).map_err(|e| GitError::from_git2(e, oid.as_str()))
    }
}
