//! sync::syncer
//!
//! The clone-or-pull routine.
//!
//! # Algorithm
//!
//! 1. Take the checkout lock (bounded wait, cancellable).
//! 2. Classify the directory ([`crate::sync::workspace::inspect`]).
//! 3. Absent: clone. Corrupted: clear, then clone once. Valid: fetch and
//!    fast-forward, refusing anything that is not a fast-forward.
//!
//! Every mutation of the checkout is bracketed by a [`SyncMarker`], so a run
//! killed at any point leaves a state the next run can classify.

use std::fs;
use std::time::{Duration, Instant};

use tracing::{debug, info, info_span, warn};

use crate::core::ops::{CheckoutLock, Operation, SyncMarker};
use crate::core::paths::CheckoutPaths;
use crate::core::types::Oid;
use crate::git::{Git, GitError};
use crate::sync::cancel::Cancellation;
use crate::sync::result::{ErrorKind, Outcome, SyncError, SyncResult};
use crate::sync::retry::RetryPolicy;
use crate::sync::spec::RepositorySpec;
use crate::sync::workspace::{self, WorkspaceState};

/// Name of the remote every checkout fetches from.
pub const ORIGIN: &str = "origin";

/// Default bounded wait for the checkout lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(30);

/// Default lock polling interval.
pub const DEFAULT_LOCK_POLL: Duration = Duration::from_millis(50);

/// Tunables for a [`RepositorySyncer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    pub retry: RetryPolicy,
    pub lock_timeout: Duration,
    pub lock_poll_interval: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            lock_poll_interval: DEFAULT_LOCK_POLL,
        }
    }
}

/// Keeps one checkout in line with one remote branch.
///
/// Stateless between calls; all state lives on disk. Safe to share across
/// threads and to call concurrently on the same spec.
///
/// # Example
///
/// ```no_run
/// use reposync::core::paths::WorkspacePaths;
/// use reposync::sync::{Cancellation, RepositoryEntry, RepositorySyncer, SyncOptions};
///
/// let spec = RepositoryEntry {
///     name: "assisted-service".into(),
///     remote_url: "https://github.com/openshift/assisted-service.git".into(),
///     branch: "master".into(),
///     path: None,
/// }
/// .resolve(&WorkspacePaths::new("/workspace"))?;
///
/// let syncer = RepositorySyncer::new(SyncOptions::default());
/// let result = syncer.sync(&spec, &Cancellation::new());
/// println!("{} -> {}", result.name, result.outcome);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct RepositorySyncer {
    options: SyncOptions,
}

impl RepositorySyncer {
    pub fn new(options: SyncOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Bring `spec.local_path` in line with `spec.branch` on `spec.remote_url`.
    ///
    /// Never fails: errors are reported in the returned result, which is
    /// also emitted as a tracing event.
    pub fn sync(&self, spec: &RepositorySpec, cancel: &Cancellation) -> SyncResult {
        let started = Instant::now();
        let span = info_span!("sync", repo = %spec.name, branch = %spec.branch);
        let _entered = span.enter();

        let result = match self.run(spec, cancel) {
            Ok((outcome, head)) => {
                SyncResult::succeeded(spec.name.as_str(), outcome, head, started.elapsed())
            }
            Err(e) => SyncResult::failed(spec.name.as_str(), &e, started.elapsed()),
        };
        result.emit();
        result
    }

    fn run(
        &self,
        spec: &RepositorySpec,
        cancel: &Cancellation,
    ) -> Result<(Outcome, Oid), SyncError> {
        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        let paths = spec.paths();
        fs::create_dir_all(paths.parent())
            .map_err(|e| SyncError::filesystem(paths.parent(), e))?;

        let _lock = CheckoutLock::acquire_within(
            &paths,
            self.options.lock_timeout,
            self.options.lock_poll_interval,
            cancel,
        )?;
        debug!(lock = %paths.lock_path().display(), "lock acquired");

        let state = workspace::inspect(&paths)
            .map_err(|e| SyncError::filesystem(paths.checkout(), e))?;
        debug!(state = state.label(), "inspected checkout");

        match state {
            WorkspaceState::Absent => {
                let head = self.clone_fresh(spec, &paths, cancel)?;
                Ok((Outcome::Cloned, head))
            }
            WorkspaceState::Corrupted { reason } => {
                warn!(%reason, "checkout is corrupted, recloning");
                workspace::clear_checkout(paths.checkout())
                    .map_err(|e| SyncError::CorruptWorkspace {
                        path: paths.checkout().to_path_buf(),
                        message: format!("{reason}; cannot remove it: {e}"),
                    })?;
                match self.clone_fresh(spec, &paths, cancel) {
                    Ok(head) => Ok((Outcome::Cloned, head)),
                    Err(e) if e.kind() == ErrorKind::Cancelled => Err(e),
                    Err(e) => Err(SyncError::CorruptWorkspace {
                        path: paths.checkout().to_path_buf(),
                        message: format!("{reason}; reclone failed: {e}"),
                    }),
                }
            }
            WorkspaceState::Valid { interrupted, .. } => {
                self.update(spec, &paths, interrupted, cancel)
            }
        }
    }

    /// Clone into an absent checkout, bracketed by a clone marker.
    ///
    /// A cancelled clone keeps its marker and partial directory. Any other
    /// failure removes both, returning the checkout to absent.
    fn clone_fresh(
        &self,
        spec: &RepositorySpec,
        paths: &CheckoutPaths,
        cancel: &Cancellation,
    ) -> Result<Oid, SyncError> {
        let marker = SyncMarker::new(spec.name.clone(), Operation::Clone, None);
        marker.write(paths)?;
        info!(op_id = %marker.op_id, url = %spec.remote_url, "cloning");

        match self.clone_into(spec, paths, cancel) {
            Ok(head) => {
                SyncMarker::remove(paths)?;
                Ok(head)
            }
            Err(e) if e.kind() == ErrorKind::Cancelled => {
                debug!("clone cancelled, leaving marker for the next run");
                Err(e)
            }
            Err(e) => {
                match workspace::clear_checkout(paths.checkout()) {
                    Ok(()) => SyncMarker::remove(paths)?,
                    Err(clear_err) => {
                        warn!(error = %clear_err, "could not remove failed clone");
                    }
                }
                Err(e)
            }
        }
    }

    fn clone_into(
        &self,
        spec: &RepositorySpec,
        paths: &CheckoutPaths,
        cancel: &Cancellation,
    ) -> Result<Oid, SyncError> {
        let dir = paths.checkout();

        let (git, tip) = self.options.retry.run("clone", cancel, |attempt| {
            workspace::clear_checkout(dir).map_err(|e| GitError::Internal {
                message: format!("cannot clear {}: {}", dir.display(), e),
            })?;
            debug!(attempt, "fetching into fresh repository");
            let git = Git::init(dir)?;
            git.ensure_remote(ORIGIN, spec.remote_url.as_str())?;
            let tip = git.fetch_branch(ORIGIN, &spec.branch, cancel)?;
            Ok((git, tip))
        })?;

        let tip = tip.ok_or_else(|| missing_branch(spec))?;
        git.create_tracking_branch(ORIGIN, &spec.branch, &tip)?;
        git.checkout_branch(&spec.branch)?;
        Ok(tip)
    }

    /// Fetch and fast-forward an existing checkout.
    fn update(
        &self,
        spec: &RepositorySpec,
        paths: &CheckoutPaths,
        interrupted: bool,
        cancel: &Cancellation,
    ) -> Result<(Outcome, Oid), SyncError> {
        let git = Git::open(paths.checkout())?;

        if interrupted {
            warn!("repairing working tree after an interrupted fast-forward");
            git.force_checkout_head()?;
            SyncMarker::remove(paths)?;
        }

        let diverged = |message: String| SyncError::DivergedHistory {
            branch: spec.branch.to_string(),
            message,
        };

        match git.current_branch()? {
            Some(current) if current == spec.branch => {}
            Some(other) => {
                return Err(diverged(format!("checkout is on branch '{other}'")));
            }
            None => return Err(diverged("checkout has a detached HEAD".into())),
        }

        if git.ensure_remote(ORIGIN, spec.remote_url.as_str())? {
            warn!(url = %spec.remote_url, "origin remote pointed elsewhere, updated");
        }

        // Any fetch rewrites FETCH_HEAD; the no-op path must not fetch.
        let local = git.head_oid()?;
        let advertised = self
            .options
            .retry
            .run("ls-remote", cancel, |_| git.remote_tip(ORIGIN, &spec.branch, cancel))?
            .ok_or_else(|| missing_branch(spec))?;

        if local == advertised {
            return Ok((Outcome::UpToDate, local));
        }

        let remote = self
            .options
            .retry
            .run("fetch", cancel, |_| git.fetch_branch(ORIGIN, &spec.branch, cancel))?
            .ok_or_else(|| missing_branch(spec))?;

        if local == remote {
            return Ok((Outcome::UpToDate, local));
        }

        if !git.is_ancestor(&local, &remote)? {
            let message = if git.is_ancestor(&remote, &local)? {
                format!(
                    "local branch is ahead of the remote ({} vs {})",
                    local.short(7),
                    remote.short(7)
                )
            } else {
                format!(
                    "local {} and remote {} do not share a fast-forward path",
                    local.short(7),
                    remote.short(7)
                )
            };
            return Err(diverged(message));
        }

        let status = git.worktree_status()?;
        if !status.is_clean() {
            return Err(diverged(format!(
                "working tree has {} staged and {} unstaged change(s)",
                status.staged, status.unstaged
            )));
        }

        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        let marker =
            SyncMarker::new(spec.name.clone(), Operation::FastForward, Some(remote.clone()));
        marker.write(paths)?;
        info!(
            op_id = %marker.op_id,
            from = %local.short(7),
            to = %remote.short(7),
            "fast-forwarding"
        );

        if let Err(e) = git.fast_forward(&spec.branch, &remote) {
            if git.force_checkout_head().is_ok() {
                SyncMarker::remove(paths)?;
            }
            return Err(e.into());
        }

        SyncMarker::remove(paths)?;
        Ok((Outcome::Pulled, remote))
    }
}

fn missing_branch(spec: &RepositorySpec) -> SyncError {
    SyncError::InvalidSpec(format!(
        "branch '{}' does not exist on {}",
        spec.branch, spec.remote_url
    ))
}
