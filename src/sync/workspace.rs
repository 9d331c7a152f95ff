//! sync::workspace
//!
//! Classifying and clearing a checkout directory.
//!
//! # Classification
//!
//! | on disk | state |
//! |---|---|
//! | missing, or an empty directory | [`WorkspaceState::Absent`] |
//! | clone marker present, or marker unreadable | [`WorkspaceState::Corrupted`] |
//! | metadata does not open, or HEAD does not resolve | [`WorkspaceState::Corrupted`] |
//! | opens with a resolvable HEAD | [`WorkspaceState::Valid`] |
//!
//! A fast-forward marker does not make a checkout corrupted: its branch ref
//! is either still at the old tip or already at the new one, and a forced
//! checkout of HEAD brings the working tree back in line.

use std::fs;
use std::io;
use std::path::Path;

use crate::core::ops::{MarkerError, Operation, SyncMarker};
use crate::core::paths::CheckoutPaths;
use crate::core::types::{BranchName, Oid};
use crate::git::Git;

/// What a checkout directory currently holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkspaceState {
    /// Nothing to keep: missing or empty.
    Absent,
    /// A usable checkout.
    Valid {
        /// Resolved HEAD commit
        head: Oid,
        /// Checked-out branch, `None` when HEAD is detached
        branch: Option<BranchName>,
        /// A fast-forward was interrupted and the working tree needs repair
        interrupted: bool,
    },
    /// Partial or damaged; must be removed before cloning.
    Corrupted {
        /// Why the checkout cannot be used
        reason: String,
    },
}

impl WorkspaceState {
    /// Short label for logs and status output.
    pub fn label(&self) -> &'static str {
        match self {
            WorkspaceState::Absent => "absent",
            WorkspaceState::Valid { .. } => "valid",
            WorkspaceState::Corrupted { .. } => "corrupted",
        }
    }
}

/// Classify the checkout at `paths`.
///
/// Read-only. Callers that go on to mutate must hold the checkout lock.
pub fn inspect(paths: &CheckoutPaths) -> io::Result<WorkspaceState> {
    let dir = paths.checkout();

    let meta = match fs::symlink_metadata(dir) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(WorkspaceState::Absent),
        Err(e) => return Err(e),
    };

    if !meta.is_dir() {
        return Ok(WorkspaceState::Corrupted {
            reason: "checkout path exists but is not a directory".into(),
        });
    }

    if is_empty_dir(dir)? {
        return Ok(WorkspaceState::Absent);
    }

    let interrupted = match SyncMarker::read(paths) {
        Ok(None) => false,
        Ok(Some(marker)) => match marker.operation {
            Operation::FastForward => true,
            Operation::Clone => {
                return Ok(WorkspaceState::Corrupted {
                    reason: format!(
                        "clone {} started at {} did not complete",
                        marker.op_id, marker.started_at
                    ),
                })
            }
        },
        Err(MarkerError::Malformed { message, .. }) => {
            return Ok(WorkspaceState::Corrupted {
                reason: format!("unreadable sync marker: {message}"),
            })
        }
        Err(MarkerError::Io { source, .. }) => return Err(source),
    };

    let git = match Git::open(dir) {
        Ok(git) => git,
        Err(e) => {
            return Ok(WorkspaceState::Corrupted {
                reason: e.to_string(),
            })
        }
    };

    let head = match git.head_oid() {
        Ok(head) => head,
        Err(e) => {
            return Ok(WorkspaceState::Corrupted {
                reason: format!("HEAD does not resolve: {e}"),
            })
        }
    };

    Ok(WorkspaceState::Valid {
        head,
        branch: git.current_branch().ok().flatten(),
        interrupted,
    })
}

/// Remove everything at `dir`.
///
/// The directory itself is removed when possible. When it cannot be (a
/// volume mount point), its contents are removed and the empty directory
/// stays, which still classifies as absent.
pub fn clear_checkout(dir: &Path) -> io::Result<()> {
    let meta = match fs::symlink_metadata(dir) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };

    if !meta.is_dir() {
        return fs::remove_file(dir);
    }

    if fs::remove_dir_all(dir).is_ok() {
        return Ok(());
    }

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

fn is_empty_dir(dir: &Path) -> io::Result<bool> {
    Ok(fs::read_dir(dir)?.next().is_none())
}
