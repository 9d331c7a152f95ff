//! core::ops::marker
//!
//! In-progress marker for checkout mutations.
//!
//! # Crash Safety Contract
//!
//! A `.git` directory alone does not prove a checkout is complete: a clone
//! killed mid-transfer leaves one behind. The marker closes that gap.
//!
//! 1. The marker is written (temp file, fsync, rename) **before** the first
//!    mutation of the checkout.
//! 2. It is removed only **after** the mutation has fully completed.
//! 3. Therefore, whenever a marker is found on startup, the last mutation
//!    did not complete, and its recorded [`Operation`] says how to recover:
//!    an interrupted clone is corrupted, an interrupted fast-forward needs
//!    its working tree repaired.
//!
//! # Storage
//!
//! - `<parent>/.<dir>.sync.json` - JSON document, one per checkout
//!
//! # Example
//!
//! ```no_run
//! use reposync::core::ops::marker::{Operation, SyncMarker};
//! use reposync::core::paths::CheckoutPaths;
//! use reposync::core::types::RepoName;
//!
//! let paths = CheckoutPaths::new("/workspace/app");
//! let marker = SyncMarker::new(RepoName::new("app")?, Operation::Clone, None);
//! marker.write(&paths)?;
//!
//! // ... clone ...
//!
//! SyncMarker::remove(&paths)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::core::paths::CheckoutPaths;
use crate::core::types::{Oid, RepoName, UtcTimestamp};

/// Errors from marker operations.
#[derive(Debug, Error)]
pub enum MarkerError {
    #[error("marker i/o error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("marker at {} is unreadable: {message}", path.display())]
    Malformed { path: PathBuf, message: String },
}

/// The mutation a marker guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Full clone into an absent (or cleared) directory.
    Clone,
    /// Fast-forward of an existing checkout's branch and working tree.
    FastForward,
}

/// Durable record of an in-flight checkout mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMarker {
    /// Unique id of the operation, for correlating logs.
    pub op_id: Uuid,
    /// Which mutation was in flight.
    pub operation: Operation,
    /// Repository the checkout belongs to.
    pub name: RepoName,
    /// When the mutation started.
    pub started_at: UtcTimestamp,
    /// Target commit, when known up front (fast-forward).
    pub target: Option<Oid>,
}

impl SyncMarker {
    /// Create a marker for a new operation.
    pub fn new(name: RepoName, operation: Operation, target: Option<Oid>) -> Self {
        Self {
            op_id: Uuid::new_v4(),
            operation,
            name,
            started_at: UtcTimestamp::now(),
            target,
        }
    }

    /// Write the marker durably.
    ///
    /// Written to a temporary sibling, fsynced, then renamed into place, so
    /// a reader never observes a half-written marker.
    pub fn write(&self, paths: &CheckoutPaths) -> Result<(), MarkerError> {
        let path = paths.marker_path();
        let io_err = |source| MarkerError::Io {
            path: path.clone(),
            source,
        };

        fs::create_dir_all(paths.parent()).map_err(io_err)?;

        let content = serde_json::to_string_pretty(self).map_err(|e| MarkerError::Malformed {
            path: path.clone(),
            message: e.to_string(),
        })?;

        let temp_path = path.with_extension("json.tmp");
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(io_err)?;
        file.write_all(content.as_bytes()).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;

        fs::rename(&temp_path, &path).map_err(io_err)?;
        Ok(())
    }

    /// Read the marker, if one exists.
    ///
    /// # Errors
    ///
    /// [`MarkerError::Malformed`] if the file exists but does not parse.
    /// Callers treat that as an interrupted clone.
    pub fn read(paths: &CheckoutPaths) -> Result<Option<Self>, MarkerError> {
        let path = paths.marker_path();
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(MarkerError::Io { path, source }),
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| MarkerError::Malformed {
                path,
                message: e.to_string(),
            })
    }

    /// Remove the marker. Removing a missing marker is not an error.
    pub fn remove(paths: &CheckoutPaths) -> Result<(), MarkerError> {
        let path = paths.marker_path();
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(MarkerError::Io { path, source }),
        }
    }

    /// Check if a marker exists.
    pub fn exists(paths: &CheckoutPaths) -> bool {
        paths.marker_path().exists()
    }
}
