//! sync::result
//!
//! Outcomes, the error taxonomy, and the per-sync observability record.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Serialize, Serializer};
use thiserror::Error;
use tracing::{info, warn};

use crate::core::ops::{LockError, MarkerError};
use crate::core::types::Oid;
use crate::git::GitError;
use crate::sync::retry::RetryError;

/// How a sync ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Outcome {
    Cloned,
    Pulled,
    UpToDate,
    Failed,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Outcome::Cloned => "cloned",
            Outcome::Pulled => "pulled",
            Outcome::UpToDate => "upToDate",
            Outcome::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Failure categories surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    /// Transfer failed after bounded retries.
    NetworkUnavailable,
    /// Partial checkout could not be replaced by a clean clone.
    CorruptWorkspace,
    /// Local commits, local changes, wrong branch, or an upstream rewrite.
    DivergedHistory,
    /// Lock not acquired within the configured wait.
    LockContention,
    /// Malformed spec, or the branch does not exist upstream.
    InvalidSpec,
    /// Cancellation or deadline observed.
    Cancelled,
    /// Local filesystem or repository failure.
    Io,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// Errors from a single sync.
///
/// Never escapes [`crate::sync::RepositorySyncer::sync`]; it is folded into
/// the [`SyncResult`] via [`SyncError::kind`].
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("invalid repository spec: {0}")]
    InvalidSpec(String),

    #[error("network unavailable after {attempts} attempt(s): {message}")]
    NetworkUnavailable { attempts: u32, message: String },

    #[error("corrupt workspace at {}: {message}", path.display())]
    CorruptWorkspace { path: PathBuf, message: String },

    #[error("history diverged on '{branch}': {message}")]
    DivergedHistory { branch: String, message: String },

    #[error("lock {} still held after {} ms", path.display(), waited.as_millis())]
    LockContention { path: PathBuf, waited: Duration },

    #[error("sync cancelled")]
    Cancelled,

    #[error("filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Marker(#[from] MarkerError),

    #[error(transparent)]
    Lock(LockError),
}

impl SyncError {
    /// Map onto the caller-facing taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::InvalidSpec(_) => ErrorKind::InvalidSpec,
            SyncError::NetworkUnavailable { .. } => ErrorKind::NetworkUnavailable,
            SyncError::CorruptWorkspace { .. } => ErrorKind::CorruptWorkspace,
            SyncError::DivergedHistory { .. } => ErrorKind::DivergedHistory,
            SyncError::LockContention { .. } => ErrorKind::LockContention,
            SyncError::Cancelled | SyncError::Git(GitError::Cancelled) => ErrorKind::Cancelled,
            SyncError::Git(GitError::Transfer { .. }) => ErrorKind::NetworkUnavailable,
            SyncError::Filesystem { .. }
            | SyncError::Git(_)
            | SyncError::Marker(_)
            | SyncError::Lock(_) => ErrorKind::Io,
        }
    }

    pub(crate) fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SyncError::Filesystem {
            path: path.into(),
            source,
        }
    }
}

impl From<LockError> for SyncError {
    fn from(err: LockError) -> Self {
        match err {
            LockError::TimedOut { path, waited } => SyncError::LockContention { path, waited },
            LockError::Cancelled => SyncError::Cancelled,
            other => SyncError::Lock(other),
        }
    }
}

impl From<RetryError> for SyncError {
    fn from(err: RetryError) -> Self {
        match err {
            RetryError::Cancelled => SyncError::Cancelled,
            RetryError::Exhausted {
                attempts,
                last: GitError::Transfer { message, .. },
            } => SyncError::NetworkUnavailable { attempts, message },
            RetryError::Exhausted { last, .. } => SyncError::Git(last),
        }
    }
}

/// Error details carried by a failed [`SyncResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncFailure {
    pub kind: ErrorKind,
    pub message: String,
}

/// Observability record for one sync.
#[derive(Debug, Clone, Serialize)]
pub struct SyncResult {
    pub name: String,
    pub outcome: Outcome,
    pub head_commit: Option<Oid>,
    pub error: Option<SyncFailure>,
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
}

impl SyncResult {
    /// A successful sync that left the checkout at `head`.
    pub fn succeeded(
        name: impl Into<String>,
        outcome: Outcome,
        head: Oid,
        duration: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            outcome,
            head_commit: Some(head),
            error: None,
            duration,
        }
    }

    /// A failed sync.
    pub fn failed(name: impl Into<String>, error: &SyncError, duration: Duration) -> Self {
        Self::failed_with(name, error.kind(), error.to_string(), duration)
    }

    /// A failed sync with an explicit kind and message.
    pub fn failed_with(
        name: impl Into<String>,
        kind: ErrorKind,
        message: impl Into<String>,
        duration: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            outcome: Outcome::Failed,
            head_commit: None,
            error: Some(SyncFailure {
                kind,
                message: message.into(),
            }),
            duration,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome != Outcome::Failed
    }

    /// The failure kind, if any.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }

    /// Emit the structured event for this result.
    pub fn emit(&self) {
        let duration_ms = self.duration.as_millis() as u64;
        match (&self.head_commit, &self.error) {
            (_, Some(failure)) => warn!(
                name = %self.name,
                outcome = %self.outcome,
                error_kind = %failure.kind,
                error = %failure.message,
                duration_ms,
                "sync failed"
            ),
            (Some(head), None) => info!(
                name = %self.name,
                outcome = %self.outcome,
                head_commit = %head,
                duration_ms,
                "sync finished"
            ),
            (None, None) => info!(
                name = %self.name,
                outcome = %self.outcome,
                duration_ms,
                "sync finished"
            ),
        }
    }
}

fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}
