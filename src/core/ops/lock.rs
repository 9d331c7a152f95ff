//! core::ops::lock
//!
//! Exclusive per-checkout lock.
//!
//! # Architecture
//!
//! The checkout lock ensures only one reposync process (or thread) can
//! mutate a given checkout at a time. The safety boundary spans process
//! restarts and pod recreation, so this is an OS-level advisory lock on a
//! file rather than an in-memory mutex.
//!
//! The lock is **checkout-scoped**, not workspace-scoped: different
//! repositories under the same workspace root never contend.
//!
//! # Storage
//!
//! - `<parent>/.<dir>.lock` - Lock file with OS-level exclusive lock
//!
//! # Invariants
//!
//! - Lock must be held for every inspection and mutation of the checkout
//! - Lock is automatically released on drop (RAII pattern)
//! - Waiting is bounded: [`CheckoutLock::acquire_within`] gives up after the
//!   configured timeout instead of blocking indefinitely
//! - The lock file itself is never deleted (deleting it would let two
//!   processes lock two different inodes)
//!
//! # Example
//!
//! ```no_run
//! use reposync::core::ops::lock::CheckoutLock;
//! use reposync::core::paths::CheckoutPaths;
//! use reposync::sync::Cancellation;
//! use std::time::Duration;
//!
//! let paths = CheckoutPaths::new("/workspace/app");
//! let lock = CheckoutLock::acquire_within(
//!     &paths,
//!     Duration::from_secs(30),
//!     Duration::from_millis(50),
//!     &Cancellation::new(),
//! )?;
//!
//! // Inspect and mutate the checkout while holding the lock
//! // ...
//!
//! drop(lock);
//! # Ok::<(), reposync::core::ops::lock::LockError>(())
//! ```

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;
use thiserror::Error;

use crate::core::paths::CheckoutPaths;
use crate::sync::Cancellation;

/// Errors from locking operations.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another process already holds the lock.
    #[error("checkout is locked by another reposync process")]
    AlreadyLocked,

    /// The lock stayed held for longer than the allowed wait.
    #[error("lock {} still held after waiting {} ms", path.display(), waited.as_millis())]
    TimedOut {
        /// The contended lock file
        path: PathBuf,
        /// How long we waited
        waited: Duration,
    },

    /// Cancellation was requested while waiting.
    #[error("cancelled while waiting for lock")]
    Cancelled,

    /// Failed to create lock file or directory.
    #[error("failed to create lock: {0}")]
    CreateFailed(String),

    /// Failed to acquire the OS lock.
    #[error("failed to acquire lock: {0}")]
    AcquireFailed(String),

    /// Failed to release the lock.
    #[error("failed to release lock: {0}")]
    ReleaseFailed(String),
}

/// An exclusive lock on one checkout.
///
/// The lock is automatically released when this guard is dropped (RAII pattern).
/// This ensures the lock is always released, even if the sync fails or panics.
#[derive(Debug)]
pub struct CheckoutLock {
    /// Path to the lock file.
    path: PathBuf,
    /// The open file handle with the lock held.
    /// When this is Some, we hold the lock.
    file: Option<File>,
}

impl CheckoutLock {
    /// Attempt to acquire the checkout lock without waiting.
    ///
    /// This uses OS-level file locking via `fs2`, which works across
    /// processes. If another holder exists, this returns
    /// `LockError::AlreadyLocked` immediately.
    ///
    /// # Errors
    ///
    /// - [`LockError::AlreadyLocked`] if another holder has the lock
    /// - [`LockError::CreateFailed`] if the lock file cannot be created
    /// - [`LockError::AcquireFailed`] if the OS lock cannot be acquired
    pub fn acquire(paths: &CheckoutPaths) -> Result<Self, LockError> {
        let parent = paths.parent();
        fs::create_dir_all(parent).map_err(|e| {
            LockError::CreateFailed(format!("cannot create {}: {}", parent.display(), e))
        })?;

        let path = paths.lock_path();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| {
                LockError::CreateFailed(format!("cannot open {}: {}", path.display(), e))
            })?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Self {
                path,
                file: Some(file),
            }),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                Err(LockError::AlreadyLocked)
            }
            Err(e) => Err(LockError::AcquireFailed(e.to_string())),
        }
    }

    /// Acquire the lock, polling until `timeout` elapses.
    ///
    /// Cancellation is observed between polls.
    ///
    /// # Errors
    ///
    /// - [`LockError::TimedOut`] if the lock is still held after `timeout`
    /// - [`LockError::Cancelled`] if `cancel` fires while waiting
    /// - any error from [`CheckoutLock::acquire`] other than `AlreadyLocked`
    pub fn acquire_within(
        paths: &CheckoutPaths,
        timeout: Duration,
        poll_interval: Duration,
        cancel: &Cancellation,
    ) -> Result<Self, LockError> {
        let started = Instant::now();
        loop {
            if cancel.is_cancelled() {
                return Err(LockError::Cancelled);
            }

            match Self::acquire(paths) {
                Ok(lock) => return Ok(lock),
                Err(LockError::AlreadyLocked) => {}
                Err(e) => return Err(e),
            }

            let waited = started.elapsed();
            if waited >= timeout {
                return Err(LockError::TimedOut {
                    path: paths.lock_path(),
                    waited,
                });
            }

            let nap = poll_interval.min(timeout - waited);
            if cancel.sleep(nap).is_err() {
                return Err(LockError::Cancelled);
            }
        }
    }

    /// Try to acquire the lock, returning None if already held.
    pub fn try_acquire(paths: &CheckoutPaths) -> Result<Option<Self>, LockError> {
        match Self::acquire(paths) {
            Ok(lock) => Ok(Some(lock)),
            Err(LockError::AlreadyLocked) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Report whether someone else currently holds the lock.
    ///
    /// Read-only callers (`status`) use this; it briefly takes and drops the
    /// lock when it is free. Returns `false` when no lock file exists yet.
    pub fn is_locked(paths: &CheckoutPaths) -> Result<bool, LockError> {
        if !paths.lock_path().exists() {
            return Ok(false);
        }
        Ok(Self::try_acquire(paths)?.is_none())
    }

    /// Check if the lock is currently held.
    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    /// Get the path to the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock explicitly.
    ///
    /// This is called automatically on drop.
    pub fn release(&mut self) -> Result<(), LockError> {
        if let Some(file) = self.file.take() {
            file.unlock()
                .map_err(|e| LockError::ReleaseFailed(e.to_string()))?;
        }
        Ok(())
    }
}

impl Drop for CheckoutLock {
    fn drop(&mut self) {
        // Best-effort release on drop - ignore errors since we're dropping
        if let Some(file) = self.file.take() {
            let _ = file.unlock();
        }
    }
}
