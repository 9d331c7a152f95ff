//! sync::cancel
//!
//! Cooperative cancellation for in-flight syncs.
//!
//! A [`Cancellation`] is a shared flag plus an optional deadline. It is
//! polled (never waited on) at every suspension point of a sync: before the
//! lock, while polling the lock, during backoff sleeps, and from inside git
//! transfer-progress callbacks, where returning `false` aborts the transfer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Granularity of cancellable sleeps.
const SLEEP_SLICE: Duration = Duration::from_millis(25);

/// Returned by [`Cancellation::sleep`] when the sleep was cut short.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

/// Cancellation handle shared between a driver and its syncs.
///
/// Clones share the same flag. [`Cancellation::with_timeout`] derives a
/// handle that shares the flag but adds (or tightens) a deadline, so a
/// per-sync timeout never outlives a run-wide cancel.
///
/// # Example
///
/// ```
/// use reposync::sync::Cancellation;
/// use std::time::Duration;
///
/// let run = Cancellation::new();
/// let per_sync = run.with_timeout(Duration::from_secs(600));
/// assert!(!per_sync.is_cancelled());
///
/// run.cancel();
/// assert!(per_sync.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl Cancellation {
    /// Create a handle that is not cancelled and has no deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive a handle sharing this flag, with a deadline `timeout` from now.
    ///
    /// An existing earlier deadline is kept.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now().checked_add(timeout);
        let deadline = match (self.deadline, candidate) {
            (Some(existing), Some(new)) => Some(existing.min(new)),
            (existing, new) => existing.or(new),
        };
        Self {
            flag: Arc::clone(&self.flag),
            deadline,
        }
    }

    /// Request cancellation for every handle sharing this flag.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// True once cancelled or past the deadline.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
            || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// True only when the shared flag was set (not merely a deadline).
    pub fn was_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Sleep for `duration` in short slices, returning early on cancellation.
    pub fn sleep(&self, duration: Duration) -> Result<(), Cancelled> {
        let until = Instant::now() + duration;
        loop {
            if self.is_cancelled() {
                return Err(Cancelled);
            }
            let now = Instant::now();
            if now >= until {
                return Ok(());
            }
            std::thread::sleep(SLEEP_SLICE.min(until - now));
        }
    }
}
