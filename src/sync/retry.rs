//! sync::retry
//!
//! Bounded exponential backoff for network transfers.
//!
//! The policy is a pure function from attempt number to wait duration, so
//! it can be tested without real delays. The loop that applies it lives in
//! [`RetryPolicy::run`] and sleeps through [`Cancellation::sleep`].

use std::time::Duration;

use tracing::{debug, warn};

use crate::git::GitError;
use crate::sync::cancel::Cancellation;

/// Default number of transfer attempts.
pub const DEFAULT_ATTEMPTS: u32 = 3;

/// Default delay before the first retry.
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(500);

/// Upper bound for any single backoff delay.
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// How a retried operation finally failed.
#[derive(Debug)]
pub enum RetryError {
    /// Every attempt failed, or a non-retryable error ended the loop early.
    Exhausted {
        /// Attempts actually made
        attempts: u32,
        /// The error from the last attempt
        last: GitError,
    },
    /// Cancellation was observed before or between attempts.
    Cancelled,
}

/// Retry/backoff policy.
///
/// # Example
///
/// ```
/// use reposync::sync::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::new(3, Duration::from_millis(500));
/// assert_eq!(policy.delay_after(1), Duration::from_millis(500));
/// assert_eq!(policy.delay_after(2), Duration::from_millis(1000));
/// assert!(policy.should_retry(2));
/// assert!(!policy.should_retry(3));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base: Duration,
    max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_ATTEMPTS, DEFAULT_BACKOFF_BASE)
    }
}

impl RetryPolicy {
    /// Create a policy with `max_attempts` total attempts (at least one).
    pub fn new(max_attempts: u32, base: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base,
            max_delay: MAX_BACKOFF,
        }
    }

    /// Override the per-delay cap.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Total attempts allowed.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Whether another attempt is allowed after `attempt` failed (1-based).
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Wait before the attempt following failed attempt `attempt` (1-based).
    ///
    /// `base * 2^(attempt - 1)`, saturating, capped at the max delay.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Run `op` under this policy.
    ///
    /// `op` receives the 1-based attempt number. Only errors for which
    /// [`GitError::is_transient`] holds are retried; a cancelled transfer
    /// ends the loop with [`RetryError::Cancelled`].
    pub fn run<T>(
        &self,
        what: &str,
        cancel: &Cancellation,
        mut op: impl FnMut(u32) -> Result<T, GitError>,
    ) -> Result<T, RetryError> {
        let mut attempt = 1;
        loop {
            if cancel.is_cancelled() {
                return Err(RetryError::Cancelled);
            }

            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(GitError::Cancelled) => return Err(RetryError::Cancelled),
                Err(e) if e.is_transient() && self.should_retry(attempt) => {
                    let delay = self.delay_after(attempt);
                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "{} failed, retrying",
                        what
                    );
                    if cancel.sleep(delay).is_err() {
                        return Err(RetryError::Cancelled);
                    }
                    attempt += 1;
                }
                Err(e) => {
                    debug!(attempt, error = %e, "{} failed, giving up", what);
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        last: e,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transient() -> GitError {
        GitError::Transfer {
            message: "connection reset".into(),
            transient: true,
        }
    }

    fn permanent() -> GitError {
        GitError::Transfer {
            message: "authentication required".into(),
            transient: false,
        }
    }

    fn instant_policy(attempts: u32) -> RetryPolicy {
        RetryPolicy::new(attempts, Duration::ZERO)
    }

    #[test]
    fn delays_double() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100));
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
        assert_eq!(policy.delay_after(3), Duration::from_millis(400));
        assert_eq!(policy.delay_after(4), Duration::from_millis(800));
    }

    #[test]
    fn delays_are_capped() {
        let policy = RetryPolicy::new(50, Duration::from_secs(1));
        assert_eq!(policy.delay_after(10), MAX_BACKOFF);
        assert_eq!(policy.delay_after(u32::MAX), MAX_BACKOFF);

        let tight = policy.with_max_delay(Duration::from_secs(2));
        assert_eq!(tight.delay_after(3), Duration::from_secs(2));
    }

    #[test]
    fn zero_attempts_means_one() {
        let policy = RetryPolicy::new(0, Duration::ZERO);
        assert_eq!(policy.max_attempts(), 1);
        assert!(!policy.should_retry(1));
    }

    #[test]
    fn succeeds_after_transient_failures() {
        let mut calls = 0;
        let result = instant_policy(3).run("fetch", &Cancellation::new(), |attempt| {
            calls += 1;
            if attempt < 3 {
                Err(transient())
            } else {
                Ok(attempt)
            }
        });
        assert_eq!(result.ok(), Some(3));
        assert_eq!(calls, 3);
    }

    #[test]
    fn exhausts_after_max_attempts() {
        let mut calls = 0;
        let result: Result<(), _> = instant_policy(3).run("fetch", &Cancellation::new(), |_| {
            calls += 1;
            Err(transient())
        });
        assert!(matches!(result, Err(RetryError::Exhausted { attempts: 3, .. })));
        assert_eq!(calls, 3);
    }

    #[test]
    fn permanent_errors_are_not_retried() {
        let mut calls = 0;
        let result: Result<(), _> = instant_policy(3).run("fetch", &Cancellation::new(), |_| {
            calls += 1;
            Err(permanent())
        });
        assert!(matches!(result, Err(RetryError::Exhausted { attempts: 1, .. })));
        assert_eq!(calls, 1);
    }

    #[test]
    fn cancelled_transfer_stops_immediately() {
        let mut calls = 0;
        let result: Result<(), _> = instant_policy(3).run("fetch", &Cancellation::new(), |_| {
            calls += 1;
            Err(GitError::Cancelled)
        });
        assert!(matches!(result, Err(RetryError::Cancelled)));
        assert_eq!(calls, 1);
    }

    #[test]
    fn pre_cancelled_never_calls_op() {
        let cancel = Cancellation::new();
        cancel.cancel();
        let result: Result<(), _> = instant_policy(3).run("fetch", &cancel, |_| {
            panic!("op must not run when already cancelled")
        });
        assert!(matches!(result, Err(RetryError::Cancelled)));
    }
}
