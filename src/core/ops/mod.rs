//! core::ops
//!
//! Locking and crash-safety markers for checkout mutations.
//!
//! # Modules
//!
//! - [`lock`] - Exclusive per-checkout lock with bounded wait
//! - [`marker`] - In-progress marker that makes interrupted mutations detectable
//!
//! # Architecture
//!
//! Every mutating sync:
//! 1. Acquires the checkout lock
//! 2. Writes a marker before the first irreversible step
//! 3. Performs the clone or fast-forward
//! 4. On success: removes the marker
//! 5. On cancellation: leaves the marker so the next run sees the partial state
//!
//! # Example
//!
//! ```no_run
//! use reposync::core::ops::{CheckoutLock, Operation, SyncMarker};
//! use reposync::core::paths::CheckoutPaths;
//! use reposync::core::types::RepoName;
//!
//! let paths = CheckoutPaths::new("/workspace/app");
//! let _lock = CheckoutLock::acquire(&paths)?;
//!
//! SyncMarker::new(RepoName::new("app")?, Operation::Clone, None).write(&paths)?;
//! // ... clone ...
//! SyncMarker::remove(&paths)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod lock;
pub mod marker;

pub use lock::{CheckoutLock, LockError};
pub use marker::{MarkerError, Operation, SyncMarker};
