//! sync
//!
//! Idempotent "clone or pull" of a single repository.
//!
//! # Modules
//!
//! - [`spec`] - Raw config entries and validated [`RepositorySpec`]s
//! - [`workspace`] - Classifying and clearing checkout directories
//! - [`syncer`] - [`RepositorySyncer`], the clone-or-pull routine
//! - [`retry`] - Bounded exponential backoff for transfers
//! - [`cancel`] - Cooperative cancellation
//! - [`result`] - Outcomes, [`ErrorKind`] and [`SyncResult`]
//!
//! # Invariants
//!
//! - A sync on an up-to-date checkout rewrites no tracked metadata
//! - A checkout is never left with git metadata and incomplete content
//!   unless a marker says so
//! - Only fast-forwards are applied; everything else is `DivergedHistory`

pub mod cancel;
pub mod result;
pub mod retry;
pub mod spec;
pub mod syncer;
pub mod workspace;

pub use cancel::{Cancellation, Cancelled};
pub use result::{ErrorKind, Outcome, SyncError, SyncFailure, SyncResult};
pub use retry::{RetryError, RetryPolicy};
pub use spec::{RepositoryEntry, RepositorySpec, SpecError};
pub use syncer::{RepositorySyncer, SyncOptions};
pub use workspace::WorkspaceState;
