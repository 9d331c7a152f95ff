//! reposync - Idempotent clone-or-pull for a workspace of git repositories
//!
//! reposync keeps a set of local checkouts (typically on a persistent volume
//! mounted into an init container) in line with their remote branches. A
//! run can be repeated any number of times: absent checkouts are cloned,
//! checkouts left corrupted by an interrupted run are recloned, and healthy
//! ones are fast-forwarded or left untouched.
//!
//! # Architecture
//!
//! The codebase follows a strict layered architecture:
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to driver)
//! - [`driver`] - Runs many syncs with bounded parallelism and fail-fast
//! - [`sync`] - The per-repository clone-or-pull routine
//! - [`core`] - Domain types, paths, locking, markers, and configuration
//! - [`git`] - Single interface for all Git operations
//! - [`ui`] - Output formatting and logging setup
//!
//! # Correctness Invariants
//!
//! reposync maintains the following invariants:
//!
//! 1. At most one sync mutates a checkout at a time (per-checkout file lock)
//! 2. An interrupted mutation is always detectable on the next run
//! 3. Only fast-forwards are applied; local work is never overwritten
//! 4. A sync with nothing to do rewrites no tracked metadata

pub mod cli;
pub mod core;
pub mod driver;
pub mod git;
pub mod sync;
pub mod ui;
