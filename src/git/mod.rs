//! git
//!
//! Single interface for all Git operations.
//!
//! # Architecture
//!
//! This module is the **ONLY doorway** to Git. All repository reads and writes
//! flow through this interface. No other module should import `git2`, and
//! reposync never shells out to the git CLI.
//!
//! # Responsibilities
//!
//! - Opening checkouts at an exact path (no parent discovery)
//! - Initializing repositories and configuring the `origin` remote
//! - Fetching a single branch, with cancellation wired into transfer callbacks
//! - Ancestry queries and working tree status
//! - Fast-forwarding the checked-out branch
//!
//! # Invariants
//!
//! - A fetch that brings nothing new writes nothing under `.git`
//! - Transfer errors are classified as transient or permanent here, once
//! - All operations return strong types (Oid, BranchName, RefName)
//!
//! # Example
//!
//! ```ignore
//! use reposync::git::Git;
//! use reposync::core::types::BranchName;
//! use reposync::sync::Cancellation;
//! use std::path::Path;
//!
//! let git = Git::open(Path::new("/workspace/app"))?;
//! let branch = BranchName::new("main")?;
//! let tip = git.fetch_branch("origin", &branch, &Cancellation::new())?;
//! ```

mod interface;

pub use interface::{Git, GitError, WorktreeStatus};
