//! core
//!
//! Core domain types, schemas, and on-disk operations for reposync.
//!
//! # Modules
//!
//! - [`types`] - Strong types: RepoName, RemoteUrl, BranchName, Oid, etc.
//! - [`paths`] - Centralized path routing for checkouts and sibling files
//! - [`ops`] - Checkout locking and in-progress markers
//! - [`config`] - Configuration schema and loading
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - Schemas are strict and self-describing
//! - Everything reposync writes outside a checkout is computed in `paths`

pub mod config;
pub mod ops;
pub mod paths;
pub mod types;
