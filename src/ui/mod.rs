//! ui
//!
//! User-facing output.
//!
//! # Modules
//!
//! - [`output`] - Summary tables, JSON output, and verbosity
//! - [`logging`] - Tracing subscriber setup
//!
//! # Design
//!
//! All terminal output goes through this module: summaries to stdout, logs
//! and errors to stderr.

pub mod logging;
pub mod output;
