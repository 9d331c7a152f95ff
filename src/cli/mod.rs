//! cli
//!
//! Command-line interface layer for reposync.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Install logging
//! - Delegate to command handlers and map their outcome to an exit status
//!
//! # Architecture
//!
//! The CLI layer is thin. Handlers load configuration, hand repositories to
//! the [`crate::driver`], and format what comes back. No handler touches a
//! checkout directly.

pub mod args;
pub mod commands;

pub use args::{Cli, Shell};

use std::path::PathBuf;
use std::process::ExitCode;

use crate::ui::{logging, output::{self, Verbosity}};

/// Settings shared by every command.
#[derive(Debug, Clone)]
pub struct Context {
    /// `--config` value
    pub config_path: Option<PathBuf>,
    pub verbosity: Verbosity,
}

/// Process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// Everything succeeded
    Success,
    /// At least one repository failed and the run counts as failed
    Failure,
    /// Configuration or usage error
    Usage,
    /// Interrupted by a signal
    Cancelled,
}

impl Exit {
    pub fn code(self) -> u8 {
        match self {
            Exit::Success => 0,
            Exit::Failure => 1,
            Exit::Usage => 2,
            Exit::Cancelled => 130,
        }
    }
}

impl From<Exit> for ExitCode {
    fn from(exit: Exit) -> Self {
        ExitCode::from(exit.code())
    }
}

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run() -> ExitCode {
    let cli = Cli::parse_args();
    let ctx = Context {
        config_path: cli.config.clone(),
        verbosity: Verbosity::from_flags(cli.quiet, cli.debug),
    };

    if let Err(e) = logging::init(ctx.verbosity, cli.log_format) {
        output::error(format!("failed to initialise logging: {e}"));
    }

    match commands::dispatch(cli.command, &ctx) {
        Ok(exit) => exit.into(),
        Err(e) => {
            output::error(format!("{e:#}"));
            Exit::Usage.into()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes() {
        assert_eq!(Exit::Success.code(), 0);
        assert_eq!(Exit::Failure.code(), 1);
        assert_eq!(Exit::Usage.code(), 2);
        assert_eq!(Exit::Cancelled.code(), 130);
    }
}
