//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--config <path>`: Use this config file instead of discovery
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Only warnings and errors in logs, no summary
//! - `--log-format <text|json>`: Log line format

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::core::config::Overrides;
use crate::ui::logging::LogFormat;

/// reposync - Idempotent clone-or-pull for a workspace of git repositories
#[derive(Parser, Debug)]
#[command(name = "reposync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (default: $REPOSYNC_CONFIG, then XDG and home locations)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Log line format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Clone or fast-forward every configured repository
    #[command(
        long_about = "Clone or fast-forward every configured repository.\n\n\
            Each repository is brought in line with its configured branch: cloned when \
            its checkout is absent, recloned when a previous run left it corrupted, and \
            fast-forwarded otherwise. Local commits, local changes, and upstream history \
            rewrites are reported as DivergedHistory and never overwritten.",
        after_help = "\
EXIT STATUS:
    0    every repository synced (or best-effort mode)
    1    at least one repository failed under fail-fast
    2    configuration or usage error
    130  interrupted

EXAMPLES:
    # Sync everything in the configured workspace
    reposync sync

    # Sync two repositories into a different volume, stop on first failure
    reposync sync --workspace /mnt/data --only app --only docs --fail-fast"
    )]
    Sync(SyncArgs),

    /// Show the state of every configured checkout without changing anything
    Status {
        /// Workspace root (overrides config and $REPOSYNC_WORKSPACE)
        #[arg(long, value_name = "DIR")]
        workspace: Option<PathBuf>,

        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Inspect the effective configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completion scripts
    #[command(after_help = "\
EXAMPLES:
    reposync completion bash > /etc/bash_completion.d/reposync
    reposync completion zsh > \"${fpath[1]}/_reposync\"")]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Arguments for `reposync sync`.
#[derive(Args, Debug, Clone, Default)]
pub struct SyncArgs {
    /// Workspace root (overrides config and $REPOSYNC_WORKSPACE)
    #[arg(long, value_name = "DIR")]
    pub workspace: Option<PathBuf>,

    /// Stop starting new syncs after the first failure
    #[arg(long, conflicts_with = "best_effort")]
    pub fail_fast: bool,

    /// Attempt every repository and succeed regardless of failures
    #[arg(long)]
    pub best_effort: bool,

    /// Maximum syncs in flight
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Only sync the named repository (repeatable)
    #[arg(long = "only", value_name = "NAME")]
    pub only: Vec<String>,

    /// Per-repository deadline in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

impl SyncArgs {
    /// Config overrides carried by these flags.
    pub fn overrides(&self) -> Overrides {
        let fail_fast = match (self.fail_fast, self.best_effort) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        };
        Overrides {
            workspace_root: self.workspace.clone(),
            fail_fast,
            concurrency_limit: self.concurrency,
            sync_timeout: self.timeout.map(Duration::from_secs),
        }
    }
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Load and validate the configuration, including every repository entry
    Validate,
}

/// Supported shells for completion generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    #[value(name = "powershell")]
    PowerShell,
}
