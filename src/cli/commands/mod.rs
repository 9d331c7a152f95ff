//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Loads and validates configuration (with its flag overrides)
//! 2. Calls the driver or the read-only inspection helpers
//! 3. Formats and displays output
//!
//! # Async Commands
//!
//! `sync` runs the async driver. The handler builds a tokio runtime and
//! blocks on it, so dispatch itself stays synchronous.

mod completion;
mod config_cmd;
mod status;
mod sync;

pub use completion::completion;
pub use config_cmd::{show as config_show, validate as config_validate};
pub use status::status;
pub use sync::sync;

use anyhow::{Context as _, Result};
use tracing::debug;

use super::args::{Command, ConfigAction};
use super::{Context, Exit};
use crate::core::config::{Config, Overrides};

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<Exit> {
    match command {
        Command::Sync(args) => sync::sync(ctx, &args),
        Command::Status { workspace, json } => status::status(ctx, workspace, json),
        Command::Config { action } => match action {
            ConfigAction::Show => config_cmd::show(ctx),
            ConfigAction::Validate => config_cmd::validate(ctx),
        },
        Command::Completion { shell } => {
            completion::completion(shell)?;
            Ok(Exit::Success)
        }
    }
}

/// Load configuration, apply flag overrides, and validate.
fn load_config(ctx: &Context, overrides: &Overrides) -> Result<Config> {
    let mut config =
        Config::load(ctx.config_path.as_deref()).context("failed to load configuration")?;
    config.apply_overrides(overrides);
    config.validate().context("invalid configuration")?;

    if let Some(path) = config.loaded_from() {
        debug!(path = %path.display(), "loaded configuration");
    }
    Ok(config)
}
