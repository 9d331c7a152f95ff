//! config command - Show or validate the effective configuration

use anyhow::{Context as _, Result};

use super::load_config;
use crate::cli::{Context, Exit};
use crate::core::config::Overrides;
use crate::ui::output;

/// Print the effective configuration as TOML.
pub fn show(ctx: &Context) -> Result<Exit> {
    let config = load_config(ctx, &Overrides::default())?;

    if let Some(path) = config.loaded_from() {
        println!("# loaded from {}", path.display());
    }
    print!("{}", config.to_toml().context("failed to render configuration")?);
    Ok(Exit::Success)
}

/// Validate the configuration and every repository entry.
///
/// Entry problems do not stop a sync run (they fail only their own
/// repository), but here they are reported together and make the command
/// fail.
pub fn validate(ctx: &Context) -> Result<Exit> {
    let config = load_config(ctx, &Overrides::default())?;
    let workspace = config.workspace()?;

    let problems: Vec<String> = config
        .repositories()
        .iter()
        .filter_map(|entry| {
            entry
                .resolve(&workspace)
                .err()
                .map(|e| format!("{}: {}", entry.name, e))
        })
        .collect();

    if problems.is_empty() {
        output::print(
            format!(
                "configuration OK: {} repositories under {}",
                config.repositories().len(),
                workspace.root().display()
            ),
            ctx.verbosity,
        );
        Ok(Exit::Success)
    } else {
        output::error(format!(
            "{} invalid repository entr{}:\n{}",
            problems.len(),
            if problems.len() == 1 { "y" } else { "ies" },
            output::format_list(&problems, "  - ")
        ));
        Ok(Exit::Usage)
    }
}
