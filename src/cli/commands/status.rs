//! status command - Show the state of every configured checkout
//!
//! Read-only: the checkout lock is only tried, never held, and nothing is fetched.

use std::path::PathBuf;

use anyhow::Result;
use serde::Serialize;

use super::load_config;
use crate::cli::{Context, Exit};
use crate::core::config::Overrides;
use crate::core::ops::CheckoutLock;
use crate::core::paths::WorkspacePaths;
use crate::sync::workspace::{self, WorkspaceState};
use crate::sync::RepositoryEntry;
use crate::ui::output;

/// One row of `status` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusRow {
    pub name: String,
    pub path: Option<PathBuf>,
    /// `absent`, `valid`, `corrupted`, or `invalid` (bad config entry)
    pub state: &'static str,
    pub branch: Option<String>,
    pub head: Option<String>,
    pub detail: Option<String>,
    pub locked: bool,
}

impl StatusRow {
    fn format(&self, name_width: usize) -> String {
        let mut line = format!("{:<width$}  {:<9}", self.name, self.state, width = name_width);
        if let Some(branch) = &self.branch {
            line.push_str(&format!("  {branch}"));
        }
        if let Some(head) = &self.head {
            line.push_str(&format!("  {}", &head[..head.len().min(12)]));
        }
        if let Some(detail) = &self.detail {
            line.push_str(&format!("  ({detail})"));
        }
        if self.locked {
            line.push_str("  [locked]");
        }
        line
    }
}

/// Show the state of every configured checkout.
pub fn status(ctx: &Context, workspace: Option<PathBuf>, json: bool) -> Result<Exit> {
    let config = load_config(
        ctx,
        &Overrides {
            workspace_root: workspace,
            ..Default::default()
        },
    )?;
    let root = config.workspace()?;

    let rows: Vec<StatusRow> = config
        .repositories()
        .iter()
        .map(|entry| inspect_entry(&root, entry))
        .collect();

    if json {
        output::print_json(&rows)?;
    } else {
        let width = rows.iter().map(|r| r.name.len()).max().unwrap_or(0);
        for row in &rows {
            output::print(row.format(width), ctx.verbosity);
        }
    }

    Ok(Exit::Success)
}

fn inspect_entry(root: &WorkspacePaths, entry: &RepositoryEntry) -> StatusRow {
    let mut row = StatusRow {
        name: entry.name.clone(),
        path: None,
        state: "invalid",
        branch: None,
        head: None,
        detail: None,
        locked: false,
    };

    let spec = match entry.resolve(root) {
        Ok(spec) => spec,
        Err(e) => {
            row.detail = Some(e.to_string());
            return row;
        }
    };
    let paths = spec.paths();
    row.path = Some(spec.local_path.clone());
    row.locked = CheckoutLock::is_locked(&paths).unwrap_or(false);

    match workspace::inspect(&paths) {
        Ok(state) => {
            row.state = state.label();
            match state {
                WorkspaceState::Absent => {}
                WorkspaceState::Valid {
                    head,
                    branch,
                    interrupted,
                } => {
                    row.head = Some(head.to_string());
                    row.branch = Some(
                        branch
                            .map(|b| b.to_string())
                            .unwrap_or_else(|| "(detached)".into()),
                    );
                    if interrupted {
                        row.detail = Some("interrupted fast-forward, repaired on next sync".into());
                    }
                }
                WorkspaceState::Corrupted { reason } => row.detail = Some(reason),
            }
        }
        Err(e) => {
            row.state = "corrupted";
            row.detail = Some(format!("cannot inspect: {e}"));
        }
    }

    row
}
