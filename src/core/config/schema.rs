//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Example
//!
//! ```toml
//! workspace_root = "/workspace"
//!
//! [settings]
//! concurrency_limit = 4
//! fail_fast = false
//! retry_count = 3
//! retry_backoff_base_ms = 500
//! lock_timeout_ms = 30000
//! sync_timeout_secs = 600
//!
//! [[repository]]
//! name = "assisted-service"
//! remote_url = "https://github.com/openshift/assisted-service.git"
//! branch = "master"
//! ```
//!
//! # Validation
//!
//! Settings are validated after parsing. Repository entries are only
//! checked for duplicates here; their fields are validated per entry when
//! a run resolves them, so one bad entry fails only its own sync.

use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::sync::RepositoryEntry;

/// The whole configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Directory all checkouts live under (the mounted volume).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_root: Option<PathBuf>,

    /// Run-wide settings.
    pub settings: Settings,

    /// Repositories, in the order they are reported.
    #[serde(rename = "repository", skip_serializing_if = "Vec::is_empty")]
    pub repositories: Vec<RepositoryEntry>,
}

impl FileConfig {
    /// Validate settings and reject duplicate repositories.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` naming the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.settings.validate()?;

        let mut names = HashSet::new();
        let mut paths = HashSet::new();
        for entry in &self.repositories {
            if !names.insert(entry.name.as_str()) {
                return Err(ConfigError::InvalidValue(format!(
                    "duplicate repository name '{}'",
                    entry.name
                )));
            }
            let path = entry.relative_path().components().collect::<PathBuf>();
            if !paths.insert(path) {
                return Err(ConfigError::InvalidValue(format!(
                    "repository '{}' uses checkout path '{}' already taken by another entry",
                    entry.name,
                    entry.relative_path().display()
                )));
            }
        }

        Ok(())
    }
}

/// Run-wide settings. Unset values fall back to defaults in
/// [`super::Config`]'s accessors.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Maximum syncs in flight at once
    pub concurrency_limit: Option<usize>,

    /// Stop scheduling new syncs after the first failure
    pub fail_fast: Option<bool>,

    /// Total transfer attempts per sync
    pub retry_count: Option<u32>,

    /// Delay before the first retry, doubled per attempt
    pub retry_backoff_base_ms: Option<u64>,

    /// Bounded wait for a checkout lock
    pub lock_timeout_ms: Option<u64>,

    /// Deadline for a single sync
    pub sync_timeout_secs: Option<u64>,
}

impl Settings {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency_limit == Some(0) {
            return Err(ConfigError::InvalidValue(
                "concurrency_limit must be greater than zero".into(),
            ));
        }
        if self.retry_count == Some(0) {
            return Err(ConfigError::InvalidValue(
                "retry_count must be at least 1 (it counts the first attempt)".into(),
            ));
        }
        if self.sync_timeout_secs == Some(0) {
            return Err(ConfigError::InvalidValue(
                "sync_timeout_secs must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
