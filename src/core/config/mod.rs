//! core::config
//!
//! Configuration schema and loading.
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Config file
//! 3. `$REPOSYNC_WORKSPACE` (workspace root only)
//! 4. CLI flags, via [`Overrides`]
//!
//! # Config Locations
//!
//! The first of these is used:
//! 1. `--config <path>`
//! 2. `$REPOSYNC_CONFIG` if set
//! 3. `$XDG_CONFIG_HOME/reposync/config.toml`
//! 4. `~/.reposync/config.toml`
//!
//! An explicitly named file (1 or 2) must exist. Unlike user preferences,
//! a sync run has nothing to do without a repository list, so finding no
//! file at all is an error too.
//!
//! # Example
//!
//! ```no_run
//! use reposync::core::config::{Config, Overrides};
//!
//! let mut config = Config::load(None)?;
//! config.apply_overrides(&Overrides {
//!     concurrency_limit: Some(8),
//!     ..Default::default()
//! });
//! config.validate()?;
//!
//! println!("workspace: {}", config.workspace()?.root().display());
//! println!("parallel syncs: {}", config.concurrency_limit());
//! # Ok::<(), reposync::core::config::ConfigError>(())
//! ```

pub mod schema;

pub use schema::{FileConfig, Settings};

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::core::paths::WorkspacePaths;
use crate::sync::retry::{DEFAULT_ATTEMPTS, DEFAULT_BACKOFF_BASE};
use crate::sync::syncer::{DEFAULT_LOCK_POLL, DEFAULT_LOCK_TIMEOUT};
use crate::sync::{RepositoryEntry, RetryPolicy, SyncOptions};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "REPOSYNC_CONFIG";

/// Environment variable overriding the workspace root.
pub const WORKSPACE_ENV: &str = "REPOSYNC_WORKSPACE";

/// Default number of syncs in flight.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("no config file found (searched: {})", format_searched(.searched))]
    NotFound { searched: Vec<PathBuf> },

    #[error("workspace_root is not set (use the config file, $REPOSYNC_WORKSPACE, or --workspace)")]
    MissingWorkspaceRoot,

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

fn format_searched(searched: &[PathBuf]) -> String {
    searched
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Values supplied on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub workspace_root: Option<PathBuf>,
    pub fail_fast: Option<bool>,
    pub concurrency_limit: Option<usize>,
    pub sync_timeout: Option<Duration>,
}

/// Effective configuration.
///
/// Accessor methods apply defaults for unset values.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Parsed file contents, with overrides applied
    pub file: FileConfig,
    /// Path the file was loaded from
    loaded_from: Option<PathBuf>,
}

impl Config {
    /// Discover, read and parse the config file, then apply
    /// `$REPOSYNC_WORKSPACE`.
    ///
    /// Does not validate; call [`Config::validate`] after applying
    /// overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = discover(
            explicit,
            std::env::var_os(CONFIG_ENV).map(PathBuf::from),
            std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from),
            dirs::home_dir(),
        )?;

        let mut config = Self::from_path(&path)?;
        if let Some(root) = std::env::var_os(WORKSPACE_ENV) {
            config.file.workspace_root = Some(PathBuf::from(root));
        }
        Ok(config)
    }

    /// Read and parse a specific file.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let file = toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        Ok(Self {
            file,
            loaded_from: Some(path.to_path_buf()),
        })
    }

    /// Build a config from an in-memory file.
    pub fn from_file(file: FileConfig) -> Self {
        Self {
            file,
            loaded_from: None,
        }
    }

    /// Apply command-line overrides.
    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(root) = &overrides.workspace_root {
            self.file.workspace_root = Some(root.clone());
        }
        if let Some(fail_fast) = overrides.fail_fast {
            self.file.settings.fail_fast = Some(fail_fast);
        }
        if let Some(limit) = overrides.concurrency_limit {
            self.file.settings.concurrency_limit = Some(limit);
        }
        if let Some(timeout) = overrides.sync_timeout {
            self.file.settings.sync_timeout_secs = Some(timeout.as_secs().max(1));
        }
    }

    /// Validate the effective configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.file.workspace_root.is_none() {
            return Err(ConfigError::MissingWorkspaceRoot);
        }
        self.file.validate()
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(&self.file).map_err(|e| ConfigError::InvalidValue(e.to_string()))
    }

    // =========================================================================
    // Accessor methods with defaults
    // =========================================================================

    /// The workspace root.
    pub fn workspace(&self) -> Result<WorkspacePaths, ConfigError> {
        self.file
            .workspace_root
            .as_ref()
            .map(WorkspacePaths::new)
            .ok_or(ConfigError::MissingWorkspaceRoot)
    }

    /// Configured repositories, in order.
    pub fn repositories(&self) -> &[RepositoryEntry] {
        &self.file.repositories
    }

    /// Maximum syncs in flight. Defaults to 4.
    pub fn concurrency_limit(&self) -> usize {
        self.file
            .settings
            .concurrency_limit
            .unwrap_or(DEFAULT_CONCURRENCY)
    }

    /// Whether to stop scheduling after the first failure. Defaults to `false`.
    pub fn fail_fast(&self) -> bool {
        self.file.settings.fail_fast.unwrap_or(false)
    }

    /// Transfer retry policy. Defaults to 3 attempts from a 500 ms base.
    pub fn retry_policy(&self) -> RetryPolicy {
        let settings = &self.file.settings;
        RetryPolicy::new(
            settings.retry_count.unwrap_or(DEFAULT_ATTEMPTS),
            settings
                .retry_backoff_base_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_BACKOFF_BASE),
        )
    }

    /// Bounded lock wait. Defaults to 30 seconds.
    pub fn lock_timeout(&self) -> Duration {
        self.file
            .settings
            .lock_timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_LOCK_TIMEOUT)
    }

    /// Per-sync deadline, if configured.
    pub fn sync_timeout(&self) -> Option<Duration> {
        self.file.settings.sync_timeout_secs.map(Duration::from_secs)
    }

    /// Options for the syncer.
    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            retry: self.retry_policy(),
            lock_timeout: self.lock_timeout(),
            lock_poll_interval: DEFAULT_LOCK_POLL,
        }
    }

    /// Get the path the config was loaded from.
    pub fn loaded_from(&self) -> Option<&Path> {
        self.loaded_from.as_deref()
    }
}

/// Pick the config file from the candidate sources, in precedence order.
fn discover(
    explicit: Option<&Path>,
    env_config: Option<PathBuf>,
    xdg_config_home: Option<PathBuf>,
    home: Option<PathBuf>,
) -> Result<PathBuf, ConfigError> {
    // Explicitly named files must exist.
    if let Some(path) = explicit.map(Path::to_path_buf).or(env_config) {
        return if path.exists() {
            Ok(path)
        } else {
            Err(ConfigError::NotFound {
                searched: vec![path],
            })
        };
    }

    let candidates: Vec<PathBuf> = xdg_config_home
        .map(|xdg| xdg.join("reposync/config.toml"))
        .into_iter()
        .chain(home.map(|h| h.join(".reposync/config.toml")))
        .collect();

    candidates
        .iter()
        .find(|p| p.exists())
        .cloned()
        .ok_or(ConfigError::NotFound {
            searched: candidates,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, contents: &str) -> PathBuf {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents).unwrap();
        path
    }

    mod discovery {
        use super::*;

        #[test]
        fn explicit_wins() {
            let temp = TempDir::new().unwrap();
            let explicit = write(temp.path(), "explicit.toml", "");
            let env = write(temp.path(), "env.toml", "");

            let found = discover(Some(&explicit), Some(env), None, None).unwrap();
            assert_eq!(found, explicit);
        }

        #[test]
        fn env_before_xdg() {
            let temp = TempDir::new().unwrap();
            let env = write(temp.path(), "env.toml", "");
            write(temp.path(), "xdg/reposync/config.toml", "");

            let found = discover(None, Some(env.clone()), Some(temp.path().join("xdg")), None)
                .unwrap();
            assert_eq!(found, env);
        }

        #[test]
        fn missing_explicit_is_error() {
            let temp = TempDir::new().unwrap();
            let result = discover(Some(&temp.path().join("nope.toml")), None, None, None);
            assert!(matches!(result, Err(ConfigError::NotFound { .. })));
        }

        #[test]
        fn falls_back_to_home() {
            let temp = TempDir::new().unwrap();
            let home_cfg = write(temp.path(), "home/.reposync/config.toml", "");

            let found = discover(
                None,
                None,
                Some(temp.path().join("empty-xdg")),
                Some(temp.path().join("home")),
            )
            .unwrap();
            assert_eq!(found, home_cfg);
        }

        #[test]
        fn nothing_found_lists_candidates() {
            let temp = TempDir::new().unwrap();
            let err = discover(None, None, Some(temp.path().join("x")), Some(temp.path().join("h")))
                .unwrap_err();
            match err {
                ConfigError::NotFound { searched } => assert_eq!(searched.len(), 2),
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    mod effective {
        use super::*;

        #[test]
        fn defaults_apply() {
            let config = Config::from_file(FileConfig::default());
            assert_eq!(config.concurrency_limit(), DEFAULT_CONCURRENCY);
            assert!(!config.fail_fast());
            assert_eq!(config.retry_policy(), RetryPolicy::default());
            assert_eq!(config.lock_timeout(), DEFAULT_LOCK_TIMEOUT);
            assert!(config.sync_timeout().is_none());
        }

        #[test]
        fn overrides_beat_file() {
            let temp = TempDir::new().unwrap();
            let path = write(
                temp.path(),
                "config.toml",
                r#"
                workspace_root = "/from-file"
                [settings]
                fail_fast = true
                concurrency_limit = 2
                "#,
            );

            let mut config = Config::from_path(&path).unwrap();
            config.apply_overrides(&Overrides {
                workspace_root: Some(PathBuf::from("/from-flag")),
                fail_fast: Some(false),
                concurrency_limit: None,
                sync_timeout: Some(Duration::from_secs(90)),
            });

            assert_eq!(config.workspace().unwrap().root(), Path::new("/from-flag"));
            assert!(!config.fail_fast());
            assert_eq!(config.concurrency_limit(), 2);
            assert_eq!(config.sync_timeout(), Some(Duration::from_secs(90)));
            assert_eq!(config.loaded_from(), Some(path.as_path()));
        }

        #[test]
        fn missing_workspace_fails_validation() {
            let config = Config::from_file(FileConfig::default());
            assert!(matches!(
                config.validate(),
                Err(ConfigError::MissingWorkspaceRoot)
            ));
        }

        #[test]
        fn parse_error_names_file() {
            let temp = TempDir::new().unwrap();
            let path = write(temp.path(), "config.toml", "[settings\n");
            let err = Config::from_path(&path).unwrap_err();
            assert!(err.to_string().contains("config.toml"));
        }

        #[test]
        fn retry_settings_flow_into_options() {
            let mut file = FileConfig::default();
            file.settings.retry_count = Some(5);
            file.settings.retry_backoff_base_ms = Some(10);
            file.settings.lock_timeout_ms = Some(250);

            let options = Config::from_file(file).sync_options();
            assert_eq!(options.retry.max_attempts(), 5);
            assert_eq!(options.retry.delay_after(2), Duration::from_millis(20));
            assert_eq!(options.lock_timeout, Duration::from_millis(250));
        }

        #[test]
        fn to_toml_is_parseable() {
            let mut file = FileConfig::default();
            file.workspace_root = Some(PathBuf::from("/w"));
            file.settings.fail_fast = Some(true);
            let text = Config::from_file(file.clone()).to_toml().unwrap();
            let parsed: FileConfig = toml::from_str(&text).unwrap();
            assert_eq!(parsed, file);
        }
    }
}
