//! driver
//!
//! Multi-repository orchestration.
//!
//! # Architecture
//!
//! The driver resolves configured entries into specs, then runs one
//! [`RepositorySyncer::sync`] per spec on tokio's blocking pool, at most
//! `concurrency_limit` at a time. Syncs are independent: one repository's
//! failure never affects another's attempt, except that under fail-fast no
//! new syncs are started once any has failed. Syncs already in flight run
//! to completion.
//!
//! # Invariants
//!
//! - Every configured repository appears in the report, either with a
//!   result or in `skipped`
//! - Results are reported in configured order, regardless of completion
//!   order
//!
//! # Example
//!
//! ```no_run
//! use reposync::core::config::Config;
//! use reposync::driver::Driver;
//! use reposync::sync::Cancellation;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load(None)?;
//! let driver = Driver::from_config(&config)?;
//! let report = driver.run(config.repositories(), &Cancellation::new()).await;
//! println!("{}", report.summary_line());
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use serde::{Serialize, Serializer};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::core::config::{Config, ConfigError};
use crate::core::paths::WorkspacePaths;
use crate::sync::{
    Cancellation, ErrorKind, Outcome, RepositoryEntry, RepositorySyncer, SyncResult,
};

/// `--only` named a repository that is not configured.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown repository '{0}'")]
pub struct UnknownRepository(pub String);

/// Run-wide scheduling options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverOptions {
    pub concurrency_limit: usize,
    pub fail_fast: bool,
    /// Deadline applied to each sync from the moment it starts
    pub sync_timeout: Option<Duration>,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            concurrency_limit: crate::core::config::DEFAULT_CONCURRENCY,
            fail_fast: false,
            sync_timeout: None,
        }
    }
}

/// Aggregate result of one run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub run_id: Uuid,
    pub fail_fast: bool,
    /// Whether the run was cancelled from outside (signal)
    pub cancelled: bool,
    /// One result per attempted repository, in configured order
    pub results: Vec<SyncResult>,
    /// Repositories never started because fail-fast halted scheduling
    pub skipped: Vec<String>,
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
}

impl SyncReport {
    /// Aggregate status.
    ///
    /// Under fail-fast, any failure (or skip) fails the run. In best-effort
    /// mode the run succeeds and failures are surfaced in the results.
    pub fn is_success(&self) -> bool {
        if self.fail_fast {
            self.failures().next().is_none() && self.skipped.is_empty()
        } else {
            true
        }
    }

    /// Failed results, in configured order.
    pub fn failures(&self) -> impl Iterator<Item = &SyncResult> {
        self.results.iter().filter(|r| !r.is_success())
    }

    /// Number of results with the given outcome.
    pub fn count(&self, outcome: Outcome) -> usize {
        self.results.iter().filter(|r| r.outcome == outcome).count()
    }

    /// One-line human summary.
    pub fn summary_line(&self) -> String {
        let mut line = format!(
            "{} cloned, {} pulled, {} up to date, {} failed",
            self.count(Outcome::Cloned),
            self.count(Outcome::Pulled),
            self.count(Outcome::UpToDate),
            self.count(Outcome::Failed),
        );
        if !self.skipped.is_empty() {
            line.push_str(&format!(", {} skipped", self.skipped.len()));
        }
        line.push_str(&format!(" in {:.1}s", self.duration.as_secs_f64()));
        line
    }
}

fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

/// Runs many syncs with bounded parallelism.
#[derive(Debug, Clone)]
pub struct Driver {
    syncer: Arc<RepositorySyncer>,
    workspace: WorkspacePaths,
    options: DriverOptions,
}

impl Driver {
    pub fn new(
        syncer: RepositorySyncer,
        workspace: WorkspacePaths,
        options: DriverOptions,
    ) -> Self {
        Self {
            syncer: Arc::new(syncer),
            workspace,
            options,
        }
    }

    /// Build a driver from validated configuration.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self::new(
            RepositorySyncer::new(config.sync_options()),
            config.workspace()?,
            DriverOptions {
                concurrency_limit: config.concurrency_limit(),
                fail_fast: config.fail_fast(),
                sync_timeout: config.sync_timeout(),
            },
        ))
    }

    pub fn options(&self) -> &DriverOptions {
        &self.options
    }

    /// Sync every entry and collect the report.
    pub async fn run(&self, entries: &[RepositoryEntry], cancel: &Cancellation) -> SyncReport {
        let run_id = Uuid::new_v4();
        let started = Instant::now();
        let fail_fast = self.options.fail_fast;
        let limit = self.options.concurrency_limit.max(1);
        info!(
            %run_id,
            repositories = entries.len(),
            concurrency = limit,
            fail_fast,
            "starting sync run"
        );

        let halted = Arc::new(AtomicBool::new(false));
        let mut slots: Vec<Option<SyncResult>> = vec![None; entries.len()];
        let mut ready = Vec::with_capacity(entries.len());

        for (index, entry) in entries.iter().enumerate() {
            match entry.resolve(&self.workspace) {
                Ok(spec) => ready.push((index, spec)),
                Err(e) => {
                    let result = SyncResult::failed_with(
                        entry.name.as_str(),
                        ErrorKind::InvalidSpec,
                        e.to_string(),
                        Duration::ZERO,
                    );
                    result.emit();
                    if fail_fast {
                        halted.store(true, Ordering::SeqCst);
                    }
                    slots[index] = Some(result);
                }
            }
        }

        let completed: Vec<(usize, String, Option<SyncResult>)> =
            stream::iter(ready.into_iter().map(|(index, spec)| {
                let syncer = Arc::clone(&self.syncer);
                let halted = Arc::clone(&halted);
                let cancel = cancel.clone();
                let timeout = self.options.sync_timeout;

                async move {
                    let name = spec.name.to_string();
                    if halted.load(Ordering::SeqCst) {
                        return (index, name, None);
                    }

                    let per_sync = match timeout {
                        Some(t) => cancel.with_timeout(t),
                        None => cancel,
                    };
                    let started = Instant::now();
                    let joined =
                        tokio::task::spawn_blocking(move || syncer.sync(&spec, &per_sync)).await;
                    let result = match joined {
                        Ok(result) => result,
                        Err(e) => {
                            let result = SyncResult::failed_with(
                                name.as_str(),
                                ErrorKind::Io,
                                format!("sync task failed: {e}"),
                                started.elapsed(),
                            );
                            result.emit();
                            result
                        }
                    };

                    if fail_fast && !result.is_success() && !halted.swap(true, Ordering::SeqCst) {
                        warn!(repo = %name, "fail-fast: no further syncs will be started");
                    }
                    (index, name, Some(result))
                }
            }))
            .buffer_unordered(limit)
            .collect()
            .await;

        let mut skipped = Vec::new();
        for (index, name, result) in completed {
            match result {
                Some(result) => slots[index] = Some(result),
                None => skipped.push((index, name)),
            }
        }
        skipped.sort_by_key(|(index, _)| *index);

        let report = SyncReport {
            run_id,
            fail_fast,
            cancelled: cancel.was_requested(),
            results: slots.into_iter().flatten().collect(),
            skipped: skipped.into_iter().map(|(_, name)| name).collect(),
            duration: started.elapsed(),
        };

        info!(%run_id, summary = %report.summary_line(), "sync run finished");
        report
    }
}

/// Restrict `entries` to the names in `only`, keeping configured order.
///
/// An empty `only` selects everything.
pub fn select_entries(
    entries: &[RepositoryEntry],
    only: &[String],
) -> Result<Vec<RepositoryEntry>, UnknownRepository> {
    if only.is_empty() {
        return Ok(entries.to_vec());
    }

    let known: HashSet<&str> = entries.iter().map(|e| e.name.as_str()).collect();
    if let Some(missing) = only.iter().find(|name| !known.contains(name.as_str())) {
        return Err(UnknownRepository(missing.clone()));
    }

    let wanted: HashSet<&str> = only.iter().map(String::as_str).collect();
    Ok(entries
        .iter()
        .filter(|e| wanted.contains(e.name.as_str()))
        .cloned()
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Oid;

    fn entry(name: &str) -> RepositoryEntry {
        RepositoryEntry {
            name: name.into(),
            remote_url: format!("https://example.com/{name}.git"),
            branch: "main".into(),
            path: None,
        }
    }

    fn ok(name: &str) -> SyncResult {
        SyncResult::succeeded(
            name,
            Outcome::UpToDate,
            Oid::new("0123456789abcdef0123456789abcdef01234567").unwrap(),
            Duration::ZERO,
        )
    }

    fn failed(name: &str) -> SyncResult {
        SyncResult::failed_with(name, ErrorKind::NetworkUnavailable, "down", Duration::ZERO)
    }

    fn report(fail_fast: bool, results: Vec<SyncResult>, skipped: &[&str]) -> SyncReport {
        SyncReport {
            run_id: Uuid::new_v4(),
            fail_fast,
            cancelled: false,
            results,
            skipped: skipped.iter().map(|s| s.to_string()).collect(),
            duration: Duration::from_millis(1200),
        }
    }

    mod selection {
        use super::*;

        #[test]
        fn empty_only_selects_all() {
            let entries = vec![entry("a"), entry("b")];
            assert_eq!(select_entries(&entries, &[]).unwrap(), entries);
        }

        #[test]
        fn keeps_configured_order() {
            let entries = vec![entry("a"), entry("b"), entry("c")];
            let picked = select_entries(&entries, &["c".into(), "a".into()]).unwrap();
            let names: Vec<_> = picked.iter().map(|e| e.name.as_str()).collect();
            assert_eq!(names, vec!["a", "c"]);
        }

        #[test]
        fn unknown_name_is_error() {
            let entries = vec![entry("a")];
            assert_eq!(
                select_entries(&entries, &["zzz".into()]),
                Err(UnknownRepository("zzz".into()))
            );
        }
    }

    mod aggregate {
        use super::*;

        #[test]
        fn all_ok_succeeds_in_both_modes() {
            assert!(report(true, vec![ok("a"), ok("b")], &[]).is_success());
            assert!(report(false, vec![ok("a"), ok("b")], &[]).is_success());
        }

        #[test]
        fn fail_fast_failure_fails() {
            assert!(!report(true, vec![ok("a"), failed("b")], &["c"]).is_success());
        }

        #[test]
        fn best_effort_failure_still_succeeds() {
            let r = report(false, vec![failed("a"), ok("b")], &[]);
            assert!(r.is_success());
            assert_eq!(r.failures().count(), 1);
        }

        #[test]
        fn summary_mentions_skips() {
            let r = report(true, vec![failed("a")], &["b", "c"]);
            let line = r.summary_line();
            assert!(line.contains("1 failed"));
            assert!(line.contains("2 skipped"));
        }

        #[test]
        fn report_json_shape() {
            let json = serde_json::to_value(report(false, vec![ok("a")], &[])).unwrap();
            assert_eq!(json["duration_ms"], 1200);
            assert_eq!(json["results"][0]["outcome"], "upToDate");
            assert!(json["skipped"].as_array().unwrap().is_empty());
        }
    }

    mod scheduling {
        use super::*;
        use tempfile::TempDir;

        fn driver(workspace: &TempDir, fail_fast: bool, limit: usize) -> Driver {
            Driver::new(
                RepositorySyncer::default(),
                WorkspacePaths::new(workspace.path()),
                DriverOptions {
                    concurrency_limit: limit,
                    fail_fast,
                    sync_timeout: None,
                },
            )
        }

        #[tokio::test]
        async fn invalid_entries_fail_individually() {
            let temp = TempDir::new().unwrap();
            let mut bad = entry("bad");
            bad.remote_url = "::nope".into();

            let cancel = Cancellation::new();
            cancel.cancel();
            let report = driver(&temp, false, 2)
                .run(&[bad, entry("good")], &cancel)
                .await;

            assert_eq!(report.results.len(), 2);
            assert_eq!(report.results[0].error_kind(), Some(ErrorKind::InvalidSpec));
            assert_eq!(report.results[1].error_kind(), Some(ErrorKind::Cancelled));
            assert!(report.cancelled);
            assert!(report.is_success());
        }

        #[tokio::test]
        async fn fail_fast_skips_after_invalid_entry() {
            let temp = TempDir::new().unwrap();
            let mut bad = entry("bad");
            bad.branch = "no..good".into();

            let report = driver(&temp, true, 1)
                .run(&[bad, entry("b"), entry("c")], &Cancellation::new())
                .await;

            assert_eq!(report.results.len(), 1);
            assert_eq!(report.skipped, vec!["b".to_string(), "c".to_string()]);
            assert!(!report.is_success());
        }
    }
}
