//! cli::commands::sync
//!
//! Sync every configured repository.
//!
//! # Design
//!
//! - Loads configuration and applies `--workspace`, `--fail-fast` /
//!   `--best-effort`, `--concurrency` and `--timeout`
//! - Restricts the run to `--only` names (unknown names are a usage error)
//! - Runs the driver; SIGINT or SIGTERM cancels in-flight syncs
//! - Prints the report (table, or JSON with `--json`) and maps it to an
//!   exit status
//!
//! # Example
//!
//! ```bash
//! # Sync everything
//! reposync sync
//!
//! # Sync one repository into a scratch workspace, JSON report
//! reposync sync --workspace /tmp/ws --only app --json
//! ```

use anyhow::{Context as _, Result};
use tracing::warn;

use super::load_config;
use crate::cli::args::SyncArgs;
use crate::cli::{Context, Exit};
use crate::driver::{select_entries, Driver, SyncReport};
use crate::sync::Cancellation;
use crate::ui::output::{self, Verbosity};

/// Run the sync command.
///
/// This is a synchronous wrapper that uses tokio to run the async driver.
pub fn sync(ctx: &Context, args: &SyncArgs) -> Result<Exit> {
    let config = load_config(ctx, &args.overrides())?;
    let entries = select_entries(config.repositories(), &args.only)?;
    let driver = Driver::from_config(&config)?;

    let rt = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    let report = rt.block_on(async {
        let cancel = Cancellation::new();
        let on_signal = cancel.clone();
        let watcher = tokio::spawn(async move {
            shutdown_signal().await;
            warn!("interrupt received, cancelling in-flight syncs");
            on_signal.cancel();
        });

        let report = driver.run(&entries, &cancel).await;
        watcher.abort();
        report
    });

    if args.json {
        output::print_json(&report).context("failed to serialize report")?;
    } else {
        output::print(output::format_report(&report), ctx.verbosity);
        if ctx.verbosity != Verbosity::Quiet && !report.fail_fast {
            for failure in report.failures() {
                warn!(repo = %failure.name, "best-effort run: repository failed");
            }
        }
    }

    Ok(exit_for(&report))
}

fn exit_for(report: &SyncReport) -> Exit {
    if report.cancelled {
        Exit::Cancelled
    } else if report.is_success() {
        Exit::Success
    } else {
        Exit::Failure
    }
}

/// Resolve when the process is asked to stop.
///
/// Never resolves if no signal handler could be installed.
async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::{ErrorKind, SyncResult};
    use std::time::Duration;
    use uuid::Uuid;

    fn report(fail_fast: bool, cancelled: bool, failed: bool) -> SyncReport {
        let results = if failed {
            vec![SyncResult::failed_with(
                "a",
                ErrorKind::NetworkUnavailable,
                "down",
                Duration::ZERO,
            )]
        } else {
            Vec::new()
        };
        SyncReport {
            run_id: Uuid::new_v4(),
            fail_fast,
            cancelled,
            results,
            skipped: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    #[test]
    fn exit_status_mapping() {
        assert_eq!(exit_for(&report(true, false, false)), Exit::Success);
        assert_eq!(exit_for(&report(true, false, true)), Exit::Failure);
        assert_eq!(exit_for(&report(false, false, true)), Exit::Success);
        assert_eq!(exit_for(&report(false, true, true)), Exit::Cancelled);
    }
}
