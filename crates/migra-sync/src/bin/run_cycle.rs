//! Runs one Migra cycle and exits.
//!
//! ```text
//! run_cycle [--config <path>]
//! ```
//!
//! Exit status is non-zero when configuration, database setup, or the cycle
//! itself fails, so the scheduler can decide whether to try again.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use migra_db::{Database, DbConfig};
use migra_sync::{
    notify, Collaborators, CrmClient, CycleOutcome, CycleSettings, MigraConfig, SyncController,
    SyncError, SyncResult,
};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match run().await {
        Ok(CycleOutcome::Skipped) => {
            info!("Migration already converged; nothing to do");
            ExitCode::SUCCESS
        }
        Ok(CycleOutcome::Completed(report)) => {
            info!(
                cycle_id = %report.cycle_id,
                fetched = report.fetched,
                inserted = report.inserted,
                discrepancies = report.discrepancies,
                source_count = report.counts.source_count,
                destination_count = report.counts.destination_count,
                run_enabled = report.run_enabled,
                "Cycle finished"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(
                error = %e,
                retryable = e.is_retryable(),
                config_error = e.is_config_error(),
                "Cycle failed"
            );
            ExitCode::FAILURE
        }
    }
}

async fn run() -> SyncResult<CycleOutcome> {
    let config = MigraConfig::load(config_path_from_args()?)?;

    let db_path = config.destination.database_path();
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| SyncError::Store(format!("cannot create {}: {e}", parent.display())))?;
    }
    let db = Database::new(DbConfig::new(db_path)).await?;

    let source = Arc::new(CrmClient::new(&config.source)?);
    let notifier = notify::from_settings(&config.notify, config.source.timeout())?;

    let controller = SyncController::new(
        CycleSettings::from(&config),
        Collaborators::with_database(source, db, notifier),
    );

    controller.run_cycle().await
}

fn config_path_from_args() -> SyncResult<Option<PathBuf>> {
    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        None => Ok(None),
        Some("--config") => args
            .next()
            .map(|p| Some(PathBuf::from(p)))
            .ok_or_else(|| SyncError::InvalidConfig("--config requires a path".into())),
        Some(other) => Err(SyncError::InvalidConfig(format!(
            "unexpected argument '{other}'. Usage: run_cycle [--config <path>]"
        ))),
    }
}
