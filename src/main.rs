//! teambackup - incremental Dropbox Business team backup
//!
//! Mirrors every team member's files into a local directory tree,
//! resuming from per-member cursors persisted in SQLite so re-runs only
//! transfer what changed.

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use core_runtime::config::BackupConfig;
use core_runtime::events::EventBus;
use core_runtime::logging::{init_logging, LoggingConfig};
use core_sync::{LocalMirror, Orchestrator, RunReport, SqliteCursorStore};
use provider_dropbox::{DropboxTeamConnector, ReqwestHttpClient};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, warn};

mod cli;

use cli::Cli;

/// Exit code for usage and authentication problems.
const EXIT_USAGE: u8 = 1;
/// Exit code for a fatal run abort; committed progress is kept.
const EXIT_FATAL: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(EXIT_USAGE);
        }
    };

    let Some(token) = cli.token.clone() else {
        eprintln!(
            "error: no team token given; pass it as an argument or set DROPBOX_TEAM_TOKEN"
        );
        return ExitCode::from(EXIT_USAGE);
    };

    let config = match cli.build_config(&token) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::from(EXIT_USAGE);
        }
    };

    let mut logging = LoggingConfig::default();
    if cli.log_level.contains('=') || cli.log_level.contains(',') {
        logging = logging.with_console_filter(&cli.log_level);
    } else {
        logging = logging.with_console_level(&cli.log_level);
    }
    if let Some(dir) = &cli.log_dir {
        logging = logging.with_log_dir(dir);
    }
    let _log_guard = match init_logging(logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::from(EXIT_USAGE);
        }
    };

    match run(config).await {
        Ok(report) => {
            print_summary(&report);
            if let Some(fatal) = &report.fatal_error {
                error!(error = %fatal, "Run aborted; committed progress is kept");
                ExitCode::from(EXIT_FATAL)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            error!(error = format!("{:#}", e), "Backup could not start");
            ExitCode::from(EXIT_USAGE)
        }
    }
}

async fn run(config: BackupConfig) -> Result<RunReport> {
    tokio::fs::create_dir_all(&config.out_root)
        .await
        .with_context(|| format!("creating output directory {}", config.out_root.display()))?;

    let db_options = SqliteConnectOptions::new()
        .filename(&config.state_db_path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(db_options)
        .await
        .context("opening state database")?;

    let store = Arc::new(SqliteCursorStore::new(pool));
    store
        .init_schema()
        .await
        .context("initializing state database")?;

    let http_client = Arc::new(ReqwestHttpClient::new());
    let connector = Arc::new(
        DropboxTeamConnector::new(http_client, config.token.clone())
            .with_retry_policy(config.page_retry.clone()),
    );
    let mirror = Arc::new(LocalMirror::new(&config.out_root));
    let events = EventBus::new(config.event_buffer);

    let orchestrator = Orchestrator::new(connector, store, mirror, events, config);

    let cancel = orchestrator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; finishing current pages, then stopping");
            cancel.cancel();
        }
    });

    Ok(orchestrator.run().await)
}

fn print_summary(report: &RunReport) {
    println!(
        "Members: {} attempted, {} committed, {} failed",
        report.members_attempted(),
        report.members_committed(),
        report.members_failed()
    );
    println!(
        "Files:   {} written ({} bytes), {} removed, {} skipped, {} errors",
        report.files_written(),
        report.bytes_written(),
        report.files_removed(),
        report.entries_skipped(),
        report.entry_errors()
    );
    println!("Elapsed: {}s", report.duration.as_secs());
}
