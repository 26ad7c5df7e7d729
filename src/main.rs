use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;

use tracing::error;

use trainsync::error::ErrorSeverity;
use trainsync::logging::{init_logging, LogLevel};
use trainsync::{LogStore, Reconciler, Status, SyncConfig};

/// trainsync - Training Log Reconciliation CLI
///
/// Merges a parsed training plan with activities recorded by fitness
/// providers into one append-only daily training log.
#[derive(Parser)]
#[command(name = "trainsync")]
#[command(version)]
#[command(about = "Training plan and activity reconciliation", long_about = None)]
struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase verbosity of output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile plan and activities into the training log
    Sync {
        /// Parsed plan entries (JSON)
        #[arg(short, long)]
        plan: Option<PathBuf>,

        /// Activity cache (JSON), repeat for several providers
        #[arg(short, long)]
        activities: Vec<PathBuf>,

        /// Training log to update
        #[arg(short, long)]
        log: Option<PathBuf>,

        /// Reconcile as of this date (YYYY-MM-DD, default: today)
        #[arg(short, long)]
        today: Option<NaiveDate>,

        /// Days of past activities to consider
        #[arg(short, long)]
        window_days: Option<i64>,
    },

    /// Inspect the training log without changing it
    Check {
        /// Training log to read
        #[arg(short, long)]
        log: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => SyncConfig::load_from_file(path)?,
        None => SyncConfig::load_or_default(),
    };
    config.logging.level = LogLevel::from_verbosity(config.logging.level, cli.verbose);
    init_logging(&config.logging)?;

    match cli.command {
        Commands::Sync {
            plan,
            activities,
            log,
            today,
            window_days,
        } => {
            if let Some(plan) = plan {
                config.paths.plan = plan;
            }
            if !activities.is_empty() {
                config.paths.activities = activities;
            }
            if let Some(log) = log {
                config.paths.log = log;
            }
            if let Some(days) = window_days {
                config.reconcile.activity_window_days = days;
            }
            config.validate()?;

            let today = today.unwrap_or_else(|| Local::now().date_naive());
            println!("{}", "Syncing training log...".green().bold());
            println!("  Log: {}", config.paths.log.display());
            println!("  As of: {}", today);

            let reconciler = Reconciler::new(config.reconcile.clone());
            let outcome = reconciler.sync(&config.paths, today).map_err(|e| {
                if e.severity() == ErrorSeverity::Critical {
                    error!("Sync aborted: {}", e);
                }
                anyhow::anyhow!("{} ({})", e.user_message(), e)
            })?;

            let report = &outcome.report;
            println!("  Plan entries: {} ({} new)", report.plans_ingested, report.pending_created);
            println!(
                "  Activities: {} linked, {} unplanned, {} already logged",
                report.linked, report.unplanned_created, report.skipped_consumed
            );
            if !report.issues.is_empty() {
                println!(
                    "{}",
                    format!("  {} records skipped for data quality", report.issues.len()).yellow()
                );
            }
            println!(
                "{}",
                format!("✓ Synced {} records", outcome.records.len()).green()
            );
        }

        Commands::Check { log } => {
            let store = LogStore::new(log.unwrap_or(config.paths.log));
            let loaded = store
                .load()
                .with_context(|| format!("Failed to read {}", store.path().display()))?;

            println!("{}", "Training log summary".cyan().bold());
            println!("  Log: {}", store.path().display());
            println!("  Records: {}", loaded.records.len());
            if !loaded.rejected.is_empty() {
                println!("  Undecodable elements kept as-is: {}", loaded.rejected.len());
            }
            for status in [Status::Completed, Status::Missed, Status::Planned, Status::Unplanned] {
                let count = loaded
                    .records
                    .iter()
                    .filter(|r| r.status == Some(status))
                    .count();
                println!("  {}: {}", status, count);
            }

            for issue in &loaded.issues {
                println!("{}", format!("  ⚠ {}", issue).yellow());
            }
        }
    }

    Ok(())
}
