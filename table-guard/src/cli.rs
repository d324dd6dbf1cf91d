//! Command-line interface
//!
//! The binary only parses arguments and prints; each command is a plain
//! function here so it can be tested without a process.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use shared::error::{AppError, AppResult};
use shared::models::Table;
use tokio_util::sync::CancellationToken;

use crate::core::Config;
use crate::reconcile::{DetectReport, Snapshot, coalesce, detect, normalize};
use crate::store::MemoryStore;
use crate::worker::{ReconcileWorker, Reconciler};

#[derive(Parser, Debug)]
#[command(name = "table-guard")]
#[command(author, version, about = "Detect and repair table/order pointer inconsistencies")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log level (overrides LOG_LEVEL)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// JSON log output (overrides LOG_JSON)
    #[arg(long, global = true)]
    pub json_logs: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Detect inconsistencies in a snapshot file and print the report
    Check {
        /// Snapshot JSON: {"tables": [...], "openOrders": [...]}
        snapshot: PathBuf,

        /// Write the snapshot with every fix applied to this file
        #[arg(long)]
        apply: Option<PathBuf>,

        /// Print one merged update per record instead of the raw fix list
        #[arg(long)]
        coalesce: bool,
    },

    /// Normalize a table record, or an array of them
    Normalize {
        /// Table JSON as delivered by a realtime payload or cache
        table: PathBuf,
    },

    /// Seed an in-memory store from a snapshot and reconcile it until Ctrl-C
    Watch {
        snapshot: PathBuf,

        /// Seconds between passes (overrides RECONCILE_INTERVAL_SECS)
        #[arg(long)]
        interval: Option<u64>,

        /// Detect and log only
        #[arg(long)]
        dry_run: bool,

        /// Write the final store state to this file on shutdown
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn read_file(path: &Path) -> AppResult<String> {
    std::fs::read_to_string(path).map_err(|e| {
        AppError::snapshot(format!("Failed to read {}: {}", path.display(), e))
            .with_detail("path", path.display().to_string())
    })
}

/// Pretty-print `value` as JSON into `path`
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> AppResult<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).map_err(|e| {
        AppError::internal(format!("Failed to write {}: {}", path.display(), e))
            .with_detail("path", path.display().to_string())
    })
}

/// `check`: detect, optionally write the repaired snapshot
pub fn run_check(
    snapshot_path: &Path,
    apply_to: Option<&Path>,
    coalesced: bool,
) -> AppResult<DetectReport> {
    let snapshot = Snapshot::load(snapshot_path)?;
    let mut report = detect(&snapshot);

    let counts = report.severity_counts();
    tracing::info!(
        tables = snapshot.tables.len(),
        open_orders = snapshot.open_orders.len(),
        high = counts.high,
        medium = counts.medium,
        low = counts.low,
        fixes = report.fixes.len(),
        "Snapshot checked"
    );

    if let Some(out) = apply_to {
        let mut repaired = snapshot;
        repaired.apply_fixes(&report.fixes);
        write_json(out, &repaired)?;
        tracing::info!(path = %out.display(), "Repaired snapshot written");
    }

    if coalesced {
        report.fixes = coalesce(&report.fixes);
    }
    Ok(report)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TableInput {
    Many(Vec<Table>),
    One(Box<Table>),
}

/// `normalize`: one table in, one normalized table out (arrays map element-wise)
pub fn run_normalize(path: &Path) -> AppResult<serde_json::Value> {
    let input: TableInput = serde_json::from_str(&read_file(path)?)?;
    let value = match input {
        TableInput::Many(tables) => {
            serde_json::to_value(tables.iter().map(normalize).collect::<Vec<_>>())?
        }
        TableInput::One(table) => serde_json::to_value(normalize(&table))?,
    };
    Ok(value)
}

/// `watch`: run the worker over an in-memory copy of the snapshot until
/// `shutdown` fires; returns the store for inspection.
pub async fn run_watch(
    snapshot_path: &Path,
    config: &Config,
    shutdown: CancellationToken,
) -> AppResult<Arc<MemoryStore>> {
    let snapshot = Snapshot::load(snapshot_path)?;
    let store = Arc::new(MemoryStore::from_snapshot(&snapshot));
    tracing::info!(
        path = %snapshot_path.display(),
        tables = snapshot.tables.len(),
        open_orders = snapshot.open_orders.len(),
        "Store seeded from snapshot"
    );

    let reconciler = Reconciler::new(store.clone(), config.dry_run);
    ReconcileWorker::new(reconciler, config, shutdown).run().await;
    Ok(store)
}
