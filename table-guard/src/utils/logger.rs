//! Logging Infrastructure
//!
//! Console output plus optional daily rotating files:
//! - `app/`: everything except reconcile findings (deleted after 14 days)
//! - `reconcile/`: findings and applied fixes, `reconcile` target only (kept)

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, prelude::*};

/// Target for findings and fix outcomes
pub const RECONCILE_TARGET: &str = "reconcile";

/// Days application logs are kept
pub const APP_LOG_RETENTION_DAYS: i64 = 14;

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Date part of a rotated file name (`app.2024-05-01`)
fn rotated_date(name: &str, prefix: &str) -> Option<NaiveDate> {
    let date = name.strip_prefix(prefix)?.strip_prefix('.')?;
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

/// Delete rotated application logs older than `keep_days`
///
/// Returns the number of files removed.
pub fn cleanup_old_logs(log_dir: &Path, keep_days: i64) -> anyhow::Result<usize> {
    let cutoff = Utc::now().date_naive() - chrono::Duration::days(keep_days);

    let app_log_dir = log_dir.join("app");
    if !app_log_dir.exists() {
        return Ok(0);
    }

    let mut removed = 0;
    for entry in fs::read_dir(app_log_dir)? {
        let path = entry?.path();
        if let Some(name) = path.file_name().and_then(|n| n.to_str())
            && let Some(date) = rotated_date(name, "app")
            && date < cutoff
        {
            fs::remove_file(&path)?;
            tracing::info!(file = %name, "Deleted old log file");
            removed += 1;
        }
    }

    Ok(removed)
}

fn file_layer<F>(json_format: bool, appender: RollingFileAppender, level: &str, keep: F) -> BoxedLayer
where
    F: Fn(&tracing::Metadata<'_>) -> bool + Send + Sync + 'static,
{
    let writer = std::sync::Mutex::new(appender);
    if json_format {
        fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_writer(writer)
            .with_filter(env_filter(level))
            .with_filter(filter_fn(keep))
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false)
            .with_writer(writer)
            .with_filter(env_filter(level))
            .with_filter(filter_fn(keep))
            .boxed()
    }
}

/// Initialize the logging system with daily rotating logs
///
/// # Arguments
/// * `level` - Log level (e.g., "info", "debug", "warn"); `RUST_LOG` wins if set
/// * `json_format` - JSON output (production) or human-readable (development)
/// * `log_dir` - Optional directory for file logging
///
/// With a `log_dir`, a cleanup task is spawned, so call this inside a tokio runtime.
pub fn init_logger_with_file(
    level: &str,
    json_format: bool,
    log_dir: Option<&str>,
) -> anyhow::Result<()> {
    let mut layers: Vec<BoxedLayer> = Vec::new();

    // Console layer
    if json_format {
        layers.push(
            fmt::layer()
                .json()
                .with_target(true)
                .with_current_span(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .with_writer(std::io::stderr)
                .with_filter(env_filter(level))
                .boxed(),
        );
    } else {
        layers.push(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(true)
                .with_line_number(true)
                .with_writer(std::io::stderr)
                .with_filter(env_filter(level))
                .boxed(),
        );
    }

    if let Some(dir) = log_dir {
        let log_dir = Path::new(dir);
        let app_log_dir = log_dir.join("app");
        let reconcile_log_dir = log_dir.join("reconcile");
        fs::create_dir_all(&app_log_dir)?;
        fs::create_dir_all(&reconcile_log_dir)?;

        let app_log = RollingFileAppender::new(Rotation::DAILY, app_log_dir, "app");
        layers.push(file_layer(json_format, app_log, level, |meta| {
            meta.target() != RECONCILE_TARGET
        }));

        let reconcile_log =
            RollingFileAppender::new(Rotation::DAILY, reconcile_log_dir, RECONCILE_TARGET);
        layers.push(file_layer(json_format, reconcile_log, level, |meta| {
            meta.target() == RECONCILE_TARGET
        }));

        tokio::spawn(periodic_cleanup(log_dir.to_path_buf()));
    }

    tracing_subscriber::registry().with(layers).try_init()?;
    Ok(())
}

/// Periodic cleanup task - runs every hour to clean old logs
async fn periodic_cleanup(log_dir: PathBuf) {
    use tokio::time::{Duration, sleep};

    loop {
        if let Err(e) = cleanup_old_logs(&log_dir, APP_LOG_RETENTION_DAYS) {
            tracing::error!(error = %e, "Failed to cleanup old logs");
        }
        sleep(Duration::from_secs(3600)).await;
    }
}

/// Initialize the logging system (console only)
pub fn init_logger(level: &str, json_format: bool) -> anyhow::Result<()> {
    init_logger_with_file(level, json_format, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotated_date() {
        assert_eq!(
            rotated_date("app.2024-05-01", "app"),
            NaiveDate::from_ymd_opt(2024, 5, 1)
        );
        assert_eq!(rotated_date("app", "app"), None);
        assert_eq!(rotated_date("reconcile.2024-05-01", "app"), None);
        assert_eq!(rotated_date("app.garbage", "app"), None);
    }

    #[test]
    fn test_cleanup_removes_only_old_app_logs() {
        let dir = tempfile::tempdir().unwrap();
        let app = dir.path().join("app");
        let reconcile = dir.path().join("reconcile");
        fs::create_dir_all(&app).unwrap();
        fs::create_dir_all(&reconcile).unwrap();

        let today = Utc::now().date_naive().format("%Y-%m-%d").to_string();
        fs::write(app.join("app.2000-01-01"), "old").unwrap();
        fs::write(app.join(format!("app.{}", today)), "new").unwrap();
        fs::write(app.join("notes.txt"), "keep").unwrap();
        fs::write(reconcile.join("reconcile.2000-01-01"), "keep").unwrap();

        let removed = cleanup_old_logs(dir.path(), APP_LOG_RETENTION_DAYS).unwrap();
        assert_eq!(removed, 1);
        assert!(!app.join("app.2000-01-01").exists());
        assert!(app.join(format!("app.{}", today)).exists());
        assert!(app.join("notes.txt").exists());
        assert!(reconcile.join("reconcile.2000-01-01").exists());
    }

    #[test]
    fn test_cleanup_without_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(cleanup_old_logs(dir.path(), 14).unwrap(), 0);
    }
}
