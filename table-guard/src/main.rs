use anyhow::Context;
use clap::Parser;
use table_guard::cli::{self, Cli, Command};
use table_guard::{Config, setup_logging};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    let _ = dotenv::dotenv();

    let args = Cli::parse();

    let mut config = Config::from_env();
    if let Some(level) = args.log_level.clone() {
        config.log_level = level;
    }
    if args.json_logs {
        config.log_json = true;
    }

    match args.command {
        Command::Check {
            snapshot,
            apply,
            coalesce,
        } => {
            setup_logging(&config)?;
            let report = cli::run_check(&snapshot, apply.as_deref(), coalesce)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Normalize { table } => {
            setup_logging(&config)?;
            let normalized = cli::run_normalize(&table)?;
            println!("{}", serde_json::to_string_pretty(&normalized)?);
        }
        Command::Watch {
            snapshot,
            interval,
            dry_run,
            out,
        } => {
            if let Some(secs) = interval {
                config.interval_secs = secs;
            }
            config.dry_run |= dry_run;
            config.validate()?;
            setup_logging(&config)?;

            tracing::info!("Starting table-guard (env: {})", config.environment);

            let shutdown = CancellationToken::new();
            let token = shutdown.clone();
            tokio::spawn(async move {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        tracing::info!("Ctrl-C received, shutting down");
                        token.cancel();
                    }
                    Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl-C"),
                }
            });

            let store = cli::run_watch(&snapshot, &config, shutdown).await?;
            if let Some(out) = out {
                cli::write_json(&out, &store.dump())
                    .with_context(|| format!("writing final state to {}", out.display()))?;
            }
        }
    }

    Ok(())
}
