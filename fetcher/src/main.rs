mod app;
mod archive;
mod ingest;
mod model;
mod pipeline;
mod store;
#[cfg(test)]
mod testing;
mod window;

use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use fetcher_core::{telemetry, Config};
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use std::process;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

#[derive(Parser)]
#[clap(name = "fetcher")]
#[clap(about = "Watermarked incremental fetcher for the consumer complaints feed", version)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the watermark table if it does not exist
    Migrate,

    /// Process the next window once
    Run {
        /// Treat this UTC date as today (YYYY-MM-DD)
        #[clap(long, env = "RUN_AS_OF")]
        as_of: Option<NaiveDate>,

        /// Trigger payload passed through to the handler
        #[clap(long, env = "RUN_EVENT", default_value = "{}")]
        event: String,
    },

    /// Show recent watermarks and the next pending window
    Status {
        /// Number of watermarks to list
        #[clap(long, default_value_t = 10, value_parser = clap::value_parser!(u32).range(1..))]
        limit: u32,

        /// Treat this UTC date as today (YYYY-MM-DD)
        #[clap(long)]
        as_of: Option<NaiveDate>,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        match e.downcast_ref::<fetcher_core::Error>() {
            Some(err) => error!(
                error = %err,
                kind = err.kind(),
                fatal = err.is_fatal(),
                "Invocation aborted"
            ),
            None => error!(error = %e, "Fatal error"),
        }
        process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Missing configuration fails before any I/O
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            telemetry::init(&Config::default().telemetry)?;
            return Err(e.into());
        }
    };

    let telemetry = telemetry::init(&config.telemetry)?;

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .acquire_timeout(std::time::Duration::from_secs(
            config.database.connect_timeout_secs,
        ))
        .connect(&config.database.url)
        .await
        .map_err(fetcher_core::Error::from)?;

    let result = match app::App::new(&config, pool.clone()).await {
        Ok(app) => execute(&app, cli.command).await,
        Err(e) => Err(e.into()),
    };

    pool.close().await;
    telemetry.shutdown();
    result
}

async fn execute(app: &app::App, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Migrate => {
            info!("Creating watermark table");
            app.migrate().await?;
            info!("Migration completed successfully");
        }

        Commands::Run { as_of, event } => {
            let event: Value = serde_json::from_str(&event)?;
            let today = as_of.unwrap_or_else(|| Utc::now().date_naive());

            let span = info_span!("invocation", run_id = %Uuid::new_v4(), %today);
            let response = app.handle(&event, today).instrument(span).await?;

            println!("{}", serde_json::to_string(&response)?);
        }

        Commands::Status { limit, as_of } => {
            let today = as_of.unwrap_or_else(|| Utc::now().date_naive());
            let report = app.status(limit, today).await?;

            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_limit_must_be_positive() {
        assert!(Cli::try_parse_from(["fetcher", "status", "--limit", "-1"]).is_err());
        assert!(Cli::try_parse_from(["fetcher", "status", "--limit", "0"]).is_err());

        let cli = Cli::try_parse_from(["fetcher", "status", "--limit", "25"]).unwrap();
        assert!(matches!(cli.command, Commands::Status { limit: 25, .. }));
    }

    #[test]
    fn status_limit_defaults_to_ten() {
        let cli = Cli::try_parse_from(["fetcher", "status"]).unwrap();
        assert!(matches!(cli.command, Commands::Status { limit: 10, .. }));
    }
}
