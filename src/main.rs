use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use pepper_forecast::service::ErrorResponse;
use pepper_forecast::{Config, ForecastError, ForecastService};

#[derive(Parser)]
#[command(name = "pepper-forecast")]
#[command(about = "Monthly pepper price forecasts from per-entity sequence models")]
struct Cli {
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Forecast the price for an entity on a future date
    Predict {
        family: String,
        entity: String,
        /// ISO-8601 date, e.g. 2025-09-30
        target_date: String,
    },
    /// List entities with a persisted model
    Entities { family: String },
    /// Show the observed history an entity's forecasts start from
    History { family: String, entity: String },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = Config::from_file(&cli.config)?;

    // Logs go to stderr so stdout stays machine-readable.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("Starting pepper-forecast with {} model families", config.families.len());
    let service = ForecastService::from_config(&config);
    debug!("Families: {:?}", service.family_names());

    let outcome = match &cli.command {
        Command::Predict {
            family,
            entity,
            target_date,
        } => emit(service.predict(family, entity, target_date).await)?,
        Command::Entities { family } => emit(service.entities(family).await)?,
        Command::History { family, entity } => emit(service.history(family, entity).await)?,
    };

    Ok(outcome)
}

fn emit<T: Serialize>(result: Result<T, ForecastError>) -> Result<ExitCode> {
    match result {
        Ok(body) => {
            println!("{}", serde_json::to_string_pretty(&body)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            println!("{}", serde_json::to_string_pretty(&ErrorResponse::from(&e))?);
            Ok(ExitCode::FAILURE)
        }
    }
}
