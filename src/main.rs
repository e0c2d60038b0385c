//! closecast command-line tool
//!
//! - `train`: grid search, refit and persist the model
//! - `evaluate`: score the persisted model and write the metrics record
//! - `predict`: print a forecast from the persisted model
//! - `serve`: run the HTTP forecast server
//! - `generate-config`: write a sample TOML configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use closecast::config::{setup_logging, AppConfig, LogFormat};
use forecast_api::{serve, AppState};
use price_forecast::pipeline::{evaluate_pipeline, forecast_days, train_pipeline, validate_horizon};
use price_forecast::ModelStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "closecast")]
#[command(version, about = "Daily closing-price forecasting", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "closecast.toml")]
    config: PathBuf,

    /// Override the price history CSV
    #[arg(long)]
    data: Option<PathBuf>,

    /// Override the model artifact path
    #[arg(long)]
    model: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Output format
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,

    /// Log file path (logs to both file and stdout)
    #[arg(long)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Select hyperparameters on the validation window, refit and save the model
    Train,
    /// Evaluate the saved model on the trailing test window
    Evaluate,
    /// Print a forecast for the days after the history
    Predict {
        /// Number of calendar days (1-30)
        #[arg(short, long, default_value_t = 7)]
        days: i64,
    },
    /// Run the forecast HTTP server
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Generate a sample config file
    GenerateConfig {
        /// Output file path
        #[arg(short, long, default_value = "closecast.toml")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        error!("closecast failed: {err:#}");
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    if let Commands::GenerateConfig { output } = &cli.command {
        return generate_sample_config(output);
    }

    let mut config = AppConfig::load(&cli.config)?;
    apply_overrides(&mut config, &cli);
    setup_logging(&config.logging)?;

    match cli.command {
        Commands::Train => {
            let pipeline = config.pipeline();
            let report = tokio::task::spawn_blocking(move || train_pipeline(&pipeline))
                .await?
                .context("training failed")?;

            println!("Candidate scores (holdout MAPE):");
            for score in &report.scores {
                println!("  {:<60} {:>8.4}%", score.params.to_string(), score.mape);
            }
            println!(
                "Best: {} ({:.4}%), saved to {}",
                report.artifact.params,
                report.artifact.validation_mape,
                config.paths.model.display()
            );
        }
        Commands::Evaluate => {
            let pipeline = config.pipeline();
            let record = tokio::task::spawn_blocking(move || evaluate_pipeline(&pipeline))
                .await?
                .context("evaluation failed")?;

            println!("Metrics saved to {}", config.paths.metrics.display());
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Commands::Predict { days } => {
            let days = validate_horizon(days)?;
            let store = ModelStore::new(&config.paths.model);
            let artifact = store.load().context("loading model")?;
            let forecast = forecast_days(&artifact, days, config.training.future_volume_window)?;

            println!("{:<12} {:>10} {:>10} {:>10}", "date", "yhat", "lower", "upper");
            for row in forecast {
                println!(
                    "{:<12} {:>10.2} {:>10.2} {:>10.2}",
                    row.date, row.yhat, row.yhat_lower, row.yhat_upper
                );
            }
        }
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }

            let state = Arc::new(AppState::new(
                ModelStore::new(&config.paths.model),
                config.training.future_volume_window,
                &config.server.api_version,
            ));
            serve(&config.server, state)
                .await
                .with_context(|| format!("serving on {}", config.server.bind_address()))?;
            info!("Forecast server stopped");
        }
        Commands::GenerateConfig { .. } => {}
    }

    Ok(())
}

fn apply_overrides(config: &mut AppConfig, cli: &Cli) {
    if let Some(data) = &cli.data {
        config.paths.data = data.clone();
    }
    if let Some(model) = &cli.model {
        config.paths.model = model.clone();
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }
    if let Some(file) = &cli.log_file {
        config.logging.log_file = Some(file.clone());
    }
}

fn generate_sample_config(path: &Path) -> Result<()> {
    let content = AppConfig::sample_toml()?;
    std::fs::write(path, content).with_context(|| format!("writing {}", path.display()))?;
    println!("Sample config written to: {}", path.display());
    Ok(())
}
