//! Application configuration and logging setup
//!
//! Every section of the TOML file is optional; missing sections and fields
//! take their defaults, and a missing file yields the default configuration.

use anyhow::{Context, Result};
use forecast_api::ServerConfig;
use price_forecast::config::{
    EvaluationConfig, FeatureConfig, ModelConfig, PathsConfig, PipelineConfig, TrainingConfig,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub features: FeatureConfig,
    #[serde(default)]
    pub training: TrainingConfig,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Read `path`, or fall back to defaults when it does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)?;
        config.pipeline().validate()?;
        Ok(config)
    }

    /// The sections the training and evaluation pipeline consumes
    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            paths: self.paths.clone(),
            features: self.features.clone(),
            training: self.training.clone(),
            evaluation: self.evaluation.clone(),
            model: self.model.clone(),
        }
    }

    /// Sample configuration file with every default spelled out
    pub fn sample_toml() -> Result<String> {
        let content = toml::to_string_pretty(&Self::default())?;
        Ok(format!(
            "# closecast configuration\n# See: closecast --help\n\n{}",
            content
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    /// Also log to this file, as JSON
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            log_file: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. With a log file,
/// both stdout and the file receive JSON lines.
pub fn setup_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| {
        Ok::<_, anyhow::Error>(
            EnvFilter::try_new(&config.level)?
                .add_directive("hyper=warn".parse()?)
                .add_directive("polars=warn".parse()?),
        )
    })?;

    if let Some(log_path) = &config.log_file {
        if let Some(parent) = log_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::File::create(log_path)
            .with_context(|| format!("creating log file {}", log_path.display()))?;

        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .json(),
            )
            .try_init()?;
        return Ok(());
    }

    match config.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .try_init(),
        LogFormat::Compact => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init(),
    }
    .map_err(|e| anyhow::anyhow!(e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use price_forecast::config::{SeasonalityMode, ThresholdPolicy};

    #[test]
    fn test_empty_document_is_default() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_partial_sections() {
        let config = AppConfig::from_toml(
            r#"
            [features]
            threshold_policy = "full_history"

            [model]
            seasonality_mode = "additive"

            [server]
            port = 9100

            [logging]
            format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.features.threshold_policy, ThresholdPolicy::FullHistory);
        assert_eq!(config.features.pct_threshold, 0.03);
        assert_eq!(config.model.seasonality_mode, SeasonalityMode::Additive);
        assert_eq!(config.model.n_changepoints, 25);
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(AppConfig::from_toml("[evaluation]\ntest_size = 0\n").is_err());
        assert!(AppConfig::from_toml("[training]\ncandidates = []\n").is_err());
    }

    #[test]
    fn test_sample_round_trips() {
        let sample = AppConfig::sample_toml().unwrap();
        let parsed = AppConfig::from_toml(&sample).unwrap();
        assert_eq!(parsed, AppConfig::default());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }
}
