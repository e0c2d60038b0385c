//! Pipeline configuration
//!
//! Every stage receives the section it needs explicitly; nothing is read from
//! module-level constants. All fields default to the values the pipeline was
//! tuned with, so an empty TOML document is a valid configuration.

use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Full configuration for training, evaluation and forecasting
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub paths: PathsConfig,
    pub features: FeatureConfig,
    pub training: TrainingConfig,
    pub evaluation: EvaluationConfig,
    pub model: ModelConfig,
}

impl PipelineConfig {
    /// Check cross-field constraints that serde cannot express
    pub fn validate(&self) -> Result<()> {
        self.features.validate()?;
        self.training.validate()?;
        self.model.validate()?;
        if self.evaluation.test_size == 0 {
            return Err(ForecastError::InvalidParameter(
                "evaluation.test_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Storage locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Historical price table (CSV)
    pub data: PathBuf,
    /// Fitted model artifact
    pub model: PathBuf,
    /// Metrics record written by the evaluator
    pub metrics: PathBuf,
    /// Holiday and corporate-event table; no calendar effects when unset
    pub calendar: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data: PathBuf::from("data/stock_data.csv"),
            model: PathBuf::from("model/price_model.bin"),
            metrics: PathBuf::from("model/metrics.json"),
            calendar: Some(PathBuf::from("calendars/market_events.csv")),
        }
    }
}

/// Which rows the event thresholds are derived from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdPolicy {
    /// Only the training partition; the holdout never influences the threshold
    #[default]
    TrainingOnly,
    /// The whole table, including rows that are later held out
    FullHistory,
}

/// Event-flag derivation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Absolute daily close change above which a row is an event
    pub pct_threshold: f64,
    /// Volume quantile above which a row is an event
    pub volume_quantile: f64,
    pub threshold_policy: ThresholdPolicy,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            pct_threshold: 0.03,
            volume_quantile: 0.99,
            threshold_policy: ThresholdPolicy::TrainingOnly,
        }
    }
}

impl FeatureConfig {
    fn validate(&self) -> Result<()> {
        if !(self.pct_threshold > 0.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "features.pct_threshold must be positive, got {}",
                self.pct_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.volume_quantile) {
            return Err(ForecastError::InvalidParameter(format!(
                "features.volume_quantile must be within [0, 1], got {}",
                self.volume_quantile
            )));
        }
        Ok(())
    }
}

/// One grid-search candidate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HyperparameterSet {
    /// Prior scale of trend changepoint deltas
    pub changepoint_prior_scale: f64,
    /// Prior scale of seasonal Fourier coefficients
    pub seasonality_prior_scale: f64,
}

impl HyperparameterSet {
    pub fn new(changepoint_prior_scale: f64, seasonality_prior_scale: f64) -> Self {
        Self {
            changepoint_prior_scale,
            seasonality_prior_scale,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.changepoint_prior_scale > 0.0) || !(self.seasonality_prior_scale > 0.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "Prior scales must be positive, got {}",
                self
            )));
        }
        Ok(())
    }
}

impl std::fmt::Display for HyperparameterSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "changepoint_prior_scale={}, seasonality_prior_scale={}",
            self.changepoint_prior_scale, self.seasonality_prior_scale
        )
    }
}

/// Grid search settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Trailing rows held out to score each candidate
    pub validation_days: usize,
    pub candidates: Vec<HyperparameterSet>,
    /// Trailing window used to project volume into the forecast horizon
    pub future_volume_window: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            validation_days: 60,
            candidates: vec![
                HyperparameterSet::new(0.03, 0.1),
                HyperparameterSet::new(0.05, 0.1),
                HyperparameterSet::new(0.1, 0.2),
                HyperparameterSet::new(0.3, 0.2),
            ],
            future_volume_window: 5,
        }
    }
}

impl TrainingConfig {
    fn validate(&self) -> Result<()> {
        if self.validation_days == 0 {
            return Err(ForecastError::InvalidParameter(
                "training.validation_days must be at least 1".to_string(),
            ));
        }
        if self.candidates.is_empty() {
            return Err(ForecastError::InvalidParameter(
                "training.candidates must not be empty".to_string(),
            ));
        }
        if self.future_volume_window == 0 {
            return Err(ForecastError::InvalidParameter(
                "training.future_volume_window must be at least 1".to_string(),
            ));
        }
        for candidate in &self.candidates {
            candidate.validate()?;
        }
        Ok(())
    }
}

/// Evaluation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Trailing rows scored against the persisted model
    pub test_size: usize,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self { test_size: 30 }
    }
}

/// How seasonal, holiday and regressor effects combine with the trend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeasonalityMode {
    /// `y = trend + effects`
    Additive,
    /// `y = trend * (1 + effects)`
    #[default]
    Multiplicative,
}

/// A periodic component expressed as a Fourier series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalityConfig {
    pub name: String,
    /// Cycle length in days
    pub period: f64,
    pub fourier_order: usize,
}

impl SeasonalityConfig {
    pub fn new(name: &str, period: f64, fourier_order: usize) -> Self {
        Self {
            name: name.to_string(),
            period,
            fourier_order,
        }
    }
}

/// Fixed model structure shared by every grid-search candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub yearly_seasonality: bool,
    pub weekly_seasonality: bool,
    pub daily_seasonality: bool,
    pub seasonality_mode: SeasonalityMode,
    pub custom_seasonalities: Vec<SeasonalityConfig>,
    pub holidays_prior_scale: f64,
    /// Prior scale applied to `bias_adjust`, `volume` and `event_peak`
    pub regressor_prior_scale: f64,
    pub n_changepoints: usize,
    /// Fraction of the history in which changepoints may be placed
    pub changepoint_range: f64,
    /// Coverage of the uncertainty interval
    pub interval_width: f64,
    /// Alternating trend/effect refinement passes
    pub fit_iterations: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            yearly_seasonality: true,
            weekly_seasonality: true,
            daily_seasonality: false,
            seasonality_mode: SeasonalityMode::Multiplicative,
            custom_seasonalities: vec![
                SeasonalityConfig::new("quarterly", 91.25, 5),
                SeasonalityConfig::new("monthly", 30.5, 5),
            ],
            holidays_prior_scale: 0.3,
            regressor_prior_scale: 0.5,
            n_changepoints: 25,
            changepoint_range: 0.8,
            interval_width: 0.8,
            fit_iterations: 8,
        }
    }
}

impl ModelConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.holidays_prior_scale > 0.0) || !(self.regressor_prior_scale > 0.0) {
            return Err(ForecastError::InvalidParameter(
                "model prior scales must be positive".to_string(),
            ));
        }
        if !(self.changepoint_range > 0.0 && self.changepoint_range <= 1.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "model.changepoint_range must be within (0, 1], got {}",
                self.changepoint_range
            )));
        }
        if !(self.interval_width > 0.0 && self.interval_width < 1.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "model.interval_width must be within (0, 1), got {}",
                self.interval_width
            )));
        }
        if self.fit_iterations == 0 {
            return Err(ForecastError::InvalidParameter(
                "model.fit_iterations must be at least 1".to_string(),
            ));
        }
        for seasonality in &self.custom_seasonalities {
            if !(seasonality.period > 0.0) || seasonality.fourier_order == 0 {
                return Err(ForecastError::InvalidParameter(format!(
                    "Seasonality '{}' needs a positive period and order",
                    seasonality.name
                )));
            }
        }
        Ok(())
    }
}
