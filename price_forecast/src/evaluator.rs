//! Holdout evaluation of a persisted model

use crate::config::PipelineConfig;
use crate::data::PriceHistory;
use crate::error::{ForecastError, Result};
use crate::features::{derive_features, to_observations, EventThresholds};
use crate::metrics::{mape_label, r2_label, round4, ForecastMetrics};
use crate::models::{point_estimates, TrainedForecastModel};
use crate::persist::{write_atomic, ModelArtifact};
use crate::utils::{frame_for_dates, future_regressors, trailing_split};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Human-readable reading of each metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanations {
    pub mape: String,
    pub rmse: String,
    pub r2: String,
}

impl Explanations {
    fn for_metrics(metrics: &ForecastMetrics) -> Self {
        Self {
            mape: format!(
                "MAPE (erro percentual médio) mostra que em média as previsões estão {:.2}% \
                 distantes do real; quanto menor melhor. O valor atual é considerado {}.",
                metrics.mape,
                mape_label(metrics.mape)
            ),
            rmse: "RMSE mede o erro médio em dólares; números menores indicam previsões \
                   mais próximas."
                .to_string(),
            r2: format!(
                "R² indica quanta variabilidade o modelo explica; valores perto de 1 são bons. \
                 O valor atual ({:.2}) é considerado {}.",
                metrics.r2,
                r2_label(metrics.r2)
            ),
        }
    }
}

/// Outcome of one evaluation run, as written to disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRecord {
    pub timestamp: DateTime<Utc>,
    pub test_size: usize,
    pub mape: f64,
    pub rmse: f64,
    pub r2: f64,
    pub explanations: Explanations,
}

impl MetricsRecord {
    /// Record with every value rounded to four decimals
    pub fn new(test_size: usize, metrics: &ForecastMetrics) -> Self {
        Self {
            timestamp: Utc::now(),
            test_size,
            mape: round4(metrics.mape),
            rmse: round4(metrics.rmse),
            r2: round4(metrics.r2),
            explanations: Explanations::for_metrics(metrics),
        }
    }
}

/// Score `artifact` on the trailing `evaluation.test_size` rows of `history`.
///
/// Regressors are re-derived from the table with the configured threshold
/// policy. Future volume is held at the trailing mean of the evaluation's
/// training partition. An artifact without fitted history is rejected.
pub fn evaluate(
    history: &PriceHistory,
    artifact: &ModelArtifact,
    config: &PipelineConfig,
) -> Result<MetricsRecord> {
    let model = &artifact.model;
    if model.history().is_empty() {
        return Err(ForecastError::DegradedModel(
            "Model artifact carries no fitted history; retrain before evaluating".to_string(),
        ));
    }

    let test_size = config.evaluation.test_size;
    let thresholds = EventThresholds::for_split(history.rows(), test_size, &config.features)?;
    let observations = to_observations(&derive_features(history.rows(), &thresholds));
    let (train, holdout) = trailing_split(&observations, test_size)?;

    let regressors = future_regressors(train, config.training.future_volume_window)?;
    let dates: Vec<_> = holdout.iter().map(|obs| obs.date).collect();
    let forecast = model.predict(&frame_for_dates(&dates, &regressors))?;

    let actual: Vec<f64> = holdout.iter().map(|obs| obs.y).collect();
    let metrics = ForecastMetrics::compute(&actual, &point_estimates(&forecast))?;

    info!(
        asset = %artifact.asset,
        test_size,
        mape = metrics.mape,
        rmse = metrics.rmse,
        r2 = metrics.r2,
        "Evaluated model"
    );

    Ok(MetricsRecord::new(test_size, &metrics))
}

/// Location of the metrics record
#[derive(Debug, Clone)]
pub struct MetricsStore {
    path: PathBuf,
}

impl MetricsStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrite the record as pretty JSON
    pub fn write(&self, record: &MetricsRecord) -> Result<()> {
        let json = serde_json::to_vec_pretty(record)?;
        write_atomic(&self.path, &json)?;
        info!(path = %self.path.display(), "Saved metrics record");
        Ok(())
    }

    pub fn read(&self) -> Result<MetricsRecord> {
        let bytes = fs::read(&self.path).map_err(|e| {
            ForecastError::DataUnavailable(format!(
                "Cannot read metrics '{}': {}",
                self.path.display(),
                e
            ))
        })?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
