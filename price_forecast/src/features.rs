//! Engineered regressors derived from price history
//!
//! Two columns are added to every row:
//! - `bias_adjust`: the constant 1.0. It carries no information; the model
//!   needs every declared regressor to have a value at fit and predict time.
//! - `event_peak`: 1 when the absolute close-to-close change exceeds the
//!   percentage threshold or the volume exceeds the volume quantile.

use crate::config::{FeatureConfig, ThresholdPolicy};
use crate::data::HistoricalObservation;
use crate::error::{ForecastError, Result};
use crate::models::Observation;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use trade_math::stats::{pct_change, quantile};

/// Regressor name of the constant bias column
pub const BIAS_ADJUST: &str = "bias_adjust";
/// Regressor name of the traded volume
pub const VOLUME: &str = "volume";
/// Regressor name of the binary event flag
pub const EVENT_PEAK: &str = "event_peak";

/// Historical row extended with the engineered regressors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineeredRow {
    pub observation: HistoricalObservation,
    pub bias_adjust: f64,
    pub event_peak: u8,
}

impl EngineeredRow {
    /// Model input: close as the target, the three regressors by name
    pub fn to_observation(&self) -> Observation {
        let mut regressors = BTreeMap::new();
        regressors.insert(BIAS_ADJUST.to_string(), self.bias_adjust);
        regressors.insert(VOLUME.to_string(), self.observation.volume);
        regressors.insert(EVENT_PEAK.to_string(), f64::from(self.event_peak));

        Observation {
            date: self.observation.date,
            y: self.observation.close,
            regressors,
        }
    }
}

/// Convert engineered rows into model observations
pub fn to_observations(rows: &[EngineeredRow]) -> Vec<Observation> {
    rows.iter().map(EngineeredRow::to_observation).collect()
}

/// Cut-offs that mark a row as an event
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventThresholds {
    /// Absolute close-to-close change
    pub pct_change: f64,
    /// Volume level; rows strictly above it are events
    pub volume: f64,
}

impl EventThresholds {
    /// Derive thresholds from `rows`
    pub fn from_rows(rows: &[HistoricalObservation], config: &FeatureConfig) -> Result<Self> {
        let volumes: Vec<f64> = rows.iter().map(|r| r.volume).collect();
        let volume = quantile(&volumes, config.volume_quantile)?;

        Ok(Self {
            pct_change: config.pct_threshold,
            volume,
        })
    }

    /// Derive thresholds for a table whose last `holdout` rows will be held out.
    ///
    /// Under [`ThresholdPolicy::TrainingOnly`] the volume quantile only sees the
    /// leading `len - holdout` rows.
    pub fn for_split(
        rows: &[HistoricalObservation],
        holdout: usize,
        config: &FeatureConfig,
    ) -> Result<Self> {
        let source = match config.threshold_policy {
            ThresholdPolicy::FullHistory => rows,
            ThresholdPolicy::TrainingOnly => {
                if holdout >= rows.len() {
                    return Err(ForecastError::InsufficientData(format!(
                        "Holdout of {} rows leaves no training rows in a table of {}",
                        holdout,
                        rows.len()
                    )));
                }
                &rows[..rows.len() - holdout]
            }
        };
        Self::from_rows(source, config)
    }
}

/// Apply the thresholds to every row of the table.
///
/// The first row has no predecessor, so only the volume condition applies to it.
pub fn derive_features(
    rows: &[HistoricalObservation],
    thresholds: &EventThresholds,
) -> Vec<EngineeredRow> {
    let closes: Vec<f64> = rows.iter().map(|r| r.close).collect();
    let changes = pct_change(&closes);

    rows.iter()
        .zip(changes)
        .map(|(row, change)| {
            let price_event = change.is_some_and(|c| c.abs() > thresholds.pct_change);
            let volume_event = row.volume > thresholds.volume;

            EngineeredRow {
                observation: row.clone(),
                bias_adjust: 1.0,
                event_peak: u8::from(price_event || volume_event),
            }
        })
        .collect()
}
