//! Forecasting models for daily price series

use crate::error::{ForecastError, Result};
use crate::utils::{frame_for_dates, future_dates};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;

/// One fitted-history row: the target plus named regressor values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: NaiveDate,
    /// Observed close
    pub y: f64,
    pub regressors: BTreeMap<String, f64>,
}

/// One row of a frame to predict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FutureRow {
    pub date: NaiveDate,
    pub regressors: BTreeMap<String, f64>,
}

/// Point estimate with its uncertainty interval
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastRow {
    pub date: NaiveDate,
    pub yhat: f64,
    pub yhat_lower: f64,
    pub yhat_upper: f64,
}

/// Point estimates of a forecast, in order
pub fn point_estimates(rows: &[ForecastRow]) -> Vec<f64> {
    rows.iter().map(|r| r.yhat).collect()
}

/// Trained forecast model
pub trait TrainedForecastModel: Debug {
    /// Predict every row of `frame`
    fn predict(&self, frame: &[FutureRow]) -> Result<Vec<ForecastRow>>;

    /// Rows the model was fitted on
    fn history(&self) -> &[Observation];

    /// Name of the model
    fn name(&self) -> &str;

    /// Calendar days after the fitted history, with the given regressor values
    fn make_future_frame(
        &self,
        periods: usize,
        regressors: &BTreeMap<String, f64>,
    ) -> Result<Vec<FutureRow>> {
        let last = self.history().last().map(|obs| obs.date).ok_or_else(|| {
            ForecastError::DegradedModel("Model has no fitted history".to_string())
        })?;
        let dates = future_dates(last, periods)?;
        Ok(frame_for_dates(&dates, regressors))
    }
}

/// Forecast model that can be trained on a history of observations
pub trait ForecastModel: Debug + Clone {
    /// The type of trained model produced
    type Trained: TrainedForecastModel;

    /// Train the model on observations ordered by date
    fn train(&self, history: &[Observation]) -> Result<Self::Trained>;

    /// Get the name of the model
    fn name(&self) -> &str;
}

pub mod decomposition;
