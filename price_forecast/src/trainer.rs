//! Grid search over hyperparameter candidates
//!
//! Every candidate is fitted on the training partition and scored by MAPE on
//! the holdout. The winner is refitted on training + holdout; that refit is the
//! model that gets persisted and its error is not re-measured.

use crate::config::HyperparameterSet;
use crate::error::{ForecastError, Result};
use crate::metrics::mape;
use crate::models::{point_estimates, ForecastModel, Observation, TrainedForecastModel};
use crate::utils::{frame_for_dates, future_regressors};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Holdout score of one candidate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    pub params: HyperparameterSet,
    pub mape: f64,
}

/// Result of a grid search
#[derive(Debug)]
pub struct TrainingOutcome<T> {
    /// Winner refitted on the full dataset
    pub model: T,
    pub best_params: HyperparameterSet,
    /// Holdout MAPE of the winner
    pub best_score: f64,
    /// Every candidate in evaluation order
    pub scores: Vec<CandidateScore>,
}

/// Forecast the holdout dates from a model fitted on the preceding rows
pub fn forecast_holdout<T: TrainedForecastModel>(
    fitted: &T,
    holdout: &[Observation],
    volume_window: usize,
) -> Result<Vec<f64>> {
    let regressors = future_regressors(fitted.history(), volume_window)?;
    let dates: Vec<_> = holdout.iter().map(|obs| obs.date).collect();
    let forecast = fitted.predict(&frame_for_dates(&dates, &regressors))?;
    Ok(point_estimates(&forecast))
}

/// Pick the candidate with the lowest holdout MAPE and refit it on all rows.
///
/// Ties resolve to the earliest candidate. A zero actual in the holdout aborts
/// the search.
pub fn select_and_fit<M, F>(
    train: &[Observation],
    holdout: &[Observation],
    candidates: &[HyperparameterSet],
    volume_window: usize,
    build: F,
) -> Result<TrainingOutcome<M::Trained>>
where
    M: ForecastModel,
    F: Fn(HyperparameterSet) -> Result<M>,
{
    if candidates.is_empty() {
        return Err(ForecastError::InvalidParameter(
            "At least one hyperparameter candidate is required".to_string(),
        ));
    }
    if holdout.is_empty() {
        return Err(ForecastError::InsufficientData(
            "Holdout partition is empty".to_string(),
        ));
    }

    let actual: Vec<f64> = holdout.iter().map(|obs| obs.y).collect();
    let mut scores = Vec::with_capacity(candidates.len());
    let mut best: Option<CandidateScore> = None;

    for params in candidates {
        let model = build(*params)?;
        let fitted = model.train(train)?;
        let predicted = forecast_holdout(&fitted, holdout, volume_window)?;
        let score = mape(&actual, &predicted)?;

        info!(params = %params, mape = score, "Scored candidate");

        let candidate = CandidateScore {
            params: *params,
            mape: score,
        };
        if best.map_or(true, |b| candidate.mape < b.mape) {
            best = Some(candidate);
        }
        scores.push(candidate);
    }

    let best = best.ok_or_else(|| {
        ForecastError::ComputationError("No candidate produced a score".to_string())
    })?;
    info!(params = %best.params, mape = best.mape, "Selected best candidate");

    let mut full = Vec::with_capacity(train.len() + holdout.len());
    full.extend_from_slice(train);
    full.extend_from_slice(holdout);
    let model = build(best.params)?.train(&full)?;

    info!(
        model = model.name(),
        observations = full.len(),
        "Refitted winner on the full dataset"
    );

    Ok(TrainingOutcome {
        model,
        best_params: best.params,
        best_score: best.mape,
        scores,
    })
}
