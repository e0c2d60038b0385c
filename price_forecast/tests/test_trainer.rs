use chrono::{Days, NaiveDate};
use price_forecast::config::HyperparameterSet;
use price_forecast::features::VOLUME;
use price_forecast::models::{ForecastModel, ForecastRow, FutureRow, Observation, TrainedForecastModel};
use price_forecast::trainer::select_and_fit;
use price_forecast::{ForecastError, Result};
use std::collections::BTreeMap;

/// Predicts the last training close inflated by a parameter-dependent offset,
/// so the holdout MAPE of a candidate is known in advance.
#[derive(Debug, Clone)]
struct OffsetModel {
    params: HyperparameterSet,
}

#[derive(Debug)]
struct FittedOffset {
    level: f64,
    offset: f64,
    history: Vec<Observation>,
}

impl OffsetModel {
    fn offset(&self) -> f64 {
        (self.params.changepoint_prior_scale - 0.1).abs()
    }
}

impl ForecastModel for OffsetModel {
    type Trained = FittedOffset;

    fn train(&self, history: &[Observation]) -> Result<FittedOffset> {
        let last = history
            .last()
            .ok_or_else(|| ForecastError::InsufficientData("empty".to_string()))?;
        Ok(FittedOffset {
            level: last.y,
            offset: self.offset(),
            history: history.to_vec(),
        })
    }

    fn name(&self) -> &str {
        "offset"
    }
}

impl TrainedForecastModel for FittedOffset {
    fn predict(&self, frame: &[FutureRow]) -> Result<Vec<ForecastRow>> {
        Ok(frame
            .iter()
            .map(|row| {
                let yhat = self.level * (1.0 + self.offset);
                ForecastRow {
                    date: row.date,
                    yhat,
                    yhat_lower: yhat,
                    yhat_upper: yhat,
                }
            })
            .collect())
    }

    fn history(&self) -> &[Observation] {
        &self.history
    }

    fn name(&self) -> &str {
        "offset"
    }
}

fn flat_series(n: usize, y: f64) -> Vec<Observation> {
    let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
    (0..n)
        .map(|i| {
            let mut regressors = BTreeMap::new();
            regressors.insert(VOLUME.to_string(), 1_000.0);
            Observation {
                date: start + Days::new(i as u64),
                y,
                regressors,
            }
        })
        .collect()
}

fn build(params: HyperparameterSet) -> Result<OffsetModel> {
    Ok(OffsetModel { params })
}

#[test]
fn test_selects_lowest_mape_candidate() {
    let rows = flat_series(100, 50.0);
    let (train, holdout) = rows.split_at(90);
    let candidates = vec![
        HyperparameterSet::new(0.03, 0.1),
        HyperparameterSet::new(0.05, 0.1),
        HyperparameterSet::new(0.1, 0.2),
        HyperparameterSet::new(0.3, 0.2),
    ];

    let outcome = select_and_fit(train, holdout, &candidates, 5, build).unwrap();

    assert_eq!(outcome.best_params, candidates[2]);
    assert!(outcome.best_score.abs() < 1e-9);
    assert_eq!(outcome.scores.len(), 4);
    assert!((outcome.scores[0].mape - 7.0).abs() < 1e-9);
    assert!((outcome.scores[3].mape - 20.0).abs() < 1e-9);
    assert_eq!(outcome.model.history().len(), 100);
}

#[test]
fn test_ties_resolve_to_earliest_candidate() {
    let rows = flat_series(40, 10.0);
    let (train, holdout) = rows.split_at(30);
    let candidates = vec![
        HyperparameterSet::new(0.5, 0.1),
        HyperparameterSet::new(0.2, 0.1),
        HyperparameterSet::new(0.2, 0.3),
        HyperparameterSet::new(0.2, 0.5),
    ];

    let outcome = select_and_fit(train, holdout, &candidates, 5, build).unwrap();
    assert_eq!(outcome.best_params, candidates[1]);
    assert_eq!(outcome.scores[1].mape, outcome.scores[2].mape);
}

#[test]
fn test_zero_actual_aborts_search() {
    let mut rows = flat_series(40, 10.0);
    rows[35].y = 0.0;
    let (train, holdout) = rows.split_at(30);
    let candidates = vec![HyperparameterSet::new(0.05, 0.1)];

    let result = select_and_fit(train, holdout, &candidates, 5, build);
    assert!(matches!(result, Err(ForecastError::ComputationError(_))));
}

#[test]
fn test_empty_candidates_are_rejected() {
    let rows = flat_series(10, 10.0);
    let (train, holdout) = rows.split_at(5);
    let result = select_and_fit(train, holdout, &[], 5, build);
    assert!(matches!(result, Err(ForecastError::InvalidParameter(_))));
}
