//! Utility functions for the price_forecast crate

use crate::error::{ForecastError, Result};
use crate::features::{BIAS_ADJUST, EVENT_PEAK, VOLUME};
use crate::models::{FutureRow, Observation};
use chrono::{Days, NaiveDate};
use std::collections::BTreeMap;
use trade_math::stats::trailing_mean;

/// Split rows positionally: everything but the last `holdout` rows trains.
///
/// Fails unless the table is strictly longer than the holdout.
pub fn trailing_split<T>(rows: &[T], holdout: usize) -> Result<(&[T], &[T])> {
    if rows.len() <= holdout {
        return Err(ForecastError::InsufficientData(format!(
            "Need more than {} rows for a holdout of {}, have {}",
            holdout,
            holdout,
            rows.len()
        )));
    }

    Ok(rows.split_at(rows.len() - holdout))
}

/// Consecutive calendar days following `last`
pub fn future_dates(last: NaiveDate, horizon: usize) -> Result<Vec<NaiveDate>> {
    (1..=horizon as u64)
        .map(|offset| {
            last.checked_add_days(Days::new(offset)).ok_or_else(|| {
                ForecastError::ValidationError(format!(
                    "Horizon of {} days overflows the calendar",
                    horizon
                ))
            })
        })
        .collect()
}

/// Regressor values assumed for dates beyond the observed history.
///
/// `bias_adjust` stays at 1.0, no events are anticipated, and volume is held
/// at its trailing mean over `volume_window` rows (or all rows when the
/// history is shorter).
pub fn future_regressors(history: &[Observation], volume_window: usize) -> Result<BTreeMap<String, f64>> {
    let volumes = history
        .iter()
        .map(|obs| {
            obs.regressors.get(VOLUME).copied().ok_or_else(|| {
                ForecastError::ValidationError(format!(
                    "Observation on {} has no '{}' regressor",
                    obs.date, VOLUME
                ))
            })
        })
        .collect::<Result<Vec<f64>>>()?;

    let window = volume_window.min(volumes.len());
    let volume = if window == 0 {
        0.0
    } else {
        trailing_mean(&volumes, window)?
    };

    let mut regressors = BTreeMap::new();
    regressors.insert(BIAS_ADJUST.to_string(), 1.0);
    regressors.insert(VOLUME.to_string(), volume);
    regressors.insert(EVENT_PEAK.to_string(), 0.0);
    Ok(regressors)
}

/// Future frame for explicit dates, all sharing the same regressor values
pub fn frame_for_dates(dates: &[NaiveDate], regressors: &BTreeMap<String, f64>) -> Vec<FutureRow> {
    dates
        .iter()
        .map(|date| FutureRow {
            date: *date,
            regressors: regressors.clone(),
        })
        .collect()
}
