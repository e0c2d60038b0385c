//! Trend + seasonality + holiday + regressor decomposition
//!
//! The series is modelled as
//!
//! ```text
//! multiplicative: y(t) = g(t) * (1 + s(t) + h(t) + r(t))
//! additive:       y(t) = g(t) + s(t) + h(t) + r(t)
//! ```
//!
//! where `g` is a piecewise-linear trend with changepoints, `s` a sum of
//! Fourier series, `h` per-day holiday effects and `r` linear regressor
//! effects. Each block is ridge-penalised according to its prior scale and
//! the trend and effect blocks are fitted by alternating least squares.

use crate::calendar::EventCalendar;
use crate::config::{HyperparameterSet, ModelConfig, SeasonalityConfig, SeasonalityMode};
use crate::error::{ForecastError, Result};
use crate::models::{ForecastModel, ForecastRow, FutureRow, Observation, TrainedForecastModel};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;
use trade_math::fourier::fourier_terms;
use trade_math::regression::{dot, ridge, DesignMatrix};
use trade_math::stats::{mean, sample_std};

/// Prior scale of the trend's base rate and offset
const TREND_BASE_PRIOR: f64 = 5.0;
/// Floor of the noise proxy that converts prior scales into ridge penalties
const MIN_NOISE_VARIANCE: f64 = 1e-6;

/// An extra regressor and the prior scale of its coefficient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressorSpec {
    pub name: String,
    pub prior_scale: f64,
}

/// Regressor with the standardisation learned from the training history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedRegressor {
    pub name: String,
    pub prior_scale: f64,
    pub mu: f64,
    pub std: f64,
}

/// Unfitted decomposition model
#[derive(Debug, Clone)]
pub struct DecompositionModel {
    name: String,
    settings: ModelConfig,
    params: HyperparameterSet,
    seasonalities: Vec<SeasonalityConfig>,
    calendar: EventCalendar,
    regressors: Vec<RegressorSpec>,
}

impl DecompositionModel {
    /// Create a model with the built-in and configured seasonalities
    pub fn new(settings: ModelConfig, params: HyperparameterSet) -> Result<Self> {
        settings.validate()?;
        params.validate()?;

        let mut model = Self {
            name: format!("Decomposition({})", params),
            settings: settings.clone(),
            params,
            seasonalities: Vec::new(),
            calendar: EventCalendar::empty(),
            regressors: Vec::new(),
        };

        if settings.yearly_seasonality {
            model = model.add_seasonality("yearly", 365.25, 10)?;
        }
        if settings.weekly_seasonality {
            model = model.add_seasonality("weekly", 7.0, 3)?;
        }
        if settings.daily_seasonality {
            model = model.add_seasonality("daily", 1.0, 4)?;
        }
        for seasonality in &settings.custom_seasonalities {
            model = model.add_seasonality(
                &seasonality.name,
                seasonality.period,
                seasonality.fourier_order,
            )?;
        }

        Ok(model)
    }

    /// Attach holiday and event effects
    pub fn with_holidays(mut self, calendar: EventCalendar) -> Self {
        self.calendar = calendar;
        self
    }

    /// Add a Fourier seasonality of `period` days
    pub fn add_seasonality(mut self, name: &str, period: f64, fourier_order: usize) -> Result<Self> {
        if self.seasonalities.iter().any(|s| s.name == name) {
            return Err(ForecastError::InvalidParameter(format!(
                "Seasonality '{}' is already registered",
                name
            )));
        }
        if !(period > 0.0) || fourier_order == 0 {
            return Err(ForecastError::InvalidParameter(format!(
                "Seasonality '{}' needs a positive period and order",
                name
            )));
        }
        self.seasonalities
            .push(SeasonalityConfig::new(name, period, fourier_order));
        Ok(self)
    }

    /// Declare a regressor that must be present at fit and predict time
    pub fn add_regressor(mut self, name: &str, prior_scale: f64) -> Result<Self> {
        if self.regressors.iter().any(|r| r.name == name) {
            return Err(ForecastError::InvalidParameter(format!(
                "Regressor '{}' is already registered",
                name
            )));
        }
        if !(prior_scale > 0.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "Regressor '{}' needs a positive prior scale",
                name
            )));
        }
        self.regressors.push(RegressorSpec {
            name: name.to_string(),
            prior_scale,
        });
        Ok(self)
    }

    pub fn params(&self) -> &HyperparameterSet {
        &self.params
    }

    pub fn seasonalities(&self) -> &[SeasonalityConfig] {
        &self.seasonalities
    }

    pub fn regressors(&self) -> &[RegressorSpec] {
        &self.regressors
    }

    fn fit_regressor_scales(&self, history: &[Observation]) -> Result<Vec<FittedRegressor>> {
        self.regressors
            .iter()
            .map(|spec| {
                let values = regressor_values(history, &spec.name)?;
                let binary = values.iter().all(|v| *v == 0.0 || *v == 1.0);
                let (mu, std) = if binary {
                    (0.0, 1.0)
                } else {
                    let std = sample_std(&values)?;
                    if std < 1e-12 {
                        (0.0, 1.0)
                    } else {
                        (mean(&values)?, std)
                    }
                };

                Ok(FittedRegressor {
                    name: spec.name.clone(),
                    prior_scale: spec.prior_scale,
                    mu,
                    std,
                })
            })
            .collect()
    }
}

fn regressor_values(history: &[Observation], name: &str) -> Result<Vec<f64>> {
    history
        .iter()
        .map(|obs| {
            obs.regressors.get(name).copied().ok_or_else(|| {
                ForecastError::ValidationError(format!(
                    "Observation on {} is missing regressor '{}'",
                    obs.date, name
                ))
            })
        })
        .collect()
}

impl ForecastModel for DecompositionModel {
    type Trained = FittedDecomposition;

    fn train(&self, history: &[Observation]) -> Result<FittedDecomposition> {
        let n = history.len();
        if n < 2 {
            return Err(ForecastError::InsufficientData(format!(
                "Need at least 2 observations to fit a trend, have {}",
                n
            )));
        }
        for pair in history.windows(2) {
            if pair[1].date <= pair[0].date {
                return Err(ForecastError::DataError(format!(
                    "Observations must be in strictly increasing date order: {} follows {}",
                    pair[1].date, pair[0].date
                )));
            }
        }
        if history.iter().any(|obs| !obs.y.is_finite()) {
            return Err(ForecastError::DataError(
                "Target contains non-finite values".to_string(),
            ));
        }

        let start = history[0].date;
        let history_end = history[n - 1].date;
        let span_days = (history_end - start).num_days() as f64;

        let max_abs = history.iter().map(|obs| obs.y.abs()).fold(0.0, f64::max);
        let y_scale = if max_abs > 0.0 { max_abs } else { 1.0 };
        let ys: Vec<f64> = history.iter().map(|obs| obs.y / y_scale).collect();
        let ts: Vec<f64> = history
            .iter()
            .map(|obs| (obs.date - start).num_days() as f64 / span_days)
            .collect();

        let changepoints = place_changepoints(
            &ts,
            self.settings.n_changepoints,
            self.settings.changepoint_range,
        );
        let noise = noise_variance(&ys);
        let regressors = self.fit_regressor_scales(history)?;
        let holiday_keys = self.calendar.effect_keys();
        let layout = FeatureLayout::new(
            &self.seasonalities,
            &self.calendar,
            &holiday_keys,
            &regressors,
        );

        let mut features = DesignMatrix::with_columns(layout.width());
        for obs in history {
            features.push_row(&layout.row(obs.date, &obs.regressors)?)?;
        }
        let mut trend_design = DesignMatrix::with_columns(2 + changepoints.len());
        for t in &ts {
            trend_design.push_row(&trend_row(*t, &changepoints))?;
        }

        let mut trend_penalties = vec![noise / TREND_BASE_PRIOR.powi(2); 2];
        trend_penalties.extend(
            changepoints
                .iter()
                .map(|_| noise / self.params.changepoint_prior_scale.powi(2)),
        );
        let feature_penalties = layout.penalties(
            noise,
            self.params.seasonality_prior_scale,
            self.settings.holidays_prior_scale,
        );

        let mode = self.settings.seasonality_mode;
        let mut beta = vec![0.0; layout.width()];
        let mut trend = vec![0.0; trend_design.cols()];

        for _ in 0..self.settings.fit_iterations {
            let effects = features.apply(&beta)?;
            trend = match mode {
                SeasonalityMode::Multiplicative => {
                    let weights: Vec<f64> = effects.iter().map(|e| 1.0 + e).collect();
                    ridge(&trend_design.scale_rows(&weights)?, &ys, &trend_penalties)?
                }
                SeasonalityMode::Additive => {
                    let target: Vec<f64> = ys.iter().zip(&effects).map(|(y, e)| y - e).collect();
                    ridge(&trend_design, &target, &trend_penalties)?
                }
            };

            if layout.width() == 0 {
                break;
            }

            let level = trend_design.apply(&trend)?;
            let target: Vec<f64> = ys.iter().zip(&level).map(|(y, g)| y - g).collect();
            beta = match mode {
                SeasonalityMode::Multiplicative => {
                    ridge(&features.scale_rows(&level)?, &target, &feature_penalties)?
                }
                SeasonalityMode::Additive => ridge(&features, &target, &feature_penalties)?,
            };
        }

        let level = trend_design.apply(&trend)?;
        let effects = features.apply(&beta)?;
        let squared_error: f64 = ys
            .iter()
            .zip(level.iter().zip(&effects))
            .map(|(y, (g, e))| (y - combine(mode, *g, *e)).powi(2))
            .sum();
        let sigma = (squared_error / n as f64).sqrt() * y_scale;

        let z = Normal::new(0.0, 1.0)
            .map_err(|e| ForecastError::ComputationError(e.to_string()))?
            .inverse_cdf(0.5 + self.settings.interval_width / 2.0);

        debug!(
            model = %self.name,
            observations = n,
            changepoints = changepoints.len(),
            effect_columns = layout.width(),
            sigma,
            "Fitted decomposition"
        );

        Ok(FittedDecomposition {
            name: self.name.clone(),
            params: self.params,
            mode,
            seasonalities: self.seasonalities.clone(),
            calendar: self.calendar.clone(),
            holiday_keys,
            regressors,
            start,
            history_end,
            span_days,
            n_observations: n,
            y_scale,
            changepoints,
            trend,
            beta,
            sigma,
            z,
            history: history.to_vec(),
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Fitted decomposition, serializable as a whole
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedDecomposition {
    name: String,
    params: HyperparameterSet,
    mode: SeasonalityMode,
    seasonalities: Vec<SeasonalityConfig>,
    calendar: EventCalendar,
    holiday_keys: Vec<(String, i64)>,
    regressors: Vec<FittedRegressor>,
    start: NaiveDate,
    history_end: NaiveDate,
    span_days: f64,
    n_observations: usize,
    y_scale: f64,
    /// Changepoint locations on the scaled time axis
    changepoints: Vec<f64>,
    /// `[offset, base rate, delta_1, ..., delta_k]` on the scaled axes
    trend: Vec<f64>,
    beta: Vec<f64>,
    /// In-sample residual standard deviation, in price units
    sigma: f64,
    /// Normal quantile of the interval width
    z: f64,
    history: Vec<Observation>,
}

impl FittedDecomposition {
    pub fn params(&self) -> &HyperparameterSet {
        &self.params
    }

    pub fn regressors(&self) -> &[FittedRegressor] {
        &self.regressors
    }

    pub fn changepoints(&self) -> &[f64] {
        &self.changepoints
    }

    /// Residual standard deviation of the fit
    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Last date of the fitted history
    pub fn history_end(&self) -> NaiveDate {
        self.history_end
    }

    /// Drop the captured training rows to ship a smaller artifact.
    ///
    /// Predictions on explicit frames keep working; anything that needs the
    /// history (future frames, evaluation) reports a degraded model.
    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    fn trend_at(&self, t: f64) -> f64 {
        dot(&trend_row(t, &self.changepoints), &self.trend)
    }
}

impl TrainedForecastModel for FittedDecomposition {
    fn predict(&self, frame: &[FutureRow]) -> Result<Vec<ForecastRow>> {
        let layout = FeatureLayout::new(
            &self.seasonalities,
            &self.calendar,
            &self.holiday_keys,
            &self.regressors,
        );

        frame
            .iter()
            .map(|row| {
                let t = (row.date - self.start).num_days() as f64 / self.span_days;
                let level = self.trend_at(t);
                let effect = dot(&layout.row(row.date, &row.regressors)?, &self.beta);
                let yhat = combine(self.mode, level, effect) * self.y_scale;

                let horizon = (row.date - self.history_end).num_days().max(0) as f64;
                let band =
                    self.z * self.sigma * (1.0 + horizon / self.n_observations as f64).sqrt();

                Ok(ForecastRow {
                    date: row.date,
                    yhat,
                    yhat_lower: yhat - band,
                    yhat_upper: yhat + band,
                })
            })
            .collect()
    }

    fn history(&self) -> &[Observation] {
        &self.history
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn combine(mode: SeasonalityMode, level: f64, effect: f64) -> f64 {
    match mode {
        SeasonalityMode::Multiplicative => level * (1.0 + effect),
        SeasonalityMode::Additive => level + effect,
    }
}

/// `[1, t, (t - s_1)+, ..., (t - s_k)+]`
fn trend_row(t: f64, changepoints: &[f64]) -> Vec<f64> {
    let mut row = Vec::with_capacity(2 + changepoints.len());
    row.push(1.0);
    row.push(t);
    row.extend(changepoints.iter().map(|s| (t - s).max(0.0)));
    row
}

/// Changepoints spread evenly over the first `range` fraction of the rows
fn place_changepoints(ts: &[f64], requested: usize, range: f64) -> Vec<f64> {
    let hist_size = (ts.len() as f64 * range).floor() as usize;
    let count = requested.min(hist_size.saturating_sub(1));
    if count == 0 {
        return Vec::new();
    }

    (1..=count)
        .map(|j| {
            let idx = ((j * (hist_size - 1)) as f64 / count as f64).round() as usize;
            ts[idx]
        })
        .collect()
}

/// Half the mean squared first difference of the scaled series
fn noise_variance(ys: &[f64]) -> f64 {
    let diffs: Vec<f64> = ys.windows(2).map(|w| (w[1] - w[0]).powi(2)).collect();
    if diffs.is_empty() {
        return MIN_NOISE_VARIANCE;
    }
    (diffs.iter().sum::<f64>() / diffs.len() as f64 / 2.0).max(MIN_NOISE_VARIANCE)
}

/// Column layout of the effect block: seasonal terms, holidays, regressors
struct FeatureLayout<'a> {
    seasonalities: &'a [SeasonalityConfig],
    regressors: &'a [FittedRegressor],
    holiday_columns: HashMap<&'a (String, i64), usize>,
    holiday_days: HashMap<NaiveDate, Vec<(String, i64)>>,
    seasonal_width: usize,
    holiday_width: usize,
}

impl<'a> FeatureLayout<'a> {
    fn new(
        seasonalities: &'a [SeasonalityConfig],
        calendar: &EventCalendar,
        holiday_keys: &'a [(String, i64)],
        regressors: &'a [FittedRegressor],
    ) -> Self {
        let holiday_columns = holiday_keys
            .iter()
            .enumerate()
            .map(|(i, key)| (key, i))
            .collect();

        Self {
            seasonalities,
            regressors,
            holiday_columns,
            holiday_days: calendar.day_index(),
            seasonal_width: seasonalities.iter().map(|s| 2 * s.fourier_order).sum(),
            holiday_width: holiday_keys.len(),
        }
    }

    fn width(&self) -> usize {
        self.seasonal_width + self.holiday_width + self.regressors.len()
    }

    fn row(&self, date: NaiveDate, values: &BTreeMap<String, f64>) -> Result<Vec<f64>> {
        let mut row = Vec::with_capacity(self.width());

        let days_since_epoch = (date - NaiveDate::default()).num_days() as f64;
        for seasonality in self.seasonalities {
            row.extend(fourier_terms(
                days_since_epoch,
                seasonality.period,
                seasonality.fourier_order,
            )?);
        }

        let mut holidays = vec![0.0; self.holiday_width];
        if let Some(keys) = self.holiday_days.get(&date) {
            for key in keys {
                if let Some(&column) = self.holiday_columns.get(key) {
                    holidays[column] = 1.0;
                }
            }
        }
        row.extend(holidays);

        for regressor in self.regressors {
            let value = values.get(&regressor.name).copied().ok_or_else(|| {
                ForecastError::ValidationError(format!(
                    "Row for {} is missing regressor '{}'",
                    date, regressor.name
                ))
            })?;
            row.push((value - regressor.mu) / regressor.std);
        }

        Ok(row)
    }

    fn penalties(&self, noise: f64, seasonality_prior: f64, holidays_prior: f64) -> Vec<f64> {
        let mut penalties = vec![noise / seasonality_prior.powi(2); self.seasonal_width];
        penalties.extend(vec![noise / holidays_prior.powi(2); self.holiday_width]);
        penalties.extend(
            self.regressors
                .iter()
                .map(|r| noise / r.prior_scale.powi(2)),
        );
        penalties
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::CalendarEvent;
    use chrono::Days;

    fn settings() -> ModelConfig {
        ModelConfig {
            yearly_seasonality: false,
            weekly_seasonality: true,
            custom_seasonalities: Vec::new(),
            ..ModelConfig::default()
        }
    }

    fn series(n: usize, f: impl Fn(usize) -> f64) -> Vec<Observation> {
        let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        (0..n)
            .map(|i| {
                let mut regressors = BTreeMap::new();
                regressors.insert("volume".to_string(), 1_000.0 + (i % 7) as f64);
                Observation {
                    date: start + Days::new(i as u64),
                    y: f(i),
                    regressors,
                }
            })
            .collect()
    }

    #[test]
    fn test_changepoint_placement() {
        let ts: Vec<f64> = (0..100).map(|i| i as f64 / 99.0).collect();
        let cps = place_changepoints(&ts, 25, 0.8);
        assert_eq!(cps.len(), 25);
        assert!(cps.windows(2).all(|w| w[1] > w[0]));
        assert!(*cps.last().unwrap() <= ts[79]);

        assert_eq!(place_changepoints(&ts[..3], 25, 0.8).len(), 1);
        assert!(place_changepoints(&ts[..2], 25, 0.8).is_empty());
    }

    #[test]
    fn test_fits_linear_trend() {
        let history = series(120, |i| 50.0 + 0.25 * i as f64);
        let model = DecompositionModel::new(settings(), HyperparameterSet::new(0.05, 0.1))
            .unwrap()
            .add_regressor("volume", 0.5)
            .unwrap();
        let fitted = model.train(&history).unwrap();

        let in_sample: Vec<FutureRow> = history
            .iter()
            .map(|obs| FutureRow {
                date: obs.date,
                regressors: obs.regressors.clone(),
            })
            .collect();
        let predictions = fitted.predict(&in_sample).unwrap();
        for (pred, obs) in predictions.iter().zip(&history) {
            assert!((pred.yhat - obs.y).abs() < 1.0, "{} vs {}", pred.yhat, obs.y);
            assert!(pred.yhat_lower <= pred.yhat && pred.yhat <= pred.yhat_upper);
        }
    }

    #[test]
    fn test_intervals_widen_with_horizon() {
        let history = series(90, |i| 20.0 + (i as f64 * 0.7).sin() + 0.1 * i as f64);
        let model = DecompositionModel::new(settings(), HyperparameterSet::new(0.05, 0.1)).unwrap();
        let fitted = model.train(&history).unwrap();

        let frame = fitted.make_future_frame(30, &BTreeMap::new()).unwrap();
        assert_eq!(frame.len(), 30);
        let forecast = fitted.predict(&frame).unwrap();
        let first = forecast[0].yhat_upper - forecast[0].yhat_lower;
        let last = forecast[29].yhat_upper - forecast[29].yhat_lower;
        assert!(last > first);
    }

    #[test]
    fn test_missing_regressor_is_rejected() {
        let history = series(30, |i| 10.0 + i as f64);
        let model = DecompositionModel::new(settings(), HyperparameterSet::new(0.05, 0.1))
            .unwrap()
            .add_regressor("event_peak", 0.5)
            .unwrap();
        assert!(matches!(
            model.train(&history),
            Err(ForecastError::ValidationError(_))
        ));
    }

    #[test]
    fn test_rejects_short_or_unordered_history() {
        let model = DecompositionModel::new(settings(), HyperparameterSet::new(0.05, 0.1)).unwrap();
        let history = series(1, |_| 10.0);
        assert!(matches!(
            model.train(&history),
            Err(ForecastError::InsufficientData(_))
        ));

        let mut history = series(5, |i| i as f64);
        history.swap(1, 2);
        assert!(matches!(model.train(&history), Err(ForecastError::DataError(_))));
    }

    #[test]
    fn test_holiday_effect_is_learned() {
        let holiday = NaiveDate::from_ymd_opt(2023, 3, 1).unwrap();
        let calendar = EventCalendar::new(vec![
            CalendarEvent::new("closure", holiday, 0, 0).unwrap(),
            CalendarEvent::new("closure", holiday + Days::new(28), 0, 0).unwrap(),
        ]);
        let history = series(100, |i| {
            let date = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap() + Days::new(i as u64);
            if date == holiday || date == holiday + Days::new(28) {
                130.0
            } else {
                100.0
            }
        });
        let model = DecompositionModel::new(
            ModelConfig {
                weekly_seasonality: false,
                holidays_prior_scale: 10.0,
                ..settings()
            },
            HyperparameterSet::new(0.001, 0.1),
        )
        .unwrap()
        .with_holidays(calendar);
        let fitted = model.train(&history).unwrap();

        let frame = vec![
            FutureRow {
                date: holiday,
                regressors: BTreeMap::new(),
            },
            FutureRow {
                date: holiday + Days::new(3),
                regressors: BTreeMap::new(),
            },
        ];
        let forecast = fitted.predict(&frame).unwrap();
        assert!(forecast[0].yhat > forecast[1].yhat + 10.0);
    }

    #[test]
    fn test_duplicate_components_are_rejected() {
        let model = DecompositionModel::new(settings(), HyperparameterSet::new(0.05, 0.1)).unwrap();
        assert!(model.clone().add_seasonality("weekly", 7.0, 3).is_err());
        let model = model.add_regressor("volume", 0.5).unwrap();
        assert!(model.clone().add_regressor("volume", 0.5).is_err());
        assert!(model.add_regressor("other", 0.0).is_err());
    }
}
