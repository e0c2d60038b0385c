//! End-to-end training, evaluation and forecasting runs

use crate::calendar::EventCalendar;
use crate::config::{HyperparameterSet, ModelConfig, PipelineConfig};
use crate::data::{DataLoader, PriceHistory};
use crate::error::{ForecastError, Result};
use crate::evaluator::{evaluate, MetricsRecord, MetricsStore};
use crate::features::{derive_features, to_observations, EventThresholds, BIAS_ADJUST, EVENT_PEAK, VOLUME};
use crate::models::decomposition::DecompositionModel;
use crate::models::{ForecastRow, TrainedForecastModel};
use crate::persist::{ModelArtifact, ModelStore};
use crate::trainer::{select_and_fit, CandidateScore};
use crate::utils::{future_regressors, trailing_split};
use tracing::info;

/// Longest horizon served by [`forecast_days`]
pub const MAX_HORIZON_DAYS: usize = 30;

/// Reject horizons outside `[1, MAX_HORIZON_DAYS]`
pub fn validate_horizon(days: i64) -> Result<usize> {
    if !(1..=MAX_HORIZON_DAYS as i64).contains(&days) {
        return Err(ForecastError::ValidationError(format!(
            "Number of days must be between 1 and {}",
            MAX_HORIZON_DAYS
        )));
    }
    Ok(days as usize)
}

/// The decomposition model every candidate shares, with `params` plugged in
pub fn build_model(
    settings: &ModelConfig,
    calendar: &EventCalendar,
    params: HyperparameterSet,
) -> Result<DecompositionModel> {
    DecompositionModel::new(settings.clone(), params)?
        .with_holidays(calendar.clone())
        .add_regressor(BIAS_ADJUST, settings.regressor_prior_scale)?
        .add_regressor(VOLUME, settings.regressor_prior_scale)?
        .add_regressor(EVENT_PEAK, settings.regressor_prior_scale)
}

/// Winning artifact and the full candidate table
#[derive(Debug)]
pub struct TrainingReport {
    pub artifact: ModelArtifact,
    pub scores: Vec<CandidateScore>,
}

/// Grid-search, refit and package a model for `history`
pub fn train_model(
    history: &PriceHistory,
    calendar: &EventCalendar,
    config: &PipelineConfig,
) -> Result<TrainingReport> {
    config.validate()?;
    let holdout = config.training.validation_days;

    let thresholds = EventThresholds::for_split(history.rows(), holdout, &config.features)?;
    let engineered = derive_features(history.rows(), &thresholds);
    let events = engineered.iter().filter(|row| row.event_peak == 1).count();
    info!(
        rows = engineered.len(),
        events,
        volume_threshold = thresholds.volume,
        "Derived features"
    );

    let observations = to_observations(&engineered);
    let (train, test) = trailing_split(&observations, holdout)?;

    let outcome = select_and_fit(
        train,
        test,
        &config.training.candidates,
        config.training.future_volume_window,
        |params| build_model(&config.model, calendar, params),
    )?;

    Ok(TrainingReport {
        artifact: ModelArtifact::new(
            history.asset(),
            outcome.best_params,
            outcome.best_score,
            outcome.model,
        ),
        scores: outcome.scores,
    })
}

/// Load history and calendar, train, and persist the winning model
pub fn train_pipeline(config: &PipelineConfig) -> Result<TrainingReport> {
    let history = DataLoader::from_csv(&config.paths.data)?;
    let calendar = EventCalendar::load(config.paths.calendar.as_deref())?;

    let report = train_model(&history, &calendar, config)?;
    ModelStore::new(&config.paths.model).save(&report.artifact)?;
    Ok(report)
}

/// Load history and the persisted model, evaluate, and overwrite the metrics record
pub fn evaluate_pipeline(config: &PipelineConfig) -> Result<MetricsRecord> {
    config.validate()?;
    let history = DataLoader::from_csv(&config.paths.data)?;
    let artifact = ModelStore::new(&config.paths.model).load()?;

    let record = evaluate(&history, &artifact, config)?;
    MetricsStore::new(&config.paths.metrics).write(&record)?;
    Ok(record)
}

/// Forecast `days` calendar days past the end of the artifact's history
pub fn forecast_days(
    artifact: &ModelArtifact,
    days: usize,
    volume_window: usize,
) -> Result<Vec<ForecastRow>> {
    let model = &artifact.model;
    if model.history().is_empty() {
        return Err(ForecastError::DegradedModel(
            "Model artifact carries no fitted history".to_string(),
        ));
    }

    let regressors = future_regressors(model.history(), volume_window)?;
    let frame = model.make_future_frame(days, &regressors)?;
    model.predict(&frame)
}
