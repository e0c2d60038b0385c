use chrono::{Datelike, Days, NaiveDate, Weekday};
use pretty_assertions::assert_eq;
use price_forecast::calendar::EventCalendar;
use price_forecast::config::{HyperparameterSet, PipelineConfig, SeasonalityMode};
use price_forecast::data::{HistoricalObservation, HistoryWriter, PriceHistory};
use price_forecast::evaluator::{evaluate, MetricsStore};
use price_forecast::models::{FutureRow, TrainedForecastModel};
use price_forecast::pipeline::{evaluate_pipeline, forecast_days, train_model, train_pipeline};
use price_forecast::utils::future_regressors;
use price_forecast::{ErrorKind, ForecastError, ModelStore};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io::Write;
use std::path::Path;
use tempfile::tempdir;

// Two years of weekday closes with trend, yearly cycle and noise
fn synthetic_history(days: u64) -> PriceHistory {
    let mut rng = StdRng::seed_from_u64(42);
    let start = NaiveDate::from_ymd_opt(2022, 1, 3).unwrap();

    let rows = (0..days)
        .map(|offset| start + Days::new(offset))
        .filter(|date| !matches!(date.weekday(), Weekday::Sat | Weekday::Sun))
        .enumerate()
        .map(|(i, date)| {
            let t = i as f64;
            let close = 140.0
                + 0.03 * t
                + 4.0 * (2.0 * std::f64::consts::PI * t / 252.0).sin()
                + rng.gen_range(-1.0..1.0);
            let spike = if i % 97 == 0 { 4.0 } else { 1.0 };
            HistoricalObservation {
                date,
                open: close - 0.5,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: spike * (5_000_000.0 + rng.gen_range(0.0..500_000.0)),
                asset: "PG".to_string(),
            }
        })
        .collect();

    PriceHistory::new(rows).unwrap()
}

fn write_calendar(path: &Path) {
    let mut file = std::fs::File::create(path).unwrap();
    writeln!(file, "name,date,lower_window,upper_window").unwrap();
    writeln!(file, "us_market,2022-07-04,-2,1").unwrap();
    writeln!(file, "us_market,2023-07-04,-2,1").unwrap();
    writeln!(file, "earnings,2022-10-19,-3,3").unwrap();
    writeln!(file, "earnings,2023-10-18,-3,3").unwrap();
}

fn config_in(dir: &Path) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.paths.data = dir.join("data").join("stock_data.csv");
    config.paths.model = dir.join("model").join("price_model.bin");
    config.paths.metrics = dir.join("model").join("metrics.json");
    config.paths.calendar = Some(dir.join("market_events.csv"));
    config
}

#[test]
fn test_train_evaluate_forecast_end_to_end() {
    let dir = tempdir().unwrap();
    let config = config_in(dir.path());
    HistoryWriter::write_csv(&config.paths.data, &synthetic_history(730)).unwrap();
    write_calendar(dir.path().join("market_events.csv").as_path());

    let report = train_pipeline(&config).unwrap();
    assert_eq!(report.scores.len(), config.training.candidates.len());
    assert!(report.scores.iter().all(|s| s.mape >= 0.0));
    assert!(report
        .scores
        .iter()
        .all(|s| s.mape >= report.artifact.validation_mape));
    assert!(config.training.candidates.contains(&report.artifact.params));
    assert_eq!(report.artifact.asset, "PG");

    let record = evaluate_pipeline(&config).unwrap();
    assert!(record.mape >= 0.0);
    assert!(record.rmse >= 0.0);
    assert!(record.r2 <= 1.0);
    assert_eq!(record.test_size, 30);
    assert_eq!(MetricsStore::new(&config.paths.metrics).read().unwrap(), record);

    let artifact = ModelStore::new(&config.paths.model).load().unwrap();
    let forecast = forecast_days(&artifact, 7, config.training.future_volume_window).unwrap();
    assert_eq!(forecast.len(), 7);
    let last = artifact.model.history_end();
    for (i, row) in forecast.iter().enumerate() {
        assert_eq!(row.date, last + Days::new(i as u64 + 1));
        assert!(row.yhat.is_finite());
        assert!(row.yhat_lower <= row.yhat && row.yhat <= row.yhat_upper);
    }
}

#[test]
fn test_persisted_model_predicts_identically() {
    let dir = tempdir().unwrap();
    let history = synthetic_history(400);
    let mut config = PipelineConfig::default();
    config.training.candidates = vec![HyperparameterSet::new(0.05, 0.1)];

    let report = train_model(&history, &EventCalendar::empty(), &config).unwrap();
    let store = ModelStore::new(dir.path().join("model.bin"));
    store.save(&report.artifact).unwrap();
    assert!(store.exists());
    assert!(store.last_modified().is_some());

    let loaded = store.load().unwrap();
    assert_eq!(loaded, report.artifact);

    let before = forecast_days(&report.artifact, 30, 5).unwrap();
    let after = forecast_days(&loaded, 30, 5).unwrap();
    assert_eq!(before, after);
}

#[test]
fn test_model_without_history_is_degraded() {
    let history = synthetic_history(300);
    let mut config = PipelineConfig::default();
    config.training.candidates = vec![HyperparameterSet::new(0.05, 0.1)];
    let mut artifact = train_model(&history, &EventCalendar::empty(), &config)
        .unwrap()
        .artifact;

    let regressors = future_regressors(artifact.model.history(), 5).unwrap();
    let frame: Vec<FutureRow> = artifact.model.make_future_frame(3, &regressors).unwrap();

    artifact.model.clear_history();
    assert!(artifact.model.predict(&frame).is_ok());

    let error = evaluate(&history, &artifact, &config).unwrap_err();
    assert!(matches!(error, ForecastError::DegradedModel(_)));
    assert!(matches!(
        forecast_days(&artifact, 7, 5),
        Err(ForecastError::DegradedModel(_))
    ));
}

#[test]
fn test_thirty_one_rows_with_thirty_row_holdout_is_insufficient() {
    let history = synthetic_history(45);
    let rows = history.rows()[..31].to_vec();
    let history = PriceHistory::new(rows).unwrap();

    let mut config = PipelineConfig::default();
    config.training.validation_days = 30;
    let error = train_model(&history, &EventCalendar::empty(), &config).unwrap_err();
    assert!(matches!(error, ForecastError::InsufficientData(_)));
    assert_eq!(error.kind(), ErrorKind::Computation);
}

#[test]
fn test_evaluation_needs_more_rows_than_test_size() {
    let history = synthetic_history(200);
    let mut config = PipelineConfig::default();
    config.training.candidates = vec![HyperparameterSet::new(0.05, 0.1)];
    let artifact = train_model(&history, &EventCalendar::empty(), &config)
        .unwrap()
        .artifact;

    config.evaluation.test_size = history.len();
    assert!(matches!(
        evaluate(&history, &artifact, &config),
        Err(ForecastError::InsufficientData(_))
    ));
}

#[test]
fn test_missing_model_is_unavailable() {
    let dir = tempdir().unwrap();
    let config = config_in(dir.path());
    HistoryWriter::write_csv(&config.paths.data, &synthetic_history(100)).unwrap();

    let error = evaluate_pipeline(&config).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::DataUnavailable);
}

#[test]
fn test_additive_mode_trains() {
    let history = synthetic_history(300);
    let mut config = PipelineConfig::default();
    config.model.seasonality_mode = SeasonalityMode::Additive;
    config.training.candidates = vec![HyperparameterSet::new(0.05, 0.1)];

    let report = train_model(&history, &EventCalendar::empty(), &config).unwrap();
    assert!(report.artifact.validation_mape.is_finite());
    assert!(forecast_days(&report.artifact, 7, 5).is_ok());
}
