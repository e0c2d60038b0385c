//! # Price Forecast
//!
//! Daily closing-price forecasting for a single equity.
//!
//! ## Features
//!
//! - Price history loading (OHLCV plus asset id) from CSV
//! - Engineered regressors: a constant `bias_adjust` and a binary `event_peak`
//! - Trend + seasonality + holiday + regressor decomposition model
//! - Grid search of prior scales by holdout MAPE, then a full refit
//! - Atomic model persistence and holdout evaluation (MAPE, RMSE, R²)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use price_forecast::config::PipelineConfig;
//! use price_forecast::pipeline::{evaluate_pipeline, forecast_days, train_pipeline};
//!
//! let config = PipelineConfig::default();
//!
//! // Grid search, refit on all rows and persist
//! let report = train_pipeline(&config)?;
//! println!("best: {}", report.artifact.params);
//!
//! // Score the persisted model on the last 30 rows
//! let record = evaluate_pipeline(&config)?;
//! println!("MAPE {:.2}%", record.mape);
//!
//! // One week ahead
//! let forecast = forecast_days(&report.artifact, 7, config.training.future_volume_window)?;
//! for row in forecast {
//!     println!("{} {:.2}", row.date, row.yhat);
//! }
//! # Ok::<(), price_forecast::ForecastError>(())
//! ```

pub mod calendar;
pub mod config;
pub mod data;
pub mod error;
pub mod evaluator;
pub mod features;
pub mod metrics;
pub mod models;
pub mod persist;
pub mod pipeline;
pub mod trainer;
pub mod utils;

// Re-export commonly used types
pub use crate::config::{HyperparameterSet, PipelineConfig};
pub use crate::data::{DataLoader, HistoricalObservation, PriceHistory};
pub use crate::error::{ErrorKind, ForecastError, Result};
pub use crate::evaluator::MetricsRecord;
pub use crate::models::{ForecastModel, ForecastRow, TrainedForecastModel};
pub use crate::persist::{ModelArtifact, ModelStore};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
