//! # closecast
//!
//! Forecasts a single equity's daily close. The workspace is split into:
//!
//! - [`trade_math`]: quantiles, rolling means, ridge regression and Fourier terms
//! - [`price_forecast`]: history loading, feature derivation, the decomposition
//!   model, grid-search training, persistence and evaluation
//! - [`forecast_api`]: the HTTP server over a persisted model
//!
//! This crate adds the TOML configuration and logging setup shared by the
//! `closecast` binary.
//!
//! ## Example
//!
//! ```
//! use closecast::config::AppConfig;
//!
//! let config = AppConfig::from_toml("[evaluation]\ntest_size = 20\n").unwrap();
//! assert_eq!(config.pipeline().evaluation.test_size, 20);
//! assert_eq!(config.server.port, 8000);
//! ```

pub mod config;

pub use forecast_api;
pub use price_forecast;
pub use trade_math;

pub use crate::config::{setup_logging, AppConfig, LogFormat, LoggingConfig};
