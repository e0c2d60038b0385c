//! # Forecast API
//!
//! HTTP boundary over a persisted model artifact:
//!
//! - `POST /predict {"days": n}`: closing-price estimates for the `n` calendar
//!   days after the fitted history (1 ≤ n ≤ 30, default 7)
//! - `GET /health`: artifact presence and modification time
//! - `GET /metrics`: request and error counters in Prometheus text format
//!
//! The artifact is reloaded from disk on every prediction, on a blocking
//! worker, so a retrain becomes visible without a restart.

pub mod config;
pub mod error;
pub mod metrics;

use crate::error::ApiError;
use crate::metrics::{ApiMetrics, Endpoint};
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use price_forecast::pipeline::{forecast_days, validate_horizon};
use price_forecast::ModelStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

pub use crate::config::ServerConfig;

/// Shared, read-only handler state
#[derive(Debug)]
pub struct AppState {
    pub store: ModelStore,
    /// Trailing rows averaged to project volume into the horizon
    pub volume_window: usize,
    pub version: String,
    pub metrics: ApiMetrics,
}

impl AppState {
    pub fn new(store: ModelStore, volume_window: usize, version: &str) -> Self {
        Self {
            store,
            volume_window,
            version: version.to_string(),
            metrics: ApiMetrics::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PredictRequest {
    #[serde(default = "default_days")]
    pub days: i64,
}

fn default_days() -> i64 {
    7
}

/// One forecast day as returned to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRow {
    /// `YYYY-MM-DD`
    pub date: String,
    /// Predicted close, rounded to cents
    pub point_estimate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub api: String,
    /// `loaded` or `missing`
    pub model: String,
    /// Artifact modification time, or `unknown`
    pub last_trained: String,
    pub version: String,
}

/// Build the router over `state`
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/predict", post(predict))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .with_state(state)
}

async fn predict(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PredictRequest>,
) -> Result<Json<Vec<PredictionRow>>, ApiError> {
    state.metrics.record_request(Endpoint::Predict);

    let result = run_prediction(&state, request.days).await;
    match &result {
        Ok(rows) => state.metrics.record_rows(rows.len()),
        Err(err) => state.metrics.record_error(err.kind()),
    }
    result.map(Json)
}

async fn run_prediction(state: &Arc<AppState>, days: i64) -> Result<Vec<PredictionRow>, ApiError> {
    let days = validate_horizon(days).map_err(|_| ApiError::InvalidHorizon(days))?;

    let store = state.store.clone();
    let volume_window = state.volume_window;
    let forecast = tokio::task::spawn_blocking(move || {
        let artifact = store.load()?;
        forecast_days(&artifact, days, volume_window)
    })
    .await
    .map_err(|e| ApiError::Worker(e.to_string()))??;

    debug!(days, rows = forecast.len(), "Served forecast");

    Ok(forecast
        .iter()
        .map(|row| PredictionRow {
            date: row.date.format("%Y-%m-%d").to_string(),
            point_estimate: (row.yhat * 100.0).round() / 100.0,
        })
        .collect())
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthStatus> {
    state.metrics.record_request(Endpoint::Health);

    let loaded = state.store.exists();
    let last_trained = state
        .store
        .last_modified()
        .filter(|_| loaded)
        .map(|time| time.to_rfc3339())
        .unwrap_or_else(|| "unknown".to_string());

    Json(HealthStatus {
        api: "healthy".to_string(),
        model: if loaded { "loaded" } else { "missing" }.to_string(),
        last_trained,
        version: state.version.clone(),
    })
}

async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.metrics.record_request(Endpoint::Metrics);
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.to_prometheus_text(),
    )
}

/// Bind `config`'s address and serve until Ctrl-C
pub async fn serve(config: &ServerConfig, state: Arc<AppState>) -> std::io::Result<()> {
    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!(address = %address, model = %state.store.path().display(), "Starting forecast server");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
