//! Mapping of pipeline failures onto HTTP responses
//!
//! Clients only ever see a fixed message per error class; the underlying
//! error text is logged server-side.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use price_forecast::{ErrorKind, ForecastError};
use serde_json::json;
use tracing::{error, warn};

/// Message returned for an out-of-range horizon
pub const HORIZON_MESSAGE: &str = "Número de dias deve ser entre 1 e 30";

#[derive(Debug)]
pub enum ApiError {
    /// Requested horizon outside the served range
    InvalidHorizon(i64),
    /// Failure inside the forecasting pipeline
    Forecast(ForecastError),
    /// The blocking worker panicked or was cancelled
    Worker(String),
}

impl ApiError {
    /// Taxonomy class reported in metrics
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::InvalidHorizon(_) => ErrorKind::Validation,
            ApiError::Forecast(err) => err.kind(),
            ApiError::Worker(_) => ErrorKind::Computation,
        }
    }

    fn public_message(&self) -> &'static str {
        match self {
            ApiError::InvalidHorizon(_) => HORIZON_MESSAGE,
            _ => match self.kind() {
                ErrorKind::Validation => "Requisição inválida",
                ErrorKind::DataUnavailable => "Modelo ou dados indisponíveis",
                ErrorKind::Computation => "Erro no cálculo da previsão",
            },
        }
    }

    fn status(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::DataUnavailable | ErrorKind::Computation => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<ForecastError> for ApiError {
    fn from(err: ForecastError) -> Self {
        ApiError::Forecast(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ApiError::InvalidHorizon(days) => warn!(days, "Rejected forecast horizon"),
            ApiError::Forecast(err) => error!(kind = %err.kind(), error = %err, "Prediction failed"),
            ApiError::Worker(msg) => error!(error = %msg, "Prediction worker failed"),
        }

        (status, Json(json!({ "detail": self.public_message() }))).into_response()
    }
}
