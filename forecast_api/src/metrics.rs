//! Request counters exposed in Prometheus text format

use price_forecast::ErrorKind;
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};

const PREFIX: &str = "closecast";

/// Endpoints that are counted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Predict,
    Health,
    Metrics,
}

impl Endpoint {
    fn label(&self) -> &'static str {
        match self {
            Endpoint::Predict => "predict",
            Endpoint::Health => "health",
            Endpoint::Metrics => "metrics",
        }
    }
}

#[derive(Debug, Default)]
pub struct ApiMetrics {
    predict_requests: AtomicU64,
    health_requests: AtomicU64,
    metrics_requests: AtomicU64,
    predict_rows: AtomicU64,
    validation_errors: AtomicU64,
    data_unavailable_errors: AtomicU64,
    computation_errors: AtomicU64,
}

impl ApiMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self, endpoint: Endpoint) {
        let counter = match endpoint {
            Endpoint::Predict => &self.predict_requests,
            Endpoint::Health => &self.health_requests,
            Endpoint::Metrics => &self.metrics_requests,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rows(&self, rows: usize) {
        self.predict_rows.fetch_add(rows as u64, Ordering::Relaxed);
    }

    pub fn record_error(&self, kind: ErrorKind) {
        let counter = match kind {
            ErrorKind::Validation => &self.validation_errors,
            ErrorKind::DataUnavailable => &self.data_unavailable_errors,
            ErrorKind::Computation => &self.computation_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn requests(&self, endpoint: Endpoint) -> u64 {
        match endpoint {
            Endpoint::Predict => self.predict_requests.load(Ordering::Relaxed),
            Endpoint::Health => self.health_requests.load(Ordering::Relaxed),
            Endpoint::Metrics => self.metrics_requests.load(Ordering::Relaxed),
        }
    }

    pub fn errors(&self, kind: ErrorKind) -> u64 {
        match kind {
            ErrorKind::Validation => self.validation_errors.load(Ordering::Relaxed),
            ErrorKind::DataUnavailable => self.data_unavailable_errors.load(Ordering::Relaxed),
            ErrorKind::Computation => self.computation_errors.load(Ordering::Relaxed),
        }
    }

    /// Render every counter as Prometheus exposition text
    pub fn to_prometheus_text(&self) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "# HELP {PREFIX}_requests_total Requests handled per endpoint");
        let _ = writeln!(out, "# TYPE {PREFIX}_requests_total counter");
        for endpoint in [Endpoint::Predict, Endpoint::Health, Endpoint::Metrics] {
            let _ = writeln!(
                out,
                "{PREFIX}_requests_total{{endpoint=\"{}\"}} {}",
                endpoint.label(),
                self.requests(endpoint)
            );
        }

        let _ = writeln!(out, "# HELP {PREFIX}_predict_errors_total Failed predictions by class");
        let _ = writeln!(out, "# TYPE {PREFIX}_predict_errors_total counter");
        for kind in [
            ErrorKind::Validation,
            ErrorKind::DataUnavailable,
            ErrorKind::Computation,
        ] {
            let _ = writeln!(
                out,
                "{PREFIX}_predict_errors_total{{kind=\"{}\"}} {}",
                kind.as_str(),
                self.errors(kind)
            );
        }

        let _ = writeln!(out, "# HELP {PREFIX}_forecast_rows_total Forecast rows returned");
        let _ = writeln!(out, "# TYPE {PREFIX}_forecast_rows_total counter");
        let _ = writeln!(
            out,
            "{PREFIX}_forecast_rows_total {}",
            self.predict_rows.load(Ordering::Relaxed)
        );

        out
    }
}
