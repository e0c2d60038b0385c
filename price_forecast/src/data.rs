//! Historical price table loading and writing

use crate::error::{ForecastError, Result};
use crate::persist::write_atomic;
use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use tracing::{debug, info};

/// One trading day of a single asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalObservation {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    /// Ticker symbol the row belongs to
    pub asset: String,
}

/// Validated, date-ordered price table for one asset
#[derive(Debug, Clone, PartialEq)]
pub struct PriceHistory {
    rows: Vec<HistoricalObservation>,
}

impl PriceHistory {
    /// Wrap rows after checking ordering and value ranges
    pub fn new(rows: Vec<HistoricalObservation>) -> Result<Self> {
        if rows.is_empty() {
            return Err(ForecastError::DataError(
                "History table is empty".to_string(),
            ));
        }

        for pair in rows.windows(2) {
            if pair[1].date <= pair[0].date {
                return Err(ForecastError::DataError(format!(
                    "Dates must be strictly increasing: {} follows {}",
                    pair[1].date, pair[0].date
                )));
            }
        }

        for row in &rows {
            let values = [row.open, row.high, row.low, row.close, row.volume];
            if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
                return Err(ForecastError::DataError(format!(
                    "Row {} has a negative or non-finite value",
                    row.date
                )));
            }
        }

        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[HistoricalObservation] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Asset identifier of the first row
    pub fn asset(&self) -> &str {
        &self.rows[0].asset
    }

    pub fn first_date(&self) -> NaiveDate {
        self.rows[0].date
    }

    pub fn last_date(&self) -> NaiveDate {
        self.rows[self.rows.len() - 1].date
    }

    /// Get the close prices as a vector
    pub fn close_prices(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.close).collect()
    }

    /// Get the volumes as a vector
    pub fn volumes(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.volume).collect()
    }
}

/// Data loader for historical price tables
#[derive(Debug)]
pub struct DataLoader;

impl DataLoader {
    /// Load a price table from a CSV file.
    ///
    /// The asset column is optional; without it the file stem is used as the
    /// asset identifier.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<PriceHistory> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            ForecastError::DataUnavailable(format!(
                "Cannot open history file {}: {}",
                path.display(),
                e
            ))
        })?;

        let df = CsvReader::new(file)
            .infer_schema(None)
            .has_header(true)
            .finish()?;

        let fallback_asset = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("UNKNOWN");

        let history = Self::from_dataframe(&df, fallback_asset)?;
        info!(
            path = %path.display(),
            rows = history.len(),
            asset = history.asset(),
            first = %history.first_date(),
            last = %history.last_date(),
            "Loaded price history"
        );
        Ok(history)
    }

    /// Build a price table from an existing DataFrame
    pub fn from_dataframe(df: &DataFrame, fallback_asset: &str) -> Result<PriceHistory> {
        let date_column = Self::detect_date_column(df)?;
        let open = Self::require_column(df, "open")?;
        let high = Self::require_column(df, "high")?;
        let low = Self::require_column(df, "low")?;
        let close = Self::require_column(df, "close")?;
        let volume = Self::require_column(df, "volume")?;
        let asset_column = Self::find_column(df, &["ativo", "asset", "symbol", "ticker"]);
        debug!(date_column = %date_column, asset_column = ?asset_column, "Detected history columns");

        let dates = column_as_strings(df, &date_column)?
            .iter()
            .map(|raw| parse_date(raw))
            .collect::<Result<Vec<_>>>()?;
        let opens = column_as_f64(df, &open)?;
        let highs = column_as_f64(df, &high)?;
        let lows = column_as_f64(df, &low)?;
        let closes = column_as_f64(df, &close)?;
        let volumes = column_as_f64(df, &volume)?;
        let assets = match &asset_column {
            Some(name) => column_as_strings(df, name)?,
            None => vec![fallback_asset.to_string(); dates.len()],
        };

        let rows = dates
            .into_iter()
            .enumerate()
            .map(|(i, date)| HistoricalObservation {
                date,
                open: opens[i],
                high: highs[i],
                low: lows[i],
                close: closes[i],
                volume: volumes[i],
                asset: assets[i].clone(),
            })
            .collect();

        PriceHistory::new(rows)
    }

    /// Detect the date column, falling back to the first (index) column
    fn detect_date_column(df: &DataFrame) -> Result<String> {
        if let Some(name) =
            Self::find_column(df, &["date", "ds", "datetime", "timestamp", "time"])
        {
            return Ok(name);
        }

        df.get_column_names()
            .first()
            .map(|name| name.to_string())
            .ok_or_else(|| ForecastError::DataError("No columns found in data".to_string()))
    }

    fn require_column(df: &DataFrame, wanted: &str) -> Result<String> {
        Self::find_column(df, &[wanted]).ok_or_else(|| {
            ForecastError::DataError(format!("No '{}' column found in data", wanted))
        })
    }

    /// Case-insensitive exact match against the candidates, in order
    fn find_column(df: &DataFrame, candidates: &[&str]) -> Option<String> {
        let column_names = df.get_column_names();
        candidates.iter().find_map(|candidate| {
            column_names
                .iter()
                .find(|name| name.trim().to_lowercase() == *candidate)
                .map(|name| name.to_string())
        })
    }
}

/// Helper to get a column as f64 values, rejecting nulls
fn column_as_f64(df: &DataFrame, column_name: &str) -> Result<Vec<f64>> {
    let series = df.column(column_name)?.cast(&DataType::Float64)?;
    let values = series.f64()?;

    values
        .into_iter()
        .enumerate()
        .map(|(i, value)| {
            value.ok_or_else(|| {
                ForecastError::DataError(format!(
                    "Column '{}' has a missing value at row {}",
                    column_name, i
                ))
            })
        })
        .collect()
}

/// Helper to get a column as strings, rejecting nulls
fn column_as_strings(df: &DataFrame, column_name: &str) -> Result<Vec<String>> {
    let series = df.column(column_name)?.cast(&DataType::Utf8)?;
    let values = series.utf8()?;

    values
        .into_iter()
        .enumerate()
        .map(|(i, value)| {
            value.map(str::to_string).ok_or_else(|| {
                ForecastError::DataError(format!(
                    "Column '{}' has a missing value at row {}",
                    column_name, i
                ))
            })
        })
        .collect()
}

/// Parse `YYYY-MM-DD`, ignoring any time-of-day suffix
pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    let trimmed = raw.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .or_else(|err| match trimmed.get(..10) {
            Some(prefix) if trimmed.len() > 10 => NaiveDate::parse_from_str(prefix, "%Y-%m-%d"),
            _ => Err(err),
        })
        .map_err(|e| ForecastError::DataError(format!("Invalid date '{}': {}", raw, e)))
}

#[derive(Debug, Serialize)]
struct HistoryRecord<'a> {
    date: String,
    #[serde(rename = "Open")]
    open: f64,
    #[serde(rename = "High")]
    high: f64,
    #[serde(rename = "Low")]
    low: f64,
    #[serde(rename = "Close")]
    close: f64,
    #[serde(rename = "Volume")]
    volume: f64,
    #[serde(rename = "Ativo")]
    asset: &'a str,
    bias_adjust: f64,
}

/// Writes price tables in the layout `DataLoader` reads
#[derive(Debug)]
pub struct HistoryWriter;

impl HistoryWriter {
    /// Replace the table at `path` wholesale.
    ///
    /// The file is written next to its destination and renamed into place, so
    /// readers see either the previous table or the new one.
    pub fn write_csv<P: AsRef<Path>>(path: P, history: &PriceHistory) -> Result<()> {
        let path = path.as_ref();
        let mut writer = csv::Writer::from_writer(Vec::new());

        for row in history.rows() {
            writer.serialize(HistoryRecord {
                date: row.date.format("%Y-%m-%d").to_string(),
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume,
                asset: &row.asset,
                bias_adjust: 1.0,
            })?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| ForecastError::SerializationError(e.to_string()))?;
        write_atomic(path, &bytes)?;

        info!(path = %path.display(), rows = history.len(), "Wrote price history");
        Ok(())
    }
}
