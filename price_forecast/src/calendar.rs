//! Holiday and corporate-event calendars
//!
//! Calendars are plain tables loaded at startup, one row per event date:
//!
//! ```text
//! name,date,lower_window,upper_window
//! us_market,2024-07-04,-2,1
//! earnings,2024-07-26,-3,3
//! ```
//!
//! Each row contributes an effect on every day in
//! `[date + lower_window, date + upper_window]`.

use crate::data::parse_date;
use crate::error::{ForecastError, Result};
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::path::Path;
use tracing::info;

/// One dated event with its window of influence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub name: String,
    pub date: NaiveDate,
    /// Days before the event that are affected (zero or negative)
    pub lower_window: i64,
    /// Days after the event that are affected (zero or positive)
    pub upper_window: i64,
}

impl CalendarEvent {
    pub fn new(name: &str, date: NaiveDate, lower_window: i64, upper_window: i64) -> Result<Self> {
        if lower_window > 0 || upper_window < 0 {
            return Err(ForecastError::InvalidParameter(format!(
                "Event '{}' on {} needs lower_window <= 0 <= upper_window",
                name, date
            )));
        }
        Ok(Self {
            name: name.to_string(),
            date,
            lower_window,
            upper_window,
        })
    }

    /// Every (offset, day) pair covered by the window
    pub fn window(&self) -> impl Iterator<Item = (i64, NaiveDate)> + '_ {
        (self.lower_window..=self.upper_window)
            .filter_map(move |offset| shift(self.date, offset).map(|day| (offset, day)))
    }
}

fn shift(date: NaiveDate, offset: i64) -> Option<NaiveDate> {
    if offset >= 0 {
        date.checked_add_days(Days::new(offset as u64))
    } else {
        date.checked_sub_days(Days::new(offset.unsigned_abs()))
    }
}

#[derive(Debug, Deserialize)]
struct EventRecord {
    name: String,
    date: String,
    lower_window: i64,
    upper_window: i64,
}

/// Ordered collection of calendar events
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCalendar {
    events: Vec<CalendarEvent>,
}

impl EventCalendar {
    pub fn new(events: Vec<CalendarEvent>) -> Self {
        Self { events }
    }

    /// Calendar without any events
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load a calendar table from CSV
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            ForecastError::DataUnavailable(format!(
                "Cannot open event calendar {}: {}",
                path.display(),
                e
            ))
        })?;

        let mut reader = csv::Reader::from_reader(file);
        let mut events = Vec::new();
        for record in reader.deserialize() {
            let record: EventRecord = record?;
            let date = parse_date(&record.date)?;
            events.push(CalendarEvent::new(
                record.name.trim(),
                date,
                record.lower_window,
                record.upper_window,
            )?);
        }

        let calendar = Self::new(events);
        info!(
            path = %path.display(),
            events = calendar.len(),
            names = calendar.names().len(),
            "Loaded event calendar"
        );
        Ok(calendar)
    }

    /// Load from `path` when configured, otherwise an empty calendar
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_csv(path),
            None => Ok(Self::empty()),
        }
    }

    pub fn events(&self) -> &[CalendarEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Distinct event names
    pub fn names(&self) -> BTreeSet<&str> {
        self.events.iter().map(|e| e.name.as_str()).collect()
    }

    /// Distinct (name, offset) effects, sorted; one model column each
    pub fn effect_keys(&self) -> Vec<(String, i64)> {
        let keys: BTreeSet<(String, i64)> = self
            .events
            .iter()
            .flat_map(|event| {
                (event.lower_window..=event.upper_window).map(|offset| (event.name.clone(), offset))
            })
            .collect();
        keys.into_iter().collect()
    }

    /// Map each affected day to the effect keys active on it
    pub fn day_index(&self) -> HashMap<NaiveDate, Vec<(String, i64)>> {
        let mut index: HashMap<NaiveDate, Vec<(String, i64)>> = HashMap::new();
        for event in &self.events {
            for (offset, day) in event.window() {
                index
                    .entry(day)
                    .or_default()
                    .push((event.name.clone(), offset));
            }
        }
        index
    }
}
