mod log_file;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::playback::{FetchError, Position, Sample, TimeWindow};

pub use log_file::{parse_rows, FileHistorySource, LogFormat};

/// A row of the sample log as the store returns it, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRow {
    #[serde(default, alias = "boat_id")]
    pub unit_id: Option<String>,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub heading: Option<f64>,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub battery_level: Option<f64>,
    pub recorded_at: String,
}

impl HistoryRow {
    /// `index` is the row's position in the response, used in error reports.
    pub fn into_sample(self, index: usize) -> Result<Sample, FetchError> {
        let malformed = |reason: String| FetchError::MalformedRow { index, reason };

        let unit_id = self
            .unit_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| malformed("missing unit id".into()))?;

        let recorded_at = DateTime::parse_from_rfc3339(self.recorded_at.trim())
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| malformed(format!("timestamp {:?}: {}", self.recorded_at, e)))?;

        if !(self.lat.is_finite() && self.lon.is_finite()) {
            return Err(malformed("non-finite coordinates".into()));
        }
        if !self.heading.map_or(true, f64::is_finite) {
            return Err(malformed("non-finite heading".into()));
        }
        if !self.speed.map_or(true, f64::is_finite) {
            return Err(malformed("non-finite speed".into()));
        }
        if let Some(level) = self.battery_level {
            if !(0.0..=100.0).contains(&level) {
                return Err(malformed(format!("battery level {} outside 0..100", level)));
            }
        }

        Ok(Sample {
            unit_id,
            position: Position::new(self.lat, self.lon),
            heading: self.heading.unwrap_or(0.0).rem_euclid(360.0),
            speed: self.speed.unwrap_or(0.0).max(0.0),
            battery_level: self.battery_level,
            recorded_at,
        })
    }

    fn timestamp(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(self.recorded_at.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// Query side of the persistent sample store.
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// All rows recorded inside `window`, in no particular order.
    async fn fetch(&self, window: TimeWindow) -> Result<Vec<HistoryRow>, FetchError>;

    /// The most recent row of every unit, used to seed the live table.
    async fn latest(&self) -> Result<Vec<HistoryRow>, FetchError>;
}

/// Keeps the newest row per unit. Rows without a unit id or a readable
/// timestamp are skipped. Equal timestamps keep the later row.
pub fn latest_per_unit(rows: Vec<HistoryRow>) -> Vec<HistoryRow> {
    let mut latest: BTreeMap<String, (DateTime<Utc>, HistoryRow)> = BTreeMap::new();
    for row in rows {
        let (Some(unit_id), Some(at)) = (row.unit_id.clone(), row.timestamp()) else {
            continue;
        };
        match latest.get(&unit_id) {
            Some((seen, _)) if *seen > at => {}
            _ => {
                latest.insert(unit_id, (at, row));
            }
        }
    }
    latest.into_values().map(|(_, row)| row).collect()
}

/// Keeps rows inside `window`. Rows whose timestamp cannot be read are kept
/// so the store can reject them.
pub fn rows_in_window(rows: Vec<HistoryRow>, window: TimeWindow) -> Vec<HistoryRow> {
    rows.into_iter()
        .filter(|row| row.timestamp().map_or(true, |t| window.contains(t)))
        .collect()
}

/// Serves a fixed set of rows.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct MemoryHistorySource {
    rows: Vec<HistoryRow>,
}

#[cfg(test)]
impl MemoryHistorySource {
    pub fn new(rows: Vec<HistoryRow>) -> Self {
        Self { rows }
    }
}

#[cfg(test)]
#[async_trait]
impl HistorySource for MemoryHistorySource {
    async fn fetch(&self, window: TimeWindow) -> Result<Vec<HistoryRow>, FetchError> {
        Ok(rows_in_window(self.rows.clone(), window))
    }

    async fn latest(&self) -> Result<Vec<HistoryRow>, FetchError> {
        Ok(latest_per_unit(self.rows.clone()))
    }
}
