use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::error::PlaybackError;

pub type UnitId = String;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Position {
    pub lat: f64,
    pub lon: f64,
}

impl Position {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn lerp(&self, other: &Position, factor: f64) -> Position {
        Position {
            lat: self.lat + (other.lat - self.lat) * factor,
            lon: self.lon + (other.lon - self.lon) * factor,
        }
    }
}

/// One recorded observation of a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Sample {
    #[schema(value_type = String)]
    pub unit_id: UnitId,
    pub position: Position,
    pub heading: f64,
    pub speed: f64,
    pub battery_level: Option<f64>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, strum_macros::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SnapshotSource {
    Live,
    Recorded,
    Interpolated,
}

/// Renderable state of one unit at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct UnitSnapshot {
    #[schema(value_type = String)]
    pub unit_id: UnitId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub position: Position,
    pub heading: f64,
    pub speed: f64,
    pub battery_level: Option<f64>,
    pub as_of: DateTime<Utc>,
    pub source: SnapshotSource,
}

impl From<&Sample> for UnitSnapshot {
    fn from(sample: &Sample) -> Self {
        UnitSnapshot {
            unit_id: sample.unit_id.clone(),
            name: None,
            position: sample.position,
            heading: sample.heading,
            speed: sample.speed,
            battery_level: sample.battery_level,
            as_of: sample.recorded_at,
            source: SnapshotSource::Recorded,
        }
    }
}

/// A push event from the live feed. Replaces the previous live value of the unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LiveUpdate {
    #[schema(value_type = String)]
    pub unit_id: UnitId,
    pub position: Position,
    #[serde(default)]
    pub heading: f64,
    #[serde(default)]
    pub speed: f64,
    #[serde(default)]
    pub battery_level: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl From<Sample> for LiveUpdate {
    fn from(sample: Sample) -> Self {
        LiveUpdate {
            unit_id: sample.unit_id,
            position: sample.position,
            heading: sample.heading,
            speed: sample.speed,
            battery_level: sample.battery_level,
            timestamp: sample.recorded_at,
        }
    }
}

impl From<LiveUpdate> for UnitSnapshot {
    fn from(update: LiveUpdate) -> Self {
        UnitSnapshot {
            unit_id: update.unit_id,
            name: None,
            position: update.position,
            heading: update.heading,
            speed: update.speed,
            battery_level: update.battery_level,
            as_of: update.timestamp,
            source: SnapshotSource::Live,
        }
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    ToSchema,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Mode {
    Live,
    Historical,
}

/// Inclusive time range `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, PlaybackError> {
        if start > end {
            return Err(PlaybackError::InvalidArgument(format!(
                "window start {} is after end {}",
                start.to_rfc3339(),
                end.to_rfc3339()
            )));
        }
        Ok(Self { start, end })
    }

    /// The `hours` leading up to `now`.
    pub fn last_hours(now: DateTime<Utc>, hours: f64) -> Result<Self, PlaybackError> {
        if !(hours.is_finite() && hours > 0.0) {
            return Err(PlaybackError::InvalidArgument(format!(
                "window width must be positive, got {} hours",
                hours
            )));
        }
        let width = Duration::milliseconds((hours * 3_600_000.0).round() as i64);
        let start = now
            .checked_sub_signed(width)
            .ok_or_else(|| PlaybackError::InvalidArgument("window width out of range".into()))?;
        Self::new(start, now)
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }

    pub fn clamp(&self, instant: DateTime<Utc>) -> DateTime<Utc> {
        instant.clamp(self.start, self.end)
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

/// Signed length of `d` in fractional seconds.
pub(crate) fn seconds(d: Duration) -> f64 {
    match d.num_microseconds() {
        Some(us) => us as f64 / 1_000_000.0,
        None => d.num_milliseconds() as f64 / 1_000.0,
    }
}
