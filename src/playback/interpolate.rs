//! Continuous position, heading and speed between recorded samples.
//!
//! A unit is only resolved while the query instant lies inside its recorded
//! span. Outside of it the unit is hidden rather than extrapolated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::store::SampleSeries;
use super::types::{seconds, Sample, SnapshotSource, UnitSnapshot};

/// How the bracketing pair is located in a series.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    ToSchema,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SearchStrategy {
    /// Walk from the bracket found on the previous call.
    #[default]
    Sweep,
    Binary,
}

/// Resolves `series` at `instant` using binary search.
pub fn resolve(series: &SampleSeries, instant: DateTime<Utc>) -> Option<UnitSnapshot> {
    let samples = series.samples();
    let upper = samples.partition_point(|s| s.recorded_at < instant);
    blend(samples, upper, instant)
}

/// Remembers where the last bracket was found in one series.
///
/// Playback mostly moves forward, so the next bracket is usually the same
/// one or a few samples ahead.
#[derive(Debug, Clone, Default)]
pub struct SeriesCursor {
    upper: usize,
}

impl SeriesCursor {
    pub fn resolve(&mut self, series: &SampleSeries, instant: DateTime<Utc>) -> Option<UnitSnapshot> {
        let samples = series.samples();
        let mut upper = self.upper.min(samples.len());
        while upper < samples.len() && samples[upper].recorded_at < instant {
            upper += 1;
        }
        while upper > 0 && samples[upper - 1].recorded_at >= instant {
            upper -= 1;
        }
        self.upper = upper;
        blend(samples, upper, instant)
    }
}

/// `upper` is the index of the first sample recorded at or after `instant`.
///
/// The chosen bracket is always the lowest-index pair containing `instant`,
/// whichever search produced `upper`.
fn blend(samples: &[Sample], upper: usize, instant: DateTime<Utc>) -> Option<UnitSnapshot> {
    if samples.len() < 2 || upper >= samples.len() {
        return None;
    }
    if upper == 0 && samples[0].recorded_at > instant {
        return None;
    }

    let lower = upper.saturating_sub(1);
    let p1 = &samples[lower];
    let p2 = &samples[lower + 1];

    let span = seconds(p2.recorded_at - p1.recorded_at);
    let factor = if span > 0.0 {
        seconds(instant - p1.recorded_at) / span
    } else {
        0.0
    };

    if factor == 0.0 && instant == p1.recorded_at {
        return Some(UnitSnapshot::from(p1));
    }

    Some(UnitSnapshot {
        unit_id: p1.unit_id.clone(),
        name: None,
        position: p1.position.lerp(&p2.position, factor),
        heading: blend_heading(p1.heading, p2.heading, factor),
        // speed is a step function between samples
        speed: p1.speed,
        battery_level: p1.battery_level,
        as_of: instant,
        source: SnapshotSource::Interpolated,
    })
}

/// Blends two compass headings along the shorter arc.
pub fn blend_heading(h1: f64, h2: f64, factor: f64) -> f64 {
    let (mut h1, mut h2) = (h1, h2);
    if (h2 - h1).abs() > 180.0 {
        if h2 > h1 {
            h1 += 360.0;
        } else {
            h2 += 360.0;
        }
    }
    (h1 + (h2 - h1) * factor).rem_euclid(360.0)
}
