use std::collections::BTreeMap;

use crate::history::{HistoryRow, HistorySource};

use super::error::FetchError;
use super::types::{Sample, TimeWindow, UnitId};

/// Samples of one unit, ordered by `recorded_at`. Equal instants keep arrival order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleSeries {
    samples: Vec<Sample>,
}

impl SampleSeries {
    pub fn from_unsorted(mut samples: Vec<Sample>) -> Self {
        // stable, so ties stay in arrival order
        samples.sort_by_key(|s| s.recorded_at);
        Self { samples }
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn span(&self) -> Option<TimeWindow> {
        match (self.samples.first(), self.samples.last()) {
            (Some(first), Some(last)) => Some(TimeWindow {
                start: first.recorded_at,
                end: last.recorded_at,
            }),
            _ => None,
        }
    }
}

/// Result of one window load, partitioned by unit.
#[derive(Debug, Clone, Default)]
pub struct WindowData {
    pub window: Option<TimeWindow>,
    pub series: BTreeMap<UnitId, SampleSeries>,
}

impl WindowData {
    /// Validates every row and keeps the ones inside `window`.
    ///
    /// A single malformed row fails the whole load so that a partial
    /// result never replaces good data.
    pub fn from_rows(window: TimeWindow, rows: Vec<HistoryRow>) -> Result<Self, FetchError> {
        let mut samples = validate(rows)?;
        samples.retain(|s| window.contains(s.recorded_at));
        Ok(Self {
            window: Some(window),
            series: partition(samples),
        })
    }

    /// Every row of an exported log; the window is the span the rows cover.
    pub fn from_log(rows: Vec<HistoryRow>) -> Result<Self, FetchError> {
        let samples = validate(rows)?;
        let start = samples.iter().map(|s| s.recorded_at).min();
        let end = samples.iter().map(|s| s.recorded_at).max();
        let window = match (start, end) {
            (Some(start), Some(end)) => Some(TimeWindow { start, end }),
            _ => None,
        };
        Ok(Self {
            window,
            series: partition(samples),
        })
    }

    pub fn sample_count(&self) -> usize {
        self.series.values().map(SampleSeries::len).sum()
    }
}

fn validate(rows: Vec<HistoryRow>) -> Result<Vec<Sample>, FetchError> {
    rows.into_iter()
        .enumerate()
        .map(|(index, row)| row.into_sample(index))
        .collect()
}

fn partition(samples: Vec<Sample>) -> BTreeMap<UnitId, SampleSeries> {
    let mut partitions: BTreeMap<UnitId, Vec<Sample>> = BTreeMap::new();
    for sample in samples {
        partitions
            .entry(sample.unit_id.clone())
            .or_default()
            .push(sample);
    }
    partitions
        .into_iter()
        .map(|(unit, samples)| (unit, SampleSeries::from_unsorted(samples)))
        .collect()
}

/// Holds the series of the current historical session.
#[derive(Debug, Default)]
pub struct SampleStore {
    data: WindowData,
}

impl SampleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queries `source` for `window` and partitions the rows.
    ///
    /// Does not touch any store: the caller decides whether the result is
    /// still wanted when it arrives and then hands it to [`SampleStore::install`].
    pub async fn load_window(
        source: &dyn HistorySource,
        window: TimeWindow,
    ) -> Result<WindowData, FetchError> {
        let rows = source.fetch(window).await?;
        WindowData::from_rows(window, rows)
    }

    pub fn install(&mut self, data: WindowData) {
        self.data = data;
    }

    pub fn clear(&mut self) {
        self.data = WindowData::default();
    }

    pub fn window(&self) -> Option<TimeWindow> {
        self.data.window
    }

    pub fn series(&self) -> &BTreeMap<UnitId, SampleSeries> {
        &self.data.series
    }

    pub fn unit_count(&self) -> usize {
        self.data.series.len()
    }

    pub fn sample_count(&self) -> usize {
        self.data.sample_count()
    }
}
