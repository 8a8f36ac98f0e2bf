use std::collections::{BTreeMap, HashMap};

use super::clock::PlaybackClock;
use super::interpolate::{resolve, SearchStrategy, SeriesCursor};
use super::live::LiveTable;
use super::registry::UnitRegistry;
use super::store::SampleSeries;
use super::types::{Mode, UnitId, UnitSnapshot};

/// Builds the displayed unit set for one frame.
///
/// Holds only search hints; the output depends solely on its inputs.
#[derive(Debug, Default)]
pub struct Projector {
    strategy: SearchStrategy,
    cursors: HashMap<UnitId, SeriesCursor>,
}

impl Projector {
    pub fn new(strategy: SearchStrategy) -> Self {
        Self {
            strategy,
            cursors: HashMap::new(),
        }
    }

    /// Forgets all search hints, e.g. after the series were replaced.
    pub fn reset(&mut self) {
        self.cursors.clear();
    }

    /// LIVE: the live table verbatim. HISTORICAL: every unit with a series,
    /// resolved at the clock's virtual time; unresolvable units are left out.
    pub fn project(
        &mut self,
        mode: Mode,
        clock: Option<&PlaybackClock>,
        live: &LiveTable,
        series: &BTreeMap<UnitId, SampleSeries>,
        registry: &UnitRegistry,
    ) -> Vec<UnitSnapshot> {
        match (mode, clock) {
            (Mode::Live, _) => live.snapshots().cloned().collect(),
            (Mode::Historical, None) => Vec::new(),
            (Mode::Historical, Some(clock)) => {
                let instant = clock.virtual_time();
                let mut units = Vec::with_capacity(series.len());
                for (unit_id, unit_series) in series {
                    let resolved = match self.strategy {
                        SearchStrategy::Binary => resolve(unit_series, instant),
                        SearchStrategy::Sweep => self
                            .cursors
                            .entry(unit_id.clone())
                            .or_default()
                            .resolve(unit_series, instant),
                    };
                    if let Some(mut snapshot) = resolved {
                        snapshot.name = registry.name(unit_id).map(String::from);
                        units.push(snapshot);
                    }
                }
                units
            }
        }
    }
}
