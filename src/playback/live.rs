use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::error::FetchError;
use super::registry::UnitRegistry;
use super::types::{LiveUpdate, UnitId, UnitSnapshot};

/// Latest pushed state of every unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveTable {
    units: BTreeMap<UnitId, UnitSnapshot>,
}

impl LiveTable {
    /// Replaces the unit's entry as a whole.
    pub fn apply(&mut self, snapshot: UnitSnapshot) {
        self.units.insert(snapshot.unit_id.clone(), snapshot);
    }

    pub fn get(&self, unit_id: &str) -> Option<&UnitSnapshot> {
        self.units.get(unit_id)
    }

    pub fn snapshots(&self) -> impl Iterator<Item = &UnitSnapshot> {
        self.units.values()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FeedHealth {
    Waiting,
    Receiving { last_event: DateTime<Utc> },
    Down { since: DateTime<Utc>, reason: String },
}

/// Merges push events into the live table.
///
/// Runs in both modes; whether the table is displayed is decided by the
/// projection.
#[derive(Debug, Clone)]
pub struct LiveFeed {
    table: LiveTable,
    health: FeedHealth,
}

impl Default for LiveFeed {
    fn default() -> Self {
        Self {
            table: LiveTable::default(),
            health: FeedHealth::Waiting,
        }
    }
}

impl LiveFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when the update was dropped for an unregistered unit.
    pub fn ingest(&mut self, update: LiveUpdate, registry: &UnitRegistry) -> bool {
        let last_event = update.timestamp;
        if !self.store(update, registry) {
            return false;
        }
        self.health = FeedHealth::Receiving { last_event };
        true
    }

    /// Loads a last known position before the feed delivers anything.
    /// Feed health is left alone.
    pub fn seed(&mut self, update: LiveUpdate, registry: &UnitRegistry) -> bool {
        self.store(update, registry)
    }

    fn store(&mut self, update: LiveUpdate, registry: &UnitRegistry) -> bool {
        if !registry.accepts(&update.unit_id) {
            log::debug!("Dropping live update for unregistered unit {}", update.unit_id);
            return false;
        }
        let mut snapshot = UnitSnapshot::from(update);
        snapshot.name = registry.name(&snapshot.unit_id).map(String::from);
        self.table.apply(snapshot);
        true
    }

    /// The transport went away. Last known positions stay in the table.
    pub fn mark_down(&mut self, error: &FetchError, now: DateTime<Utc>) {
        log::warn!("Live feed down: {}", error);
        self.health = FeedHealth::Down {
            since: now,
            reason: error.to_string(),
        };
    }

    pub fn table(&self) -> &LiveTable {
        &self.table
    }

    pub fn health(&self) -> &FeedHealth {
        &self.health
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::registry::UnitInfo;
    use crate::playback::types::{Position, SnapshotSource};
    use chrono::TimeZone;

    fn update(unit: &str, lat: f64, battery: Option<f64>) -> LiveUpdate {
        LiveUpdate {
            unit_id: unit.to_string(),
            position: Position::new(lat, 77.5),
            heading: 45.0,
            speed: 3.0,
            battery_level: battery,
            timestamp: Utc.with_ymd_and_hms(2025, 3, 1, 6, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_update_replaces_whole_entry() {
        let mut feed = LiveFeed::new();
        let registry = UnitRegistry::default();

        assert!(feed.ingest(update("boat-1", 8.0, Some(90.0)), &registry));
        assert!(feed.ingest(update("boat-1", 8.1, None), &registry));

        let entry = feed.table().get("boat-1").unwrap();
        assert_eq!(entry.position.lat, 8.1);
        assert_eq!(entry.battery_level, None);
        assert_eq!(entry.source, SnapshotSource::Live);
        assert_eq!(feed.table().len(), 1);
    }

    #[test]
    fn test_registry_filters_and_names_units() {
        let registry = UnitRegistry::new(vec![UnitInfo {
            id: "boat-1".into(),
            name: "Sea Star".into(),
            registration_number: None,
        }]);
        let mut feed = LiveFeed::new();

        assert!(feed.ingest(update("boat-1", 8.0, None), &registry));
        assert!(!feed.ingest(update("stranger", 8.0, None), &registry));

        assert_eq!(feed.table().len(), 1);
        assert_eq!(feed.table().get("boat-1").unwrap().name.as_deref(), Some("Sea Star"));
    }

    #[test]
    fn test_seed_fills_table_without_touching_health() {
        let registry = UnitRegistry::new(vec![UnitInfo {
            id: "boat-1".into(),
            name: "Sea Star".into(),
            registration_number: None,
        }]);
        let mut feed = LiveFeed::new();

        assert!(feed.seed(update("boat-1", 8.0, Some(40.0)), &registry));
        assert!(!feed.seed(update("stranger", 8.0, None), &registry));

        assert_eq!(feed.health(), &FeedHealth::Waiting);
        let entry = feed.table().get("boat-1").unwrap();
        assert_eq!(entry.name.as_deref(), Some("Sea Star"));
        assert_eq!(entry.source, SnapshotSource::Live);
    }

    #[test]
    fn test_feed_down_keeps_last_positions() {
        let mut feed = LiveFeed::new();
        assert_eq!(feed.health(), &FeedHealth::Waiting);

        feed.ingest(update("boat-1", 8.0, None), &UnitRegistry::default());
        assert!(matches!(feed.health(), FeedHealth::Receiving { .. }));

        feed.mark_down(&FetchError::LiveFeed("channel closed".into()), Utc::now());
        match feed.health() {
            FeedHealth::Down { reason, .. } => assert!(reason.contains("channel closed")),
            other => panic!("unexpected health {:?}", other),
        }
        assert!(feed.table().get("boat-1").is_some());
    }
}
