use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::history::HistoryRow;

use super::clock::{PlaybackClock, TimeStep, DEFAULT_SPEED};
use super::error::{FetchError, PlaybackError};
use super::interpolate::SearchStrategy;
use super::live::{FeedHealth, LiveFeed};
use super::projection::Projector;
use super::registry::UnitRegistry;
use super::store::{SampleStore, WindowData};
use super::types::{LiveUpdate, Mode, TimeWindow, UnitSnapshot};

pub const DEFAULT_WINDOW_HOURS: f64 = 24.0;

/// Window widths offered to the range selector.
pub const WINDOW_PRESETS_HOURS: [f64; 5] = [1.0, 6.0, 12.0, 24.0, 168.0];

#[derive(Debug, Clone, Copy)]
pub struct ControllerSettings {
    pub window_hours: f64,
    pub speed: f64,
    pub strategy: SearchStrategy,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            window_hours: DEFAULT_WINDOW_HOURS,
            speed: DEFAULT_SPEED,
            strategy: SearchStrategy::default(),
        }
    }
}

/// Tag of an issued window load. Only the latest ticket may be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct FetchTicket {
    pub generation: u64,
    pub mode: Mode,
    pub window: TimeWindow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied { units: usize, samples: usize },
    Stale,
    Failed,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlaybackStatus {
    pub mode: Mode,
    pub clock: PlaybackClock,
    pub window_hours: f64,
    pub window_presets_hours: Vec<f64>,
    pub loaded_window: Option<TimeWindow>,
    pub pending_fetch: Option<FetchTicket>,
    /// Set while the displayed history is older than the last requested window.
    pub last_fetch_error: Option<String>,
    pub live_feed: FeedHealth,
    pub live_units: usize,
    pub historical_units: usize,
    pub historical_samples: usize,
}

/// Owns the display mode and every piece of state that depends on it.
pub struct ModeController {
    mode: Mode,
    clock: PlaybackClock,
    store: SampleStore,
    live: LiveFeed,
    registry: UnitRegistry,
    projector: Projector,
    window_hours: f64,
    generation: u64,
    pending: Option<FetchTicket>,
    last_fetch_error: Option<String>,
}

impl ModeController {
    pub fn new(
        settings: ControllerSettings,
        registry: UnitRegistry,
        now: DateTime<Utc>,
    ) -> Result<Self, PlaybackError> {
        let mut clock = PlaybackClock::new(TimeWindow::last_hours(now, settings.window_hours)?);
        clock.set_speed(settings.speed)?;

        Ok(Self {
            mode: Mode::Live,
            clock,
            store: SampleStore::new(),
            live: LiveFeed::new(),
            registry,
            projector: Projector::new(settings.strategy),
            window_hours: settings.window_hours,
            generation: 0,
            pending: None,
            last_fetch_error: None,
        })
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn clock(&self) -> &PlaybackClock {
        &self.clock
    }

    pub fn store(&self) -> &SampleStore {
        &self.store
    }

    pub fn live(&self) -> &LiveFeed {
        &self.live
    }

    pub fn pending(&self) -> Option<FetchTicket> {
        self.pending
    }

    pub fn window_hours(&self) -> f64 {
        self.window_hours
    }

    /// LIVE -> HISTORICAL. Returns the load the caller has to run, or `None`
    /// when already historical.
    pub fn enter_historical(&mut self, now: DateTime<Utc>) -> Option<FetchTicket> {
        if self.mode == Mode::Historical {
            return None;
        }
        log::info!("Switching to historical mode ({} h window)", self.window_hours);
        self.mode = Mode::Historical;
        match TimeWindow::last_hours(now, self.window_hours) {
            Ok(window) => Some(self.issue(window)),
            Err(e) => {
                log::error!("Cannot build history window: {}", e);
                None
            }
        }
    }

    /// HISTORICAL -> LIVE. Any outstanding load becomes stale.
    pub fn enter_live(&mut self) {
        if self.mode == Mode::Live {
            return;
        }
        log::info!("Switching to live mode");
        self.mode = Mode::Live;
        self.clock.pause();
        self.store.clear();
        self.projector.reset();
        self.pending = None;
        self.last_fetch_error = None;
    }

    pub fn set_mode(&mut self, mode: Mode, now: DateTime<Utc>) -> Option<FetchTicket> {
        match mode {
            Mode::Historical => self.enter_historical(now),
            Mode::Live => {
                self.enter_live();
                None
            }
        }
    }

    pub fn toggle(&mut self, now: DateTime<Utc>) -> Option<FetchTicket> {
        match self.mode {
            Mode::Live => self.set_mode(Mode::Historical, now),
            Mode::Historical => self.set_mode(Mode::Live, now),
        }
    }

    /// Changes the window width. While historical this reloads `now - hours .. now`;
    /// while live the width is kept for the next entry.
    pub fn set_window_hours(
        &mut self,
        hours: f64,
        now: DateTime<Utc>,
    ) -> Result<Option<FetchTicket>, PlaybackError> {
        let window = TimeWindow::last_hours(now, hours)?;
        self.window_hours = hours;
        if self.mode == Mode::Historical {
            Ok(Some(self.issue(window)))
        } else {
            Ok(None)
        }
    }

    fn issue(&mut self, window: TimeWindow) -> FetchTicket {
        self.generation += 1;
        let ticket = FetchTicket {
            generation: self.generation,
            mode: self.mode,
            window,
        };
        if let Some(previous) = self.pending.replace(ticket) {
            log::debug!("Fetch #{} superseded by #{}", previous.generation, ticket.generation);
        }
        log::info!(
            "Loading history #{} for {} .. {}",
            ticket.generation,
            window.start.to_rfc3339(),
            window.end.to_rfc3339()
        );
        ticket
    }

    /// Applies the result of a load if `ticket` is still the one being waited for.
    ///
    /// A failed load keeps the previous series and clock window.
    pub fn apply_fetch(
        &mut self,
        ticket: FetchTicket,
        result: Result<WindowData, FetchError>,
    ) -> FetchOutcome {
        if self.mode != ticket.mode || self.pending != Some(ticket) {
            log::debug!("Discarding stale history fetch #{}", ticket.generation);
            return FetchOutcome::Stale;
        }
        self.pending = None;

        let data = match result {
            Ok(data) => data,
            Err(e) => {
                log::warn!("History fetch #{} failed: {}", ticket.generation, e);
                self.last_fetch_error = Some(e.to_string());
                return FetchOutcome::Failed;
            }
        };

        if let Err(e) = self
            .clock
            .set_window(ticket.window.start, ticket.window.end, true)
        {
            // windows are validated when issued
            log::error!("Rejected window for fetch #{}: {}", ticket.generation, e);
            self.last_fetch_error = Some(e.to_string());
            return FetchOutcome::Failed;
        }

        let units = data.series.len();
        let samples = data.sample_count();
        self.store.install(data);
        self.projector.reset();
        self.last_fetch_error = None;
        log::info!(
            "History #{} loaded: {} samples across {} units",
            ticket.generation,
            samples,
            units
        );
        FetchOutcome::Applied { units, samples }
    }

    /// Merges a push event. Always lands in the live table, whatever the mode.
    pub fn ingest_live(&mut self, update: LiveUpdate) -> bool {
        self.live.ingest(update, &self.registry)
    }

    pub fn live_feed_down(&mut self, error: &FetchError, now: DateTime<Utc>) {
        self.live.mark_down(error, now);
    }

    /// Fills the live table with the last recorded row of each unit.
    /// Malformed rows are skipped. Returns how many units were seeded.
    pub fn seed_live(&mut self, rows: Vec<HistoryRow>) -> usize {
        let mut seeded = 0;
        for (index, row) in rows.into_iter().enumerate() {
            match row.into_sample(index) {
                Ok(sample) => {
                    if self.live.seed(LiveUpdate::from(sample), &self.registry) {
                        seeded += 1;
                    }
                }
                Err(e) => log::warn!("Skipping live seed row: {}", e),
            }
        }
        seeded
    }

    pub fn play(&mut self) {
        if self.mode == Mode::Historical {
            self.clock.play();
        } else {
            log::debug!("Ignoring play while live");
        }
    }

    pub fn pause(&mut self) {
        self.clock.pause();
    }

    pub fn seek(&mut self, instant: DateTime<Utc>) -> DateTime<Utc> {
        self.clock.seek(instant)
    }

    pub fn step(&mut self, amount: i32, unit: TimeStep) -> DateTime<Utc> {
        self.clock.step(amount, unit)
    }

    pub fn set_speed(&mut self, multiplier: f64) -> Result<(), PlaybackError> {
        self.clock.set_speed(multiplier)
    }

    pub fn next_speed(&mut self) -> f64 {
        self.clock.next_speed()
    }

    /// One animation frame: advance the clock (historical only) and project.
    pub fn tick(&mut self, elapsed: std::time::Duration) -> Vec<UnitSnapshot> {
        if self.mode == Mode::Historical {
            self.clock.tick(elapsed);
        }
        self.project()
    }

    /// Projects the current state without advancing the clock.
    pub fn project(&mut self) -> Vec<UnitSnapshot> {
        let clock = match self.mode {
            Mode::Historical => Some(&self.clock),
            Mode::Live => None,
        };
        self.projector.project(
            self.mode,
            clock,
            self.live.table(),
            self.store.series(),
            &self.registry,
        )
    }

    pub fn status(&self) -> PlaybackStatus {
        PlaybackStatus {
            mode: self.mode,
            clock: self.clock.clone(),
            window_hours: self.window_hours,
            window_presets_hours: WINDOW_PRESETS_HOURS.to_vec(),
            loaded_window: self.store.window(),
            pending_fetch: self.pending,
            last_fetch_error: self.last_fetch_error.clone(),
            live_feed: self.live.health().clone(),
            live_units: self.live.table().len(),
            historical_units: self.store.unit_count(),
            historical_samples: self.store.sample_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::registry::UnitInfo;
    use crate::playback::types::Position;
    use chrono::{Duration, TimeZone};
    use std::time::Duration as StdDuration;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn controller() -> ModeController {
        ModeController::new(ControllerSettings::default(), UnitRegistry::default(), now()).unwrap()
    }

    fn row(unit: &str, at: DateTime<Utc>, lat: f64) -> HistoryRow {
        HistoryRow {
            unit_id: Some(unit.to_string()),
            lat,
            lon: 0.0,
            heading: Some(0.0),
            speed: Some(5.0),
            battery_level: None,
            recorded_at: at.to_rfc3339(),
        }
    }

    fn history_for(ticket: &FetchTicket) -> WindowData {
        let end = ticket.window.end;
        WindowData::from_rows(
            ticket.window,
            vec![
                row("boat-1", end - Duration::hours(2), 0.0),
                row("boat-1", end - Duration::hours(1), 10.0),
            ],
        )
        .unwrap()
    }

    fn live_update(lat: f64) -> LiveUpdate {
        LiveUpdate {
            unit_id: "boat-1".into(),
            position: Position::new(lat, 77.0),
            heading: 180.0,
            speed: 2.0,
            battery_level: Some(55.0),
            timestamp: now(),
        }
    }

    fn live_table_snapshots(c: &ModeController) -> Vec<UnitSnapshot> {
        c.live().table().snapshots().cloned().collect()
    }

    #[test]
    fn test_starts_live() {
        let c = controller();
        assert_eq!(c.mode(), Mode::Live);
        assert!(c.pending().is_none());
        assert_eq!(c.clock().speed(), DEFAULT_SPEED);
    }

    #[test]
    fn test_enter_historical_issues_default_window() {
        let mut c = controller();
        let ticket = c.toggle(now()).unwrap();

        assert_eq!(c.mode(), Mode::Historical);
        assert_eq!(ticket.mode, Mode::Historical);
        assert_eq!(ticket.window.end, now());
        assert_eq!(ticket.window.duration(), Duration::hours(24));
        assert_eq!(c.pending(), Some(ticket));
        assert!(c.enter_historical(now()).is_none());
    }

    #[test]
    fn test_applied_fetch_initializes_clock() {
        let mut c = controller();
        let ticket = c.toggle(now()).unwrap();
        let data = history_for(&ticket);

        let outcome = c.apply_fetch(ticket, Ok(data));
        assert_eq!(outcome, FetchOutcome::Applied { units: 1, samples: 2 });
        assert_eq!(c.clock().window(), ticket.window);
        assert_eq!(c.clock().virtual_time(), ticket.window.end);
        assert!(!c.clock().is_playing());
        assert!(c.pending().is_none());

        // window end is after the last sample, so nothing is shown yet
        assert!(c.tick(StdDuration::from_millis(16)).is_empty());

        c.seek(now() - Duration::minutes(90));
        let units = c.tick(StdDuration::from_millis(16));
        assert_eq!(units.len(), 1);
        assert!((units[0].position.lat - 5.0).abs() < 1e-9);
        assert_eq!(units[0].speed, 5.0);
    }

    #[test]
    fn test_playing_advances_only_in_historical() {
        let mut c = controller();
        c.play();
        assert!(!c.clock().is_playing());

        let ticket = c.toggle(now()).unwrap();
        c.apply_fetch(ticket, Ok(history_for(&ticket)));
        let start = now() - Duration::hours(2);
        c.seek(start);
        c.play();
        c.tick(StdDuration::from_secs(6));
        assert_eq!(c.clock().virtual_time(), start + Duration::seconds(60));
    }

    #[test]
    fn test_round_trip_projects_exact_live_table() {
        let mut c = controller();
        c.ingest_live(live_update(8.0));
        let before = c.tick(StdDuration::from_millis(16));
        assert_eq!(before, live_table_snapshots(&c));

        let ticket = c.toggle(now()).unwrap();
        c.apply_fetch(ticket, Ok(history_for(&ticket)));
        c.seek(now() - Duration::minutes(90));
        c.play();
        let historical = c.tick(StdDuration::from_millis(16));
        assert_ne!(historical, before);

        // pushed while historical: kept, not shown
        c.ingest_live(live_update(9.0));
        let still_historical = c.tick(StdDuration::from_millis(16));
        assert!(still_historical.iter().all(|u| u.position.lat < 9.0));

        c.toggle(now());
        assert_eq!(c.mode(), Mode::Live);
        assert!(!c.clock().is_playing());
        assert_eq!(c.store().unit_count(), 0);

        let after = c.tick(StdDuration::from_millis(16));
        assert_eq!(after, live_table_snapshots(&c));
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].position.lat, 9.0);
    }

    #[test]
    fn test_stale_fetch_after_returning_live_is_discarded() {
        let mut c = controller();
        c.ingest_live(live_update(8.0));
        let clock_before = c.clock().clone();

        let ticket = c.toggle(now()).unwrap();
        c.toggle(now());
        let data = history_for(&ticket);

        assert_eq!(c.apply_fetch(ticket, Ok(data)), FetchOutcome::Stale);
        assert_eq!(c.store().unit_count(), 0);
        assert_eq!(c.store().window(), None);
        assert_eq!(c.clock(), &clock_before);
        assert_eq!(c.tick(StdDuration::from_millis(16)), live_table_snapshots(&c));
    }

    #[test]
    fn test_stale_fetch_after_reentering_is_discarded() {
        let mut c = controller();
        let first = c.toggle(now()).unwrap();
        c.toggle(now());
        let second = c.toggle(now() + Duration::minutes(1)).unwrap();
        assert_ne!(first, second);

        assert_eq!(c.apply_fetch(first, Ok(history_for(&first))), FetchOutcome::Stale);
        assert_eq!(c.pending(), Some(second));
        assert!(matches!(
            c.apply_fetch(second, Ok(history_for(&second))),
            FetchOutcome::Applied { .. }
        ));
    }

    #[test]
    fn test_window_change_supersedes_pending_fetch() {
        let mut c = controller();
        let wide = c.toggle(now()).unwrap();
        let narrow = c.set_window_hours(6.0, now()).unwrap().unwrap();

        assert_eq!(c.mode(), Mode::Historical);
        assert_eq!(narrow.window.duration(), Duration::hours(6));
        assert_eq!(c.apply_fetch(wide, Ok(history_for(&wide))), FetchOutcome::Stale);
        assert!(matches!(
            c.apply_fetch(narrow, Ok(history_for(&narrow))),
            FetchOutcome::Applied { .. }
        ));
        assert_eq!(c.clock().window(), narrow.window);
    }

    #[test]
    fn test_window_change_while_live_is_remembered() {
        let mut c = controller();
        assert!(c.set_window_hours(1.0, now()).unwrap().is_none());
        assert_eq!(c.mode(), Mode::Live);

        let ticket = c.toggle(now()).unwrap();
        assert_eq!(ticket.window.duration(), Duration::hours(1));
    }

    #[test]
    fn test_invalid_arguments_do_not_mutate() {
        let mut c = controller();
        let ticket = c.toggle(now()).unwrap();

        assert!(matches!(
            c.set_window_hours(0.0, now()),
            Err(PlaybackError::InvalidArgument(_))
        ));
        assert!(matches!(c.set_speed(-2.0), Err(PlaybackError::InvalidArgument(_))));
        assert_eq!(c.window_hours(), DEFAULT_WINDOW_HOURS);
        assert_eq!(c.pending(), Some(ticket));
        assert_eq!(c.clock().speed(), DEFAULT_SPEED);
    }

    #[test]
    fn test_failed_fetch_keeps_previous_window() {
        let mut c = controller();
        let first = c.toggle(now()).unwrap();
        c.apply_fetch(first, Ok(history_for(&first)));
        let seek_to = now() - Duration::minutes(90);
        c.seek(seek_to);

        let second = c.set_window_hours(6.0, now() + Duration::hours(1)).unwrap().unwrap();
        let outcome = c.apply_fetch(second, Err(FetchError::Query("connection reset".into())));

        assert_eq!(outcome, FetchOutcome::Failed);
        assert_eq!(c.clock().window(), first.window);
        assert_eq!(c.clock().virtual_time(), seek_to);
        assert_eq!(c.store().window(), Some(first.window));
        assert_eq!(c.store().sample_count(), 2);
        assert_eq!(c.tick(StdDuration::ZERO).len(), 1);

        let status = c.status();
        assert!(status.last_fetch_error.is_some());
        assert!(status.pending_fetch.is_none());
    }

    #[test]
    fn test_seeded_live_table_is_projected_before_any_push() {
        let registry = UnitRegistry::new(vec![
            UnitInfo {
                id: "boat-1".into(),
                name: "Sea Star".into(),
                registration_number: None,
            },
            UnitInfo {
                id: "boat-2".into(),
                name: "Blue Wave".into(),
                registration_number: None,
            },
        ]);
        let mut c = ModeController::new(ControllerSettings::default(), registry, now()).unwrap();
        let mut broken = row("boat-2", now(), 1.0);
        broken.recorded_at = "garbage".into();

        let seeded = c.seed_live(vec![
            row("boat-1", now() - Duration::hours(1), 8.5),
            broken,
            row("stranger", now(), 3.0),
        ]);

        assert_eq!(seeded, 1);
        assert_eq!(c.status().live_feed, FeedHealth::Waiting);
        let units = c.tick(StdDuration::from_millis(16));
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].unit_id, "boat-1");
        assert_eq!(units[0].name.as_deref(), Some("Sea Star"));
        assert_eq!(units[0].position.lat, 8.5);
        assert_eq!(units[0].as_of, now() - Duration::hours(1));
    }

    #[test]
    fn test_status_reports_counts() {
        let mut c = controller();
        c.ingest_live(live_update(8.0));
        let ticket = c.toggle(now()).unwrap();
        c.apply_fetch(ticket, Ok(history_for(&ticket)));

        let status = c.status();
        assert_eq!(status.mode, Mode::Historical);
        assert_eq!(status.live_units, 1);
        assert_eq!(status.historical_units, 1);
        assert_eq!(status.historical_samples, 2);
        assert_eq!(status.loaded_window, Some(ticket.window));
        assert_eq!(status.window_presets_hours, WINDOW_PRESETS_HOURS.to_vec());
    }
}
