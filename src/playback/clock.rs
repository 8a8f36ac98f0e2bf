use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::error::PlaybackError;
use super::types::TimeWindow;

pub const DEFAULT_SPEED: f64 = 10.0;

/// Speeds offered by `next_speed`, in cycling order.
pub const SPEED_PRESETS: [f64; 4] = [1.0, 10.0, 60.0, 120.0];

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
#[strum(serialize_all = "snake_case")]
pub enum TimeStep {
    Minutes,
    Hours,
    Days,
    Months,
}

/// Virtual-time cursor over the loaded historical window.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PlaybackClock {
    virtual_time: DateTime<Utc>,
    is_playing: bool,
    speed_multiplier: f64,
    window: TimeWindow,
}

impl PlaybackClock {
    pub fn new(window: TimeWindow) -> Self {
        Self {
            virtual_time: window.end,
            is_playing: false,
            speed_multiplier: DEFAULT_SPEED,
            window,
        }
    }

    pub fn virtual_time(&self) -> DateTime<Utc> {
        self.virtual_time
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn speed(&self) -> f64 {
        self.speed_multiplier
    }

    pub fn window(&self) -> TimeWindow {
        self.window
    }

    pub fn play(&mut self) {
        self.is_playing = true;
    }

    pub fn pause(&mut self) {
        self.is_playing = false;
    }

    /// Advances virtual time by `elapsed` wall time scaled by the speed.
    ///
    /// Reaching the end of the window stops playback; it does not loop.
    pub fn tick(&mut self, elapsed: std::time::Duration) -> DateTime<Utc> {
        if !self.is_playing {
            return self.virtual_time;
        }

        let micros = (elapsed.as_secs_f64() * self.speed_multiplier * 1_000_000.0).round() as i64;
        let next = self
            .virtual_time
            .checked_add_signed(Duration::microseconds(micros))
            .unwrap_or(self.window.end);

        if next >= self.window.end {
            self.virtual_time = self.window.end;
            self.is_playing = false;
        } else {
            self.virtual_time = next.max(self.window.start);
        }
        self.virtual_time
    }

    /// Jumps to `instant`, clamped into the window. Play state is unchanged.
    pub fn seek(&mut self, instant: DateTime<Utc>) -> DateTime<Utc> {
        self.virtual_time = self.window.clamp(instant);
        self.virtual_time
    }

    /// Moves by a signed number of calendar units, then clamps like `seek`.
    pub fn step(&mut self, amount: i32, unit: TimeStep) -> DateTime<Utc> {
        let current = self.virtual_time;
        let moved = match unit {
            TimeStep::Minutes => current.checked_add_signed(Duration::minutes(amount.into())),
            TimeStep::Hours => current.checked_add_signed(Duration::hours(amount.into())),
            TimeStep::Days => current.checked_add_signed(Duration::days(amount.into())),
            TimeStep::Months if amount >= 0 => {
                current.checked_add_months(Months::new(amount.unsigned_abs()))
            }
            TimeStep::Months => current.checked_sub_months(Months::new(amount.unsigned_abs())),
        };
        let target = moved.unwrap_or(if amount >= 0 {
            self.window.end
        } else {
            self.window.start
        });
        self.seek(target)
    }

    pub fn set_speed(&mut self, multiplier: f64) -> Result<(), PlaybackError> {
        if !(multiplier.is_finite() && multiplier > 0.0) {
            return Err(PlaybackError::InvalidArgument(format!(
                "speed multiplier must be positive, got {}",
                multiplier
            )));
        }
        self.speed_multiplier = multiplier;
        Ok(())
    }

    /// Cycles through [`SPEED_PRESETS`]. Speeds outside the presets restart at the first.
    pub fn next_speed(&mut self) -> f64 {
        let next = SPEED_PRESETS
            .iter()
            .position(|&preset| preset == self.speed_multiplier)
            .map(|i| SPEED_PRESETS[(i + 1) % SPEED_PRESETS.len()])
            .unwrap_or(SPEED_PRESETS[0]);
        self.speed_multiplier = next;
        next
    }

    /// Replaces the bounds. With `reset_to_end` the cursor moves to `end` and
    /// playback stops; otherwise the cursor is re-clamped.
    pub fn set_window(
        &mut self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        reset_to_end: bool,
    ) -> Result<(), PlaybackError> {
        let window = TimeWindow::new(start, end)?;
        self.window = window;
        if reset_to_end {
            self.virtual_time = end;
            self.is_playing = false;
        } else {
            self.virtual_time = window.clamp(self.virtual_time);
        }
        Ok(())
    }
}
