mod clock;
mod controller;
mod engine;
mod error;
mod interpolate;
mod live;
mod parsing;
mod projection;
mod registry;
mod store;
mod types;

pub use clock::{PlaybackClock, TimeStep};
pub use controller::{ControllerSettings, FetchTicket, ModeController, PlaybackStatus};
pub use engine::{ControlRequest, Engine, Frame};
pub use error::{FetchError, PlaybackError};
pub use interpolate::{resolve, SearchStrategy};
pub use live::FeedHealth;
pub use parsing::{deserialize_std_duration, parse_instant};
pub use registry::{UnitInfo, UnitRegistry};
pub use store::WindowData;
pub use types::{LiveUpdate, Mode, Position, Sample, SnapshotSource, TimeWindow, UnitSnapshot};
