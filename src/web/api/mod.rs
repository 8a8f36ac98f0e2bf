pub mod error;
pub mod live;
pub mod playback;
pub mod units;
