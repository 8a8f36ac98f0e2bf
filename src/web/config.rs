use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::playback::{
    deserialize_std_duration, ControllerSettings, SearchStrategy, UnitInfo, UnitRegistry,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub web: WebConfig,
    pub history: HistoryConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub units: Vec<UnitInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryConfig {
    /// Exported sample log, `.yaml` or `.json`.
    pub path: PathBuf,
    /// Fill the live table from the newest row of each unit at startup.
    #[serde(default = "default_seed_live")]
    pub seed_live: bool,
}

fn default_seed_live() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaybackConfig {
    #[serde(default = "default_window_hours")]
    pub default_window_hours: f64,
    #[serde(default = "default_speed")]
    pub default_speed: f64,
    #[serde(
        default = "default_frame_interval",
        deserialize_with = "deserialize_std_duration"
    )]
    pub frame_interval: Duration,
    #[serde(default)]
    pub search: SearchStrategy,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            default_window_hours: default_window_hours(),
            default_speed: default_speed(),
            frame_interval: default_frame_interval(),
            search: SearchStrategy::default(),
        }
    }
}

fn default_window_hours() -> f64 {
    ControllerSettings::default().window_hours
}

fn default_speed() -> f64 {
    ControllerSettings::default().speed
}

fn default_frame_interval() -> Duration {
    Duration::from_millis(16)
}

impl PlaybackConfig {
    pub fn settings(&self) -> ControllerSettings {
        ControllerSettings {
            window_hours: self.default_window_hours,
            speed: self.default_speed,
            strategy: self.search,
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn registry(&self) -> UnitRegistry {
        UnitRegistry::new(self.units.iter().cloned())
    }
}
