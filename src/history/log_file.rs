use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::playback::{FetchError, TimeWindow};

use super::{latest_per_unit, rows_in_window, HistoryRow, HistorySource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Yaml,
    Json,
}

impl LogFormat {
    /// Picks the format from the file extension; anything but `.json` is read as YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Yaml,
        }
    }
}

/// Parses an exported sample log: a top-level list of rows.
pub fn parse_rows(content: &str, format: LogFormat) -> Result<Vec<HistoryRow>, FetchError> {
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    let rows = match format {
        LogFormat::Yaml => serde_yaml::from_str(content)?,
        LogFormat::Json => serde_json::from_str(content)?,
    };
    Ok(rows)
}

/// History backed by an exported sample log on disk.
///
/// The file is re-read on every fetch, so an export refreshed in place is
/// picked up by the next window load.
pub struct FileHistorySource {
    path: PathBuf,
    format: LogFormat,
}

impl FileHistorySource {
    pub fn new(path: PathBuf) -> Self {
        let format = LogFormat::from_path(&path);
        Self { path, format }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_rows(&self) -> Result<Vec<HistoryRow>, FetchError> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            FetchError::Query(format!("reading {}: {}", self.path.display(), e))
        })?;
        parse_rows(&content, self.format)
    }

    /// Every row of the log, unfiltered.
    pub fn load_all(&self) -> Result<Vec<HistoryRow>, FetchError> {
        let content = std::fs::read_to_string(&self.path)?;
        parse_rows(&content, self.format)
    }
}

#[async_trait]
impl HistorySource for FileHistorySource {
    async fn fetch(&self, window: TimeWindow) -> Result<Vec<HistoryRow>, FetchError> {
        Ok(rows_in_window(self.read_rows().await?, window))
    }

    async fn latest(&self) -> Result<Vec<HistoryRow>, FetchError> {
        Ok(latest_per_unit(self.read_rows().await?))
    }
}
