use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("history query failed: {0}")]
    Query(String),
    #[error("malformed payload: {0}")]
    Payload(String),
    #[error("malformed row {index}: {reason}")]
    MalformedRow { index: usize, reason: String },
    #[error("live feed unavailable: {0}")]
    LiveFeed(String),
}

impl From<std::io::Error> for FetchError {
    fn from(err: std::io::Error) -> Self {
        FetchError::Query(err.to_string())
    }
}

impl From<serde_yaml::Error> for FetchError {
    fn from(err: serde_yaml::Error) -> Self {
        FetchError::Payload(err.to_string())
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Payload(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("playback engine is not running")]
    EngineStopped,
}
