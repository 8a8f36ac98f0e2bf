use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer};
use thiserror::Error;

use super::types::TimeWindow;

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("invalid duration {input:?}: {reason}")]
    Duration { input: String, reason: String },
    #[error("invalid instant {0:?}: expected RFC3339, T+<duration> or T-<duration>")]
    Instant(String),
}

pub fn parse_duration(s: &str) -> Result<Duration, ParseError> {
    let invalid = |reason: String| ParseError::Duration {
        input: s.to_string(),
        reason,
    };
    humantime::parse_duration(s.trim())
        .map_err(|e| invalid(e.to_string()))
        .and_then(|d| Duration::from_std(d).map_err(|e| invalid(e.to_string())))
}

/// Resolves a user supplied instant against a recorded span.
///
/// `T+90m` counts from the span's start, `T-10m` back from its end; anything
/// else must be an RFC3339 timestamp.
pub fn parse_instant(s: &str, span: TimeWindow) -> Result<DateTime<Utc>, ParseError> {
    let s = s.trim();

    if let Some(rest) = s.strip_prefix(['T', 't']) {
        let out_of_range = || ParseError::Instant(s.to_string());
        if let Some(dur) = rest.strip_prefix('+') {
            return span
                .start
                .checked_add_signed(parse_duration(dur)?)
                .ok_or_else(out_of_range);
        }
        if let Some(dur) = rest.strip_prefix('-') {
            return span
                .end
                .checked_sub_signed(parse_duration(dur)?)
                .ok_or_else(out_of_range);
        }
    }

    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| ParseError::Instant(s.to_string()))
}

/// Serde helper for `humantime` strings such as `16ms` or `1s`.
pub fn deserialize_std_duration<'de, D>(deserializer: D) -> Result<std::time::Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    humantime::parse_duration(raw.trim()).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn span() -> TimeWindow {
        TimeWindow::new(
            Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 2, 0, 0, 0).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_relative_to_start_and_end() {
        assert_eq!(
            parse_instant("T+90m", span()).unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 1, 1, 30, 0).unwrap()
        );
        assert_eq!(
            parse_instant(" t-10m ", span()).unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 1, 23, 50, 0).unwrap()
        );
    }

    #[test]
    fn test_absolute_instant() {
        assert_eq!(
            parse_instant("2025-03-01T12:00:00+05:30", span()).unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 1, 6, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(
            parse_instant("yesterday", span()),
            Err(ParseError::Instant(_))
        ));
        assert!(matches!(
            parse_instant("T+soon", span()),
            Err(ParseError::Duration { .. })
        ));
    }

    #[test]
    fn test_offset_beyond_calendar_range_is_an_error() {
        assert_eq!(
            parse_instant("T+300000years", span()),
            Err(ParseError::Instant("T+300000years".into()))
        );
        assert_eq!(
            parse_instant("T-300000years", span()),
            Err(ParseError::Instant("T-300000years".into()))
        );
    }

    #[test]
    fn test_deserialize_std_duration() {
        #[derive(Deserialize)]
        struct Holder {
            #[serde(deserialize_with = "deserialize_std_duration")]
            every: std::time::Duration,
        }
        let holder: Holder = serde_yaml::from_str("every: 16ms").unwrap();
        assert_eq!(holder.every, std::time::Duration::from_millis(16));
        assert!(serde_yaml::from_str::<Holder>("every: often").is_err());
    }
}
