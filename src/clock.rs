use chrono::{DateTime, FixedOffset, Utc};
use log::warn;

use crate::error::Result;
use crate::options::ViewerOptions;

const NOT_AVAILABLE: &str = "N/A";

/// Converts UTC instants to the session's fixed display timezone.
///
/// The offset never changes with the date, so daylight-saving transitions
/// are not represented.
#[derive(Debug, Clone)]
pub struct DisplayClock {
    offset: FixedOffset,
    label: String,
}

impl DisplayClock {
    pub fn new(offset: FixedOffset, label: impl Into<String>) -> Self {
        Self {
            offset,
            label: label.into(),
        }
    }

    pub fn from_options(opts: &ViewerOptions) -> Result<Self> {
        Ok(Self::new(opts.display_offset()?, opts.timezone_label.clone()))
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Per-point format, e.g. `01 Jan 2025 11:30:00`.
    pub fn format_point(&self, instant: Option<DateTime<Utc>>) -> String {
        self.format(instant, "%d %b %Y %H:%M:%S")
    }

    /// Summary format, e.g. `01 Jan 2025, 11:30:00`.
    pub fn format_summary(&self, instant: Option<DateTime<Utc>>) -> String {
        self.format(instant, "%d %b %Y, %H:%M:%S")
    }

    fn format(&self, instant: Option<DateTime<Utc>>, pattern: &str) -> String {
        match instant {
            Some(t) => t.with_timezone(&self.offset).format(pattern).to_string(),
            None => NOT_AVAILABLE.to_string(),
        }
    }
}

/// Parse a GPX `<time>` value. Unparseable text is treated as absent.
pub fn parse_instant(text: &str) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(text.trim()) {
        Ok(t) => Some(t.with_timezone(&Utc)),
        Err(e) => {
            warn!("ignoring unparseable time '{text}': {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ist() -> DisplayClock {
        DisplayClock::new(FixedOffset::east_opt(330 * 60).unwrap(), "IST")
    }

    #[test]
    fn test_point_format() {
        let t = Utc.with_ymd_and_hms(2025, 1, 1, 6, 0, 0).unwrap();
        assert_eq!(ist().format_point(Some(t)), "01 Jan 2025 11:30:00");
    }

    #[test]
    fn test_summary_format_crosses_midnight() {
        let t = Utc.with_ymd_and_hms(2024, 12, 31, 20, 15, 5).unwrap();
        assert_eq!(ist().format_summary(Some(t)), "01 Jan 2025, 01:45:05");
    }

    #[test]
    fn test_absent_instant() {
        assert_eq!(ist().format_point(None), "N/A");
        assert_eq!(ist().format_summary(None), "N/A");
    }

    #[test]
    fn test_parse_instant() {
        let t = parse_instant("2025-01-01T06:00:00Z").unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2025, 1, 1, 6, 0, 0).unwrap());

        let offset = parse_instant("2025-01-01T11:30:00+05:30").unwrap();
        assert_eq!(offset, t);

        assert!(parse_instant("yesterday").is_none());
    }
}
