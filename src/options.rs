use chrono::FixedOffset;
use serde::Deserialize;

use crate::error::{Result, ViewerError};

/// Options for a viewer session.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerOptions {
    /// Display timezone as minutes east of UTC (default: 330, i.e. +05:30)
    #[serde(default = "default_utc_offset_minutes")]
    pub utc_offset_minutes: i32,

    /// Label shown next to converted times (default: "IST")
    #[serde(default = "default_timezone_label")]
    pub timezone_label: String,

    /// Include elevation as the 3rd coordinate value in GeoJSON (default: true)
    #[serde(default = "default_true")]
    pub include_elevation: bool,

    /// Include the raw timestamp in GeoJSON point properties (default: true)
    #[serde(default = "default_true")]
    pub include_time: bool,
}

impl Default for ViewerOptions {
    fn default() -> Self {
        Self {
            utc_offset_minutes: default_utc_offset_minutes(),
            timezone_label: default_timezone_label(),
            include_elevation: true,
            include_time: true,
        }
    }
}

impl ViewerOptions {
    /// The configured display offset. Offsets must lie strictly within ±24h.
    pub fn display_offset(&self) -> Result<FixedOffset> {
        self.utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                ViewerError::InvalidOptions(format!(
                    "utcOffsetMinutes out of range: {}",
                    self.utc_offset_minutes
                ))
            })
    }
}

fn default_utc_offset_minutes() -> i32 {
    330
}

fn default_timezone_label() -> String {
    "IST".to_string()
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_object() {
        let opts: ViewerOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(opts.utc_offset_minutes, 330);
        assert_eq!(opts.timezone_label, "IST");
        assert!(opts.include_elevation);
        assert!(opts.include_time);
    }

    #[test]
    fn test_camel_case_fields() {
        let opts: ViewerOptions =
            serde_json::from_str(r#"{"utcOffsetMinutes": -300, "timezoneLabel": "EST"}"#)
                .unwrap();
        assert_eq!(opts.display_offset().unwrap().local_minus_utc(), -300 * 60);
        assert_eq!(opts.timezone_label, "EST");
    }

    #[test]
    fn test_offset_out_of_range() {
        let opts = ViewerOptions {
            utc_offset_minutes: 24 * 60,
            ..Default::default()
        };
        assert!(matches!(
            opts.display_offset(),
            Err(ViewerError::InvalidOptions(_))
        ));
    }
}
