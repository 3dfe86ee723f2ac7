use chrono::{DateTime, Utc};

use crate::units::KilometersPerHour;

/// A parsed GPX document reduced to what the viewer uses: every `<trkpt>`
/// in document order, plus how many routes and waypoints it declares.
#[derive(Debug, Default)]
pub struct GpxDocument {
    pub points: Vec<RawPoint>,
    pub route_count: usize,
    pub waypoint_count: usize,
}

/// A `<trkpt>` as read from the document.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPoint {
    pub lat: f64,
    pub lon: f64,
    pub ele: Option<f64>,
    pub time: Option<DateTime<Utc>>,
}

impl RawPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon,
            ele: None,
            time: None,
        }
    }
}

/// A track point enriched with its derived speed.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackPoint {
    pub lat: f64,
    pub lon: f64,
    /// Meters; 0 when the document has none.
    pub elevation: f64,
    pub time: Option<DateTime<Utc>>,
    /// Speed over the segment ending at this point.
    pub speed: KilometersPerHour,
}
