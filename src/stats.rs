use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{Result, ViewerError};
use crate::geodesic::haversine;
use crate::gpx_types::{GpxDocument, RawPoint, TrackPoint};
use crate::units::{KilometersPerHour, Meters};

/// Aggregate statistics over one imported track.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackSummary {
    pub track_count: usize,
    pub route_count: usize,
    pub waypoint_count: usize,
    pub point_count: usize,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub elevation_range: (f64, f64),
    pub speed_range: SpeedRange,
    pub total_distance: Meters,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpeedRange {
    pub min: KilometersPerHour,
    pub max: KilometersPerHour,
    pub average: KilometersPerHour,
}

/// Result of one aggregation pass.
#[derive(Debug, Clone)]
pub struct TrackStats {
    pub points: Vec<TrackPoint>,
    pub summary: TrackSummary,
}

/// Speed over the segment `prev -> next`. Zero unless both points carry a
/// timestamp and time moves forward.
fn segment_speed(prev: &RawPoint, next: &RawPoint, distance: Meters) -> KilometersPerHour {
    match (prev.time, next.time) {
        (Some(t0), Some(t1)) => {
            let seconds = (t1 - t0).num_milliseconds() as f64 / 1000.0;
            distance.per_seconds(seconds).unwrap_or_default()
        }
        _ => KilometersPerHour::default(),
    }
}

/// Enrich the point sequence with speeds and compute the track summary.
pub fn aggregate(doc: &GpxDocument) -> Result<TrackStats> {
    let raw = &doc.points;
    if raw.is_empty() {
        return Err(ViewerError::EmptyTrack);
    }

    let mut points = Vec::with_capacity(raw.len());
    let mut total_distance = Meters::default();

    for (i, pt) in raw.iter().enumerate() {
        let speed = if i == 0 {
            KilometersPerHour::default()
        } else {
            let prev = &raw[i - 1];
            let distance = haversine(prev.lat, prev.lon, pt.lat, pt.lon);
            total_distance += distance;
            segment_speed(prev, pt, distance)
        };

        points.push(TrackPoint {
            lat: pt.lat,
            lon: pt.lon,
            elevation: pt.ele.unwrap_or(0.0),
            time: pt.time,
            speed,
        });
    }

    let elevation_range = min_max(points.iter().map(|p| p.elevation));
    let (min_speed, max_speed) = min_max(points.iter().map(|p| p.speed.0));
    let average = points.iter().map(|p| p.speed.0).sum::<f64>() / points.len() as f64;

    let summary = TrackSummary {
        track_count: 1,
        route_count: doc.route_count,
        waypoint_count: doc.waypoint_count,
        point_count: points.len(),
        start_time: points.iter().find_map(|p| p.time),
        end_time: points.iter().rev().find_map(|p| p.time),
        elevation_range,
        speed_range: SpeedRange {
            min: KilometersPerHour(min_speed),
            max: KilometersPerHour(max_speed),
            average: KilometersPerHour(average),
        },
        total_distance,
    };

    Ok(TrackStats { points, summary })
}

/// Min and max of a non-empty sequence.
fn min_max(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}
