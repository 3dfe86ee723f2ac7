use geo::{ChamberlainDuquetteArea, LineString, Polygon};

use crate::features::Coord;
use crate::geodesic::{EARTH_RADIUS_M, haversine};
use crate::units::{Meters, SquareMeters};

/// Length of a drawn line along the sphere.
pub fn line_length(coords: &[Coord]) -> Meters {
    coords
        .windows(2)
        .map(|w| haversine(w[0].lat, w[0].lon, w[1].lat, w[1].lon))
        .sum()
}

/// Sphere radius `chamberlain_duquette_unsigned_area` works on.
const GEO_EQUATORIAL_RADIUS_M: f64 = 6_378_137.0;

/// Area enclosed by a drawn ring on the same sphere `line_length` uses.
pub fn polygon_area(ring: &[Coord]) -> SquareMeters {
    if ring.len() < 3 {
        return SquareMeters(0.0);
    }
    let exterior: LineString<f64> = ring.iter().map(|c| (c.lon, c.lat)).collect::<Vec<_>>().into();
    let polygon = Polygon::new(exterior, Vec::new());
    let scale = (EARTH_RADIUS_M / GEO_EQUATORIAL_RADIUS_M).powi(2);
    SquareMeters(polygon.chamberlain_duquette_unsigned_area() * scale)
}

fn hundredths(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// `"1.23 km"` above 100 m, otherwise `"45.6 m"`.
pub fn format_length(length: Meters) -> String {
    if length.0 > 100.0 {
        format!("{} km", hundredths(length.to_kilometers().0))
    } else {
        format!("{} m", hundredths(length.0))
    }
}

/// `"1.23 km<sup>2</sup>"` above 10 000 m², otherwise in m².
pub fn format_area(area: SquareMeters) -> String {
    if area.0 > 10_000.0 {
        format!("{} km<sup>2</sup>", hundredths(area.to_square_kilometers()))
    } else {
        format!("{} m<sup>2</sup>", hundredths(area.0))
    }
}
