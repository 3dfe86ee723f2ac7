use crate::units::Meters;

/// Mean Earth radius used for every distance in the viewer.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two points given in decimal degrees
/// (Haversine, spherical Earth).
pub fn haversine(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> Meters {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    Meters(EARTH_RADIUS_M * c)
}
