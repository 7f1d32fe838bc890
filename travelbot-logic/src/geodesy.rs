//! Great-circle helpers shared by every other module.

/// Mean earth radius in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Haversine distance in meters between two points given in degrees
pub fn distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    // Rounding can push `a` a hair outside [0, 1] for antipodal or identical points
    let a = a.clamp(0.0, 1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Initial bearing in degrees [0, 360) when leaving point 1 towards point 2.
///
/// Returns [None] when the points coincide, there is no meaningful direction then.
pub fn bearing(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> Option<f64> {
    if lat1 == lat2 && lon1 == lon2 {
        return None;
    }

    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let y = d_lon.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * d_lon.cos();

    Some(normalize_degrees(y.atan2(x).to_degrees()))
}

/// Smallest angle between two headings, in [0, 180]
pub fn heading_delta(a: f64, b: f64) -> f64 {
    let diff = (a - b).abs() % 360.0;
    if diff > 180.0 { 360.0 - diff } else { diff }
}

/// Point reached after travelling `meters` from the start along `bearing_deg`
pub fn offset(lat: f64, lon: f64, bearing_deg: f64, meters: f64) -> (f64, f64) {
    let angular = meters / EARTH_RADIUS_M;
    let theta = bearing_deg.to_radians();
    let phi1 = lat.to_radians();
    let lambda1 = lon.to_radians();

    let phi2 = (phi1.sin() * angular.cos() + phi1.cos() * angular.sin() * theta.cos()).asin();
    let lambda2 = lambda1
        + (theta.sin() * angular.sin() * phi1.cos()).atan2(angular.cos() - phi1.sin() * phi2.sin());

    (phi2.to_degrees(), normalize_longitude(lambda2.to_degrees()))
}

fn normalize_degrees(deg: f64) -> f64 {
    let d = deg.rem_euclid(360.0);
    // rem_euclid can return exactly 360.0 for tiny negative inputs
    if d >= 360.0 { 0.0 } else { d }
}

fn normalize_longitude(lon: f64) -> f64 {
    (lon + 540.0).rem_euclid(360.0) - 180.0
}
