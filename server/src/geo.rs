//! Spherical geometry over the Earth measured in nautical miles.

use passage_shared::Coordinate;
use thiserror::Error;

/// Earth radius in nautical miles.
pub const EARTH_RADIUS_NM: f64 = 3440.065;

#[derive(Clone, Copy, Debug, Error, PartialEq)]
pub enum GeoError {
    #[error("latitude {0} outside [-90, 90]")]
    LatitudeOutOfRange(f64),
    #[error("longitude {0} outside [-180, 180]")]
    LongitudeOutOfRange(f64),
}

fn check(c: Coordinate) -> Result<(), GeoError> {
    if !c.lat.is_finite() || c.lat < -90.0 || c.lat > 90.0 {
        return Err(GeoError::LatitudeOutOfRange(c.lat));
    }
    if !c.lng.is_finite() || c.lng < -180.0 || c.lng > 180.0 {
        return Err(GeoError::LongitudeOutOfRange(c.lng));
    }
    Ok(())
}

/// Great-circle distance between two points (haversine), in nautical miles.
pub fn distance_nm(a: Coordinate, b: Coordinate) -> Result<f64, GeoError> {
    check(a)?;
    check(b)?;

    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    Ok(EARTH_RADIUS_NM * c)
}

/// Initial bearing from `a` to `b` in degrees, [0, 360).
pub fn bearing_deg(a: Coordinate, b: Coordinate) -> Result<f64, GeoError> {
    check(a)?;
    check(b)?;

    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let d_lng = (b.lng - a.lng).to_radians();

    let y = d_lng.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * d_lng.cos();

    Ok(normalize_angle(y.atan2(x).to_degrees()))
}

/// Destination point after sailing `distance_nm` on `bearing_deg` from `a`.
pub fn destination(a: Coordinate, bearing_deg: f64, distance_nm: f64) -> Result<Coordinate, GeoError> {
    check(a)?;

    let angular = distance_nm / EARTH_RADIUS_NM;
    let bearing = bearing_deg.to_radians();
    let lat1 = a.lat.to_radians();
    let lng1 = a.lng.to_radians();

    let lat2 = (lat1.sin() * angular.cos() + lat1.cos() * angular.sin() * bearing.cos()).asin();
    let lng2 = lng1
        + (bearing.sin() * angular.sin() * lat1.cos())
            .atan2(angular.cos() - lat1.sin() * lat2.sin());

    Ok(Coordinate {
        lat: lat2.to_degrees(),
        lng: normalize_lng(lng2.to_degrees()),
    })
}

/// Normalize an angle to [0, 360).
pub fn normalize_angle(deg: f64) -> f64 {
    ((deg % 360.0) + 360.0) % 360.0
}

/// Absolute angular difference between two bearings, wrapped to [0, 180].
pub fn angle_diff(a: f64, b: f64) -> f64 {
    let d = normalize_angle(a - b);
    if d > 180.0 {
        360.0 - d
    } else {
        d
    }
}

/// Signed angular offset of `a` relative to `b`, wrapped to (-180, 180].
pub fn signed_angle_diff(a: f64, b: f64) -> f64 {
    let d = normalize_angle(a - b);
    if d > 180.0 {
        d - 360.0
    } else {
        d
    }
}

fn normalize_lng(lng: f64) -> f64 {
    let wrapped = ((lng + 180.0) % 360.0 + 360.0) % 360.0 - 180.0;
    // keep the +180 edge representable
    if wrapped == -180.0 && lng > 0.0 {
        180.0
    } else {
        wrapped
    }
}
