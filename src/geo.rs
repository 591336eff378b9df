/// Mean Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two lat/lon points (decimal degrees) using
/// the haversine formula.
///
/// Latitude is expected in [-90, 90] and longitude in [-180, 180]; inputs
/// outside those ranges are not validated and yield an undefined (though
/// finite, non-panicking) result. This is an accepted limitation of the
/// spherical model, not a silent clamp.
pub fn distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);

    EARTH_RADIUS_KM * 2.0 * a.sqrt().atan2((1.0 - a).sqrt())
}
