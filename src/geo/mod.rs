pub mod index;

use crate::models::location::GeoPoint;

const EARTH_RADIUS_KM: f64 = 6_371.0;

/// One degree of latitude is roughly 111 km; longitude shrinks with cos(lat).
const KM_PER_DEGREE: f64 = 111.0;

/// Great-circle distance between two points, km.
pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng;
    let central_angle = 2.0 * haversine.sqrt().asin();

    EARTH_RADIUS_KM * central_angle
}

/// Axis-aligned pre-filter rectangle around a center point. Coarse on
/// purpose; candidates inside it still go through exact refinement.
#[derive(Debug, Clone, Copy)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl BoundingBox {
    pub fn around(center: &GeoPoint, radius_km: f64) -> Self {
        let lat_delta = radius_km / KM_PER_DEGREE;
        // cos(lat) vanishes at the poles; floor it so the box degrades to
        // the full longitude span instead of dividing by zero.
        let lng_delta = radius_km / (KM_PER_DEGREE * center.lat.to_radians().cos().max(1e-6));

        // A box spilling past the antimeridian cannot be expressed as one
        // lng interval; widen to the full span so no in-radius point on the
        // far side of the seam is filtered out.
        let (min_lng, max_lng) = {
            let min = center.lng - lng_delta;
            let max = center.lng + lng_delta;
            if min < -180.0 || max > 180.0 {
                (-180.0, 180.0)
            } else {
                (min, max)
            }
        };

        Self {
            min_lat: (center.lat - lat_delta).max(-90.0),
            max_lat: (center.lat + lat_delta).min(90.0),
            min_lng,
            max_lng,
        }
    }

    pub fn contains(&self, p: &GeoPoint) -> bool {
        p.lat >= self.min_lat
            && p.lat <= self.max_lat
            && p.lng >= self.min_lng
            && p.lng <= self.max_lng
    }
}
