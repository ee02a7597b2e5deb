use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

use crate::error::AppError;
use crate::geo::{haversine_km, BoundingBox};
use crate::models::location::{DriverLocation, GeoPoint};

#[derive(Debug, Clone, Copy)]
pub struct NearbyQuery {
    pub center: GeoPoint,
    pub radius_km: f64,
    pub limit: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct NearbyDriver {
    pub driver_id: u64,
    pub position: GeoPoint,
    pub distance_km: f64,
    pub last_seen: DateTime<Utc>,
}

/// Online drivers within `radius_km` of the query center, nearest first,
/// capped at `limit`. Candidates are narrowed with a bounding box, then
/// refined with exact great-circle distance; offline and stale pings never
/// make it into the result.
pub fn nearby(
    locations: &DashMap<u64, DriverLocation>,
    query: &NearbyQuery,
    freshness_secs: i64,
    now: DateTime<Utc>,
) -> Result<Vec<NearbyDriver>, AppError> {
    if !query.center.is_valid() {
        return Err(AppError::InvalidArgument(format!(
            "coordinates out of range: ({}, {})",
            query.center.lat, query.center.lng
        )));
    }
    if query.radius_km <= 0.0 {
        return Err(AppError::InvalidArgument(format!(
            "radius must be positive, got {}",
            query.radius_km
        )));
    }
    if query.limit == 0 {
        return Err(AppError::InvalidArgument("limit must be positive".into()));
    }

    let bbox = BoundingBox::around(&query.center, query.radius_km);

    let mut matches: Vec<NearbyDriver> = locations
        .iter()
        .filter_map(|entry| {
            let loc = entry.value();
            if !loc.is_fresh(now, freshness_secs) || !bbox.contains(&loc.position) {
                return None;
            }

            let distance_km = haversine_km(&query.center, &loc.position);
            if distance_km > query.radius_km {
                return None;
            }

            Some(NearbyDriver {
                driver_id: loc.driver_id,
                position: loc.position,
                distance_km,
                last_seen: loc.last_seen,
            })
        })
        .collect();

    matches.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    matches.truncate(query.limit);

    Ok(matches)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use dashmap::DashMap;

    use super::{nearby, NearbyQuery};
    use crate::error::AppError;
    use crate::models::location::{DriverLocation, GeoPoint};

    const FRESHNESS_SECS: i64 = 300;

    fn ping(driver_id: u64, lat: f64, lng: f64, is_online: bool, age_secs: i64) -> DriverLocation {
        let now = Utc::now();
        DriverLocation {
            driver_id,
            position: GeoPoint { lat, lng },
            accuracy: 5.0,
            speed: 0.0,
            heading: 0.0,
            is_online,
            last_seen: now - Duration::seconds(age_secs),
            updated_at: now,
        }
    }

    fn tugu_square() -> GeoPoint {
        GeoPoint {
            lat: -7.797068,
            lng: 110.370529,
        }
    }

    fn query(radius_km: f64, limit: usize) -> NearbyQuery {
        NearbyQuery {
            center: tugu_square(),
            radius_km,
            limit,
        }
    }

    #[test]
    fn returns_only_drivers_within_radius_sorted_ascending() {
        let locations = DashMap::new();
        locations.insert(1, ping(1, -7.800, 110.372, true, 10)); // ~0.4 km
        locations.insert(2, ping(2, -7.7975, 110.3710, true, 10)); // ~0.07 km
        locations.insert(3, ping(3, -7.90, 110.50, true, 10)); // ~18 km, out

        let result = nearby(&locations, &query(5.0, 10), FRESHNESS_SECS, Utc::now()).unwrap();

        let ids: Vec<u64> = result.iter().map(|d| d.driver_id).collect();
        assert_eq!(ids, vec![2, 1]);
        assert!(result.iter().all(|d| d.distance_km <= 5.0));
    }

    #[test]
    fn excludes_offline_and_stale_drivers() {
        let locations = DashMap::new();
        locations.insert(1, ping(1, -7.798, 110.371, false, 10)); // offline
        locations.insert(2, ping(2, -7.798, 110.371, true, 600)); // stale
        locations.insert(3, ping(3, -7.798, 110.371, true, 60)); // ok

        let result = nearby(&locations, &query(5.0, 10), FRESHNESS_SECS, Utc::now()).unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].driver_id, 3);
    }

    #[test]
    fn caps_result_at_limit() {
        let locations = DashMap::new();
        for id in 1..=5 {
            let offset = id as f64 * 0.001;
            locations.insert(id, ping(id, -7.797 - offset, 110.370, true, 10));
        }

        let result = nearby(&locations, &query(5.0, 2), FRESHNESS_SECS, Utc::now()).unwrap();

        assert_eq!(result.len(), 2);
        assert!(result[0].distance_km <= result[1].distance_km);
    }

    #[test]
    fn equatorial_origin_is_queryable() {
        let locations = DashMap::new();
        locations.insert(1, ping(1, 0.005, 0.0, true, 10));

        let q = NearbyQuery {
            center: GeoPoint { lat: 0.0, lng: 0.0 },
            radius_km: 2.0,
            limit: 10,
        };
        let result = nearby(&locations, &q, FRESHNESS_SECS, Utc::now()).unwrap();

        assert_eq!(result.len(), 1);
    }

    #[test]
    fn finds_drivers_across_the_antimeridian() {
        let locations = DashMap::new();
        locations.insert(1, ping(1, 0.0, -179.99, true, 10));

        let q = NearbyQuery {
            center: GeoPoint {
                lat: 0.0,
                lng: 179.999,
            },
            radius_km: 5.0,
            limit: 10,
        };
        let result = nearby(&locations, &q, FRESHNESS_SECS, Utc::now()).unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].driver_id, 1);
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        let locations = DashMap::new();
        let q = NearbyQuery {
            center: GeoPoint {
                lat: 95.0,
                lng: 110.0,
            },
            radius_km: 5.0,
            limit: 10,
        };

        let err = nearby(&locations, &q, FRESHNESS_SECS, Utc::now()).unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));
    }

    #[test]
    fn rejects_non_positive_radius() {
        let locations = DashMap::new();
        let err = nearby(&locations, &query(0.0, 10), FRESHNESS_SECS, Utc::now()).unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));
    }
}
