use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lng)
    }
}

/// Latest known position for a driver. One record per driver, upserted on
/// every location ping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverLocation {
    pub driver_id: u64,
    pub position: GeoPoint,
    pub accuracy: f64,
    pub speed: f64,
    pub heading: f64,
    pub is_online: bool,
    pub last_seen: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DriverLocation {
    /// A driver counts as online only while the last ping is inside the
    /// freshness window.
    pub fn is_fresh(&self, now: DateTime<Utc>, freshness_secs: i64) -> bool {
        self.is_online && (now - self.last_seen).num_seconds() <= freshness_secs
    }
}
