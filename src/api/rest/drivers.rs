use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::ledger::{available_balance, driver_earnings, EarningsSummary};
use crate::error::AppError;
use crate::geo::index::{nearby, NearbyDriver, NearbyQuery};
use crate::models::driver::{Driver, DriverStatus};
use crate::models::location::{DriverLocation, GeoPoint};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/drivers", post(register))
        .route("/drivers/nearby", get(nearby_drivers))
        .route("/drivers/:id", get(fetch))
        .route("/drivers/:id/earnings", get(earnings))
        .route("/drivers/:id/location", patch(update_location))
        .route("/drivers/:id/online", patch(set_online))
}

#[derive(Deserialize)]
pub struct RegisterDriverBody {
    pub driver_code: String,
    pub name: String,
    pub phone: String,
    pub user_id: Option<u64>,
    #[serde(default)]
    pub rating: f64,
    pub push_token: Option<String>,
}

#[derive(Serialize)]
struct DriverResponse {
    #[serde(flatten)]
    driver: Driver,
    available_balance: f64,
}

async fn register(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterDriverBody>,
) -> Result<Json<Driver>, AppError> {
    if body.driver_code.trim().is_empty() {
        return Err(AppError::InvalidArgument(
            "driver_code cannot be empty".to_string(),
        ));
    }
    if body.name.trim().is_empty() {
        return Err(AppError::InvalidArgument("name cannot be empty".to_string()));
    }
    if state
        .drivers
        .iter()
        .any(|d| d.driver_code == body.driver_code)
    {
        return Err(AppError::Conflict(format!(
            "driver code {} already registered",
            body.driver_code
        )));
    }

    let now = Utc::now();
    let driver = Driver {
        id: state.next_driver_id(),
        driver_code: body.driver_code,
        user_id: body.user_id,
        name: body.name,
        phone: body.phone,
        status: DriverStatus::Active,
        is_active: true,
        rating: body.rating.clamp(0.0, 5.0),
        total_trips: 0,
        total_earnings: 0.0,
        push_token: body.push_token,
        created_at: now,
        updated_at: now,
    };

    state.drivers.insert(driver.id, driver.clone());
    Ok(Json(driver))
}

async fn fetch(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<DriverResponse>, AppError> {
    let driver = state
        .drivers
        .get(&id)
        .map(|d| d.clone())
        .ok_or_else(|| AppError::NotFound(format!("driver {id} not found")))?;

    let available = available_balance(&state, &driver);
    Ok(Json(DriverResponse {
        driver,
        available_balance: available,
    }))
}

async fn earnings(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<EarningsSummary>, AppError> {
    Ok(Json(driver_earnings(&state, id)?))
}

#[derive(Deserialize)]
pub struct LocationPingBody {
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub accuracy: f64,
    #[serde(default)]
    pub speed: f64,
    #[serde(default)]
    pub heading: f64,
    pub timestamp: Option<DateTime<Utc>>,
}

async fn update_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(body): Json<LocationPingBody>,
) -> Result<Json<DriverLocation>, AppError> {
    let position = GeoPoint {
        lat: body.lat,
        lng: body.lng,
    };
    if !position.is_valid() {
        return Err(AppError::InvalidArgument(format!(
            "coordinates out of range: ({}, {})",
            body.lat, body.lng
        )));
    }
    if !state.drivers.contains_key(&id) {
        return Err(AppError::NotFound(format!("driver {id} not found")));
    }

    let now = Utc::now();
    let location = DriverLocation {
        driver_id: id,
        position,
        accuracy: body.accuracy,
        speed: body.speed,
        heading: body.heading,
        is_online: true,
        // Client clocks drift; a future-dated ping must not keep the driver
        // fresh past the window.
        last_seen: body.timestamp.unwrap_or(now).min(now),
        updated_at: now,
    };

    // One row per driver; every ping replaces the previous one.
    state.locations.insert(id, location.clone());
    tracing::debug!(driver_id = id, lat = body.lat, lng = body.lng, "location ping");

    Ok(Json(location))
}

#[derive(Deserialize)]
pub struct SetOnlineBody {
    pub is_online: bool,
}

async fn set_online(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(body): Json<SetOnlineBody>,
) -> Result<Json<DriverLocation>, AppError> {
    let mut location = state.locations.get_mut(&id).ok_or_else(|| {
        AppError::NotFound(format!("no location recorded for driver {id}"))
    })?;

    let now = Utc::now();
    location.is_online = body.is_online;
    if body.is_online {
        location.last_seen = now;
    }
    location.updated_at = now;

    Ok(Json(location.clone()))
}

#[derive(Deserialize)]
pub struct NearbyParams {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub radius: Option<f64>,
    pub limit: Option<usize>,
}

#[derive(Serialize)]
struct NearbyResponse {
    drivers: Vec<NearbyDriver>,
    count: usize,
    radius_km: f64,
}

async fn nearby_drivers(
    State(state): State<Arc<AppState>>,
    Query(params): Query<NearbyParams>,
) -> Result<Json<NearbyResponse>, AppError> {
    // Absent parameters mean a missing reading; (0, 0) itself is a valid
    // coordinate and goes through.
    let (lat, lng) = match (params.lat, params.lng) {
        (Some(lat), Some(lng)) => (lat, lng),
        _ => {
            return Err(AppError::InvalidArgument(
                "lat and lng are required".to_string(),
            ))
        }
    };

    let radius_km = params.radius.unwrap_or(state.config.dispatch_radius_km);
    let limit = params.limit.unwrap_or(state.config.nearby_default_limit);

    let query = NearbyQuery {
        center: GeoPoint { lat, lng },
        radius_km,
        limit,
    };
    let drivers = nearby(
        &state.locations,
        &query,
        state.config.location_freshness_secs,
        Utc::now(),
    )?;

    Ok(Json(NearbyResponse {
        count: drivers.len(),
        radius_km,
        drivers,
    }))
}
