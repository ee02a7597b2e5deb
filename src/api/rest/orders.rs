use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;

use crate::engine::orders::{
    accept_order, cancel_order, complete_order, create_order, create_public_order,
    CreateOrderRequest, CreatePublicOrderRequest,
};
use crate::error::AppError;
use crate::models::location::GeoPoint;
use crate::models::order::Order;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", post(create))
        .route("/orders/public", post(create_public))
        .route("/orders/:id", get(fetch).delete(soft_delete))
        .route("/orders/:id/accept", post(accept))
        .route("/orders/:id/complete", post(complete))
        .route("/orders/:id/cancel", post(cancel))
}

#[derive(Deserialize)]
pub struct CreateOrderBody {
    pub customer_id: Option<u64>,
    pub tariff_id: u64,
    pub pickup: Option<GeoPoint>,
    pub dropoff: Option<GeoPoint>,
    pub pickup_location: String,
    pub drop_location: String,
    pub distance_km: f64,
    #[serde(default)]
    pub customer_phone: String,
    #[serde(default)]
    pub customer_name: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Deserialize)]
pub struct CreatePublicOrderBody {
    pub driver_code: String,
    pub tariff_id: u64,
    pub customer_phone: String,
    #[serde(default)]
    pub customer_name: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Deserialize)]
pub struct DriverActionBody {
    pub driver_id: u64,
}

async fn create(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateOrderBody>,
) -> Result<Json<Order>, AppError> {
    let order = create_order(
        &state,
        CreateOrderRequest {
            customer_id: body.customer_id,
            tariff_id: body.tariff_id,
            pickup: body.pickup,
            dropoff: body.dropoff,
            pickup_location: body.pickup_location,
            drop_location: body.drop_location,
            distance_km: body.distance_km,
            customer_phone: body.customer_phone,
            customer_name: body.customer_name,
            notes: body.notes,
        },
    )
    .await?;

    Ok(Json(order))
}

async fn create_public(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreatePublicOrderBody>,
) -> Result<Json<Order>, AppError> {
    let order = create_public_order(
        &state,
        CreatePublicOrderRequest {
            driver_code: body.driver_code,
            tariff_id: body.tariff_id,
            customer_phone: body.customer_phone,
            customer_name: body.customer_name,
            notes: body.notes,
        },
    )
    .await?;

    Ok(Json(order))
}

async fn fetch(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<Order>, AppError> {
    let order = state
        .orders
        .get(&id)
        .filter(|o| !o.deleted)
        .map(|o| o.clone())
        .ok_or_else(|| AppError::NotFound(format!("order {id} not found")))?;

    Ok(Json(order))
}

async fn accept(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(body): Json<DriverActionBody>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(accept_order(&state, id, body.driver_id)?))
}

async fn complete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(body): Json<DriverActionBody>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(complete_order(&state, id, body.driver_id)?))
}

async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(cancel_order(&state, id)?))
}

/// Orders referenced by completed trips stay attributable to the ledger, so
/// deletion only hides the record.
async fn soft_delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<Order>, AppError> {
    let mut order = state
        .orders
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("order {id} not found")))?;

    order.deleted = true;
    Ok(Json(order.clone()))
}
