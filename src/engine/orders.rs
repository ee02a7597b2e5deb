use chrono::Utc;
use tracing::info;

use crate::engine::ledger;
use crate::engine::queue::enqueue_order;
use crate::error::AppError;
use crate::models::driver::DriverStatus;
use crate::models::location::GeoPoint;
use crate::models::order::{Order, OrderStatus};
use crate::state::AppState;

pub struct CreateOrderRequest {
    pub customer_id: Option<u64>,
    pub tariff_id: u64,
    pub pickup: Option<GeoPoint>,
    pub dropoff: Option<GeoPoint>,
    pub pickup_location: String,
    pub drop_location: String,
    pub distance_km: f64,
    pub customer_phone: String,
    pub customer_name: String,
    pub notes: String,
}

/// Kiosk flow: the customer scans a sticker on a specific becak, so the
/// order targets that driver rather than going through geo dispatch.
pub struct CreatePublicOrderRequest {
    pub driver_code: String,
    pub tariff_id: u64,
    pub customer_phone: String,
    pub customer_name: String,
    pub notes: String,
}

/// Creates a pending order with the price frozen from the tariff and hands
/// it to the dispatch queue. Dispatch failures never propagate back here.
pub async fn create_order(state: &AppState, req: CreateOrderRequest) -> Result<Order, AppError> {
    if req.distance_km < 0.0 {
        return Err(AppError::InvalidArgument(format!(
            "distance must be non-negative, got {}",
            req.distance_km
        )));
    }
    for point in [&req.pickup, &req.dropoff].into_iter().flatten() {
        if !point.is_valid() {
            return Err(AppError::InvalidArgument(format!(
                "coordinates out of range: ({}, {})",
                point.lat, point.lng
            )));
        }
    }

    let tariff = state
        .tariffs
        .get(&req.tariff_id)
        .filter(|t| t.is_active)
        .map(|t| t.clone())
        .ok_or_else(|| AppError::NotFound(format!("tariff {} not found", req.tariff_id)))?;

    let id = state.next_order_id();
    let order = Order {
        id,
        order_number: format!("ORD-{id:06}"),
        customer_id: req.customer_id,
        driver_id: None,
        driver_code: None,
        tariff_id: tariff.id,
        pickup: req.pickup,
        dropoff: req.dropoff,
        pickup_location: req.pickup_location,
        drop_location: req.drop_location,
        distance_km: req.distance_km,
        price: tariff.price,
        status: OrderStatus::Pending,
        payment_status: "pending".to_string(),
        customer_phone: req.customer_phone,
        customer_name: req.customer_name,
        notes: req.notes,
        accepted_at: None,
        completed_at: None,
        cancelled_at: None,
        created_at: Utc::now(),
        deleted: false,
    };

    state.orders.insert(order.id, order.clone());
    state.metrics.order_transitions("created");
    info!(order_id = order.id, order_number = %order.order_number, "order created");

    enqueue_order(state, order.clone()).await?;
    Ok(order)
}

pub async fn create_public_order(
    state: &AppState,
    req: CreatePublicOrderRequest,
) -> Result<Order, AppError> {
    let tariff = state
        .tariffs
        .get(&req.tariff_id)
        .filter(|t| t.is_active)
        .map(|t| t.clone())
        .ok_or_else(|| AppError::NotFound(format!("tariff {} not found", req.tariff_id)))?;

    let driver_exists = state
        .drivers
        .iter()
        .any(|d| d.driver_code == req.driver_code);
    if !driver_exists {
        return Err(AppError::NotFound(format!(
            "driver code {} not found",
            req.driver_code
        )));
    }

    let customer_name = if req.customer_name.is_empty() {
        "Customer".to_string()
    } else {
        req.customer_name
    };

    let id = state.next_order_id();
    let order = Order {
        id,
        order_number: format!("ORD-{id:06}"),
        customer_id: None,
        driver_id: None,
        driver_code: Some(req.driver_code),
        tariff_id: tariff.id,
        pickup: None,
        dropoff: None,
        // Filled in later by the driver once the trip is agreed.
        pickup_location: String::new(),
        drop_location: String::new(),
        distance_km: tariff.max_distance_km,
        price: tariff.price,
        status: OrderStatus::Pending,
        payment_status: "pending".to_string(),
        customer_phone: req.customer_phone,
        customer_name,
        notes: req.notes,
        accepted_at: None,
        completed_at: None,
        cancelled_at: None,
        created_at: Utc::now(),
        deleted: false,
    };

    state.orders.insert(order.id, order.clone());
    state.metrics.order_transitions("created");
    info!(order_id = order.id, driver_code = ?order.driver_code, "kiosk order created");

    enqueue_order(state, order.clone()).await?;
    Ok(order)
}

/// Pending -> Accepted. The order entry guard is held across the whole
/// guard-and-mutate, so two accepts racing on one order serialize and the
/// loser sees a non-pending status.
pub fn accept_order(state: &AppState, order_id: u64, driver_id: u64) -> Result<Order, AppError> {
    // Lock order before driver, as everywhere else.
    let mut order = state
        .orders
        .get_mut(&order_id)
        .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

    if order.status != OrderStatus::Pending {
        return Err(AppError::Conflict(format!(
            "order {order_id} is not available for acceptance"
        )));
    }

    let mut driver = state
        .drivers
        .get_mut(&driver_id)
        .ok_or_else(|| AppError::NotFound(format!("driver {driver_id} not found")))?;

    if let Some(code) = &order.driver_code {
        if driver.driver_code != *code {
            return Err(AppError::Forbidden(format!(
                "order {order_id} is reserved for driver code {code}"
            )));
        }
    }

    if !driver.is_active || driver.status != DriverStatus::Active {
        return Err(AppError::DriverUnavailable(format!(
            "driver {driver_id} is not available to accept orders"
        )));
    }

    let now = Utc::now();
    order.status = OrderStatus::Accepted;
    order.driver_id = Some(driver_id);
    order.accepted_at = Some(now);
    driver.status = DriverStatus::OnTrip;
    driver.updated_at = now;

    state.metrics.order_transitions("accepted");
    info!(order_id, driver_id, "order accepted");

    Ok(order.clone())
}

/// Accepted -> Completed. Completes the trip, releases the driver, and
/// credits the fare in one unit under the order and driver entry guards.
pub fn complete_order(state: &AppState, order_id: u64, driver_id: u64) -> Result<Order, AppError> {
    let mut order = state
        .orders
        .get_mut(&order_id)
        .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

    if order.driver_id != Some(driver_id) {
        return Err(AppError::Forbidden(format!(
            "order {order_id} does not belong to driver {driver_id}"
        )));
    }

    if order.status != OrderStatus::Accepted {
        return Err(AppError::InvalidTransition(format!(
            "order {order_id} is not in accepted status"
        )));
    }

    let mut driver = state
        .drivers
        .get_mut(&driver_id)
        .ok_or_else(|| AppError::NotFound(format!("driver {driver_id} not found")))?;

    let now = Utc::now();
    order.status = OrderStatus::Completed;
    order.accepted_at = None;
    order.completed_at = Some(now);
    driver.status = DriverStatus::Active;
    driver.total_trips += 1;
    driver.updated_at = now;
    ledger::credit(&mut driver, order.price);

    state.metrics.order_transitions("completed");
    info!(order_id, driver_id, price = order.price, "order completed");

    Ok(order.clone())
}

/// Pending|Accepted -> Cancelled. An attached driver goes back into the
/// available pool and the order drops its reference to it.
pub fn cancel_order(state: &AppState, order_id: u64) -> Result<Order, AppError> {
    let mut order = state
        .orders
        .get_mut(&order_id)
        .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

    if order.status.is_terminal() {
        return Err(AppError::InvalidTransition(format!(
            "order {order_id} is already finished"
        )));
    }

    let now = Utc::now();
    order.status = OrderStatus::Cancelled;
    order.accepted_at = None;
    order.cancelled_at = Some(now);

    if let Some(driver_id) = order.driver_id.take() {
        if let Some(mut driver) = state.drivers.get_mut(&driver_id) {
            driver.status = DriverStatus::Active;
            driver.updated_at = now;
        }
    }

    state.metrics.order_transitions("cancelled");
    info!(order_id, "order cancelled");

    Ok(order.clone())
}
