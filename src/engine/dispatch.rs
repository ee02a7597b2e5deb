use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::error::AppError;
use crate::geo::index::{nearby, NearbyQuery};
use crate::models::driver::DriverStatus;
use crate::models::order::Order;
use crate::state::AppState;

struct Candidate {
    driver_id: u64,
    push_token: String,
}

/// Consumes newly created pending orders and notifies eligible drivers.
/// Runs detached from the request path; a delivery failure here is logged
/// and counted, never surfaced to the customer who placed the order.
pub async fn run_dispatch_worker(state: Arc<AppState>, mut order_rx: mpsc::Receiver<Order>) {
    info!("dispatch worker started");

    while let Some(order) = order_rx.recv().await {
        state.metrics.orders_in_dispatch_queue.dec();

        let start = Instant::now();
        match dispatch_order(&state, &order).await {
            Ok(notified) => {
                state
                    .metrics
                    .dispatch_latency_seconds
                    .with_label_values(&["success"])
                    .observe(start.elapsed().as_secs_f64());
                info!(order_id = order.id, notified, "order dispatched");
            }
            Err(err) => {
                state
                    .metrics
                    .dispatch_latency_seconds
                    .with_label_values(&["error"])
                    .observe(start.elapsed().as_secs_f64());
                error!(order_id = order.id, error = %err, "failed to dispatch order");
            }
        }
    }

    warn!("dispatch worker stopped: queue channel closed");
}

async fn dispatch_order(state: &AppState, order: &Order) -> Result<usize, AppError> {
    let candidates = select_candidates(state, order)?;

    if candidates.is_empty() {
        warn!(order_id = order.id, "no eligible drivers to notify");
        return Ok(0);
    }

    let payload = json!({
        "order_id": order.id,
        "order_number": order.order_number,
        "price": order.price,
        "pickup_location": order.pickup_location,
        "drop_location": order.drop_location,
        "distance_km": order.distance_km,
        "eta_minutes": order.eta_minutes(),
    });
    let body = format!(
        "Rp{}, {:.1} km, sekitar {} menit",
        order.price,
        order.distance_km,
        order.eta_minutes()
    );

    let mut notified = 0;
    for candidate in candidates {
        match state
            .notifier
            .send(&candidate.push_token, "Order baru tersedia", &body, &payload)
            .await
        {
            Ok(()) => {
                notified += 1;
                state.metrics.dispatch_notifications("sent");
            }
            Err(err) => {
                state.metrics.dispatch_notifications("failed");
                warn!(
                    order_id = order.id,
                    driver_id = candidate.driver_id,
                    error = %err,
                    "notification delivery failed"
                );
            }
        }
    }

    Ok(notified)
}

/// Kiosk orders target exactly the scanned driver. Orders with pickup
/// coordinates go to online drivers near the pickup point. Orders with
/// free-text locations only are broadcast to every active driver holding a
/// push token.
fn select_candidates(state: &AppState, order: &Order) -> Result<Vec<Candidate>, AppError> {
    if let Some(code) = &order.driver_code {
        let targeted = state
            .drivers
            .iter()
            .filter(|d| d.driver_code == *code && d.is_active)
            .filter_map(|d| {
                d.push_token.as_ref().map(|token| Candidate {
                    driver_id: d.id,
                    push_token: token.clone(),
                })
            })
            .collect();
        return Ok(targeted);
    }

    if let Some(pickup) = order.pickup {
        let query = NearbyQuery {
            center: pickup,
            radius_km: state.config.dispatch_radius_km,
            limit: state.config.nearby_default_limit,
        };
        let found = nearby(
            &state.locations,
            &query,
            state.config.location_freshness_secs,
            Utc::now(),
        )?;

        let candidates = found
            .into_iter()
            .filter_map(|near| {
                let driver = state.drivers.get(&near.driver_id)?;
                if !driver.is_active || driver.status != DriverStatus::Active {
                    return None;
                }
                let token = driver.push_token.clone()?;
                Some(Candidate {
                    driver_id: driver.id,
                    push_token: token,
                })
            })
            .collect();
        return Ok(candidates);
    }

    let broadcast = state
        .drivers
        .iter()
        .filter(|d| d.is_active && d.status == DriverStatus::Active)
        .filter_map(|d| {
            d.push_token.as_ref().map(|token| Candidate {
                driver_id: d.id,
                push_token: token.clone(),
            })
        })
        .collect();
    Ok(broadcast)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;

    use super::dispatch_order;
    use crate::config::Config;
    use crate::engine::orders::{
        create_order, create_public_order, CreateOrderRequest, CreatePublicOrderRequest,
    };
    use crate::models::driver::{Driver, DriverStatus};
    use crate::models::location::{DriverLocation, GeoPoint};
    use crate::models::tariff::Tariff;
    use crate::notify::recording::RecordingNotifier;
    use crate::state::AppState;
    use tokio::sync::mpsc;

    // The receiver must stay alive or enqueueing new orders fails.
    fn test_state(
        notifier: Arc<RecordingNotifier>,
    ) -> (Arc<AppState>, mpsc::Receiver<crate::models::order::Order>) {
        let config = Config {
            http_port: 0,
            log_level: "info".to_string(),
            dispatch_queue_size: 64,
            dispatch_radius_km: 5.0,
            location_freshness_secs: 300,
            nearby_default_limit: 10,
        };
        let (state, rx) = AppState::new(config, notifier);
        let state = Arc::new(state);
        state.tariffs.insert(
            1,
            Tariff {
                id: 1,
                name: "Dekat".to_string(),
                min_distance_km: 0.0,
                max_distance_km: 3.0,
                price: 20_000.0,
                is_active: true,
            },
        );
        (state, rx)
    }

    fn add_driver(state: &AppState, code: &str, token: Option<&str>) -> u64 {
        let id = state.next_driver_id();
        let now = Utc::now();
        state.drivers.insert(
            id,
            Driver {
                id,
                driver_code: code.to_string(),
                user_id: None,
                name: code.to_string(),
                phone: "0812".to_string(),
                status: DriverStatus::Active,
                is_active: true,
                rating: 4.5,
                total_trips: 0,
                total_earnings: 0.0,
                push_token: token.map(|t| t.to_string()),
                created_at: now,
                updated_at: now,
            },
        );
        id
    }

    fn put_location(state: &AppState, driver_id: u64, lat: f64, lng: f64) {
        let now = Utc::now();
        state.locations.insert(
            driver_id,
            DriverLocation {
                driver_id,
                position: GeoPoint { lat, lng },
                accuracy: 5.0,
                speed: 0.0,
                heading: 0.0,
                is_online: true,
                last_seen: now,
                updated_at: now,
            },
        );
    }

    fn order_request(pickup: Option<GeoPoint>) -> CreateOrderRequest {
        CreateOrderRequest {
            customer_id: Some(1),
            tariff_id: 1,
            pickup,
            dropoff: None,
            pickup_location: "Tugu".to_string(),
            drop_location: "Malioboro".to_string(),
            distance_km: 1.2,
            customer_phone: "0811".to_string(),
            customer_name: "Sari".to_string(),
            notes: String::new(),
        }
    }

    #[tokio::test]
    async fn notifies_only_nearby_online_drivers() {
        let notifier = Arc::new(RecordingNotifier::default());
        let (state, _rx) = test_state(notifier.clone());

        let near = add_driver(&state, "BCK-001", Some("tok-near"));
        put_location(&state, near, -7.798, 110.371);
        let far = add_driver(&state, "BCK-002", Some("tok-far"));
        put_location(&state, far, -7.95, 110.60);
        // Active but never pinged a location; not a geo candidate.
        add_driver(&state, "BCK-003", Some("tok-silent"));

        let pickup = GeoPoint {
            lat: -7.797068,
            lng: 110.370529,
        };
        let order = create_order(&state, order_request(Some(pickup))).await.unwrap();
        let notified = dispatch_order(&state, &order).await.unwrap();

        assert_eq!(notified, 1);
        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "tok-near");
        assert_eq!(sent[0].2["order_id"], order.id);
        assert_eq!(sent[0].2["price"], 20_000.0);
    }

    #[tokio::test]
    async fn broadcasts_when_order_has_no_coordinates() {
        let notifier = Arc::new(RecordingNotifier::default());
        let (state, _rx) = test_state(notifier.clone());

        add_driver(&state, "BCK-001", Some("tok-1"));
        add_driver(&state, "BCK-002", Some("tok-2"));
        add_driver(&state, "BCK-003", None); // no push token, skipped

        let order = create_order(&state, order_request(None)).await.unwrap();
        let notified = dispatch_order(&state, &order).await.unwrap();

        assert_eq!(notified, 2);
    }

    #[tokio::test]
    async fn kiosk_order_notifies_the_targeted_driver_only() {
        let notifier = Arc::new(RecordingNotifier::default());
        let (state, _rx) = test_state(notifier.clone());

        add_driver(&state, "BCK-001", Some("tok-1"));
        add_driver(&state, "BCK-002", Some("tok-2"));

        let order = create_public_order(
            &state,
            CreatePublicOrderRequest {
                driver_code: "BCK-002".to_string(),
                tariff_id: 1,
                customer_phone: "0811".to_string(),
                customer_name: String::new(),
                notes: String::new(),
            },
        )
        .await
        .unwrap();
        let notified = dispatch_order(&state, &order).await.unwrap();

        assert_eq!(notified, 1);
        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent[0].0, "tok-2");
    }

    #[tokio::test]
    async fn delivery_failure_is_swallowed_and_others_still_notified() {
        let notifier = Arc::new(RecordingNotifier {
            fail_tokens: vec!["tok-1".to_string()],
            ..Default::default()
        });
        let (state, _rx) = test_state(notifier.clone());

        add_driver(&state, "BCK-001", Some("tok-1"));
        add_driver(&state, "BCK-002", Some("tok-2"));

        let order = create_order(&state, order_request(None)).await.unwrap();
        let notified = dispatch_order(&state, &order).await.unwrap();

        assert_eq!(notified, 1);
        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "tok-2");
    }
}
