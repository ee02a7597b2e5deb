use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::location::GeoPoint;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Accepted,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    pub order_number: String,
    pub customer_id: Option<u64>,
    /// Set on accept; kiosk orders target a driver through `driver_code`
    /// instead and leave this unset while pending.
    pub driver_id: Option<u64>,
    /// Kiosk flow: the sticker code scanned by the customer. Only the
    /// targeted driver may accept such an order.
    pub driver_code: Option<String>,
    pub tariff_id: u64,
    pub pickup: Option<GeoPoint>,
    pub dropoff: Option<GeoPoint>,
    pub pickup_location: String,
    pub drop_location: String,
    pub distance_km: f64,
    /// Frozen from the tariff at creation, immutable afterwards.
    pub price: f64,
    pub status: OrderStatus,
    pub payment_status: String,
    pub customer_phone: String,
    pub customer_name: String,
    pub notes: String,
    /// Transition timestamps; only the one matching the current status is
    /// ever set.
    pub accepted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    /// Soft delete; completed trips stay attributable to the ledger.
    pub deleted: bool,
}

impl Order {
    /// Estimated pickup time in minutes: one minute per km plus a flat
    /// two-minute head start.
    pub fn eta_minutes(&self) -> i64 {
        self.distance_km as i64 + 2
    }
}
