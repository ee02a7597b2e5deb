use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverStatus {
    Active,
    Inactive,
    OnTrip,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Driver {
    pub id: u64,
    pub driver_code: String,
    pub user_id: Option<u64>,
    pub name: String,
    pub phone: String,
    /// Trip engagement: flips to OnTrip on accept and back to Active on
    /// complete/cancel.
    pub status: DriverStatus,
    /// Eligibility gate, independent of trip engagement. An inactive driver
    /// never receives dispatch and cannot accept orders.
    pub is_active: bool,
    pub rating: f64,
    pub total_trips: u32,
    /// Running ledger balance. Written only by the order state machine
    /// (credit on completion) and the ledger (debit on withdrawal approval).
    pub total_earnings: f64,
    pub push_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
