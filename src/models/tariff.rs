use serde::{Deserialize, Serialize};

/// Flat-rate tariff band. Consulted at order creation only; the price is
/// frozen onto the order afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tariff {
    pub id: u64,
    pub name: String,
    pub min_distance_km: f64,
    pub max_distance_km: f64,
    pub price: f64,
    pub is_active: bool,
}
