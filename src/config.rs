use std::env;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub dispatch_queue_size: usize,
    /// Default search radius around an order's pickup point, km.
    pub dispatch_radius_km: f64,
    /// Location pings older than this are treated as offline, seconds.
    pub location_freshness_secs: i64,
    pub nearby_default_limit: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            dispatch_queue_size: parse_or_default("DISPATCH_QUEUE_SIZE", 1024)?,
            dispatch_radius_km: parse_or_default("DISPATCH_RADIUS_KM", 5.0)?,
            location_freshness_secs: parse_or_default("LOCATION_FRESHNESS_SECS", 300)?,
            nearby_default_limit: parse_or_default("NEARBY_DEFAULT_LIMIT", 10)?,
        })
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
