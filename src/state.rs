use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::config::Config;
use crate::models::driver::Driver;
use crate::models::location::DriverLocation;
use crate::models::order::Order;
use crate::models::tariff::Tariff;
use crate::models::withdrawal::Withdrawal;
use crate::notify::Notifier;
use crate::observability::metrics::Metrics;

/// Shared service state. The DashMap entry guards are the persistence
/// layer's row locks: every guard-and-mutate sequence holds the entry guard
/// for the whole read-check-write.
///
/// Lock ordering for multi-entity operations is fixed as
/// orders -> drivers -> withdrawals; never acquire against that order.
pub struct AppState {
    pub drivers: DashMap<u64, Driver>,
    pub orders: DashMap<u64, Order>,
    pub locations: DashMap<u64, DriverLocation>,
    pub withdrawals: DashMap<u64, Withdrawal>,
    pub tariffs: DashMap<u64, Tariff>,
    pub order_tx: mpsc::Sender<Order>,
    pub notifier: Arc<dyn Notifier>,
    pub metrics: Metrics,
    pub config: Config,
    order_seq: AtomicU64,
    driver_seq: AtomicU64,
    withdrawal_seq: AtomicU64,
}

impl AppState {
    pub fn new(config: Config, notifier: Arc<dyn Notifier>) -> (Self, mpsc::Receiver<Order>) {
        let (order_tx, order_rx) = mpsc::channel(config.dispatch_queue_size);

        (
            Self {
                drivers: DashMap::new(),
                orders: DashMap::new(),
                locations: DashMap::new(),
                withdrawals: DashMap::new(),
                tariffs: DashMap::new(),
                order_tx,
                notifier,
                metrics: Metrics::new(),
                config,
                order_seq: AtomicU64::new(1),
                driver_seq: AtomicU64::new(1),
                withdrawal_seq: AtomicU64::new(1),
            },
            order_rx,
        )
    }

    pub fn next_order_id(&self) -> u64 {
        self.order_seq.fetch_add(1, Ordering::Relaxed)
    }

    pub fn next_driver_id(&self) -> u64 {
        self.driver_seq.fetch_add(1, Ordering::Relaxed)
    }

    pub fn next_withdrawal_id(&self) -> u64 {
        self.withdrawal_seq.fetch_add(1, Ordering::Relaxed)
    }
}
