use prometheus::{
    Encoder, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub order_transitions_total: IntCounterVec,
    pub orders_in_dispatch_queue: IntGauge,
    pub dispatch_latency_seconds: HistogramVec,
    pub dispatch_notifications_total: IntCounterVec,
    pub withdrawal_decisions_total: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let order_transitions_total = IntCounterVec::new(
            Opts::new(
                "order_transitions_total",
                "Order lifecycle transitions by kind",
            ),
            &["transition"],
        )
        .expect("valid order_transitions_total metric");

        let orders_in_dispatch_queue = IntGauge::new(
            "orders_in_dispatch_queue",
            "Current number of orders waiting for dispatch",
        )
        .expect("valid orders_in_dispatch_queue metric");

        let dispatch_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "dispatch_latency_seconds",
                "Latency of dispatch processing in seconds",
            ),
            &["outcome"],
        )
        .expect("valid dispatch_latency_seconds metric");

        let dispatch_notifications_total = IntCounterVec::new(
            Opts::new(
                "dispatch_notifications_total",
                "Driver notifications by delivery outcome",
            ),
            &["outcome"],
        )
        .expect("valid dispatch_notifications_total metric");

        let withdrawal_decisions_total = IntCounterVec::new(
            Opts::new(
                "withdrawal_decisions_total",
                "Withdrawal decisions by outcome",
            ),
            &["decision"],
        )
        .expect("valid withdrawal_decisions_total metric");

        registry
            .register(Box::new(order_transitions_total.clone()))
            .expect("register order_transitions_total");
        registry
            .register(Box::new(orders_in_dispatch_queue.clone()))
            .expect("register orders_in_dispatch_queue");
        registry
            .register(Box::new(dispatch_latency_seconds.clone()))
            .expect("register dispatch_latency_seconds");
        registry
            .register(Box::new(dispatch_notifications_total.clone()))
            .expect("register dispatch_notifications_total");
        registry
            .register(Box::new(withdrawal_decisions_total.clone()))
            .expect("register withdrawal_decisions_total");

        Self {
            registry,
            order_transitions_total,
            orders_in_dispatch_queue,
            dispatch_latency_seconds,
            dispatch_notifications_total,
            withdrawal_decisions_total,
        }
    }

    pub fn order_transitions(&self, transition: &str) {
        self.order_transitions_total
            .with_label_values(&[transition])
            .inc();
    }

    pub fn dispatch_notifications(&self, outcome: &str) {
        self.dispatch_notifications_total
            .with_label_values(&[outcome])
            .inc();
    }

    pub fn withdrawal_decisions(&self, decision: &str) {
        self.withdrawal_decisions_total
            .with_label_values(&[decision])
            .inc();
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}
