use shared::metrics_defs::{MetricDef, MetricType};

pub const RELAY_REQUESTS: MetricDef = MetricDef {
    name: "relay.requests",
    metric_type: MetricType::Counter,
    description: "Inbound API requests. Tagged with endpoint, status.",
};

pub const RELAY_DELIVERIES: MetricDef = MetricDef {
    name: "relay.deliveries",
    metric_type: MetricType::Counter,
    description: "Outbound event deliveries. Tagged with event_type, outcome.",
};

pub const RELAY_DELIVERY_DURATION: MetricDef = MetricDef {
    name: "relay.delivery.duration",
    metric_type: MetricType::Histogram,
    description: "Outbound delivery duration in seconds",
};

pub const ALL_METRICS: &[MetricDef] = &[RELAY_REQUESTS, RELAY_DELIVERIES, RELAY_DELIVERY_DURATION];
