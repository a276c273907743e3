use shared::metrics_defs::{MetricDef, MetricType};

pub const REGISTRY_REFRESH: MetricDef = MetricDef {
    name: "registry.refresh",
    metric_type: MetricType::Counter,
    description: "Registry refresh attempts. Tagged with outcome.",
};

pub const REGISTRY_TENANTS: MetricDef = MetricDef {
    name: "registry.tenants",
    metric_type: MetricType::Gauge,
    description: "Number of tenants in the current registry snapshot",
};

pub const ALL_METRICS: &[MetricDef] = &[REGISTRY_REFRESH, REGISTRY_TENANTS];
