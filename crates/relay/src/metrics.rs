use lazy_static::lazy_static;
use prometheus::{
    register_int_counter_vec_with_registry, register_int_counter_with_registry, Encoder,
    IntCounter, IntCounterVec, Registry, TextEncoder,
};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref ALERTS_RECEIVED_TOTAL: IntCounter = register_int_counter_with_registry!(
        "hawkeye_relay_alerts_received_total",
        "Total number of alerts received over the webhook.",
        REGISTRY
    )
    .expect("Failed to register ALERTS_RECEIVED_TOTAL");
    pub static ref ALERTS_FIRING_TOTAL: IntCounter = register_int_counter_with_registry!(
        "hawkeye_relay_alerts_firing_total",
        "Total number of firing alerts dispatched for investigation.",
        REGISTRY
    )
    .expect("Failed to register ALERTS_FIRING_TOTAL");
    pub static ref PROMPTS_DELIVERED_TOTAL: IntCounter = register_int_counter_with_registry!(
        "hawkeye_relay_prompts_delivered_total",
        "Total number of prompts accepted by the inference service.",
        REGISTRY
    )
    .expect("Failed to register PROMPTS_DELIVERED_TOTAL");
    pub static ref BOOTSTRAP_FAILURES_TOTAL: IntCounterVec = register_int_counter_vec_with_registry!(
        "hawkeye_relay_bootstrap_failures_total",
        "Total number of session bootstrap failures, by step.",
        &["step"],
        REGISTRY
    )
    .expect("Failed to register BOOTSTRAP_FAILURES_TOTAL");
}

/// Renders every registered metric in the prometheus text format.
pub fn gather_metrics() -> crate::Result<String> {
    // Touch the lazies so all families appear even before the first alert.
    lazy_static::initialize(&ALERTS_RECEIVED_TOTAL);
    lazy_static::initialize(&ALERTS_FIRING_TOTAL);
    lazy_static::initialize(&PROMPTS_DELIVERED_TOTAL);
    lazy_static::initialize(&BOOTSTRAP_FAILURES_TOTAL);

    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    encoder.encode(&REGISTRY.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| crate::Error::Internal(e.to_string()))
}
