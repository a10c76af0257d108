use lazy_static::lazy_static;
use prometheus::{Counter, Encoder, Opts, Registry, TextEncoder};
use std::sync::OnceLock;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref SENSORS_CREATED_TOTAL: Counter = Counter::with_opts(Opts::new(
        "sensor_api_sensors_created_total",
        "Total sensors created"
    ))
    .expect("valid metric options");
    pub static ref READINGS_ADDED_TOTAL: Counter = Counter::with_opts(Opts::new(
        "sensor_api_readings_added_total",
        "Total readings stored"
    ))
    .expect("valid metric options");
    pub static ref READINGS_PRUNED_TOTAL: Counter = Counter::with_opts(Opts::new(
        "sensor_api_readings_pruned_total",
        "Total readings deleted by the retention window"
    ))
    .expect("valid metric options");
    pub static ref NOT_FOUND_TOTAL: Counter = Counter::with_opts(Opts::new(
        "sensor_api_not_found_total",
        "Total requests answered with 404"
    ))
    .expect("valid metric options");
}

static REGISTERED: OnceLock<Result<(), String>> = OnceLock::new();

fn register_all() -> prometheus::Result<()> {
    REGISTRY.register(Box::new(SENSORS_CREATED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(READINGS_ADDED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(READINGS_PRUNED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(NOT_FOUND_TOTAL.clone()))?;
    Ok(())
}

/// Registers the counters with `REGISTRY`. Safe to call more than once.
pub fn init_metrics() -> prometheus::Result<()> {
    REGISTERED
        .get_or_init(|| register_all().map_err(|e| e.to_string()))
        .clone()
        .map_err(prometheus::Error::Msg)
}

pub fn gather_metrics() -> crate::errors::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
