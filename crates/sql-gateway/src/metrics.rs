use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec,
    TextEncoder,
};
use std::sync::LazyLock;

pub static QUERY_REQUESTS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "sql_gateway_requests_total",
        "Query route requests by outcome",
        &["outcome"]
    )
    .unwrap()
});

pub static GATE_REJECTIONS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "sql_gateway_gate_rejections_total",
        "Statements rejected by gating",
        &["reason"]
    )
    .unwrap()
});

pub static DB_ERRORS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "sql_gateway_db_errors_total",
        "Database failures by binding and transience",
        &["binding", "transient"]
    )
    .unwrap()
});

pub static QUERY_LATENCY: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "sql_gateway_query_duration_seconds",
        "Statement execution latency in seconds",
        &["binding"],
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap()
});

pub fn metrics_output() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
