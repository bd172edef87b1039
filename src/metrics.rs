use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Encoder, Gauge, Histogram, TextEncoder, register_counter,
    register_counter_vec, register_gauge, register_histogram,
};

lazy_static! {
    pub static ref REQUEST_TOTAL: Counter =
        register_counter!("phrase_requests_total", "Total number of generation requests").unwrap();
    pub static ref GENERATIONS_TOTAL: Counter =
        register_counter!("phrase_generations_total", "Successful (charged) generations").unwrap();
    pub static ref QUOTA_REJECTIONS: CounterVec = register_counter_vec!(
        "phrase_quota_rejections_total",
        "Requests rejected because the quota was exhausted",
        &["class"]
    )
    .unwrap();
    pub static ref UPSTREAM_FAILURES: Counter =
        register_counter!("phrase_upstream_failures_total", "Failed upstream generation calls").unwrap();
    pub static ref UPSTREAM_LATENCY: Histogram = register_histogram!(
        "phrase_upstream_latency_seconds",
        "Upstream generation latency in seconds"
    )
    .unwrap();
    pub static ref ACTIVE_SESSIONS: Gauge =
        register_gauge!("phrase_active_sessions", "Current number of issued session tokens").unwrap();
    pub static ref LOGIN_FAILURES: Counter =
        register_counter!("phrase_login_failures_total", "Logins with a wrong password").unwrap();
}

// Text exposition of the default registry
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
