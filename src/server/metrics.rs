use axum::response::IntoResponse;
use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Encoder, HistogramOpts, HistogramVec, IntCounter, Opts, Registry, TextEncoder,
};
use std::time::Duration;

/// Metric name prefix for all Formforge metrics
const PREFIX: &str = "formforge";

lazy_static! {
    // Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Request Metrics
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_http_requests_total"), "Total number of HTTP requests"),
        &["method", "path", "status"]
    ).expect("Failed to create http_requests_total metric");

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_http_request_duration_seconds"),
            "HTTP request duration in seconds"
        )
        .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["method", "path"]
    ).expect("Failed to create http_request_duration_seconds metric");

    // Versioning Metrics
    pub static ref VERSIONS_PUBLISHED_TOTAL: IntCounter = IntCounter::new(
        format!("{PREFIX}_versions_published_total"),
        "Total form versions published"
    ).expect("Failed to create versions_published_total metric");

    pub static ref VERSION_LEASE_TIMEOUTS_TOTAL: IntCounter = IntCounter::new(
        format!("{PREFIX}_version_lease_timeouts_total"),
        "Publishes that timed out waiting for the per-form lease"
    ).expect("Failed to create version_lease_timeouts_total metric");

    // Submission Metrics
    pub static ref SUBMISSIONS_RECORDED_TOTAL: IntCounter = IntCounter::new(
        format!("{PREFIX}_submissions_recorded_total"),
        "Total submissions recorded"
    ).expect("Failed to create submissions_recorded_total metric");

    pub static ref AUDIT_WRITE_FAILURES_TOTAL: IntCounter = IntCounter::new(
        format!("{PREFIX}_audit_write_failures_total"),
        "Best-effort audit log writes that failed"
    ).expect("Failed to create audit_write_failures_total metric");

    // Notification Metrics
    pub static ref NOTIFICATIONS_ENQUEUED_TOTAL: IntCounter = IntCounter::new(
        format!("{PREFIX}_notifications_enqueued_total"),
        "Notification jobs enqueued"
    ).expect("Failed to create notifications_enqueued_total metric");

    pub static ref NOTIFICATION_ENQUEUE_FAILURES_TOTAL: IntCounter = IntCounter::new(
        format!("{PREFIX}_notification_enqueue_failures_total"),
        "Notification jobs that could not be enqueued"
    ).expect("Failed to create notification_enqueue_failures_total metric");

    pub static ref NOTIFICATIONS_SENT_TOTAL: IntCounter = IntCounter::new(
        format!("{PREFIX}_notifications_sent_total"),
        "Notifications delivered"
    ).expect("Failed to create notifications_sent_total metric");

    pub static ref NOTIFICATION_RETRIES_TOTAL: IntCounter = IntCounter::new(
        format!("{PREFIX}_notification_retries_total"),
        "Notification delivery retries scheduled"
    ).expect("Failed to create notification_retries_total metric");

    pub static ref NOTIFICATIONS_DEAD_TOTAL: IntCounter = IntCounter::new(
        format!("{PREFIX}_notifications_dead_total"),
        "Notification jobs dead-lettered after exhausting attempts"
    ).expect("Failed to create notifications_dead_total metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Register all metrics - ignore errors if already registered (for tests)
    let _ = REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(VERSIONS_PUBLISHED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(VERSION_LEASE_TIMEOUTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(SUBMISSIONS_RECORDED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(AUDIT_WRITE_FAILURES_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(NOTIFICATIONS_ENQUEUED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(NOTIFICATION_ENQUEUE_FAILURES_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(NOTIFICATIONS_SENT_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(NOTIFICATION_RETRIES_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(NOTIFICATIONS_DEAD_TOTAL.clone()));
}

/// Record an HTTP request with its outcome and duration.
pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration.as_secs_f64());
}

/// Prometheus exposition endpoint.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            String::new(),
        );
    }
    (
        axum::http::StatusCode::OK,
        String::from_utf8_lossy(&buffer).into_owned(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_register_and_increment() {
        init_metrics();
        // Double registration must be harmless.
        init_metrics();

        let before = NOTIFICATIONS_SENT_TOTAL.get();
        NOTIFICATIONS_SENT_TOTAL.inc();
        assert_eq!(NOTIFICATIONS_SENT_TOTAL.get(), before + 1);
    }

    #[tokio::test]
    async fn exposition_includes_http_metrics() {
        init_metrics();
        record_http_request("GET", "/v1/forms/test", 200, Duration::from_millis(5));

        let response = metrics_handler().await.into_response();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }
}
