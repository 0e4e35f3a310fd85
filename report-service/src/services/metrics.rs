//! Prometheus metrics for report-service.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::{Lazy, OnceCell};
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

/// Counter for generated reports by report kind and status.
pub static REPORTS_GENERATED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "report_generated_total",
        "Total number of report generation requests",
        &["report", "status"]
    )
    .expect("Failed to register REPORTS_GENERATED")
});

/// Histogram for end to end report generation time.
pub static REPORT_GENERATION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "report_generation_duration_seconds",
        "Report generation duration in seconds",
        &["report"],
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]
    )
    .expect("Failed to register REPORT_GENERATION_DURATION")
});

/// Counter for selected transactions by match outcome.
pub static TRANSACTIONS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "report_transactions_total",
        "Selected transactions by match outcome",
        &["outcome"]
    )
    .expect("Failed to register TRANSACTIONS")
});

pub static EMAIL_DELIVERIES: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "report_email_deliveries_total",
        "Report email deliveries by status",
        &["status"]
    )
    .expect("Failed to register EMAIL_DELIVERIES")
});

/// Histogram for database query duration.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "report_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
    )
    .expect("Failed to register DB_QUERY_DURATION")
});

/// Counter for errors.
pub static ERRORS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "report_errors_total",
        "Total number of errors",
        &["error_type"]
    )
    .expect("Failed to register ERRORS")
});

/// Recorder behind the `metrics` facade used by the HTTP middleware.
static HTTP_RECORDER: OnceCell<Option<PrometheusHandle>> = OnceCell::new();

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&REPORTS_GENERATED);
    Lazy::force(&REPORT_GENERATION_DURATION);
    Lazy::force(&TRANSACTIONS);
    Lazy::force(&EMAIL_DELIVERIES);
    Lazy::force(&DB_QUERY_DURATION);
    Lazy::force(&ERRORS);

    HTTP_RECORDER.get_or_init(|| match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "HTTP metrics recorder not installed");
            None
        }
    });
}

/// Get all metrics as Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
    }
    let mut output = String::from_utf8_lossy(&buffer).into_owned();

    if let Some(handle) = HTTP_RECORDER.get().and_then(Option::as_ref) {
        output.push_str(&handle.render());
    }
    output
}

pub fn record_report(report: &str, status: &str) {
    REPORTS_GENERATED.with_label_values(&[report, status]).inc();
}

pub fn record_transactions(outcome: &str, count: usize) {
    TRANSACTIONS
        .with_label_values(&[outcome])
        .inc_by(count as f64);
}

pub fn record_email_delivery(status: &str) {
    EMAIL_DELIVERIES.with_label_values(&[status]).inc();
}

/// Record an error.
pub fn record_error(error_type: &str) {
    ERRORS.with_label_values(&[error_type]).inc();
}
