//! Prometheus metrics for the p2px engine.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()`. A registration failure means a
//! duplicate metric name, which is a startup-time programming error.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

use crate::error::{TelemetryError, TelemetryResult};

/// Background passes.
/// Labels: job (reconcile/sweep), outcome (run/skipped)
pub static PASSES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "p2px_passes_total",
        "Background passes by job and outcome",
        &["job", "outcome"]
    )
    .unwrap()
});

/// Wall time of completed passes.
pub static PASS_DURATION_MS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "p2px_pass_duration_ms",
        "Background pass duration in milliseconds",
        &["job"],
        vec![1.0, 5.0, 10.0, 50.0, 100.0, 500.0, 1000.0, 5000.0, 30000.0]
    )
    .unwrap()
});

/// Persisted order status changes.
pub static TRANSITIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "p2px_order_transitions_total",
        "Order status transitions by target status",
        &["to"]
    )
    .unwrap()
});

/// Orders skipped inside a pass because of an error.
pub static ORDER_FAILURES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "p2px_order_failures_total",
        "Per-order failures isolated within a background pass",
        &["job"]
    )
    .unwrap()
});

pub static OPERATOR_ALERTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "p2px_operator_alerts_total",
        "Alerts raised to operators",
        &["kind"]
    )
    .unwrap()
});

pub static NOTIFY_FAILURES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "p2px_notify_failures_total",
        "Notifications that could not be delivered",
        &["template"]
    )
    .unwrap()
});

/// Take attempts rejected because another taker won.
pub static TAKE_CONFLICTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "p2px_take_conflicts_total",
        "Concurrent take attempts that lost the race",
        &["kind"]
    )
    .unwrap()
});

/// Metrics facade.
pub struct Metrics;

impl Metrics {
    pub fn pass_run(job: &str, duration_ms: f64) {
        PASSES_TOTAL.with_label_values(&[job, "run"]).inc();
        PASS_DURATION_MS.with_label_values(&[job]).observe(duration_ms);
    }

    pub fn pass_skipped(job: &str) {
        PASSES_TOTAL.with_label_values(&[job, "skipped"]).inc();
    }

    pub fn order_transition(to: &str) {
        TRANSITIONS_TOTAL.with_label_values(&[to]).inc();
    }

    pub fn order_failure(job: &str) {
        ORDER_FAILURES_TOTAL.with_label_values(&[job]).inc();
    }

    pub fn operator_alert(kind: &str) {
        OPERATOR_ALERTS_TOTAL.with_label_values(&[kind]).inc();
    }

    pub fn notify_failure(template: &str) {
        NOTIFY_FAILURES_TOTAL.with_label_values(&[template]).inc();
    }

    pub fn take_conflict(kind: &str) {
        TAKE_CONFLICTS_TOTAL.with_label_values(&[kind]).inc();
    }

    /// Text exposition of every registered metric.
    pub fn render() -> TelemetryResult<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&prometheus::gather(), &mut buffer)
            .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| TelemetryError::Metrics(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_includes_recorded_series() {
        Metrics::pass_skipped("reconcile");
        Metrics::order_transition("ACTIVE");
        let text = Metrics::render().unwrap();
        assert!(text.contains("p2px_passes_total"));
        assert!(text.contains("p2px_order_transitions_total"));
    }
}
