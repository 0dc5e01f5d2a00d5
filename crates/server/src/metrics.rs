// crates/server/src/metrics.rs
//! Prometheus metrics.
//!
//! The job counters and histograms are emitted by `proposal-desk-jobs`
//! through the `metrics` facade; this module installs the recorder that
//! collects them and renders the text exposition for `GET /metrics`.

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

/// Global Prometheus handle for rendering metrics.
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// Call once at startup, before any job is triggered.
/// Returns `true` if initialization succeeded, `false` if already initialized.
pub fn init_metrics() -> bool {
    if PROMETHEUS_HANDLE.get().is_some() {
        return false;
    }

    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();

    if metrics::set_global_recorder(recorder).is_err() {
        tracing::warn!("Failed to set global metrics recorder (already set)");
        return false;
    }

    if PROMETHEUS_HANDLE.set(handle).is_err() {
        tracing::warn!("Failed to store Prometheus handle (already set)");
    }

    describe_metrics();

    tracing::info!("Prometheus metrics initialized");
    true
}

fn describe_metrics() {
    describe_counter!(
        "job_triggers_total",
        "Trigger requests by task and outcome (started, rejected, failed)"
    );
    describe_counter!(
        "job_runs_total",
        "Finished background runs by task and final state"
    );
    describe_histogram!(
        "job_run_duration_seconds",
        "Wall-clock duration of background runs in seconds"
    );
}

/// Render current metrics in Prometheus text format.
///
/// Returns `None` if metrics are not initialized.
pub fn render_metrics() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(|h| h.render())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_noop() {
        init_metrics();
        assert!(!init_metrics());
        assert!(render_metrics().is_some());
    }
}
