// src/metrics.rs
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("refresh_runs_total", "Refresh cycles started, per feed.");
        describe_counter!(
            "refresh_errors_total",
            "Failed refresh cycles, per feed and error kind."
        );
        describe_counter!(
            "refresh_skipped_total",
            "Ticks skipped because a prior run was still in flight."
        );
        describe_counter!(
            "publish_suppressed_total",
            "Out-of-order snapshots discarded by the monotonicity guard."
        );
        describe_counter!("scheduler_ticks_total", "Trigger firings, per feed.");
        describe_counter!("fetch_errors_total", "Provider HTTP errors, per feed.");
        describe_gauge!(
            "feed_last_refresh_ts",
            "Unix ts of the last published snapshot, per feed."
        );
        describe_histogram!("refresh_fetch_ms", "Provider fetch time in milliseconds.");
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder. Call once, before the scheduler
    /// starts emitting.
    pub fn init() -> Self {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .expect("prometheus: install recorder");
        ensure_metrics_described();
        Self { handle }
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
