use axum::extract::State;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// GET /metrics in Prometheus text exposition format.
pub async fn prometheus_metrics(State(handle): State<Arc<PrometheusHandle>>) -> impl IntoResponse {
    handle.render()
}

/// Register descriptions for every metric the service emits.
pub fn describe_metrics() {
    metrics::describe_counter!(
        "reconciliation_runs_total",
        "Completed reconciliation runs, labelled by outcome"
    );
    metrics::describe_counter!(
        "reconciliation_runs_skipped_total",
        "Triggers skipped because a run was already in progress"
    );
    metrics::describe_counter!(
        "reconciliation_batches_failed_total",
        "Batches whose lookup or persistence failed"
    );
    metrics::describe_counter!(
        "reconciliation_products_checked_total",
        "Products classified by reconciliation"
    );
    metrics::describe_histogram!(
        "reconciliation_run_seconds",
        "Wall-clock duration of a reconciliation run"
    );
    metrics::describe_gauge!(
        "worker_pool_active_tasks",
        "Batch tasks currently executing"
    );
    metrics::describe_counter!(
        "alerts_sent_total",
        "Invalid product alerts, labelled by outcome"
    );
}
