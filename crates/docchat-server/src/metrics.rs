//! Prometheus metrics recorder and metric names.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the `PrometheusHandle` used to render the `/metrics` endpoint.
/// Must be called once at startup before any metrics are recorded.
pub fn install_recorder() -> PrometheusHandle {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install metrics recorder");
    info!("prometheus metrics recorder installed");
    handle
}

/// A handle that renders metrics without installing a global recorder.
pub fn detached_handle() -> PrometheusHandle {
    PrometheusBuilder::new().build_recorder().handle()
}

// Metric name constants to avoid typos across modules.

/// WebSocket sessions admitted (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket sessions torn down (counter).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Sessions evicted for a full outbound queue (counter).
pub const WS_EVICTIONS_TOTAL: &str = "ws_evictions_total";
/// Registry member count (gauge).
pub const WS_SESSIONS_ACTIVE: &str = "ws_sessions_active";
/// Session lifetime (histogram).
pub const WS_SESSION_DURATION_SECONDS: &str = "ws_session_duration_seconds";
/// Queries dispatched to the pipeline (counter).
pub const QUERIES_TOTAL: &str = "queries_total";
/// Queries answered with an error frame (counter, labels: kind).
pub const QUERY_ERRORS_TOTAL: &str = "query_errors_total";
/// Exchanges that could not be persisted (counter).
pub const EXCHANGE_PERSIST_FAILURES_TOTAL: &str = "exchange_persist_failures_total";
/// Answer service latency (histogram).
pub const ANSWER_DURATION_SECONDS: &str = "answer_duration_seconds";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detached_handle_renders() {
        let handle = detached_handle();
        let output = handle.render();
        assert!(output.is_empty() || output.contains('#') || output.contains('\n'));
    }

    #[test]
    fn metric_constants_are_snake_case() {
        let names = [
            WS_CONNECTIONS_TOTAL,
            WS_DISCONNECTIONS_TOTAL,
            WS_EVICTIONS_TOTAL,
            WS_SESSIONS_ACTIVE,
            WS_SESSION_DURATION_SECONDS,
            QUERIES_TOTAL,
            QUERY_ERRORS_TOTAL,
            EXCHANGE_PERSIST_FAILURES_TOTAL,
            ANSWER_DURATION_SECONDS,
        ];
        for name in names {
            assert!(
                name.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "metric name '{name}' must be snake_case"
            );
        }
    }
}
