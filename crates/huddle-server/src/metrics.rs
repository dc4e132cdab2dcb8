//! Prometheus metrics recorder and metric names.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the handle used to render `/metrics`. Call once at startup,
/// before anything is recorded.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Render Prometheus text format from the installed recorder.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

// Metric name constants to avoid typos across modules.

/// Chat connections admitted (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// Chat connections rejected at admission (counter, labels: reason).
pub const WS_CONNECTIONS_REJECTED_TOTAL: &str = "ws_connections_rejected_total";
/// Chat disconnections (counter).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Open chat connections (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Broker subscriptions (gauge).
pub const WS_SUBSCRIPTIONS_ACTIVE: &str = "ws_subscriptions_active";
/// Frames that could not be queued for a subscriber (counter).
pub const WS_BROADCAST_DROPS_TOTAL: &str = "ws_broadcast_drops_total";
/// Subscribers evicted for exhausting their drop budget (counter).
pub const WS_SLOW_CLIENT_EVICTIONS_TOTAL: &str = "ws_slow_client_evictions_total";
/// Chat connection duration seconds (histogram).
pub const WS_CONNECTION_DURATION_SECONDS: &str = "ws_connection_duration_seconds";
/// Messages persisted and broadcast (counter).
pub const CHAT_MESSAGES_TOTAL: &str = "chat_messages_total";
/// Blank submissions dropped (counter).
pub const CHAT_BLANK_DROPPED_TOTAL: &str = "chat_blank_dropped_total";
/// Persist failures (counter, labels: `error_type`).
pub const CHAT_PERSIST_FAILURES_TOTAL: &str = "chat_persist_failures_total";
/// Inbound frames that violated the wire schema (counter).
pub const CHAT_PROTOCOL_ERRORS_TOTAL: &str = "chat_protocol_errors_total";
/// Persist-then-broadcast duration seconds (histogram).
pub const CHAT_DELIVERY_DURATION_SECONDS: &str = "chat_delivery_duration_seconds";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_without_global_install() {
        let handle = PrometheusBuilder::new().build_recorder().handle();
        let output = render(&handle);
        assert!(output.is_empty() || output.contains('#') || output.contains('\n'));
    }

    #[test]
    fn metric_constants_are_snake_case() {
        let names = [
            WS_CONNECTIONS_TOTAL,
            WS_CONNECTIONS_REJECTED_TOTAL,
            WS_DISCONNECTIONS_TOTAL,
            WS_CONNECTIONS_ACTIVE,
            WS_SUBSCRIPTIONS_ACTIVE,
            WS_BROADCAST_DROPS_TOTAL,
            WS_SLOW_CLIENT_EVICTIONS_TOTAL,
            WS_CONNECTION_DURATION_SECONDS,
            CHAT_MESSAGES_TOTAL,
            CHAT_BLANK_DROPPED_TOTAL,
            CHAT_PERSIST_FAILURES_TOTAL,
            CHAT_PROTOCOL_ERRORS_TOTAL,
            CHAT_DELIVERY_DURATION_SECONDS,
        ];
        for name in names {
            assert!(
                name.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "metric name '{name}' must be snake_case"
            );
        }
    }
}
