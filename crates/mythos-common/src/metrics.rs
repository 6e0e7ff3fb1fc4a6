//! Metrics bootstrap. Counters/histograms are registered under these names by the
//! crates that own them; this module only wires the exporter so every
//! binary exposes the same `/metrics` surface.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the process-wide Prometheus recorder and return a handle whose
/// `render()` can be mounted behind an HTTP endpoint by the caller.
pub fn install_metrics() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus metrics recorder")
}

// Well-known metric names, collected here so every crate that emits them
// agrees on spelling. Spec references: §4.1 (connections/backpressure),
// §4.2 (event bus), §4.3 (broker), §4.5 (movement).
pub mod names {
    pub const CONN_ATTACHED_TOTAL: &str = "mythos_connections_attached_total";
    pub const CONN_DETACHED_TOTAL: &str = "mythos_connections_detached_total";
    pub const CONN_DROPPED_MESSAGE_TOTAL: &str = "mythos_connections_dropped_message_total";
    pub const CONN_SLOW_CONSUMER_TOTAL: &str = "mythos_connections_slow_consumer_total";
    pub const CONN_AGE_SECONDS: &str = "mythos_connection_age_seconds";

    pub const BUS_PUBLISHED_TOTAL: &str = "mythos_bus_published_total";
    pub const BUS_DROPPED_TOTAL: &str = "mythos_bus_dropped_total";
    pub const BUS_HANDLER_ERROR_TOTAL: &str = "mythos_bus_handler_error_total";
    pub const BUS_HANDLER_TIMEOUT_TOTAL: &str = "mythos_bus_handler_timeout_total";

    pub const BROKER_PUBLISH_TOTAL: &str = "mythos_broker_publish_total";
    pub const BROKER_PUBLISH_BYTES_TOTAL: &str = "mythos_broker_publish_bytes_total";
    pub const BROKER_ACK_SUCCESS_TOTAL: &str = "mythos_broker_ack_success_total";
    pub const BROKER_ACK_FAILURE_TOTAL: &str = "mythos_broker_ack_failure_total";
    pub const BROKER_NAK_TOTAL: &str = "mythos_broker_nak_total";
    pub const BROKER_BATCH_FLUSH_SUCCESS_TOTAL: &str = "mythos_broker_batch_flush_success_total";
    pub const BROKER_BATCH_FLUSH_FAILURE_TOTAL: &str = "mythos_broker_batch_flush_failure_total";
    pub const BROKER_FAILED_BATCH_QUEUE_DEPTH: &str = "mythos_broker_failed_batch_queue_depth";
    pub const BROKER_CURRENT_BATCH_SIZE: &str = "mythos_broker_current_batch_size";
    pub const BROKER_POOL_SUCCESSFUL: &str = "mythos_broker_pool_successful";
    pub const BROKER_POOL_FAILED: &str = "mythos_broker_pool_failed";
    pub const BROKER_CONSECUTIVE_HEALTH_FAILURES: &str =
        "mythos_broker_consecutive_health_failures";

    pub const MOVEMENT_SUCCESS_TOTAL: &str = "mythos_movement_success_total";
    pub const MOVEMENT_ERROR_TOTAL: &str = "mythos_movement_error_total";
}
