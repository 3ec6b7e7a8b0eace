//! ABOUTME: Metrics collection for telemetry streaming
//! ABOUTME: Provides Prometheus metrics for stream health monitoring

use prometheus_client::metrics::{counter::Counter, gauge::Gauge};
use prometheus_client::registry::Registry;

/// Metrics for streaming operations
#[derive(Debug, Clone, Default)]
pub struct StreamMetrics {
    /// Samples appended to history from live frames
    pub samples_appended: Counter,
    /// Frames discarded because they were not well-formed readings
    pub frames_dropped: Counter,
    /// Runtime errors reported by the transport
    pub transport_errors: Counter,
    /// Transports opened, including reconnects
    pub connections_opened: Counter,
    /// Reconnects scheduled after an unexpected close
    pub reconnects_scheduled: Counter,
    /// Current number of registered observers
    pub subscribers: Gauge,
}

impl StreamMetrics {
    /// Create new streaming metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every metric under the `poolwatch_stream` prefix
    pub fn register(&self, registry: &mut Registry) {
        let registry = registry.sub_registry_with_prefix("poolwatch_stream");
        registry.register(
            "samples_appended",
            "Samples appended to history",
            self.samples_appended.clone(),
        );
        registry.register(
            "frames_dropped",
            "Malformed frames discarded",
            self.frames_dropped.clone(),
        );
        registry.register(
            "transport_errors",
            "Transport error events",
            self.transport_errors.clone(),
        );
        registry.register(
            "connections_opened",
            "Transports opened",
            self.connections_opened.clone(),
        );
        registry.register(
            "reconnects_scheduled",
            "Reconnects scheduled after unexpected closes",
            self.reconnects_scheduled.clone(),
        );
        registry.register(
            "subscribers",
            "Registered observers",
            self.subscribers.clone(),
        );
    }
}
