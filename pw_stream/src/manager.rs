//! ABOUTME: Application-wide telemetry stream service
//! ABOUTME: One transport at a time, history kept across views and reconnects

use pw_config::StreamConfig;
use std::sync::Arc;
use tracing::debug;

use crate::driver::{Command, StreamCore};
use crate::machine::ConnectionState;
use crate::metrics::StreamMetrics;
use crate::registry::SubscriptionToken;
use crate::sample::Sample;
use crate::transport::Connector;

/// Shared stream manager
///
/// Constructed once by the application root and cloned into every view
/// that needs live telemetry. Control calls return immediately; progress
/// is observed through [`StreamManager::subscribe`].
#[derive(Debug, Clone)]
pub struct StreamManager {
    core: Arc<StreamCore>,
}

impl StreamManager {
    /// Start the service; must be called inside a tokio runtime
    pub fn start(config: StreamConfig, connector: Arc<dyn Connector>) -> Self {
        Self::with_metrics(config, connector, StreamMetrics::new())
    }

    pub fn with_metrics(
        config: StreamConfig,
        connector: Arc<dyn Connector>,
        metrics: StreamMetrics,
    ) -> Self {
        Self {
            core: Arc::new(StreamCore::spawn(config, connector, metrics)),
        }
    }

    /// Stream `key`, replacing any other pool being watched
    ///
    /// A no-op when already connecting or live on `key`.
    pub fn connect(&self, key: &str) {
        debug!(key = %key, "Stream connect requested");
        self.core.command(Command::Connect(key.to_string()));
    }

    /// Close the transport and cancel pending reconnects; history is kept
    pub fn disconnect(&self) {
        debug!("Stream disconnect requested");
        self.core.command(Command::Disconnect);
    }

    /// Hand over historical samples fetched out of band
    ///
    /// Applied only if no live sample has arrived for `key` yet.
    pub fn seed(&self, key: &str, samples: Vec<Sample>) {
        self.core.command(Command::Seed {
            key: key.to_string(),
            samples,
        });
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionToken
    where
        F: Fn() + Send + Sync + 'static,
    {
        let registry = &self.core.shared().registry;
        let token = registry.subscribe(callback);
        self.core.metrics().subscribers.set(registry.len() as i64);
        token
    }

    /// Stop notifying an observer; the transport keeps running
    pub fn unsubscribe(&self, token: SubscriptionToken) -> bool {
        let registry = &self.core.shared().registry;
        let removed = registry.unsubscribe(token);
        self.core.metrics().subscribers.set(registry.len() as i64);
        removed
    }

    /// Samples for `key`, oldest first
    pub fn read(&self, key: &str) -> Vec<Sample> {
        self.core.shared().history.read(key)
    }

    pub fn latest(&self, key: &str) -> Option<Sample> {
        self.core.shared().history.latest(key)
    }

    /// Pools that have accumulated history
    pub fn keys(&self) -> Vec<String> {
        self.core.shared().history.keys()
    }

    pub fn state(&self) -> ConnectionState {
        self.core.shared().state()
    }

    pub fn metrics(&self) -> &StreamMetrics {
        self.core.metrics()
    }

    /// Stop the service and release its transport
    pub async fn shutdown(&self) {
        self.core.shutdown().await;
    }
}
