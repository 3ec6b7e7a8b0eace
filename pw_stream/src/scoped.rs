//! ABOUTME: Per-consumer stream client with private state
//! ABOUTME: Same connect/parse/reconnect contract, torn down with its owner

use pw_config::StreamConfig;
use std::sync::Arc;
use tracing::debug;

use crate::driver::{Command, StreamCore};
use crate::machine::{ConnectionState, ConnectionStatus};
use crate::metrics::StreamMetrics;
use crate::registry::SubscriptionToken;
use crate::sample::Sample;
use crate::transport::Connector;

#[derive(Debug, Clone)]
pub struct ScopedClientOptions {
    /// Connect as soon as the client is created
    pub auto_connect: bool,
}

impl Default for ScopedClientOptions {
    fn default() -> Self {
        Self { auto_connect: true }
    }
}

/// Stream client owned by a single consumer
///
/// Unlike [`crate::StreamManager`] nothing is shared: history, state and
/// observers belong to this client. Dropping it cancels any pending
/// reconnect before releasing the transport.
#[derive(Debug)]
pub struct ScopedStreamClient {
    key: String,
    core: StreamCore,
}

impl ScopedStreamClient {
    /// Create a client for `key`; must be called inside a tokio runtime
    pub fn new(
        config: StreamConfig,
        connector: Arc<dyn Connector>,
        key: impl Into<String>,
        options: ScopedClientOptions,
    ) -> Self {
        let client = Self {
            key: key.into(),
            core: StreamCore::spawn(config, connector, StreamMetrics::new()),
        };
        if options.auto_connect {
            client.connect();
        }
        client
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn connect(&self) {
        self.core.command(Command::Connect(self.key.clone()));
    }

    pub fn disconnect(&self) {
        self.core.command(Command::Disconnect);
    }

    /// Fire-and-forget outbound message
    ///
    /// Silently dropped unless the stream is open; nothing is queued for later.
    pub fn send(&self, message: impl Into<String>) {
        if self.state().status != ConnectionStatus::Open {
            debug!(key = %self.key, "Dropping outbound message, stream not open");
            return;
        }
        self.core.command(Command::Send(message.into()));
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionToken
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.core.shared().registry.subscribe(callback)
    }

    pub fn unsubscribe(&self, token: SubscriptionToken) -> bool {
        self.core.shared().registry.unsubscribe(token)
    }

    /// Samples received by this client, oldest first
    pub fn samples(&self) -> Vec<Sample> {
        self.core.shared().history.read(&self.key)
    }

    pub fn latest(&self) -> Option<Sample> {
        self.core.shared().history.latest(&self.key)
    }

    pub fn state(&self) -> ConnectionState {
        self.core.shared().state()
    }

    pub fn metrics(&self) -> &StreamMetrics {
        self.core.metrics()
    }

    /// Disconnect and wait for the driver to stop
    pub async fn close(self) {
        self.core.command(Command::Disconnect);
        self.core.shutdown().await;
    }
}

impl Drop for ScopedStreamClient {
    fn drop(&mut self) {
        // Disconnect cancels the reconnect timer before the transport goes
        self.core.command(Command::Disconnect);
        self.core.command(Command::Shutdown);
    }
}
