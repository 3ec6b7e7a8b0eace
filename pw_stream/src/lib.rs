//! ABOUTME: Live telemetry streaming for monitored storage pools
//! ABOUTME: Owns the push connection, bounded sample history and observer notifications
//!
//! [`StreamManager`] is the application-wide service: one transport at a
//! time, history that survives view changes and reconnects, and a
//! payload-free observer registry. [`ScopedStreamClient`] offers the same
//! contract privately to a single consumer.

mod driver;
mod error;
mod history;
mod machine;
mod manager;
mod metrics;
mod registry;
mod sample;
mod scoped;
mod seed;
mod transport;
mod ws;

pub use error::{Result, StreamError};
pub use history::History;
pub use machine::{ConnectionMachine, ConnectionState, ConnectionStatus, Effect};
pub use manager::StreamManager;
pub use metrics::StreamMetrics;
pub use registry::{Callback, SubscriptionRegistry, SubscriptionToken};
pub use sample::{parse_frame, Sample, WireReading, WireTimestamp};
pub use scoped::{ScopedClientOptions, ScopedStreamClient};
pub use seed::{backfill, HttpSeedSource, SeedSource};
pub use transport::{Connector, TransportEvent, TransportHandle, TransportSink};
pub use ws::WsConnector;
