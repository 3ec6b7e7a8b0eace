//! ABOUTME: Transport abstraction between the stream driver and the network
//! ABOUTME: Connectors report lifecycle events through a generation-tagged sink

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::driver::DriverEvent;

/// Lifecycle and data events a transport reports
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Opened,
    Message(String),
    Error(String),
    Closed,
}

/// Where a transport reports its events
///
/// Events are tagged with the transport generation so the driver can drop
/// anything coming from a transport it has already released.
#[derive(Debug, Clone)]
pub struct TransportSink {
    transport: u64,
    events: mpsc::UnboundedSender<DriverEvent>,
}

impl TransportSink {
    pub(crate) fn new(transport: u64, events: mpsc::UnboundedSender<DriverEvent>) -> Self {
        Self { transport, events }
    }

    pub fn transport(&self) -> u64 {
        self.transport
    }

    pub fn opened(&self) {
        self.emit(TransportEvent::Opened);
    }

    pub fn message(&self, text: impl Into<String>) {
        self.emit(TransportEvent::Message(text.into()));
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit(TransportEvent::Error(message.into()));
    }

    pub fn closed(&self) {
        self.emit(TransportEvent::Closed);
    }

    fn emit(&self, event: TransportEvent) {
        // The driver may already be gone during shutdown
        let _ = self.events.send(DriverEvent::Transport {
            transport: self.transport,
            event,
        });
    }
}

/// Owner's handle on an open or pending transport
///
/// Dropping the handle releases the transport.
#[derive(Debug)]
pub struct TransportHandle {
    cancel: CancellationToken,
    outbound: mpsc::UnboundedSender<String>,
}

impl TransportHandle {
    pub fn new(cancel: CancellationToken, outbound: mpsc::UnboundedSender<String>) -> Self {
        Self { cancel, outbound }
    }

    /// Queue a text message; false if the transport is already gone
    pub fn send(&self, text: String) -> bool {
        !self.cancel.is_cancelled() && self.outbound.send(text).is_ok()
    }

    /// Release the transport; no close event is expected afterwards
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for TransportHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Opens push transports for the driver
///
/// `open` must return immediately; progress is reported through `sink`.
pub trait Connector: Send + Sync + 'static {
    fn open(&self, url: Url, sink: TransportSink) -> TransportHandle;
}
