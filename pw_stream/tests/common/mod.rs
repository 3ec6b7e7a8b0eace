//! ABOUTME: Scripted in-memory connector for driving the stream driver in tests
//! ABOUTME: Records every opened transport and lets tests play the server side

#![allow(dead_code)]

use pw_config::StreamConfig;
use pw_stream::{Connector, TransportHandle, TransportSink};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

pub const RECONNECT_DELAY: Duration = Duration::from_millis(3000);

pub struct OpenedTransport {
    pub url: Url,
    pub sink: TransportSink,
    pub cancel: CancellationToken,
    pub outbound: mpsc::UnboundedReceiver<String>,
}

#[derive(Default)]
pub struct ScriptedConnector {
    opened: Mutex<Vec<OpenedTransport>>,
}

impl ScriptedConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of transports ever opened
    pub fn opened(&self) -> usize {
        self.opened.lock().unwrap().len()
    }

    /// Transports not yet released by the driver
    pub fn live(&self) -> usize {
        self.opened
            .lock()
            .unwrap()
            .iter()
            .filter(|t| !t.cancel.is_cancelled())
            .count()
    }

    pub fn sink(&self, index: usize) -> TransportSink {
        self.opened.lock().unwrap()[index].sink.clone()
    }

    pub fn last_sink(&self) -> TransportSink {
        self.opened
            .lock()
            .unwrap()
            .last()
            .expect("no transport opened")
            .sink
            .clone()
    }

    pub fn url(&self, index: usize) -> Url {
        self.opened.lock().unwrap()[index].url.clone()
    }

    pub fn released(&self, index: usize) -> bool {
        self.opened.lock().unwrap()[index].cancel.is_cancelled()
    }

    pub fn next_outbound(&self, index: usize) -> Option<String> {
        self.opened.lock().unwrap()[index].outbound.try_recv().ok()
    }
}

impl Connector for ScriptedConnector {
    fn open(&self, url: Url, sink: TransportSink) -> TransportHandle {
        let cancel = CancellationToken::new();
        let (outbound_tx, outbound) = mpsc::unbounded_channel();
        self.opened.lock().unwrap().push(OpenedTransport {
            url,
            sink,
            cancel: cancel.clone(),
            outbound,
        });
        TransportHandle::new(cancel, outbound_tx)
    }
}

pub fn config() -> StreamConfig {
    StreamConfig {
        origin: "https://nas.example".to_string(),
        reconnect_delay_ms: RECONNECT_DELAY.as_millis() as u64,
        ..Default::default()
    }
}

/// Let the driver drain its queues (paused clock only)
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

/// Count notifications delivered to an observer
#[derive(Clone, Default)]
pub struct NotifyCounter(Arc<AtomicUsize>);

impl NotifyCounter {
    pub fn callback(&self) -> impl Fn() + Send + Sync + 'static {
        let count = Arc::clone(&self.0);
        move || {
            count.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}
