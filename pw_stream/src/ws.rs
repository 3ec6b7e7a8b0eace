//! ABOUTME: WebSocket connector for the iostat push endpoint
//! ABOUTME: Runs one socket task per transport and reports through the sink

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{protocol::frame::coding::CloseCode, Message},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::StreamError;
use crate::transport::{Connector, TransportHandle, TransportSink};

/// Connector backed by `tokio-tungstenite`
///
/// Mirrors browser socket semantics: a failure is reported as an error
/// followed by a close, a server close with a non-normal code records the
/// close reason as the error first.
#[derive(Debug, Clone, Default)]
pub struct WsConnector;

impl WsConnector {
    pub fn new() -> Self {
        Self
    }
}

impl Connector for WsConnector {
    fn open(&self, url: Url, sink: TransportSink) -> TransportHandle {
        let cancel = CancellationToken::new();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_socket(url, sink, cancel.clone(), outbound_rx));
        TransportHandle::new(cancel, outbound_tx)
    }
}

async fn run_socket(
    url: Url,
    sink: TransportSink,
    cancel: CancellationToken,
    mut outbound: mpsc::UnboundedReceiver<String>,
) {
    debug!(url = %url, transport = sink.transport(), "Opening WebSocket");

    let connected = tokio::select! {
        _ = cancel.cancelled() => return,
        result = connect_async(url.as_str()) => result,
    };

    let socket = match connected {
        Ok((socket, _response)) => socket,
        Err(e) => {
            warn!(url = %url, error = %e, "WebSocket connection failed");
            sink.error(StreamError::Transport(e.to_string()).to_string());
            sink.closed();
            return;
        }
    };

    info!(url = %url, transport = sink.transport(), "WebSocket open");
    sink.opened();

    let (mut write, mut read) = socket.split();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = write.send(Message::Close(None)).await;
                debug!(url = %url, "WebSocket released");
                return;
            }
            Some(text) = outbound.recv() => {
                if let Err(e) = write.send(Message::Text(text)).await {
                    sink.error(StreamError::Transport(e.to_string()).to_string());
                    sink.closed();
                    return;
                }
            }
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => sink.message(text),
                Some(Ok(Message::Close(frame))) => {
                    if let Some(frame) = frame.filter(|f| f.code != CloseCode::Normal) {
                        sink.error(format!(
                            "Closed by server ({}): {}",
                            u16::from(frame.code),
                            frame.reason
                        ));
                    }
                    sink.closed();
                    return;
                }
                // binary and control frames carry no readings
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    sink.error(StreamError::Transport(e.to_string()).to_string());
                    sink.closed();
                    return;
                }
                None => {
                    sink.closed();
                    return;
                }
            }
        }
    }
}
