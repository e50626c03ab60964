/// Tokio-based WebSocket transport for villa-ws
///
/// This crate provides a concrete implementation of the Transport trait
/// using tokio-tungstenite. The gateway puts exactly one frame in each binary
/// WebSocket message, so messages are forwarded as-is without reassembly.
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, trace, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, Notify, mpsc};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

pub use villacore::net::{Transport, TransportEvent, TransportFactory};

type RawWs = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<RawWs, Message>;
type WsStream = SplitStream<RawWs>;

const EVENT_CHANNEL_CAPACITY: usize = 100;
/// Upper bound on the closing handshake, including waiting out a send that
/// holds the sink.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Tokio WebSocket transport
pub struct TokioWebSocketTransport {
    ws_sink: Mutex<Option<WsSink>>,
    read_shutdown: Arc<Notify>,
}

impl TokioWebSocketTransport {
    fn new(sink: WsSink, read_shutdown: Arc<Notify>) -> Self {
        Self {
            ws_sink: Mutex::new(Some(sink)),
            read_shutdown,
        }
    }
}

#[async_trait]
impl Transport for TokioWebSocketTransport {
    async fn send(&self, data: &[u8]) -> Result<(), anyhow::Error> {
        let mut sink_guard = self.ws_sink.lock().await;
        let sink = sink_guard
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("Socket is closed"))?;

        trace!("--> Sending WebSocket message: {} bytes", data.len());
        sink.send(Message::binary(Bytes::copy_from_slice(data)))
            .await
            .map_err(|e| anyhow::anyhow!("WebSocket send error: {}", e))?;
        Ok(())
    }

    async fn disconnect(&self) {
        // The pump stops even if the peer never answers the close frame.
        self.read_shutdown.notify_one();

        let close = async {
            match self.ws_sink.lock().await.take() {
                Some(mut sink) => sink.close().await,
                None => Ok(()),
            }
        };
        match tokio::time::timeout(CLOSE_TIMEOUT, close).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("WebSocket close error: {e}"),
            Err(_) => warn!("WebSocket close did not finish within {CLOSE_TIMEOUT:?}"),
        }
    }
}

/// Factory for creating Tokio WebSocket transports
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioWebSocketTransportFactory;

impl TokioWebSocketTransportFactory {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TransportFactory for TokioWebSocketTransportFactory {
    async fn create_transport(
        &self,
        url: &str,
    ) -> Result<(Arc<dyn Transport>, mpsc::Receiver<TransportEvent>), anyhow::Error> {
        info!("Dialing {url}");
        let (client, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| anyhow::anyhow!("WebSocket connect failed: {}", e))?;

        let (sink, stream) = client.split();
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let read_shutdown = Arc::new(Notify::new());
        let transport = Arc::new(TokioWebSocketTransport::new(sink, read_shutdown.clone()));

        // Queue Connected before the read pump can report anything else.
        let _ = event_tx.send(TransportEvent::Connected).await;
        tokio::task::spawn(read_pump(stream, event_tx, read_shutdown));

        Ok((transport, event_rx))
    }
}

async fn read_pump(
    mut stream: WsStream,
    event_tx: mpsc::Sender<TransportEvent>,
    shutdown: Arc<Notify>,
) {
    loop {
        let next = tokio::select! {
            biased;
            _ = shutdown.notified() => {
                debug!("Transport disconnected locally, closing read pump");
                break;
            }
            next = stream.next() => next,
        };
        match next {
            Some(Ok(Message::Binary(data))) => {
                trace!("<-- Received WebSocket message: {} bytes", data.len());
                if event_tx
                    .send(TransportEvent::DataReceived(data))
                    .await
                    .is_err()
                {
                    warn!("Event receiver dropped, closing read pump");
                    break;
                }
            }
            Some(Ok(Message::Close(frame))) => {
                debug!("Received close frame: {frame:?}");
                break;
            }
            Some(Ok(Message::Text(text))) => {
                warn!("Ignoring unexpected text message ({} bytes)", text.len());
            }
            // Pings are answered by tungstenite itself.
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                error!("Error reading from websocket: {e}");
                break;
            }
            None => {
                trace!("Websocket stream ended");
                break;
            }
        }
    }

    let _ = event_tx.send(TransportEvent::Disconnected).await;
}
