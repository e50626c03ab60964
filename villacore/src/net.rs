use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::mpsc;

/// An event produced by the transport layer.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// The transport has successfully connected.
    Connected,
    /// One complete message has been received. For the WebSocket transport
    /// this is exactly one frame.
    DataReceived(Bytes),
    /// The connection was lost or closed by the peer.
    Disconnected,
}

/// Represents an active network connection.
/// The transport is a dumb pipe for messages with no knowledge of the framing.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends one message. A message is delivered whole or not at all.
    async fn send(&self, data: &[u8]) -> Result<(), anyhow::Error>;

    /// Closes the connection.
    async fn disconnect(&self);
}

/// A factory responsible for creating new transport instances.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    /// Connects to `url` and returns the transport, along with a stream of events.
    async fn create_transport(
        &self,
        url: &str,
    ) -> Result<(Arc<dyn Transport>, mpsc::Receiver<TransportEvent>), anyhow::Error>;
}
