#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::mpsc;
use villa_ws::framing::Frame;
use villa_ws::package::{LoginReply, Package, PackageRegistry};
use villa_ws::protocol::{BizType, Flag};
use villa_ws::transport::{Transport, TransportEvent, TransportFactory};
use villa_ws::types::connection::{ConnectionInfo, CredentialProvider};

pub const TOKEN: &str = "1.secret.bot";

pub fn connection_info() -> ConnectionInfo {
    ConnectionInfo {
        endpoint_url: "ws://gateway.test/ws".to_string(),
        uid: 42,
        app_id: 0,
        platform: 3,
        device_id: "device-1".to_string(),
    }
}

/// Stands in for the gateway: every connection the client dials shows up
/// here as a [`Peer`].
pub struct Gateway {
    connections: mpsc::UnboundedReceiver<Peer>,
    attempts: Arc<AtomicUsize>,
}

impl Gateway {
    pub fn new() -> (Self, Arc<dyn TransportFactory>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let attempts = Arc::new(AtomicUsize::new(0));
        let factory = Arc::new(MockTransportFactory {
            connections: tx,
            attempts: attempts.clone(),
        });
        (
            Self {
                connections: rx,
                attempts,
            },
            factory,
        )
    }

    pub async fn next_connection(&mut self) -> Peer {
        self.connections
            .recv()
            .await
            .expect("transport factory dropped")
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

struct MockTransportFactory {
    connections: mpsc::UnboundedSender<Peer>,
    attempts: Arc<AtomicUsize>,
}

#[async_trait]
impl TransportFactory for MockTransportFactory {
    async fn create_transport(
        &self,
        url: &str,
    ) -> Result<(Arc<dyn Transport>, mpsc::Receiver<TransportEvent>), anyhow::Error> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel(64);
        let transport = Arc::new(PeerTransport {
            sent: sent_tx,
            closed: AtomicBool::new(false),
            disconnects: AtomicUsize::new(0),
        });
        event_tx.send(TransportEvent::Connected).await?;

        self.connections
            .send(Peer {
                url: url.to_string(),
                sent: sent_rx,
                events: event_tx,
                transport: transport.clone(),
                registry: PackageRegistry::server(),
            })
            .map_err(|_| anyhow::anyhow!("gateway dropped"))?;
        Ok((transport, event_rx))
    }
}

pub struct PeerTransport {
    sent: mpsc::UnboundedSender<Bytes>,
    closed: AtomicBool,
    disconnects: AtomicUsize,
}

#[async_trait]
impl Transport for PeerTransport {
    async fn send(&self, data: &[u8]) -> Result<(), anyhow::Error> {
        if self.closed.load(Ordering::SeqCst) {
            anyhow::bail!("socket closed");
        }
        self.sent
            .send(Bytes::copy_from_slice(data))
            .map_err(|_| anyhow::anyhow!("peer gone"))
    }

    async fn disconnect(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}

/// The server end of one connection.
pub struct Peer {
    pub url: String,
    sent: mpsc::UnboundedReceiver<Bytes>,
    events: mpsc::Sender<TransportEvent>,
    transport: Arc<PeerTransport>,
    registry: Arc<PackageRegistry>,
}

impl Peer {
    pub async fn next_frame(&mut self) -> Frame {
        let data = self.sent.recv().await.expect("client dropped the socket");
        Frame::decode(&data).expect("client sent a malformed frame")
    }

    pub async fn next_package(&mut self) -> (Frame, Package) {
        let frame = self.next_frame().await;
        let package = self
            .registry
            .decode(frame.biz_type, &frame.body)
            .expect("client sent an undecodable package");
        (frame, package)
    }

    /// Next package that is not a heartbeat.
    pub async fn next_non_heartbeat(&mut self) -> (Frame, Package) {
        loop {
            let (frame, package) = self.next_package().await;
            if !matches!(package, Package::HeartBeat(_)) {
                return (frame, package);
            }
        }
    }

    pub async fn reply(&self, package: &Package) {
        let body = self.registry.encode(package).unwrap();
        let frame = Frame::new(package.biz_type().code(), 0, 0, Flag::Response, body);
        self.send_raw(frame.encode().unwrap()).await;
    }

    pub async fn push(&self, biz_type: BizType, body: impl Into<Bytes>) {
        let frame = Frame::new(biz_type.code(), 0, 0, Flag::Request, body);
        self.send_raw(frame.encode().unwrap()).await;
    }

    pub async fn send_raw(&self, data: Bytes) {
        self.events
            .send(TransportEvent::DataReceived(data))
            .await
            .unwrap();
    }

    /// Reads the login request and accepts it.
    pub async fn accept_login(&mut self, conn_id: u64) -> (Frame, Package) {
        let (frame, login) = self.next_package().await;
        assert!(matches!(login, Package::Login(_)), "expected Login, got {login:?}");
        self.reply(&Package::LoginReply(LoginReply {
            server_timestamp: 1_700_000_000_000,
            conn_id,
            code: 0,
            msg: String::new(),
        }))
        .await;
        (frame, login)
    }

    pub async fn drop_connection(&self) {
        let _ = self.events.send(TransportEvent::Disconnected).await;
    }

    pub fn disconnects(&self) -> usize {
        self.transport.disconnects.load(Ordering::SeqCst)
    }
}

/// Fails the first `failures` calls for connection info.
pub struct FlakyCredentials {
    pub failures: AtomicUsize,
    pub calls: Arc<AtomicUsize>,
}

#[async_trait]
impl CredentialProvider for FlakyCredentials {
    async fn connection_info(&self) -> Result<ConnectionInfo, anyhow::Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failed = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            anyhow::bail!("platform API unavailable");
        }
        Ok(connection_info())
    }

    async fn login_token(&self) -> Result<String, anyhow::Error> {
        Ok(TOKEN.to_string())
    }
}
