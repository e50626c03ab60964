use crate::socket::error::{RecvError, SendError};
use crate::transport::{Transport, TransportEvent};
use bytes::Bytes;
use log::{debug, trace};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, mpsc};
use villacore::framing::Frame;
use villacore::package::{Package, PackageRegistry};
use villacore::protocol::BizType;

/// What a received frame turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    ControlPackage(Package),
    /// Body of an `Event` frame. Decoding it is the event decoder's job, so
    /// this is produced whatever the bytes look like.
    EventPayload(Bytes),
    ShutdownSignal,
}

impl Decoded {
    pub fn classify(frame: Frame, registry: &PackageRegistry) -> Result<Self, RecvError> {
        if frame.biz_type == BizType::Event.code() {
            return Ok(Self::EventPayload(frame.body));
        }
        if frame.biz_type == BizType::Shutdown.code() {
            return Ok(Self::ShutdownSignal);
        }
        registry
            .decode(frame.biz_type, &frame.body)
            .map(Self::ControlPackage)
            .map_err(|source| RecvError::Package {
                biz_type: frame.biz_type,
                source,
            })
    }
}

/// One physical connection. Owns the outbound request id counter, which
/// starts at 0 and is never shared with another session.
pub struct Session {
    transport: Arc<dyn Transport>,
    events: Mutex<mpsc::Receiver<TransportEvent>>,
    registry: Arc<PackageRegistry>,
    app_id: i32,
    /// Guards the id counter and the socket write together, so ids go out in
    /// the order they were assigned.
    next_id: Mutex<u64>,
    closed: AtomicBool,
}

impl Session {
    pub fn new(
        transport: Arc<dyn Transport>,
        events: mpsc::Receiver<TransportEvent>,
        registry: Arc<PackageRegistry>,
        app_id: i32,
    ) -> Self {
        Self {
            transport,
            events: Mutex::new(events),
            registry,
            app_id,
            next_id: Mutex::new(0),
            closed: AtomicBool::new(false),
        }
    }

    pub fn app_id(&self) -> i32 {
        self.app_id
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Id the next successful send will carry.
    pub async fn next_id(&self) -> u64 {
        *self.next_id.lock().await
    }

    /// Encodes, frames and writes `package`, returning the request id it was
    /// sent with. The id only advances when the write succeeded.
    pub async fn send(&self, package: &Package) -> Result<u64, SendError> {
        if self.is_closed() {
            return Err(SendError::Closed);
        }
        let body = self.registry.encode(package)?;

        let mut next_id = self.next_id.lock().await;
        let id = *next_id;
        let frame = Frame::new(
            package.biz_type().code(),
            id,
            self.app_id,
            self.registry.outbound_flag(),
            body,
        )
        .encode()?;

        debug!(target: "Client/Send", "--> [{id}] {package}");
        self.transport
            .send(&frame)
            .await
            .map_err(SendError::Transport)?;
        *next_id += 1;
        Ok(id)
    }

    /// Waits for the next frame and classifies it.
    pub async fn receive(&self) -> Result<Decoded, RecvError> {
        let mut events = self.events.lock().await;
        loop {
            match events.recv().await {
                Some(TransportEvent::DataReceived(data)) => {
                    let frame = Frame::decode(&data)?;
                    trace!(
                        target: "Client/Recv",
                        "<-- [{}] biz_type={} body {} bytes",
                        frame.id,
                        frame.biz_type,
                        frame.body.len()
                    );
                    return Decoded::classify(frame, &self.registry);
                }
                Some(TransportEvent::Connected) => continue,
                Some(TransportEvent::Disconnected) | None => return Err(RecvError::Closed),
            }
        }
    }

    /// Closes the underlying transport. Only the first call reaches it.
    pub async fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.transport.disconnect().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;
    use villacore::framing::FrameError;
    use villacore::package::{HeartBeat, KickOff, Role};
    use villacore::protocol::Flag;

    fn heartbeat(ts: &str) -> Package {
        Package::HeartBeat(HeartBeat {
            client_timestamp: ts.to_string(),
        })
    }

    fn server_frame(package: &Package, id: u64) -> Bytes {
        let body = PackageRegistry::server().encode(package).unwrap();
        Frame::new(package.biz_type().code(), id, 0, Flag::Response, body)
            .encode()
            .unwrap()
    }

    #[tokio::test]
    async fn test_sequence_ids_are_consecutive() {
        let (transport, mut sent, _event_tx, event_rx) = MockTransport::new();
        let session = Session::new(transport, event_rx, PackageRegistry::client(), 104);

        for expected in 0..5u64 {
            assert_eq!(session.send(&heartbeat("1")).await.unwrap(), expected);
        }

        for expected in 0..5u64 {
            let frame = Frame::decode(&sent.recv().await.unwrap()).unwrap();
            assert_eq!(frame.id, expected);
            assert_eq!(frame.app_id, 104);
            assert_eq!(frame.flag, Flag::Request);
            assert_eq!(frame.biz_type, BizType::PHeartBeat.code());
        }
        assert_eq!(session.next_id().await, 5);
    }

    #[tokio::test]
    async fn test_concurrent_sends_get_distinct_ordered_ids() {
        let (transport, mut sent, _event_tx, event_rx) = MockTransport::new();
        let session = Arc::new(Session::new(
            transport,
            event_rx,
            PackageRegistry::client(),
            0,
        ));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let session = session.clone();
            handles.push(tokio::spawn(async move {
                session.send(&heartbeat("1")).await.unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // Wire order matches id order.
        for expected in 0..16u64 {
            let frame = Frame::decode(&sent.recv().await.unwrap()).unwrap();
            assert_eq!(frame.id, expected);
        }
    }

    #[tokio::test]
    async fn test_send_reply_package_is_rejected() {
        let (transport, _sent, _event_tx, event_rx) = MockTransport::new();
        let session = Session::new(transport, event_rx, PackageRegistry::client(), 0);

        let result = session
            .send(&Package::KickOff(KickOff {
                code: 0,
                reason: String::new(),
            }))
            .await;
        assert!(matches!(result, Err(SendError::Package(_))));
        assert_eq!(session.next_id().await, 0);
    }

    #[tokio::test]
    async fn test_failed_write_does_not_advance_id() {
        let (transport, _sent, _event_tx, event_rx) = MockTransport::new();
        let session = Session::new(transport.clone(), event_rx, PackageRegistry::client(), 0);

        transport.disconnect().await;
        assert!(matches!(
            session.send(&heartbeat("1")).await,
            Err(SendError::Transport(_))
        ));
        assert_eq!(session.next_id().await, 0);
    }

    #[tokio::test]
    async fn test_send_after_close() {
        let (transport, _sent, _event_tx, event_rx) = MockTransport::new();
        let session = Session::new(transport.clone(), event_rx, PackageRegistry::client(), 0);

        session.close().await;
        session.close().await;
        assert!(matches!(
            session.send(&heartbeat("1")).await,
            Err(SendError::Closed)
        ));
        assert_eq!(
            transport.disconnects.load(std::sync::atomic::Ordering::SeqCst),
            1
        );
    }

    #[tokio::test]
    async fn test_receive_classifies_frames() {
        let (transport, _sent, event_tx, event_rx) = MockTransport::new();
        let session = Session::new(transport, event_rx, PackageRegistry::client(), 0);
        let kick_off = Package::KickOff(KickOff {
            code: 2,
            reason: "bye".to_string(),
        });

        event_tx.send(TransportEvent::Connected).await.unwrap();
        event_tx
            .send(TransportEvent::DataReceived(server_frame(&kick_off, 9)))
            .await
            .unwrap();
        event_tx
            .send(TransportEvent::DataReceived(
                Frame::new(BizType::Event.code(), 1, 0, Flag::Response, vec![0xFF; 3])
                    .encode()
                    .unwrap(),
            ))
            .await
            .unwrap();
        event_tx
            .send(TransportEvent::DataReceived(
                Frame::new(BizType::Shutdown.code(), 2, 0, Flag::Response, Bytes::new())
                    .encode()
                    .unwrap(),
            ))
            .await
            .unwrap();
        event_tx.send(TransportEvent::Disconnected).await.unwrap();

        assert_eq!(session.receive().await.unwrap(), Decoded::ControlPackage(kick_off));
        assert_eq!(
            session.receive().await.unwrap(),
            Decoded::EventPayload(Bytes::from(vec![0xFF; 3]))
        );
        assert_eq!(session.receive().await.unwrap(), Decoded::ShutdownSignal);
        assert!(matches!(session.receive().await, Err(RecvError::Closed)));
    }

    #[tokio::test]
    async fn test_receive_after_peer_dropped() {
        let (transport, _sent, event_tx, event_rx) = MockTransport::new();
        let session = Session::new(transport, event_rx, PackageRegistry::client(), 0);
        drop(event_tx);
        assert!(matches!(session.receive().await, Err(RecvError::Closed)));
    }

    #[tokio::test]
    async fn test_receive_corrupt_frame_is_fatal() {
        let (transport, _sent, event_tx, event_rx) = MockTransport::new();
        let session = Session::new(transport, event_rx, PackageRegistry::client(), 0);
        event_tx
            .send(TransportEvent::DataReceived(Bytes::from_static(&[0u8; 32])))
            .await
            .unwrap();

        let err = session.receive().await.unwrap_err();
        assert!(matches!(err, RecvError::Frame(FrameError::BadMagic(0))));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_event_frames_classify_regardless_of_body() {
        let registry = PackageRegistry::client();
        for body in [vec![], vec![0xFF, 0xFF, 0xFF], b"not protobuf".to_vec()] {
            let frame = Frame::new(BizType::Event.code(), 0, 0, Flag::Response, body.clone());
            assert_eq!(
                Decoded::classify(frame, &registry).unwrap(),
                Decoded::EventPayload(Bytes::from(body))
            );
        }
    }

    #[test]
    fn test_unknown_biz_type_is_not_fatal() {
        let registry = PackageRegistry::client();
        let frame = Frame::new(BizType::RoomMsg.code(), 0, 0, Flag::Response, Bytes::new());
        let err = Decoded::classify(frame, &registry).unwrap_err();
        assert!(matches!(err, RecvError::Package { biz_type: 63, .. }));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_server_registry_classifies_requests() {
        let registry = PackageRegistry::new(Role::Server, villacore::package::PACKAGE_TABLE).unwrap();
        let body = PackageRegistry::client().encode(&heartbeat("99")).unwrap();
        let frame = Frame::new(BizType::PHeartBeat.code(), 0, 0, Flag::Request, body);
        assert_eq!(
            Decoded::classify(frame, &registry).unwrap(),
            Decoded::ControlPackage(heartbeat("99"))
        );
    }
}
