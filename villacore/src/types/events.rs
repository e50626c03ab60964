use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;

/// Where a connection supervisor currently is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    #[default]
    Idle,
    Connecting,
    LoggingIn,
    /// Logged in; heartbeat and receive loops are running.
    Active,
    /// The session was dropped and a new one will be attempted after backoff.
    Reconnecting,
    LoggingOut,
    /// Terminal. The supervisor will not connect again.
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Why a supervisor reached [`ConnectionState::Closed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The server kicked this device off. Reconnecting would go against the
    /// server's intent.
    KickedOff { code: i32, reason: String },
    /// The server acknowledged a logout.
    LoggedOut,
    /// The owning application asked the supervisor to stop.
    StopRequested,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Socket error or close.
    ConnectionLost,
    /// The server sent the shutdown signal.
    ServerShutdown,
    /// A frame failed to decode; stream alignment is lost.
    CorruptStream,
    KickedOff { code: i32, reason: String },
    LoggedOut,
    StopRequested,
}

impl From<CloseReason> for DisconnectReason {
    fn from(reason: CloseReason) -> Self {
        match reason {
            CloseReason::KickedOff { code, reason } => Self::KickedOff { code, reason },
            CloseReason::LoggedOut => Self::LoggedOut,
            CloseReason::StopRequested => Self::StopRequested,
        }
    }
}

/// A login succeeded and the session is active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connected {
    pub connection_id: u64,
    pub server_timestamp: u64,
    pub uid: u64,
    pub device_id: String,
}

/// An active session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disconnected {
    pub reason: DisconnectReason,
    /// False once the supervisor is closing for good.
    pub will_reconnect: bool,
}

/// Lifecycle callbacks for the owning application, e.g. to mark a bot online.
/// Called inline from the supervisor, so implementations should return quickly.
pub trait ConnectionHooks: Send + Sync {
    fn on_connected(&self, _connected: &Connected) {}

    fn on_disconnected(&self, _disconnected: &Disconnected) {}
}

/// Hooks that do nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

impl ConnectionHooks for NoopHooks {}

/// Turns an event payload (the body of an `Event` frame) into a typed
/// business event.
pub trait EventDecoder: Send + Sync {
    type Event: Send + 'static;

    fn decode_event(&self, payload: Bytes) -> Result<Self::Event, anyhow::Error>;
}

/// Receives decoded events. Each dispatch runs in its own task, so events may
/// arrive out of order or concurrently.
#[async_trait]
pub trait EventSink<E>: Send + Sync {
    async fn dispatch(&self, event: E);
}

/// Hands the payload through untouched, for applications that decode the
/// event envelope themselves.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawEventDecoder;

impl EventDecoder for RawEventDecoder {
    type Event = Bytes;

    fn decode_event(&self, payload: Bytes) -> Result<Bytes, anyhow::Error> {
        Ok(payload)
    }
}
