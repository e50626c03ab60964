use crate::config::ClientConfig;
use crate::dispatch::DispatchGroup;
use crate::handshake;
use crate::socket::{Decoded, RecvError, Session};
use crate::transport::TransportFactory;
use anyhow::Context;
use bytes::Bytes;
use log::{debug, info, trace, warn};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::sleep;
use villacore::package::{Logout, Package, PackageRegistry};
use villacore::types::connection::{ConnectionInfo, CredentialProvider};
use villacore::types::events::{
    CloseReason, Connected, ConnectionHooks, ConnectionState, DisconnectReason, Disconnected,
    EventDecoder, EventSink,
};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ClientError {
    #[error("client is already running")]
    AlreadyRunning,
    #[error("client is closed and will not connect again")]
    Closed,
}

/// What the receive loop does with one received item.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Step {
    Continue,
    Dispatch(Bytes),
    Reconnect(DisconnectReason),
    Close(CloseReason),
}

/// How an active session ended.
enum SessionEnd {
    Reconnect(DisconnectReason),
    Close(CloseReason),
    Stop,
}

pub(crate) fn step(bot_id: &str, received: Result<Decoded, RecvError>) -> Step {
    match received {
        Ok(Decoded::EventPayload(payload)) => Step::Dispatch(payload),
        Ok(Decoded::ShutdownSignal) => {
            info!(target: "Client", "[{bot_id}] Server is shutting down.");
            Step::Reconnect(DisconnectReason::ServerShutdown)
        }
        Ok(Decoded::ControlPackage(package)) => control_step(bot_id, package),
        Err(e) if !e.is_fatal() => {
            warn!(target: "Client/Recv", "[{bot_id}] Dropping frame: {e}");
            Step::Continue
        }
        Err(RecvError::Closed) => {
            info!(target: "Client", "[{bot_id}] Connection closed by peer.");
            Step::Reconnect(DisconnectReason::ConnectionLost)
        }
        Err(e) => {
            warn!(target: "Client/Recv", "[{bot_id}] Stream is corrupt: {e}");
            Step::Reconnect(DisconnectReason::CorruptStream)
        }
    }
}

fn control_step(bot_id: &str, package: Package) -> Step {
    match package {
        Package::KickOff(kick_off) => {
            warn!(
                target: "Client",
                "[{bot_id}] Kicked off by server. Code: {}, Reason: {}",
                kick_off.code, kick_off.reason
            );
            Step::Close(CloseReason::KickedOff {
                code: kick_off.code,
                reason: kick_off.reason,
            })
        }
        Package::LogoutReply(reply) if reply.code == 0 => {
            info!(target: "Client", "[{bot_id}] Logged out.");
            Step::Close(CloseReason::LoggedOut)
        }
        Package::LogoutReply(reply) => {
            warn!(
                target: "Client",
                "[{bot_id}] Logout failed. Code: {}, Message: {}",
                reply.code, reply.msg
            );
            Step::Continue
        }
        Package::HeartBeatReply(reply) if reply.code != 0 => {
            warn!(target: "Client/Keepalive", "[{bot_id}] Heartbeat rejected with code {}", reply.code);
            Step::Continue
        }
        Package::HeartBeatReply(reply) => {
            trace!(target: "Client/Keepalive", "<-- HeartBeatReply, server time {}", reply.server_timestamp);
            Step::Continue
        }
        other => {
            warn!(target: "Client", "[{bot_id}] Ignoring unexpected {:?} on an active session", other.kind());
            Step::Continue
        }
    }
}

/// Keeps one bot connected to the gateway: connects, logs in, sends
/// heartbeats, hands events to the sink and reconnects after failures until a
/// kick-off, a logout or a stop request closes it for good.
pub struct Client<E = Bytes> {
    config: ClientConfig,
    credentials: Arc<dyn CredentialProvider>,
    transport_factory: Arc<dyn TransportFactory>,
    registry: Arc<PackageRegistry>,
    decoder: Arc<dyn EventDecoder<Event = E>>,
    sink: Arc<dyn EventSink<E>>,
    hooks: Arc<dyn ConnectionHooks>,
    state: watch::Sender<ConnectionState>,
    stop: watch::Sender<bool>,
    is_running: AtomicBool,
}

impl<E: Send + 'static> Client<E> {
    pub fn new(
        config: ClientConfig,
        credentials: Arc<dyn CredentialProvider>,
        transport_factory: Arc<dyn TransportFactory>,
        decoder: Arc<dyn EventDecoder<Event = E>>,
        sink: Arc<dyn EventSink<E>>,
        hooks: Arc<dyn ConnectionHooks>,
    ) -> Self {
        Self {
            config,
            credentials,
            transport_factory,
            registry: PackageRegistry::client(),
            decoder,
            sink,
            hooks,
            state: watch::Sender::new(ConnectionState::Idle),
            stop: watch::Sender::new(false),
            is_running: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Relaxed)
    }

    /// Asks the supervisor to log out and close. Takes effect at the next
    /// await point of `run`; waits such as the reconnect backoff are cut short.
    pub fn request_stop(&self) {
        info!(target: "Client", "[{}] Stop requested.", self.config.bot_id);
        self.stop.send_replace(true);
    }

    pub fn is_stop_requested(&self) -> bool {
        *self.stop.borrow()
    }

    pub(crate) async fn stopped(&self) {
        let mut stop = self.stop.subscribe();
        let _ = stop.wait_for(|stopped| *stopped).await;
    }

    async fn until_stopped<F: Future>(&self, fut: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.stopped() => None,
            output = fut => Some(output),
        }
    }

    /// Returns false if a stop was requested while waiting.
    async fn wait_backoff(&self) -> bool {
        self.until_stopped(sleep(self.config.reconnect_backoff))
            .await
            .is_some()
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(target: "Client", "[{}] {previous} -> {state}", self.config.bot_id);
        }
    }

    /// Runs the connection until it closes for good. A client runs at most
    /// once at a time and never again after it has closed.
    pub async fn run(self: &Arc<Self>) -> Result<CloseReason, ClientError> {
        if self.is_running.swap(true, Ordering::SeqCst) {
            warn!("Client `run` method called while already running.");
            return Err(ClientError::AlreadyRunning);
        }
        let _guard = scopeguard::guard((), |_| {
            self.is_running.store(false, Ordering::SeqCst);
        });
        if self.state() == ConnectionState::Closed {
            return Err(ClientError::Closed);
        }

        let mut dispatch = DispatchGroup::new(self.config.max_in_flight_events);
        let reason = self.supervise(&mut dispatch).await;
        self.set_state(ConnectionState::Closed);
        dispatch.drain(self.config.dispatch_drain_timeout).await;

        info!(target: "Client", "[{}] Client run loop has shut down ({reason:?}).", self.config.bot_id);
        Ok(reason)
    }

    async fn supervise(self: &Arc<Self>, dispatch: &mut DispatchGroup) -> CloseReason {
        let bot_id = self.config.bot_id.as_str();
        let backoff = self.config.reconnect_backoff;

        loop {
            if self.is_stop_requested() {
                return CloseReason::StopRequested;
            }
            self.set_state(ConnectionState::Connecting);

            let (session, info, token) = match self.until_stopped(self.connect()).await {
                None => return CloseReason::StopRequested,
                Some(Ok(connected)) => connected,
                Some(Err(e)) => {
                    warn!(target: "Client", "[{bot_id}] Failed to connect: {e:#}. Reconnect in {backoff:?}");
                    self.set_state(ConnectionState::Reconnecting);
                    if !self.wait_backoff().await {
                        return CloseReason::StopRequested;
                    }
                    continue;
                }
            };

            self.set_state(ConnectionState::LoggingIn);
            let login = handshake::do_login(&session, &info, token, self.config.login_timeout);
            let reply = match self.until_stopped(login).await {
                None => {
                    session.close().await;
                    return CloseReason::StopRequested;
                }
                Some(Ok(reply)) => reply,
                Some(Err(handshake::LoginError::KickedOff { code, reason })) => {
                    warn!(
                        target: "Client/Login",
                        "[{bot_id}] Kicked off during login. Code: {code}, Reason: {reason}"
                    );
                    session.close().await;
                    let reason = CloseReason::KickedOff { code, reason };
                    self.hooks.on_disconnected(&Disconnected {
                        reason: reason.clone().into(),
                        will_reconnect: false,
                    });
                    return reason;
                }
                Some(Err(e)) => {
                    warn!(target: "Client/Login", "[{bot_id}] Login failed: {e}. Reconnect in {backoff:?}");
                    session.close().await;
                    self.set_state(ConnectionState::Reconnecting);
                    if !self.wait_backoff().await {
                        return CloseReason::StopRequested;
                    }
                    continue;
                }
            };

            info!(
                target: "Client",
                "[{bot_id}] Logged in as uid {} on device {} (connection {})",
                info.uid, info.device_id, reply.conn_id
            );
            self.set_state(ConnectionState::Active);
            self.hooks.on_connected(&Connected {
                connection_id: reply.conn_id,
                server_timestamp: reply.server_timestamp,
                uid: info.uid,
                device_id: info.device_id.clone(),
            });

            let heartbeat = tokio::spawn(self.clone().keepalive_loop(session.clone()));
            let end = self.receive_loop(&session, dispatch).await;
            heartbeat.abort();

            match end {
                SessionEnd::Reconnect(reason) => {
                    session.close().await;
                    self.set_state(ConnectionState::Reconnecting);
                    warn!(target: "Client", "[{bot_id}] Disconnected ({reason:?}). Reconnect in {backoff:?}");
                    self.hooks.on_disconnected(&Disconnected {
                        reason,
                        will_reconnect: true,
                    });
                    if !self.wait_backoff().await {
                        return CloseReason::StopRequested;
                    }
                }
                SessionEnd::Close(reason) => {
                    session.close().await;
                    self.hooks.on_disconnected(&Disconnected {
                        reason: reason.clone().into(),
                        will_reconnect: false,
                    });
                    return reason;
                }
                SessionEnd::Stop => {
                    self.set_state(ConnectionState::LoggingOut);
                    self.logout(&session, &info, dispatch).await;
                    session.close().await;
                    self.hooks.on_disconnected(&Disconnected {
                        reason: DisconnectReason::StopRequested,
                        will_reconnect: false,
                    });
                    return CloseReason::StopRequested;
                }
            }
        }
    }

    /// Fetches fresh credentials and dials the gateway.
    async fn connect(&self) -> Result<(Arc<Session>, ConnectionInfo, String), anyhow::Error> {
        let info = self
            .credentials
            .connection_info()
            .await
            .context("fetching connection info")?;
        let token = self
            .credentials
            .login_token()
            .await
            .context("fetching login token")?;
        let (transport, events) = self
            .transport_factory
            .create_transport(&info.endpoint_url)
            .await
            .with_context(|| format!("dialing {}", info.endpoint_url))?;
        info!(target: "Client", "[{}] Connected to {}", self.config.bot_id, info.endpoint_url);

        let session = Session::new(transport, events, self.registry.clone(), info.app_id);
        Ok((Arc::new(session), info, token))
    }

    async fn receive_loop(&self, session: &Session, dispatch: &mut DispatchGroup) -> SessionEnd {
        loop {
            let received = tokio::select! {
                biased;
                _ = self.stopped() => return SessionEnd::Stop,
                received = session.receive() => received,
            };
            match step(&self.config.bot_id, received) {
                Step::Continue => {}
                Step::Dispatch(payload) => {
                    let Some(event) = self.decode_event(payload) else {
                        continue;
                    };
                    // A full dispatch group must not hold off a stop request.
                    if self.until_stopped(dispatch.reserve()).await.is_none() {
                        debug!(
                            target: "Client/Dispatch",
                            "[{}] Stop requested while waiting for a dispatch slot, dropping event",
                            self.config.bot_id
                        );
                        return SessionEnd::Stop;
                    }
                    self.dispatch_event(event, dispatch).await;
                }
                Step::Reconnect(reason) => return SessionEnd::Reconnect(reason),
                Step::Close(reason) => return SessionEnd::Close(reason),
            }
        }
    }

    fn decode_event(&self, payload: Bytes) -> Option<E> {
        self.decoder
            .decode_event(payload)
            .inspect_err(|e| {
                warn!(
                    target: "Client/Dispatch",
                    "[{}] Failed to decode event: {e:#}",
                    self.config.bot_id
                )
            })
            .ok()
    }

    async fn dispatch_event(&self, event: E, dispatch: &mut DispatchGroup) {
        let sink = self.sink.clone();
        dispatch.spawn(async move { sink.dispatch(event).await }).await;
    }

    /// Sends `Logout` and waits up to the logout grace period for the reply.
    /// Events that arrive meanwhile are still dispatched.
    async fn logout(&self, session: &Session, info: &ConnectionInfo, dispatch: &mut DispatchGroup) {
        let bot_id = self.config.bot_id.as_str();
        let logout = Package::Logout(Logout {
            uid: info.uid,
            platform: info.platform,
            app_id: info.app_id,
            device_id: info.device_id.clone(),
        });
        if let Err(e) = session.send(&logout).await {
            warn!(target: "Client", "[{bot_id}] Failed to send logout: {e}");
            return;
        }

        let grace = self.config.logout_grace;
        let replied = tokio::time::timeout(grace, async {
            loop {
                match step(bot_id, session.receive().await) {
                    Step::Close(_) | Step::Reconnect(_) => return,
                    Step::Dispatch(payload) => {
                        if let Some(event) = self.decode_event(payload) {
                            self.dispatch_event(event, dispatch).await;
                        }
                    }
                    Step::Continue => {}
                }
            }
        })
        .await;
        if replied.is_err() {
            warn!(target: "Client", "[{bot_id}] No logout reply within {grace:?}, closing anyway.");
        }
    }
}
