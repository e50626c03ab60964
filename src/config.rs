use std::time::Duration;

#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Identity used in log lines.
    pub bot_id: String,
    /// Fixed wait between connection attempts.
    pub reconnect_backoff: Duration,
    pub heartbeat_interval: Duration,
    /// How long to wait for the login reply before giving up on a socket.
    pub login_timeout: Duration,
    /// How long a graceful stop waits for the logout reply.
    pub logout_grace: Duration,
    /// How long shutdown waits for in-flight event dispatches.
    pub dispatch_drain_timeout: Duration,
    /// Upper bound on concurrently running event dispatches. Receiving
    /// pauses while the bound is reached; a stop request still gets through.
    pub max_in_flight_events: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            bot_id: String::new(),
            reconnect_backoff: Duration::from_secs(5),
            heartbeat_interval: Duration::from_secs(20),
            login_timeout: Duration::from_secs(30),
            logout_grace: Duration::from_secs(5),
            dispatch_drain_timeout: Duration::from_secs(5),
            max_in_flight_events: 256,
        }
    }
}

impl ClientConfig {
    pub fn for_bot(bot_id: impl Into<String>) -> Self {
        Self {
            bot_id: bot_id.into(),
            ..Self::default()
        }
    }
}
