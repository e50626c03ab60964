use crate::client::Client;
use crate::socket::Session;
use log::{debug, trace, warn};
use std::sync::Arc;
use tokio::time::MissedTickBehavior;
use villacore::package::{HeartBeat, Package};

impl<E: Send + 'static> Client<E> {
    fn heartbeat_package() -> Package {
        Package::HeartBeat(HeartBeat {
            client_timestamp: chrono::Utc::now().timestamp_millis().to_string(),
        })
    }

    /// Sends a heartbeat right away and then once per interval until the
    /// session closes or a stop is requested. A failed send is logged and the
    /// next tick tries again; detecting a dead socket is the receive loop's job.
    pub(crate) async fn keepalive_loop(self: Arc<Self>, session: Arc<Session>) {
        let mut ticker = tokio::time::interval(self.config().heartbeat_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if session.is_closed() {
                        debug!(target: "Client/Keepalive", "Session closed, exiting keepalive loop.");
                        return;
                    }
                    match session.send(&Self::heartbeat_package()).await {
                        Ok(id) => trace!(target: "Client/Keepalive", "Heartbeat {id} sent"),
                        Err(e) => warn!(
                            target: "Client/Keepalive",
                            "[{}] Heartbeat failed: {e}",
                            self.config().bot_id
                        ),
                    }
                },
                _ = self.stopped() => {
                    debug!(target: "Client/Keepalive", "Stop requested, exiting keepalive loop.");
                    return;
                }
            }
        }
    }
}
