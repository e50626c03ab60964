use crate::bot::Bot;
use crate::client::Client;
use anyhow::anyhow;
use bytes::Bytes;
use log::{error, info, warn};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::task::JoinSet;
use villacore::types::events::CloseReason;

type LifespanHook = Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send>;

/// How one bot's run ended.
#[derive(Debug)]
pub struct BotExit {
    pub bot_id: String,
    pub result: anyhow::Result<CloseReason>,
}

/// Runs several bots in one process. Startup hooks run before any bot
/// connects and shutdown hooks after the last one has closed. A shutdown
/// signal asks every bot to log out; once no bot is left running the runner
/// returns on its own.
pub struct Runner<E = Bytes> {
    bots: Vec<Bot<E>>,
    on_startup: Vec<LifespanHook>,
    on_shutdown: Vec<LifespanHook>,
}

impl<E: Send + 'static> Default for Runner<E> {
    fn default() -> Self {
        Self {
            bots: Vec::new(),
            on_startup: Vec::new(),
            on_shutdown: Vec::new(),
        }
    }
}

impl<E: Send + 'static> Runner<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bot(mut self, bot: Bot<E>) -> Self {
        self.bots.push(bot);
        self
    }

    /// Hooks run in registration order.
    pub fn on_startup<F, Fut>(mut self, hook: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_startup.push(Box::new(move || Box::pin(hook())));
        self
    }

    pub fn on_shutdown<F, Fut>(mut self, hook: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_shutdown.push(Box::new(move || Box::pin(hook())));
        self
    }

    /// Runs until every bot has closed, stopping them all on SIGINT or SIGTERM.
    pub async fn run(self) -> Vec<BotExit> {
        self.run_until(shutdown_signal()).await
    }

    /// Like [`Runner::run`], with `shutdown` in place of the process signals.
    /// Exits are reported in the order the bots were added.
    pub async fn run_until<S>(self, shutdown: S) -> Vec<BotExit>
    where
        S: Future<Output = ()>,
    {
        let Self {
            bots,
            on_startup,
            on_shutdown,
        } = self;

        for hook in on_startup {
            hook().await;
        }

        let clients: Vec<Arc<Client<E>>> = bots.iter().map(Bot::client).collect();
        let mut running = JoinSet::new();
        let mut task_index = HashMap::new();
        for (index, client) in clients.iter().enumerate() {
            let client = client.clone();
            let handle = running.spawn(async move { client.run().await });
            task_index.insert(handle.id(), index);
        }
        info!(target: "Runner", "Started {} bots", clients.len());

        let mut results: Vec<Option<anyhow::Result<CloseReason>>> =
            clients.iter().map(|_| None).collect();
        let mut shutdown_requested = false;
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown, if !shutdown_requested => {
                    info!(target: "Runner", "Shutdown requested, stopping {} bots", running.len());
                    shutdown_requested = true;
                    for client in &clients {
                        client.request_stop();
                    }
                }
                joined = running.join_next_with_id() => {
                    let (id, result) = match joined {
                        Some(Ok((id, result))) => (id, result.map_err(anyhow::Error::from)),
                        Some(Err(e)) => {
                            error!(target: "Runner", "Bot task failed: {e}");
                            (e.id(), Err(anyhow!("bot task failed: {e}")))
                        }
                        None => break,
                    };
                    let Some(&index) = task_index.get(&id) else {
                        continue;
                    };
                    match &result {
                        Ok(reason) => info!(
                            target: "Runner",
                            "[{}] Bot closed: {reason:?}",
                            clients[index].config().bot_id
                        ),
                        Err(e) => warn!(
                            target: "Runner",
                            "[{}] Bot did not run: {e:#}",
                            clients[index].config().bot_id
                        ),
                    }
                    results[index] = Some(result);
                }
            }
        }
        if !shutdown_requested {
            info!(target: "Runner", "No bot connections left, shutting down.");
        }

        for hook in on_shutdown {
            hook().await;
        }

        clients
            .iter()
            .zip(results)
            .map(|(client, result)| BotExit {
                bot_id: client.config().bot_id.clone(),
                result: result.unwrap_or_else(|| Err(anyhow!("bot task did not report back"))),
            })
            .collect()
    }
}

/// Resolves on Ctrl-C, or on SIGTERM where the platform has it.
pub async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(target: "Runner", "Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(target: "Runner", "Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => info!(target: "Runner", "Received SIGINT"),
        _ = terminate => info!(target: "Runner", "Received SIGTERM"),
    }
}
