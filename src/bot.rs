use crate::client::{Client, ClientError};
use crate::config::ClientConfig;
use crate::transport::{TokioWebSocketTransportFactory, TransportFactory};
use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use log::{debug, info};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use tokio::task;
use villacore::types::connection::CredentialProvider;
use villacore::types::events::{
    CloseReason, Connected, ConnectionHooks, Disconnected, EventDecoder, EventSink,
    RawEventDecoder,
};

type Callback<T, E> =
    Arc<dyn Fn(T, Arc<Client<E>>) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

struct BotEventSink<E> {
    client: Weak<Client<E>>,
    event_handler: Option<Callback<E, E>>,
}

#[async_trait]
impl<E: Send + 'static> EventSink<E> for BotEventSink<E> {
    async fn dispatch(&self, event: E) {
        let Some(handler) = &self.event_handler else {
            debug!(target: "Client/Dispatch", "No event handler registered, dropping event");
            return;
        };
        if let Some(client) = self.client.upgrade() {
            handler(event, client).await;
        }
    }
}

struct BotHooks<E> {
    client: Weak<Client<E>>,
    on_connected: Option<Callback<Connected, E>>,
    on_disconnected: Option<Callback<Disconnected, E>>,
}

impl<E> BotHooks<E> {
    fn spawn_callback<T: Send + 'static>(&self, callback: &Option<Callback<T, E>>, value: &T)
    where
        T: Clone,
        E: Send + 'static,
    {
        let (Some(callback), Some(client)) = (callback, self.client.upgrade()) else {
            return;
        };
        let callback = callback.clone();
        let value = value.clone();
        tokio::spawn(async move {
            callback(value, client).await;
        });
    }
}

impl<E: Send + 'static> ConnectionHooks for BotHooks<E> {
    fn on_connected(&self, connected: &Connected) {
        self.spawn_callback(&self.on_connected, connected);
    }

    fn on_disconnected(&self, disconnected: &Disconnected) {
        self.spawn_callback(&self.on_disconnected, disconnected);
    }
}

pub struct Bot<E = Bytes> {
    client: Arc<Client<E>>,
}

impl Bot {
    /// A builder whose events are the raw event payloads.
    pub fn builder() -> BotBuilder<Bytes> {
        BotBuilder::new(RawEventDecoder)
    }

    pub fn builder_with_decoder<D>(decoder: D) -> BotBuilder<D::Event>
    where
        D: EventDecoder + 'static,
    {
        BotBuilder::new(decoder)
    }
}

impl<E: Send + 'static> Bot<E> {
    pub fn client(&self) -> Arc<Client<E>> {
        self.client.clone()
    }

    /// Spawns the connection supervisor. The handle resolves once the bot has
    /// closed for good.
    pub fn run(&self) -> task::JoinHandle<Result<CloseReason, ClientError>> {
        let client = self.client.clone();
        tokio::spawn(async move { client.run().await })
    }

    /// Requests a graceful logout; the handle returned by `run` resolves
    /// once it is done.
    pub fn stop(&self) {
        self.client.request_stop();
    }
}

pub struct BotBuilder<E = Bytes> {
    config: ClientConfig,
    credentials: Option<Arc<dyn CredentialProvider>>,
    transport_factory: Option<Arc<dyn TransportFactory>>,
    decoder: Arc<dyn EventDecoder<Event = E>>,
    event_handler: Option<Callback<E, E>>,
    on_connected: Option<Callback<Connected, E>>,
    on_disconnected: Option<Callback<Disconnected, E>>,
}

impl<E: Send + 'static> BotBuilder<E> {
    fn new<D>(decoder: D) -> Self
    where
        D: EventDecoder<Event = E> + 'static,
    {
        Self {
            config: ClientConfig::default(),
            credentials: None,
            transport_factory: None,
            decoder: Arc::new(decoder),
            event_handler: None,
            on_connected: None,
            on_disconnected: None,
        }
    }

    pub fn with_config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_credentials<P>(mut self, credentials: P) -> Self
    where
        P: CredentialProvider + 'static,
    {
        self.credentials = Some(Arc::new(credentials));
        self
    }

    /// Replaces the default tokio-tungstenite transport.
    pub fn with_transport_factory(mut self, factory: Arc<dyn TransportFactory>) -> Self {
        self.transport_factory = Some(factory);
        self
    }

    /// Runs `handler` for every decoded event, each in its own task.
    pub fn on_event<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(E, Arc<Client<E>>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.event_handler = Some(Arc::new(move |event, client| {
            Box::pin(handler(event, client))
        }));
        self
    }

    pub fn on_connected<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(Connected, Arc<Client<E>>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_connected = Some(Arc::new(move |connected, client| {
            Box::pin(handler(connected, client))
        }));
        self
    }

    pub fn on_disconnected<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(Disconnected, Arc<Client<E>>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_disconnected = Some(Arc::new(move |disconnected, client| {
            Box::pin(handler(disconnected, client))
        }));
        self
    }

    pub fn build(self) -> Result<Bot<E>> {
        let credentials = self
            .credentials
            .ok_or_else(|| anyhow::anyhow!("Credentials are required to build a bot"))?;
        let transport_factory = self
            .transport_factory
            .unwrap_or_else(|| Arc::new(TokioWebSocketTransportFactory::new()));

        info!("Creating client for bot '{}'...", self.config.bot_id);
        let client = Arc::new_cyclic(|weak: &Weak<Client<E>>| {
            let sink = Arc::new(BotEventSink {
                client: weak.clone(),
                event_handler: self.event_handler,
            });
            let hooks = Arc::new(BotHooks {
                client: weak.clone(),
                on_connected: self.on_connected,
                on_disconnected: self.on_disconnected,
            });
            Client::new(
                self.config,
                credentials,
                transport_factory,
                self.decoder,
                sink,
                hooks,
            )
        });

        Ok(Bot { client })
    }
}
