//! The client facade.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anilibria_core::Title;
use anilibria_gateway::{
    Classifier, ConnectionState, EpisodeDeriver, EventRegistry, Filter, GatewayEvent,
    GatewaySupervisor, Handler, Pipeline, Transport, TungsteniteTransport, TypedEvent,
    GatewayError, handler_fn,
};
use anilibria_http::{HttpClient, TitleQuery};
use anilibria_settings::{ClientSettings, load_settings};
use serde_json::Value;
use tokio::sync::watch;
use tracing::info;

use crate::errors::{ClientError, Result};

/// AniLibria API client: REST lookups plus the realtime gateway.
///
/// Handlers are registered up front, then [`start`](Self::start) runs the
/// gateway until [`shutdown`](Self::shutdown) or until reconnecting gives up.
///
/// ```no_run
/// # async fn run() -> anilibria::Result<()> {
/// use anilibria::{AniLibriaClient, TitleEpisode};
///
/// let client = AniLibriaClient::from_env()?;
/// client.on(|new: TitleEpisode| async move {
///     println!("{} episode {:?}", new.title.id, new.episode.number_key());
///     Ok(())
/// });
/// client.start().await
/// # }
/// ```
pub struct AniLibriaClient {
    settings: ClientSettings,
    http: HttpClient,
    registry: Arc<EventRegistry>,
    gateway: Arc<GatewaySupervisor>,
}

impl AniLibriaClient {
    /// Client from explicit settings over the default WebSocket transport.
    pub fn new(settings: ClientSettings) -> Result<Self> {
        Self::with_transport(settings, Arc::new(TungsteniteTransport))
    }

    /// Client from `~/.anilibria/settings.json` and `ANILIBRIA_*` overrides.
    pub fn from_env() -> Result<Self> {
        Self::new(load_settings()?)
    }

    /// Client over a custom gateway transport.
    pub fn with_transport(settings: ClientSettings, transport: Arc<dyn Transport>) -> Result<Self> {
        settings.validate()?;
        let http = HttpClient::from_settings(&settings.http)?;
        let registry = Arc::new(EventRegistry::new());
        let deriver = EpisodeDeriver::new(Arc::new(http.clone()));
        let pipeline = Arc::new(Pipeline::new(
            Arc::clone(&registry),
            Classifier::default(),
            Some(deriver),
        ));
        let gateway = Arc::new(GatewaySupervisor::from_settings(
            &settings.gateway,
            transport,
            pipeline,
        ));
        Ok(Self {
            settings,
            http,
            registry,
            gateway,
        })
    }

    /// Effective settings.
    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    /// REST client.
    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    /// Handler registry shared with the gateway.
    pub fn registry(&self) -> &Arc<EventRegistry> {
        &self.registry
    }

    /// Gateway supervisor.
    pub fn gateway(&self) -> &Arc<GatewaySupervisor> {
        &self.gateway
    }

    // ── Handlers ──

    /// Register `handler` under an event name such as `"on_title_update"`.
    pub fn register(&self, name: impl Into<String>, handler: Arc<dyn Handler>, filter: Option<Filter>) {
        self.registry.register(name, handler, filter);
    }

    /// Register a closure receiving the raw [`GatewayEvent`] for `name`.
    ///
    /// Useful for tags without a typed record.
    pub fn on_event<F, Fut>(&self, name: impl Into<String>, callback: F)
    where
        F: Fn(Arc<GatewayEvent>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.registry.register(name, handler_fn(callback), None);
    }

    /// Register a closure for the typed event `E`.
    pub fn on<E, F, Fut>(&self, callback: F)
    where
        E: TypedEvent + Clone,
        F: Fn(E) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.registry.register_typed::<E, F, Fut>(callback, None);
    }

    /// Register a closure for `E` that only fires when `filter` matches.
    pub fn on_filtered<E, F, Fut>(&self, filter: Filter, callback: F)
    where
        E: TypedEvent + Clone,
        F: Fn(E) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.registry.register_typed::<E, F, Fut>(callback, Some(filter));
    }

    /// Like [`on_filtered`](Self::on_filtered), with the filter given as JSON.
    pub fn on_matching<E, F, Fut>(&self, pattern: &Value, callback: F) -> Result<()>
    where
        E: TypedEvent + Clone,
        F: Fn(E) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let filter = Filter::from_json(pattern)?;
        self.on_filtered::<E, F, Fut>(filter, callback);
        Ok(())
    }

    // ── Gateway ──

    /// Subscribe to server-side events; re-sent after every reconnect.
    pub fn subscribe(&self, pattern: Value, filter: Option<&str>, remove: Option<&str>) -> Result<()> {
        Ok(self.gateway.subscribe(pattern, filter, remove)?)
    }

    /// Send a raw JSON frame on the live connection.
    pub fn send(&self, payload: &Value) -> Result<()> {
        Ok(self.gateway.send(payload)?)
    }

    /// Run the gateway until shutdown or until reconnecting gives up.
    pub async fn start(&self) -> Result<()> {
        info!(url = %self.settings.gateway.url, "starting gateway");
        Ok(self.gateway.start().await?)
    }

    /// Run the gateway alongside `task`, shutting it down once `task` ends.
    ///
    /// If the gateway fails first its error is returned and `task` is dropped.
    /// A task that finishes before the gateway got going still yields its
    /// output.
    pub async fn start_with<F>(&self, task: F) -> Result<F::Output>
    where
        F: Future,
    {
        let gateway = self.start();
        tokio::pin!(gateway, task);
        tokio::select! {
            biased;
            result = &mut gateway => {
                result?;
                Ok(task.await)
            }
            output = &mut task => {
                self.gateway.shutdown();
                match gateway.await {
                    Ok(()) | Err(ClientError::Gateway(GatewayError::ShuttingDown)) => Ok(output),
                    Err(e) => Err(e),
                }
            }
        }
    }

    /// Stop the gateway and wait up to `grace` for running handlers.
    ///
    /// Returns `false` if handlers were still running at the deadline.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.gateway.shutdown();
        self.registry.drain(grace).await
    }

    /// Current gateway connection state.
    pub fn state(&self) -> ConnectionState {
        self.gateway.state()
    }

    /// Receiver notified on every connection state change.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.gateway.watch_state()
    }

    /// API version reported by the last handshake.
    pub fn api_version(&self) -> Option<String> {
        self.gateway.api_version()
    }

    // ── REST ──

    /// Fetch a single title.
    pub async fn get_title(&self, query: &TitleQuery) -> Result<Title> {
        Ok(self.http.get_title(query).await?)
    }
}

impl std::fmt::Debug for AniLibriaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AniLibriaClient")
            .field("gateway", &self.gateway)
            .field("http", &self.http.base_url())
            .field("handlers", &self.registry.count())
            .finish_non_exhaustive()
    }
}
