//! Connection supervisor.
//!
//! Owns the reconnect loop and the [`ConnectionState`] machine:
//!
//! ```text
//! Disconnected → Connecting → Connected ─(close/error)→ Connecting ...
//!                                  └─(shutdown)→ Closing → Disconnected
//! ```
//!
//! At most one connection is live at a time; the previous socket is closed
//! before the next dial. Failed dials and sessions that drop before
//! [`ReconnectPolicy::stable_after_ms`] are consecutive failures and back off
//! per [`ReconnectPolicy`]. Only a session that stayed up that long resets
//! the failure count and is redialed immediately.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use anilibria_settings::GatewaySettings;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::backoff::ReconnectPolicy;
use crate::errors::{GatewayError, Result};
use crate::events::{GatewayEvent, Startup, names};
use crate::pipeline::Pipeline;
use crate::state::{ConnectionState, StateCell};
use crate::transport::{Connection, Transport};

/// How a session ended.
enum SessionEnd {
    /// Shutdown was requested.
    Cancelled,
    /// The socket closed or failed.
    Dropped {
        /// Time between open and drop.
        uptime: Duration,
        reason: String,
    },
}

/// Keeps the gateway connection alive and feeds frames into the [`Pipeline`].
pub struct GatewaySupervisor {
    url: String,
    connect_timeout: Duration,
    policy: ReconnectPolicy,
    transport: Arc<dyn Transport>,
    pipeline: Arc<Pipeline>,
    state: StateCell,
    attempts: AtomicU64,
    running: AtomicBool,
    started: AtomicBool,
    cancel: CancellationToken,
    /// Outbound queue of the live session.
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
    /// Serialized subscription frames, replayed on every connect.
    subscriptions: Mutex<Vec<String>>,
}

impl GatewaySupervisor {
    /// Supervisor for `url` with the default policy and a 10 s connect timeout.
    pub fn new(url: impl Into<String>, transport: Arc<dyn Transport>, pipeline: Arc<Pipeline>) -> Self {
        Self {
            url: url.into(),
            connect_timeout: Duration::from_secs(10),
            policy: ReconnectPolicy::default(),
            transport,
            pipeline,
            state: StateCell::new(),
            attempts: AtomicU64::new(0),
            running: AtomicBool::new(false),
            started: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            outbound: Mutex::new(None),
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    /// Supervisor configured from settings.
    pub fn from_settings(
        settings: &GatewaySettings,
        transport: Arc<dyn Transport>,
        pipeline: Arc<Pipeline>,
    ) -> Self {
        Self::new(settings.url.clone(), transport, pipeline)
            .with_connect_timeout(Duration::from_millis(settings.connect_timeout_ms))
            .with_policy(ReconnectPolicy::from(&settings.reconnect))
    }

    /// Replace the reconnect policy.
    #[must_use]
    pub fn with_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replace the per-attempt connect timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }

    /// Receiver notified on every state transition.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Connection attempts made so far.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Whether [`start`](Self::start) is currently running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// API version from the most recent handshake.
    pub fn api_version(&self) -> Option<String> {
        self.pipeline.api_version()
    }

    /// The pipeline frames are fed into.
    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    /// Connect and keep reconnecting until [`shutdown`](Self::shutdown).
    ///
    /// Returns `Ok(())` after a shutdown, or
    /// [`GatewayError::RetriesExhausted`] once the policy gives up.
    #[instrument(skip(self), fields(url = %self.url))]
    pub async fn start(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(GatewayError::ShuttingDown);
        }
        if self.running.swap(true, Ordering::AcqRel) {
            return Err(GatewayError::AlreadyRunning);
        }
        let result = self.run().await;
        let _ = self.state.set(ConnectionState::Disconnected);
        self.running.store(false, Ordering::Release);
        info!(ok = result.is_ok(), "gateway stopped");
        result
    }

    async fn run(&self) -> Result<()> {
        let mut failures: u32 = 0;
        loop {
            if self.cancel.is_cancelled() {
                return Ok(());
            }
            let _ = self.state.set(ConnectionState::Connecting);
            let attempt = self.attempts.fetch_add(1, Ordering::Relaxed) + 1;
            debug!(attempt, "connecting");

            let dial = tokio::time::timeout(self.connect_timeout, self.transport.connect(&self.url));
            let dialed = tokio::select! {
                () = self.cancel.cancelled() => return Ok(()),
                dialed = dial => dialed,
            };

            let last_error = match dialed {
                Ok(Ok(conn)) => match self.run_session(conn).await {
                    SessionEnd::Cancelled => return Ok(()),
                    SessionEnd::Dropped { uptime, reason } if self.policy.is_stable(uptime) => {
                        info!(reason = %reason, uptime_ms = uptime.as_millis(), "connection lost, reconnecting");
                        failures = 0;
                        continue;
                    }
                    SessionEnd::Dropped { uptime, reason } => {
                        format!("{reason} after {}ms", uptime.as_millis())
                    }
                },
                Ok(Err(e)) => e.to_string(),
                Err(_) => format!(
                    "connect timed out after {}ms",
                    self.connect_timeout.as_millis()
                ),
            };

            failures = failures.saturating_add(1);
            if self.policy.exhausted(failures) {
                error!(failures, error = %last_error, "giving up on gateway");
                return Err(GatewayError::RetriesExhausted {
                    attempts: failures,
                    last_error,
                });
            }

            let delay = self.policy.delay(failures);
            warn!(
                failures,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %last_error,
                "connection attempt failed, backing off"
            );
            tokio::select! {
                () = self.cancel.cancelled() => return Ok(()),
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn run_session(&self, mut conn: Box<dyn Connection>) -> SessionEnd {
        let opened = tokio::time::Instant::now();
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let replay = {
            let subscriptions = self.subscriptions.lock();
            *self.outbound.lock() = Some(tx);
            let _ = self.state.set(ConnectionState::Connected);
            subscriptions.clone()
        };
        info!("gateway connected");

        if !self.started.swap(true, Ordering::AcqRel) {
            let _ = self.pipeline.registry().dispatch(
                names::STARTUP,
                Arc::new(GatewayEvent::Startup(Startup)),
                &Value::Null,
            );
        }

        let mut reason = None;
        for frame in replay {
            if let Err(e) = conn.send(frame).await {
                reason = Some(e.to_string());
                break;
            }
        }
        if reason.is_none() {
            debug!("subscriptions replayed");
        }

        while reason.is_none() {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    let _ = self.state.set(ConnectionState::Closing);
                    *self.outbound.lock() = None;
                    if let Err(e) = conn.close().await {
                        debug!(error = %e, "close during shutdown failed");
                    }
                    return SessionEnd::Cancelled;
                }
                Some(text) = rx.recv() => {
                    if let Err(e) = conn.send(text).await {
                        reason = Some(e.to_string());
                    }
                }
                frame = conn.receive() => match frame {
                    Some(Ok(text)) => self.pipeline.process(&text),
                    Some(Err(e)) => reason = Some(e.to_string()),
                    None => reason = Some("closed by peer".to_string()),
                },
            }
        }

        *self.outbound.lock() = None;
        if let Err(e) = conn.close().await {
            debug!(error = %e, "close after drop failed");
        }
        SessionEnd::Dropped {
            uptime: opened.elapsed(),
            reason: reason.unwrap_or_default(),
        }
    }

    /// Send a JSON frame on the live connection.
    ///
    /// Fails with [`GatewayError::NotConnected`] unless the state is
    /// [`ConnectionState::Connected`].
    pub fn send(&self, payload: &Value) -> Result<()> {
        if self.state.get() != ConnectionState::Connected {
            return Err(GatewayError::NotConnected);
        }
        let text = serde_json::to_string(payload)?;
        let outbound = self.outbound.lock();
        let tx = outbound.as_ref().ok_or(GatewayError::NotConnected)?;
        tx.send(text).map_err(|_| GatewayError::NotConnected)
    }

    /// Subscribe to server-side events matching `pattern`.
    ///
    /// The request is sent now if connected and again after every reconnect.
    /// `filter` and `remove` are comma-separated field lists.
    pub fn subscribe(
        &self,
        pattern: Value,
        filter: Option<&str>,
        remove: Option<&str>,
    ) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(GatewayError::ShuttingDown);
        }
        let text = serde_json::to_string(&subscription_frame(pattern, filter, remove))?;
        let mut subscriptions = self.subscriptions.lock();
        if let Some(tx) = self.outbound.lock().as_ref() {
            let _ = tx.send(text.clone());
        }
        subscriptions.push(text);
        Ok(())
    }

    /// Number of remembered subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.lock().len()
    }

    /// Stop reconnecting, close the live socket and stop dispatching.
    ///
    /// Handlers already running are left to finish.
    pub fn shutdown(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        info!("gateway shutdown requested");
        self.pipeline.registry().close();
        if self.is_running() {
            let _ = self.state.set(ConnectionState::Closing);
        }
        self.cancel.cancel();
    }

    /// Token cancelled by [`shutdown`](Self::shutdown).
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl std::fmt::Debug for GatewaySupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewaySupervisor")
            .field("url", &self.url)
            .field("state", &self.state())
            .field("attempts", &self.attempts())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// `{"subscribe": pattern, "filter"?: .., "remove"?: ..}`
fn subscription_frame(pattern: Value, filter: Option<&str>, remove: Option<&str>) -> Value {
    let mut frame = Map::new();
    let _ = frame.insert("subscribe".into(), pattern);
    if let Some(filter) = filter {
        let _ = frame.insert("filter".into(), Value::String(filter.to_string()));
    }
    if let Some(remove) = remove {
        let _ = frame.insert("remove".into(), Value::String(remove.to_string()));
    }
    Value::Object(frame)
}
