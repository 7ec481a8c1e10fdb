//! Event dispatch registry.
//!
//! Maps handler names to ordered lists of [`Handler`]s with optional
//! [`Filter`]s. [`EventRegistry::dispatch`] spawns every matching handler as
//! its own task and returns immediately. Handler errors and panics are logged
//! and never reach the caller or sibling handlers.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use crate::events::{GatewayEvent, TypedEvent};
use crate::filter::Filter;

/// Callback invoked for dispatched events.
///
/// Implemented for any `Fn(Arc<GatewayEvent>) -> impl Future<Output = anyhow::Result<()>>`.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Handle one event.
    async fn handle(&self, event: Arc<GatewayEvent>) -> anyhow::Result<()>;
}

#[async_trait]
impl<F, Fut> Handler for F
where
    F: Fn(Arc<GatewayEvent>) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn handle(&self, event: Arc<GatewayEvent>) -> anyhow::Result<()> {
        (self)(event).await
    }
}

/// Box a closure as a [`Handler`].
pub fn handler_fn<F, Fut>(callback: F) -> Arc<dyn Handler>
where
    F: Fn(Arc<GatewayEvent>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(callback)
}

/// Adapts a callback taking a typed record `E` into a [`Handler`].
pub struct TypedHandler<E, F> {
    callback: F,
    _event: PhantomData<fn(E)>,
}

impl<E, F> TypedHandler<E, F> {
    /// Wrap `callback`.
    pub fn new(callback: F) -> Self {
        Self {
            callback,
            _event: PhantomData,
        }
    }
}

#[async_trait]
impl<E, F, Fut> Handler for TypedHandler<E, F>
where
    E: TypedEvent + Clone,
    F: Fn(E) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn handle(&self, event: Arc<GatewayEvent>) -> anyhow::Result<()> {
        match E::extract(&event) {
            Some(record) => (self.callback)(record.clone()).await,
            None => Err(anyhow::anyhow!(
                "{} handler received {}",
                E::NAME,
                event.name()
            )),
        }
    }
}

struct Registration {
    handler: Arc<dyn Handler>,
    filter: Option<Filter>,
}

/// Handler registrations plus the tasks running them.
pub struct EventRegistry {
    handlers: RwLock<HashMap<String, Vec<Registration>>>,
    tasks: Mutex<JoinSet<()>>,
    /// Approximate count of running tasks (atomic for lock-free reads).
    pending: Arc<AtomicUsize>,
    accepting: AtomicBool,
}

impl EventRegistry {
    /// Create an empty, open registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            tasks: Mutex::new(JoinSet::new()),
            pending: Arc::new(AtomicUsize::new(0)),
            accepting: AtomicBool::new(true),
        }
    }

    /// Append `handler` to the list for `name`.
    ///
    /// Duplicates are allowed; each registration runs independently.
    pub fn register(&self, name: impl Into<String>, handler: Arc<dyn Handler>, filter: Option<Filter>) {
        let name = name.into();
        debug!(event = %name, filtered = filter.is_some(), "registering handler");
        self.handlers
            .write()
            .entry(name)
            .or_default()
            .push(Registration { handler, filter });
    }

    /// Register a callback for the typed event `E` under [`TypedEvent::NAME`].
    pub fn register_typed<E, F, Fut>(&self, callback: F, filter: Option<Filter>)
    where
        E: TypedEvent + Clone,
        F: Fn(E) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.register(E::NAME, Arc::new(TypedHandler::<E, F>::new(callback)), filter);
    }

    /// Whether anything is registered under `name`.
    #[must_use]
    pub fn has_handlers(&self, name: &str) -> bool {
        self.handlers.read().get(name).is_some_and(|list| !list.is_empty())
    }

    /// Total number of registrations.
    #[must_use]
    pub fn count(&self) -> usize {
        self.handlers.read().values().map(Vec::len).sum()
    }

    /// Schedule every handler under `name` whose filter matches `subject`.
    ///
    /// Returns the number of handlers scheduled. Returns 0 without
    /// scheduling anything once the registry is closed.
    pub fn dispatch(&self, name: &str, event: Arc<GatewayEvent>, subject: &Value) -> usize {
        if !self.accepting.load(Ordering::Acquire) {
            debug!(event = %name, "registry closed, dropping dispatch");
            return 0;
        }

        let matching: Vec<Arc<dyn Handler>> = {
            let handlers = self.handlers.read();
            let Some(list) = handlers.get(name) else {
                return 0;
            };
            list.iter()
                .filter(|reg| reg.filter.as_ref().is_none_or(|f| f.matches(subject)))
                .map(|reg| Arc::clone(&reg.handler))
                .collect()
        };

        debug!(event = %name, handlers = matching.len(), "dispatching");
        for handler in &matching {
            let name = name.to_string();
            let handler = Arc::clone(handler);
            let event = Arc::clone(&event);
            self.track("handler", async move {
                run_handler(&name, handler.as_ref(), event).await;
            });
        }
        matching.len()
    }

    /// Run `future` as a tracked background task.
    ///
    /// Returns `false` (and drops the future) once the registry is closed.
    pub fn spawn<F>(&self, future: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if !self.accepting.load(Ordering::Acquire) {
            return false;
        }
        self.track("background", future);
        true
    }

    /// Spawn `future` into the set. `pending` is released even if it panics.
    fn track<F>(&self, label: &'static str, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let pending = Arc::clone(&self.pending);
        let _ = pending.fetch_add(1, Ordering::Relaxed);

        let mut tasks = self.tasks.lock();
        // Reap finished tasks so the set does not grow with every dispatch.
        while let Some(result) = tasks.try_join_next() {
            if let Err(e) = result {
                warn!(error = %e, "dispatch task failed");
            }
        }
        let _ = tasks.spawn(async move {
            if let Err(panic) = AssertUnwindSafe(future).catch_unwind().await {
                error!(task = label, panic = %panic_message(&*panic), "task panicked");
            }
            let _ = pending.fetch_sub(1, Ordering::Relaxed);
        });
    }

    /// Stop accepting dispatches. Already-running handlers continue.
    pub fn close(&self) {
        if self.accepting.swap(false, Ordering::AcqRel) {
            debug!(pending = self.pending_count(), "registry closed");
        }
    }

    /// Whether [`close`](Self::close) was called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        !self.accepting.load(Ordering::Acquire)
    }

    /// Approximate number of handler tasks still running.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.load(Ordering::Relaxed)
    }

    /// Wait for running handler tasks, up to `timeout`.
    ///
    /// Returns `true` if everything finished. Tasks still running at the
    /// deadline are detached, not aborted.
    pub async fn drain(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let mut batch = std::mem::take(&mut *self.tasks.lock());
            if batch.is_empty() {
                return true;
            }
            let joined = tokio::time::timeout_at(deadline, async {
                while let Some(result) = batch.join_next().await {
                    if let Err(e) = result {
                        warn!(error = %e, "dispatch task failed");
                    }
                }
            })
            .await;
            if joined.is_err() {
                batch.detach_all();
                return false;
            }
        }
    }
}

impl Default for EventRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for EventRegistry {
    fn drop(&mut self) {
        // Handlers outlive the registry; dropping the set would abort them.
        self.tasks.get_mut().detach_all();
    }
}

impl std::fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRegistry")
            .field("handler_count", &self.count())
            .field("pending_count", &self.pending_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}

async fn run_handler(name: &str, handler: &dyn Handler, event: Arc<GatewayEvent>) {
    match AssertUnwindSafe(handler.handle(event)).catch_unwind().await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(event = %name, error = %e, "handler failed"),
        Err(panic) => {
            error!(event = %name, panic = %panic_message(&*panic), "handler panicked");
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic".to_string())
}
