//! Classify-and-dispatch pipeline for inbound frames.

use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::classifier::{Classified, Classifier};
use crate::deriver::EpisodeDeriver;
use crate::events::{GatewayEvent, PlaylistUpdate, names};
use crate::registry::EventRegistry;

/// Turns inbound frames into dispatched events.
///
/// Runs on the receive loop, so nothing here awaits. Enrichment for derived
/// events is spawned as a tracked background task on the registry.
#[derive(Debug)]
pub struct Pipeline {
    registry: Arc<EventRegistry>,
    classifier: Classifier,
    deriver: Option<EpisodeDeriver>,
    api_version: RwLock<Option<String>>,
}

impl Pipeline {
    /// Pipeline dispatching into `registry`. Without a deriver no
    /// `on_title_episode` events are produced.
    pub fn new(
        registry: Arc<EventRegistry>,
        classifier: Classifier,
        deriver: Option<EpisodeDeriver>,
    ) -> Self {
        Self {
            registry,
            classifier,
            deriver,
            api_version: RwLock::new(None),
        }
    }

    /// The registry events are dispatched into.
    pub fn registry(&self) -> &Arc<EventRegistry> {
        &self.registry
    }

    /// API version from the most recent handshake.
    pub fn api_version(&self) -> Option<String> {
        self.api_version.read().clone()
    }

    /// Process one inbound text frame. Malformed frames are logged and dropped.
    pub fn process(&self, text: &str) {
        match serde_json::from_str::<Value>(text) {
            Ok(payload) => self.process_value(&payload),
            Err(e) => warn!(error = %e, bytes = text.len(), "dropping non-JSON frame"),
        }
    }

    /// Process one inbound JSON object.
    pub fn process_value(&self, payload: &Value) {
        if !payload.is_object() {
            warn!(%payload, "dropping non-object frame");
            return;
        }

        if self.registry.has_handlers(names::RAW_PACKET) {
            let raw = Arc::new(GatewayEvent::RawPacket(payload.clone()));
            let _ = self.registry.dispatch(names::RAW_PACKET, raw, payload);
        }

        let (event, subject) = match self.classifier.classify(payload) {
            Ok(Classified::Event { event, subject }) => (event, subject),
            Ok(Classified::Unclassified) => {
                debug!(%payload, "unclassified message");
                return;
            }
            Err(e) => {
                warn!(error = %e, "dropping undecodable message");
                return;
            }
        };

        match &event {
            GatewayEvent::Connect(connect) => {
                info!(api_version = ?connect.api_version, "connected to API");
                self.api_version.write().clone_from(&connect.api_version);
            }
            GatewayEvent::Subscription(ack) => {
                debug!(subscribe = ack.subscribe, id = ?ack.subscription_id, "subscription acknowledged");
            }
            _ => {}
        }

        let name = event.name();
        let event = Arc::new(event);
        let _ = self.registry.dispatch(&name, Arc::clone(&event), &subject);

        if let GatewayEvent::PlaylistUpdate(update) = event.as_ref() {
            self.schedule_derive(update);
        }
    }

    fn schedule_derive(&self, update: &PlaylistUpdate) {
        let Some(deriver) = &self.deriver else {
            return;
        };
        if !self.registry.has_handlers(names::TITLE_EPISODE) {
            return;
        }

        let deriver = deriver.clone();
        let registry = Arc::clone(&self.registry);
        let update = update.clone();
        let _ = self.registry.spawn(async move {
            match deriver.derive(&update).await {
                Ok(Some(derived)) => {
                    debug!(id = derived.title.id, episode = %update.episode, "new episode");
                    let subject = serde_json::to_value(&derived).unwrap_or_default();
                    let event = Arc::new(GatewayEvent::TitleEpisode(derived));
                    let _ = registry.dispatch(names::TITLE_EPISODE, event, &subject);
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "failed to derive title episode"),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use anilibria_core::{FetchError, Title, TitleFetcher};
    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::mpsc;

    use crate::filter::Filter;
    use crate::registry::handler_fn;

    struct StaticFetcher;

    #[async_trait]
    impl TitleFetcher for StaticFetcher {
        async fn fetch_title(&self, id: i64) -> Result<Title, FetchError> {
            if id == 404 {
                return Err(FetchError::Api {
                    code: 404,
                    message: "Release not found".into(),
                });
            }
            Ok(Title {
                id,
                ..Title::default()
            })
        }
    }

    fn pipeline() -> Pipeline {
        Pipeline::new(
            Arc::new(EventRegistry::new()),
            Classifier::default(),
            Some(EpisodeDeriver::new(Arc::new(StaticFetcher))),
        )
    }

    /// Registers a handler under `name` that forwards the dispatched event.
    fn capture(p: &Pipeline, name: &str, filter: Option<Filter>) -> mpsc::UnboundedReceiver<Arc<GatewayEvent>> {
        let (tx, rx) = mpsc::unbounded_channel();
        p.registry().register(
            name,
            handler_fn(move |event| {
                let tx = tx.clone();
                async move {
                    let _ = tx.send(event);
                    Ok(())
                }
            }),
            filter,
        );
        rx
    }

    async fn settle(p: &Pipeline) {
        assert!(p.registry().drain(Duration::from_secs(1)).await);
    }

    fn playlist_frame(reupload: bool) -> String {
        json!({
            "playlist_update": {
                "id": 5,
                "updated_episode": {"episode": 3, "hls": {"fhd": "x", "hd": "y", "sd": "z"}},
                "diff": {},
                "reupload": reupload
            },
            "type": "playlist_update"
        })
        .to_string()
    }

    #[tokio::test]
    async fn handshake_sets_api_version() {
        let p = pipeline();
        let mut rx = capture(&p, names::CONNECT, None);
        p.process(r#"{"connection": "success", "api_version": "3.0.14"}"#);
        settle(&p).await;
        assert_eq!(p.api_version().as_deref(), Some("3.0.14"));
        assert!(matches!(rx.recv().await.as_deref(), Some(GatewayEvent::Connect(_))));
    }

    #[tokio::test]
    async fn raw_packet_precedes_classification() {
        let p = pipeline();
        let mut raw = capture(&p, names::RAW_PACKET, None);
        p.process(r#"{"hello": "world"}"#);
        settle(&p).await;
        let event = raw.recv().await.unwrap();
        assert_eq!(*event, GatewayEvent::RawPacket(json!({"hello": "world"})));
    }

    #[tokio::test]
    async fn garbage_is_dropped() {
        let p = pipeline();
        let mut raw = capture(&p, names::RAW_PACKET, None);
        p.process("not json");
        p.process("[1, 2]");
        settle(&p).await;
        assert!(raw.try_recv().is_err());
    }

    #[tokio::test]
    async fn new_episode_is_derived() {
        let p = pipeline();
        let mut updates = capture(&p, "on_playlist_update", None);
        let mut episodes = capture(&p, names::TITLE_EPISODE, None);

        p.process(&playlist_frame(false));
        settle(&p).await;

        assert!(matches!(updates.recv().await.as_deref(), Some(GatewayEvent::PlaylistUpdate(_))));
        let derived = episodes.recv().await.unwrap();
        let GatewayEvent::TitleEpisode(te) = derived.as_ref() else {
            panic!("expected TitleEpisode, got {derived:?}");
        };
        assert_eq!(te.title.id, 5);
    }

    #[tokio::test]
    async fn reupload_is_not_derived() {
        let p = pipeline();
        let mut updates = capture(&p, "on_playlist_update", None);
        let mut episodes = capture(&p, names::TITLE_EPISODE, None);

        p.process(&playlist_frame(true));
        settle(&p).await;

        assert!(updates.recv().await.is_some());
        assert!(episodes.try_recv().is_err());
    }

    #[tokio::test]
    async fn fetch_failure_only_loses_the_derived_event() {
        let p = pipeline();
        let mut episodes = capture(&p, names::TITLE_EPISODE, None);
        let mut updates = capture(&p, "on_playlist_update", None);

        let frame = playlist_frame(false).replace("\"id\":5", "\"id\":404");
        p.process(&frame);
        settle(&p).await;

        assert!(updates.recv().await.is_some());
        assert!(episodes.try_recv().is_err());
    }

    #[tokio::test]
    async fn title_episode_filters_see_title_fields() {
        let p = pipeline();
        let mut wanted = capture(
            &p,
            names::TITLE_EPISODE,
            Some(Filter::new().nested("title", Filter::new().equals("id", 5))),
        );
        let mut other = capture(
            &p,
            names::TITLE_EPISODE,
            Some(Filter::new().nested("title", Filter::new().equals("id", 6))),
        );

        p.process(&playlist_frame(false));
        settle(&p).await;

        assert!(wanted.recv().await.is_some());
        assert!(other.try_recv().is_err());
    }

    #[tokio::test]
    async fn unknown_tags_dispatch_raw_payload() {
        let p = pipeline();
        let mut rx = capture(&p, "on_video_update", None);
        p.process(r#"{"type": "video_update", "video_update": {"id": 1}}"#);
        settle(&p).await;
        let event = rx.recv().await.unwrap();
        assert!(matches!(event.as_ref(), GatewayEvent::Unknown { tag, .. } if tag == "video_update"));
    }
}
