//! Gateway tests against a local WebSocket server.

use std::sync::Arc;
use std::time::Duration;

use anilibria_gateway::{
    Classifier, ConnectionState, EventRegistry, Filter, GatewayError, GatewaySupervisor,
    Pipeline, PlaylistUpdate, ReconnectPolicy, TungsteniteTransport, names,
};
use assert_matches::assert_matches;
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

const TIMEOUT: Duration = Duration::from_secs(5);

fn fast_policy(max_retries: Option<u32>) -> ReconnectPolicy {
    ReconnectPolicy {
        max_retries,
        base_delay_ms: 10,
        max_delay_ms: 50,
        jitter_factor: 0.0,
        stable_after_ms: 5000,
    }
}

fn playlist_update(id: i64) -> Value {
    json!({
        "type": "playlist_update",
        "playlist_update": {
            "id": id,
            "updated_episode": {"episode": 1, "hls": {"fhd": "a", "hd": "b", "sd": "c"}},
            "episode": "1",
            "diff": {}
        }
    })
}

/// Serve every accepted socket: read the first client frame, send the
/// handshake plus `frames`, then close the first connection and keep later
/// ones open. Client frames are reported as `(connection index, text)`.
async fn spawn_server(frames: Vec<Value>) -> (String, mpsc::UnboundedReceiver<(usize, String)>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/", listener.local_addr().unwrap());
    let (tx, rx) = mpsc::unbounded_channel();

    let _server = tokio::spawn(async move {
        let mut index = 0usize;
        while let Ok((stream, _)) = listener.accept().await {
            let Ok(mut ws) = accept_async(stream).await else {
                continue;
            };
            let current = index;
            index += 1;
            if let Some(Ok(Message::Text(text))) = ws.next().await {
                let _ = tx.send((current, text.as_str().to_owned()));
            }
            let handshake = json!({"connection": "success", "api_version": "3.0.14"});
            let mut outgoing = vec![handshake];
            outgoing.extend(frames.iter().cloned());
            for frame in outgoing {
                if ws.send(Message::Text(frame.to_string().into())).await.is_err() {
                    break;
                }
            }
            if current == 0 {
                let _ = ws.close(None).await;
            } else {
                let tx = tx.clone();
                let _reader = tokio::spawn(async move {
                    while let Some(Ok(message)) = ws.next().await {
                        if let Message::Text(text) = message {
                            let _ = tx.send((current, text.as_str().to_owned()));
                        }
                    }
                });
            }
        }
    });

    (url, rx)
}

fn supervisor(url: &str, registry: Arc<EventRegistry>, max_retries: Option<u32>) -> Arc<GatewaySupervisor> {
    let pipeline = Arc::new(Pipeline::new(registry, Classifier::default(), None));
    Arc::new(
        GatewaySupervisor::new(url, Arc::new(TungsteniteTransport), pipeline)
            .with_policy(fast_policy(max_retries))
            .with_connect_timeout(Duration::from_secs(2)),
    )
}

#[tokio::test]
async fn reconnects_and_replays_subscriptions() {
    let (url, mut inbound) = spawn_server(vec![playlist_update(5)]).await;
    let registry = Arc::new(EventRegistry::new());

    let (updates_tx, mut updates) = mpsc::unbounded_channel();
    registry.register_typed::<PlaylistUpdate, _, _>(
        move |update| {
            let tx = updates_tx.clone();
            async move {
                let _ = tx.send(update);
                Ok(())
            }
        },
        Some(Filter::new().equals("id", 5)),
    );

    let sup = supervisor(&url, registry, None);
    sup.subscribe(json!({"id": 5}), None, None).unwrap();
    let runner = tokio::spawn({
        let sup = Arc::clone(&sup);
        async move { sup.start().await }
    });

    let expected = json!({"subscribe": {"id": 5}}).to_string();
    let first = timeout(TIMEOUT, inbound.recv()).await.unwrap().unwrap();
    assert_eq!(first, (0, expected.clone()));
    let second = timeout(TIMEOUT, inbound.recv()).await.unwrap().unwrap();
    assert_eq!(second, (1, expected));

    // one update per connection
    for _ in 0..2 {
        let update = timeout(TIMEOUT, updates.recv()).await.unwrap().unwrap();
        assert_eq!(update.id, Some(5));
    }
    assert_eq!(sup.api_version().as_deref(), Some("3.0.14"));
    assert!(sup.attempts() >= 2);

    sup.shutdown();
    timeout(TIMEOUT, runner).await.unwrap().unwrap().unwrap();
    assert_eq!(sup.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn filtered_handlers_skip_other_titles() {
    let (url, _inbound) = spawn_server(vec![playlist_update(6), playlist_update(5)]).await;
    let registry = Arc::new(EventRegistry::new());

    let (tx, mut seen) = mpsc::unbounded_channel();
    registry.register_typed::<PlaylistUpdate, _, _>(
        move |update| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(update.id);
                Ok(())
            }
        },
        Some(Filter::new().equals("id", 5)),
    );

    let sup = supervisor(&url, Arc::clone(&registry), None);
    sup.subscribe(json!({"id": 5}), None, None).unwrap();
    let runner = tokio::spawn({
        let sup = Arc::clone(&sup);
        async move { sup.start().await }
    });

    let id = timeout(TIMEOUT, seen.recv()).await.unwrap().unwrap();
    assert_eq!(id, Some(5));

    sup.shutdown();
    timeout(TIMEOUT, runner).await.unwrap().unwrap().unwrap();
    assert!(registry.drain(TIMEOUT).await);
    while let Ok(id) = seen.try_recv() {
        assert_eq!(id, Some(5));
    }
}

#[tokio::test]
async fn send_reaches_the_server_while_connected() {
    let (url, mut inbound) = spawn_server(vec![]).await;
    let registry = Arc::new(EventRegistry::new());
    let sup = supervisor(&url, registry, None);
    let runner = tokio::spawn({
        let sup = Arc::clone(&sup);
        async move { sup.start().await }
    });

    // first connection is closed by the server after its first frame
    let mut states = sup.watch_state();
    let _ = timeout(TIMEOUT, states.wait_for(|s| *s == ConnectionState::Connected))
        .await
        .unwrap()
        .unwrap();
    sup.send(&json!({"hello": 1})).unwrap();
    let (index, text) = timeout(TIMEOUT, inbound.recv()).await.unwrap().unwrap();
    assert_eq!(index, 0);
    assert_eq!(text, json!({"hello": 1}).to_string());

    sup.shutdown();
    timeout(TIMEOUT, runner).await.unwrap().unwrap().unwrap();
}

#[tokio::test]
async fn unreachable_gateway_exhausts_retries() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("ws://{}/", listener.local_addr().unwrap());
    drop(listener);

    let registry = Arc::new(EventRegistry::new());
    let (tx, mut startups) = mpsc::unbounded_channel::<()>();
    registry.register(
        names::STARTUP,
        anilibria_gateway::handler_fn(move |_event| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(());
                Ok(())
            }
        }),
        None,
    );

    let sup = supervisor(&url, registry, Some(2));
    let err = timeout(TIMEOUT, sup.start()).await.unwrap().unwrap_err();
    assert_matches!(err, GatewayError::RetriesExhausted { attempts: 2, .. });
    assert_eq!(sup.attempts(), 2);
    assert!(startups.try_recv().is_err());
}
